//! Database query modules.
//!
//! - pictures: Picture metadata CRUD, binary column access, and filtered listing

pub mod pictures;
