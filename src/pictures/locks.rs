//! Named generation locks and per-picture locks.
//!
//! One async mutex per rendition file name, created on first use. An entry
//! is dropped again when its last holder or waiter lets go, so the table only
//! holds names that are being generated right now.
//!
//! Per-picture locks are read/write: URL lookups that may generate share the
//! read side, so different sizes of one picture still render in parallel,
//! while commands that replace bytes or names take the write side.

use std::sync::Arc;

use dashmap::DashMap;
use picforge_common::PictureId;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::debug;

/// Process-wide table of per-name locks.
#[derive(Debug, Default)]
pub struct GenerationLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Held while a rendition is generated. Releases and prunes on drop.
pub struct GenerationGuard<'a> {
    registry: &'a GenerationLocks,
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl GenerationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `name`.
    pub async fn acquire(&self, name: &str) -> GenerationGuard<'_> {
        let lock = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = match lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Waiting for generation lock {}", name);
                lock.lock_owned().await
            }
        };

        GenerationGuard {
            registry: self,
            name: name.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of names currently held or waited on.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for GenerationGuard<'_> {
    fn drop(&mut self) {
        // Release first so the strong count only reflects the table and waiters.
        drop(self.guard.take());
        self.registry
            .locks
            .remove_if(&self.name, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Process-wide table of per-picture read/write locks.
#[derive(Debug, Default)]
pub struct PictureLocks {
    locks: DashMap<PictureId, Arc<RwLock<()>>>,
}

enum HeldPicture {
    Read(OwnedRwLockReadGuard<()>),
    Write(OwnedRwLockWriteGuard<()>),
}

/// Shared or exclusive hold on one picture. Releases and prunes on drop.
pub struct PictureGuard<'a> {
    registry: &'a PictureLocks,
    id: PictureId,
    guard: Option<HeldPicture>,
}

impl PictureLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, id: PictureId) -> Arc<RwLock<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Shared hold: rendition lookups and generation.
    pub async fn read(&self, id: PictureId) -> PictureGuard<'_> {
        let guard = self.lock_for(id).read_owned().await;
        PictureGuard {
            registry: self,
            id,
            guard: Some(HeldPicture::Read(guard)),
        }
    }

    /// Exclusive hold: changes to the original bytes or the rendition names.
    pub async fn write(&self, id: PictureId) -> PictureGuard<'_> {
        let lock = self.lock_for(id);
        let guard = match lock.clone().try_write_owned() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Waiting for picture lock {}", id);
                lock.write_owned().await
            }
        };
        PictureGuard {
            registry: self,
            id,
            guard: Some(HeldPicture::Write(guard)),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for PictureGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.registry
            .locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_pruned_after_release() {
        let locks = GenerationLocks::new();
        {
            let _guard = locks.acquire("a_100.jpg").await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_names_do_not_block() {
        let locks = GenerationLocks::new();
        let _a = locks.acquire("a.jpg").await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.acquire("b.jpg")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_name_is_serialized() {
        let locks = Arc::new(GenerationLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("same.jpg").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_picture_readers_share() {
        let locks = PictureLocks::new();
        let id = PictureId::new();
        let _a = locks.read(id).await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.read(id)).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_picture_writer_waits_for_readers() {
        let locks = Arc::new(PictureLocks::new());
        let id = PictureId::new();
        let reader = locks.read(id).await;

        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.write(id)).await;
        assert!(blocked.is_err());

        drop(reader);
        let writer = tokio::time::timeout(Duration::from_millis(200), locks.write(id)).await;
        assert!(writer.is_ok());
        drop(writer);
        assert!(locks.is_empty());
    }
}
