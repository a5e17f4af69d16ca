//! Picture database queries.
//!
//! This module provides CRUD operations for picture records, access to the
//! optional binary column, and filtered listing.

use chrono::{DateTime, Utc};
use picforge_common::{Error, PictureId, PictureReference, Result};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension};

use crate::models::{Picture, PictureFilter};

const PICTURE_COLUMNS: &str = "id, mime_type, seo_filename, alt_attribute, title_attribute,
     reference, object_id, is_new, created_at, updated_at";

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

/// Parse a picture from a database row.
///
/// Expects columns in the order of [`PICTURE_COLUMNS`].
fn parse_picture_row(row: &rusqlite::Row) -> rusqlite::Result<Picture> {
    let id: String = row.get(0)?;
    let reference: String = row.get(5)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(Picture {
        id: id.parse().map_err(|e| conversion_error(0, e))?,
        mime_type: row.get(1)?,
        seo_filename: row.get(2)?,
        alt_attribute: row.get(3)?,
        title_attribute: row.get(4)?,
        reference: reference.parse().map_err(|e| conversion_error(5, e))?,
        object_id: row.get(6)?,
        is_new: row.get(7)?,
        created_at: parse_timestamp(8, &created_at)?,
        updated_at: parse_timestamp(9, &updated_at)?,
    })
}

/// Insert a new picture record.
///
/// `binary` is stored in the record only when pictures live in the database;
/// pass `None` when the bytes go to a byte store.
///
/// # Returns
///
/// * `Ok(PictureId)` - The ID of the inserted picture
/// * `Err(Error)` - If a database error occurs
pub fn insert_picture(conn: &Connection, picture: &Picture, binary: Option<&[u8]>) -> Result<PictureId> {
    conn.execute(
        "INSERT INTO pictures (id, mime_type, seo_filename, alt_attribute, title_attribute,
                               reference, object_id, is_new, picture_binary, created_at, updated_at)
         VALUES (:id, :mime_type, :seo_filename, :alt_attribute, :title_attribute,
                 :reference, :object_id, :is_new, :picture_binary, :created_at, :updated_at)",
        rusqlite::named_params! {
            ":id": picture.id.to_string(),
            ":mime_type": &picture.mime_type,
            ":seo_filename": &picture.seo_filename,
            ":alt_attribute": &picture.alt_attribute,
            ":title_attribute": &picture.title_attribute,
            ":reference": picture.reference.as_str(),
            ":object_id": &picture.object_id,
            ":is_new": picture.is_new,
            ":picture_binary": binary,
            ":created_at": picture.created_at.to_rfc3339(),
            ":updated_at": picture.updated_at.to_rfc3339(),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(picture.id)
}

/// Get a picture by ID.
///
/// # Returns
///
/// * `Ok(Some(Picture))` - The picture if found
/// * `Ok(None)` - If the picture does not exist
/// * `Err(Error)` - If a database error occurs
pub fn get_picture(conn: &Connection, id: PictureId) -> Result<Option<Picture>> {
    conn.query_row(
        &format!("SELECT {} FROM pictures WHERE id = :id", PICTURE_COLUMNS),
        rusqlite::named_params! { ":id": id.to_string() },
        parse_picture_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Get the binary stored in a picture record.
///
/// Returns `Ok(None)` both for unknown ids and for records whose bytes live
/// in a byte store.
pub fn get_picture_binary(conn: &Connection, id: PictureId) -> Result<Option<Vec<u8>>> {
    let binary = conn
        .query_row(
            "SELECT picture_binary FROM pictures WHERE id = :id",
            rusqlite::named_params! { ":id": id.to_string() },
            |row| row.get::<_, Option<Vec<u8>>>(0),
        )
        .optional()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(binary.flatten())
}

/// Update the metadata columns of a picture.
///
/// Leaves the binary column untouched and refreshes `updated_at`.
///
/// # Returns
///
/// * `Ok(true)` - If the picture was updated
/// * `Ok(false)` - If the picture did not exist
pub fn update_picture(conn: &Connection, picture: &Picture) -> Result<bool> {
    let rows = conn
        .execute(
            "UPDATE pictures SET mime_type = :mime_type, seo_filename = :seo_filename,
                    alt_attribute = :alt_attribute, title_attribute = :title_attribute,
                    reference = :reference, object_id = :object_id, is_new = :is_new,
                    updated_at = :updated_at
             WHERE id = :id",
            rusqlite::named_params! {
                ":id": picture.id.to_string(),
                ":mime_type": &picture.mime_type,
                ":seo_filename": &picture.seo_filename,
                ":alt_attribute": &picture.alt_attribute,
                ":title_attribute": &picture.title_attribute,
                ":reference": picture.reference.as_str(),
                ":object_id": &picture.object_id,
                ":is_new": picture.is_new,
                ":updated_at": Utc::now().to_rfc3339(),
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(rows > 0)
}

/// Replace (or clear, with `None`) the binary stored in a picture record.
pub fn update_picture_binary(conn: &Connection, id: PictureId, binary: Option<&[u8]>) -> Result<bool> {
    let rows = conn
        .execute(
            "UPDATE pictures SET picture_binary = :picture_binary, updated_at = :updated_at
             WHERE id = :id",
            rusqlite::named_params! {
                ":id": id.to_string(),
                ":picture_binary": binary,
                ":updated_at": Utc::now().to_rfc3339(),
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(rows > 0)
}

/// Persist only the seo filename of a picture.
pub fn set_seo_filename(conn: &Connection, id: PictureId, seo_filename: &str) -> Result<bool> {
    let rows = conn
        .execute(
            "UPDATE pictures SET seo_filename = :seo_filename, updated_at = :updated_at
             WHERE id = :id",
            rusqlite::named_params! {
                ":id": id.to_string(),
                ":seo_filename": seo_filename,
                ":updated_at": Utc::now().to_rfc3339(),
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(rows > 0)
}

/// Persist only the `is_new` flag of a picture.
pub fn set_is_new(conn: &Connection, id: PictureId, is_new: bool) -> Result<bool> {
    let rows = conn
        .execute(
            "UPDATE pictures SET is_new = :is_new, updated_at = :updated_at WHERE id = :id",
            rusqlite::named_params! {
                ":id": id.to_string(),
                ":is_new": is_new,
                ":updated_at": Utc::now().to_rfc3339(),
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(rows > 0)
}

/// Delete a picture by ID.
///
/// # Returns
///
/// * `Ok(true)` - If the picture was deleted
/// * `Ok(false)` - If the picture did not exist
pub fn delete_picture(conn: &Connection, id: PictureId) -> Result<bool> {
    let rows_affected = conn
        .execute(
            "DELETE FROM pictures WHERE id = :id",
            rusqlite::named_params! { ":id": id.to_string() },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(rows_affected > 0)
}

fn filter_clause(filter: &PictureFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let Some(reference) = filter.reference {
        conditions.push("reference = ?");
        params.push(Value::Text(reference.as_str().to_string()));
    }
    if let Some(object_id) = &filter.object_id {
        conditions.push("object_id = ?");
        params.push(Value::Text(object_id.clone()));
    }
    if let Some(is_new) = filter.is_new {
        conditions.push("is_new = ?");
        params.push(Value::Integer(i64::from(is_new)));
    }

    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }
}

/// List pictures matching a filter, oldest first.
pub fn list_pictures(conn: &Connection, filter: &PictureFilter) -> Result<Vec<Picture>> {
    let (where_clause, mut params) = filter_clause(filter);

    let mut sql = format!(
        "SELECT {} FROM pictures{} ORDER BY created_at, id",
        PICTURE_COLUMNS, where_clause
    );
    if filter.limit.is_some() || filter.offset.is_some() {
        sql.push_str(" LIMIT ? OFFSET ?");
        params.push(Value::Integer(filter.limit.map(i64::from).unwrap_or(-1)));
        params.push(Value::Integer(filter.offset.map(i64::from).unwrap_or(0)));
    }

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::database(e.to_string()))?;

    let pictures = stmt
        .query_map(rusqlite::params_from_iter(params), parse_picture_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(pictures)
}

/// Count pictures matching a filter (limit and offset are ignored).
pub fn count_pictures(conn: &Connection, filter: &PictureFilter) -> Result<u64> {
    let (where_clause, params) = filter_clause(filter);

    let count: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM pictures{}", where_clause),
            rusqlite::params_from_iter(params),
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(count as u64)
}
