use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;

/// Register a medication in the reference table.
pub fn insert_medication(
    conn: &Connection,
    medication_id: &str,
    name: &str,
    generic_name: Option<&str>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medications (medication_id, name, generic_name) VALUES (?1, ?2, ?3)",
        params![medication_id, name, generic_name],
    )?;
    Ok(())
}

pub fn medication_name(
    conn: &Connection,
    medication_id: &str,
) -> Result<Option<String>, DatabaseError> {
    let name = conn
        .query_row(
            "SELECT name FROM medications WHERE medication_id = ?1",
            params![medication_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(name)
}
