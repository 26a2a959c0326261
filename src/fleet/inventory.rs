//! Spare-parts inventory queries.

use anyhow::Result;
use rusqlite::Row;

use crate::fleet::{FleetError, Part};
use crate::storage::Pool;

pub fn list(pool: &Pool) -> Result<Vec<Part>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT ref, designation, quantity, min_threshold, used_on FROM parts ORDER BY ref",
    )?;
    let rows = stmt.query_map([], part_from_row)?;
    let mut parts = Vec::new();
    for row in rows {
        parts.push(row?);
    }
    Ok(parts)
}

/// Parts strictly below their reorder threshold.
pub fn low_stock(pool: &Pool) -> Result<Vec<Part>> {
    Ok(list(pool)?.into_iter().filter(Part::is_low_stock).collect())
}

/// Manager stock correction: set the absolute quantity.
pub fn set_quantity(pool: &Pool, part_ref: &str, quantity: i64) -> Result<Part> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE parts SET quantity = ?1 WHERE ref = ?2",
        rusqlite::params![quantity.max(0), part_ref],
    )?;
    if changed == 0 {
        return Err(FleetError::PartNotFound(part_ref.to_string()).into());
    }
    get(pool, part_ref)
}

/// Consume one unit when a conformity report references a replaced part.
/// Quantity floors at zero; a phantom reference is a caller error.
pub fn consume(pool: &Pool, part_ref: &str) -> Result<()> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE parts SET quantity = MAX(quantity - 1, 0) WHERE ref = ?1",
        [part_ref],
    )?;
    if changed == 0 {
        return Err(FleetError::PartNotFound(part_ref.to_string()).into());
    }
    Ok(())
}

pub fn get(pool: &Pool, part_ref: &str) -> Result<Part> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT ref, designation, quantity, min_threshold, used_on FROM parts WHERE ref = ?1",
        [part_ref],
        part_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            anyhow::Error::from(FleetError::PartNotFound(part_ref.to_string()))
        }
        other => other.into(),
    })
}

fn part_from_row(row: &Row<'_>) -> rusqlite::Result<Part> {
    Ok(Part {
        r#ref: row.get(0)?,
        designation: row.get(1)?,
        quantity: row.get(2)?,
        min_threshold: row.get(3)?,
        used_on: row.get(4)?,
    })
}
