//! Database schema, migrations, and reference-data seed.

use anyhow::Result;
use rusqlite::Connection;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS components (
            name TEXT PRIMARY KEY,
            max_criticality INTEGER NOT NULL CHECK (max_criticality BETWEEN 0 AND 100)
        );

        CREATE TABLE IF NOT EXISTS trains (
            id TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            commissioned_on TEXT NOT NULL,
            km_total INTEGER NOT NULL DEFAULT 0,
            health INTEGER NOT NULL DEFAULT 100 CHECK (health BETWEEN 0 AND 100),
            last_inspection TEXT
        );

        CREATE TABLE IF NOT EXISTS anomalies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            train_id TEXT NOT NULL,
            technician TEXT NOT NULL,
            reported_at TEXT NOT NULL,
            category TEXT NOT NULL,
            component TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            immobilization INTEGER NOT NULL DEFAULT 0,
            severity TEXT NOT NULL,
            calculated_criticality INTEGER NOT NULL CHECK (calculated_criticality BETWEEN 0 AND 100),
            urgency TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'to_treat',
            FOREIGN KEY (train_id) REFERENCES trains(id)
        );

        CREATE TABLE IF NOT EXISTS conformities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            train_id TEXT NOT NULL,
            performed_at TEXT NOT NULL,
            technician TEXT NOT NULL,
            intervention_type TEXT NOT NULL,
            component TEXT NOT NULL,
            part_ref TEXT,
            result TEXT NOT NULL,
            observations TEXT NOT NULL DEFAULT '',
            FOREIGN KEY (train_id) REFERENCES trains(id)
        );

        CREATE TABLE IF NOT EXISTS parts (
            ref TEXT PRIMARY KEY,
            designation TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 0,
            min_threshold INTEGER NOT NULL DEFAULT 0,
            used_on TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX IF NOT EXISTS idx_anomalies_train_reported
            ON anomalies(train_id, reported_at);
        CREATE INDEX IF NOT EXISTS idx_anomalies_train_component
            ON anomalies(train_id, component, reported_at);
        CREATE INDEX IF NOT EXISTS idx_conformities_train
            ON conformities(train_id, performed_at);",
    )?;

    Ok(())
}

/// Seed catalog and demo fleet data. Safe to call repeatedly: only writes
/// into empty tables, so operator edits survive restarts.
pub fn seed(conn: &Connection) -> Result<()> {
    let component_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM components", [], |row| row.get(0))?;
    if component_count == 0 {
        // AMDEC criticality ceilings per component family.
        let components: &[(&str, i64)] = &[
            ("frein", 95),
            ("porte", 80),
            ("moteur", 90),
            ("climatisation", 40),
            ("compresseur", 85),
            ("batterie", 70),
            ("pantographe", 88),
        ];
        let mut stmt =
            conn.prepare("INSERT INTO components (name, max_criticality) VALUES (?1, ?2)")?;
        for (name, max) in components {
            stmt.execute(rusqlite::params![name, max])?;
        }
    }

    let train_count: i64 = conn.query_row("SELECT COUNT(*) FROM trains", [], |row| row.get(0))?;
    if train_count == 0 {
        let trains: &[(&str, &str, &str, i64)] = &[
            ("Z2M-01", "Z2M", "2010-05-20", 450_000),
            ("Z2M-05", "Z2M", "2011-07-12", 512_000),
            ("Z2M-08", "Z2M", "2009-03-03", 600_000),
        ];
        let mut stmt = conn.prepare(
            "INSERT INTO trains (id, model, commissioned_on, km_total, health) VALUES (?1, ?2, ?3, ?4, 100)",
        )?;
        for (id, model, commissioned, km) in trains {
            stmt.execute(rusqlite::params![id, model, commissioned, km])?;
        }
    }

    let part_count: i64 = conn.query_row("SELECT COUNT(*) FROM parts", [], |row| row.get(0))?;
    if part_count == 0 {
        let parts: &[(&str, &str, i64, i64, &str)] = &[
            ("VP001", "Valve de pression", 4, 2, "frein,hydraulique"),
            ("VR003", "Vérin porte", 2, 1, "porte"),
            ("PLT10", "Plaquette de frein", 20, 5, "frein"),
        ];
        let mut stmt = conn.prepare(
            "INSERT INTO parts (ref, designation, quantity, min_threshold, used_on) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (part_ref, designation, qty, threshold, used_on) in parts {
            stmt.execute(rusqlite::params![part_ref, designation, qty, threshold, used_on])?;
        }
    }

    Ok(())
}
