// 🗄️ SQLite persistence for generation/validation history
//
// WAL-mode database with three tables:
// - generated_nubans  (GenerationRecord)
// - validations       (ValidationRecord)
// - events            (append-only audit trail)
//
// Record ids are UNIQUE; inserting a record twice is skipped, not an error.

use crate::history::{GenerationRecord, ValidationRecord, ValidationType};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Event for the audit trail
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Open (or create) a database file and make sure the schema exists
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    setup_database(&conn)?;
    tracing::debug!(path = %path.display(), "database ready");
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery (in-memory databases answer "memory")
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS generated_nubans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_id TEXT UNIQUE NOT NULL,
            nuban TEXT NOT NULL,
            bank_code TEXT NOT NULL,
            bank_name TEXT NOT NULL,
            serial_number TEXT NOT NULL,
            check_digit INTEGER NOT NULL,
            generated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS validations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_id TEXT UNIQUE NOT NULL,
            nuban TEXT NOT NULL,
            bank_code TEXT,
            bank_name TEXT,
            is_valid INTEGER NOT NULL,
            reason TEXT NOT NULL,
            validated_at TEXT NOT NULL,
            validation_type TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_generated_bank ON generated_nubans(bank_code)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_validations_time ON validations(validated_at)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn parse_time(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

// ============================================================================
// GENERATIONS
// ============================================================================

/// Insert a generation record and its audit event in one transaction.
/// Returns false if it was already stored.
pub fn insert_generation(conn: &Connection, record: &GenerationRecord) -> Result<bool> {
    let tx = conn.unchecked_transaction()?;
    let result = tx.execute(
        "INSERT INTO generated_nubans (
            record_id, nuban, bank_code, bank_name, serial_number, check_digit, generated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.id,
            record.nuban,
            record.bank_code,
            record.bank_name,
            record.serial_number,
            record.check_digit,
            record.generated_at.to_rfc3339(),
        ],
    );

    match result {
        Ok(_) => {
            let event = Event::new(
                "nuban_generated",
                "generation",
                &record.id,
                serde_json::json!({ "nuban": record.nuban, "bank_code": record.bank_code }),
                "codec",
            );
            insert_event(&tx, &event)?;
            tx.commit().context("Failed to commit generation record")?;
            Ok(true)
        }
        Err(e) if is_constraint_violation(&e) => Ok(false),
        Err(e) => Err(e).context("Failed to insert generation record"),
    }
}

/// Newest first, at most `limit` rows
pub fn load_generations(conn: &Connection, limit: usize) -> Result<Vec<GenerationRecord>> {
    let mut stmt = conn.prepare(
        "SELECT record_id, nuban, bank_code, bank_name, serial_number, check_digit, generated_at
         FROM generated_nubans
         ORDER BY generated_at DESC, id DESC
         LIMIT ?1",
    )?;

    let records = stmt
        .query_map(params![limit as i64], |row| {
            let generated_at: String = row.get(6)?;
            Ok(GenerationRecord {
                id: row.get(0)?,
                nuban: row.get(1)?,
                bank_code: row.get(2)?,
                bank_name: row.get(3)?,
                serial_number: row.get(4)?,
                check_digit: row.get(5)?,
                generated_at: parse_time(&generated_at)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

// ============================================================================
// VALIDATIONS
// ============================================================================

/// Insert a validation record and its audit event in one transaction.
/// Returns false if it was already stored.
pub fn insert_validation(conn: &Connection, record: &ValidationRecord) -> Result<bool> {
    let tx = conn.unchecked_transaction()?;
    let result = tx.execute(
        "INSERT INTO validations (
            record_id, nuban, bank_code, bank_name, is_valid, reason, validated_at, validation_type
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.id,
            record.nuban,
            record.bank_code,
            record.bank_name,
            record.is_valid,
            record.reason,
            record.validated_at.to_rfc3339(),
            record.validation_type.as_str(),
        ],
    );

    match result {
        Ok(_) => {
            let event = Event::new(
                "nuban_validated",
                "validation",
                &record.id,
                serde_json::json!({
                    "nuban": record.nuban,
                    "is_valid": record.is_valid,
                    "validation_type": record.validation_type.as_str(),
                }),
                "codec",
            );
            insert_event(&tx, &event)?;
            tx.commit().context("Failed to commit validation record")?;
            Ok(true)
        }
        Err(e) if is_constraint_violation(&e) => Ok(false),
        Err(e) => Err(e).context("Failed to insert validation record"),
    }
}

/// Newest first, at most `limit` rows
pub fn load_validations(conn: &Connection, limit: usize) -> Result<Vec<ValidationRecord>> {
    let mut stmt = conn.prepare(
        "SELECT record_id, nuban, bank_code, bank_name, is_valid, reason, validated_at, validation_type
         FROM validations
         ORDER BY validated_at DESC, id DESC
         LIMIT ?1",
    )?;

    let records = stmt
        .query_map(params![limit as i64], |row| {
            let validated_at: String = row.get(6)?;
            let validation_type: String = row.get(7)?;
            Ok(ValidationRecord {
                id: row.get(0)?,
                nuban: row.get(1)?,
                bank_code: row.get(2)?,
                bank_name: row.get(3)?,
                is_valid: row.get(4)?,
                reason: row.get(5)?,
                validated_at: parse_time(&validated_at)?,
                validation_type: ValidationType::parse(&validation_type)
                    .unwrap_or(ValidationType::Manual),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn delete_validation(conn: &Connection, record_id: &str) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM validations WHERE record_id = ?1",
        params![record_id],
    )?;
    Ok(removed > 0)
}

/// Wipe both history tables. The audit trail is kept.
pub fn clear_history(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM generated_nubans", [])?;
    tx.execute("DELETE FROM validations", [])?;

    let event = Event::new("history_cleared", "history", "all", serde_json::json!({}), "user");
    insert_event(&tx, &event)?;
    tx.commit().context("Failed to commit history clear")?;
    Ok(())
}

/// Row count for one of the known tables
pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let sql = match table {
        "generated_nubans" => "SELECT COUNT(*) FROM generated_nubans",
        "validations" => "SELECT COUNT(*) FROM validations",
        "events" => "SELECT COUNT(*) FROM events",
        other => anyhow::bail!("unknown table: {}", other),
    };
    let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// EVENTS
// ============================================================================

pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_time(&timestamp)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

/// Most recent event of a given type, if any
pub fn last_event_of_type(conn: &Connection, event_type: &str) -> Result<Option<String>> {
    let id = conn
        .query_row(
            "SELECT event_id FROM events WHERE event_type = ?1 ORDER BY id DESC LIMIT 1",
            params![event_type],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

// ============================================================================
// TESTS
// ============================================================================
