// src/storage/store.rs — SQLite operations

use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::infra::errors::HaulbotError;
use crate::pipeline::report::Profile;

/// One submitted report as it lands in `driver_reports`. The insertion
/// timestamp is generated inside `insert_driver_report`, not carried here.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub full_name: String,
    pub phone_number: String,
    pub username: String,
    pub user_id: i64,
    pub zone: String,
    pub latitude: f64,
    pub longitude: f64,
    pub reason: String,
    pub plate_or_comment: String,
    pub photo_name: String,
    pub full_address: String,
    pub city: String,
    pub county: String,
    pub district: String,
    pub suburb: String,
    pub street: String,
    pub house_number: String,
}

/// User directory and report persistence. The connection sits behind a
/// mutex so concurrent per-user tasks can share one handle.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("sqlite connection poisoned")
    }

    // -- User directory --

    pub fn is_registered(&self, user_id: i64) -> Result<bool, HaulbotError> {
        let conn = self.conn();
        let found: Option<i64> = conn
            .query_row("SELECT id FROM users WHERE id = ?1", params![user_id], |r| {
                r.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    pub fn is_banned(&self, user_id: i64) -> Result<bool, HaulbotError> {
        let conn = self.conn();
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM ban_list WHERE user_id = ?1",
                params![user_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn is_admin(&self, user_id: i64) -> Result<bool, HaulbotError> {
        let conn = self.conn();
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM admins WHERE user_id = ?1",
                params![user_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Idempotent insert: a duplicate id is ignored, not an error.
    pub fn register_user(
        &self,
        user_id: i64,
        full_name: &str,
        phone_number: &str,
        username: Option<&str>,
    ) -> Result<(), HaulbotError> {
        self.conn().execute(
            "INSERT OR IGNORE INTO users (id, full_name, phone_number, username)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, full_name, phone_number, username],
        )?;
        Ok(())
    }

    pub fn get_user_by_id(&self, user_id: i64) -> Result<Option<Profile>, HaulbotError> {
        let conn = self.conn();
        let profile = conn
            .query_row(
                "SELECT full_name, phone_number, username FROM users WHERE id = ?1",
                params![user_id],
                |r| {
                    Ok(Profile {
                        full_name: r.get::<_, Option<String>>(0)?.unwrap_or_default(),
                        phone_number: r.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        username: r.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    /// Remove a user from `users` and add them to `ban_list`.
    /// Returns false if the user was not registered.
    pub fn ban_user(&self, user_id: i64) -> Result<bool, HaulbotError> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;

        let found: Option<i64> = tx
            .query_row("SELECT id FROM users WHERE id = ?1", params![user_id], |r| {
                r.get(0)
            })
            .optional()?;
        if found.is_none() {
            return Ok(false);
        }

        tx.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
        tx.execute(
            "INSERT INTO ban_list (user_id) VALUES (?1)",
            params![user_id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    // -- Driver reports --

    /// Insert a report row, stamping it with the UNIX time of insertion.
    /// Returns the auto-incremented row id.
    pub fn insert_driver_report(&self, row: &ReportRow) -> Result<i64, HaulbotError> {
        let conn = self.conn();
        let timestamp = Utc::now().timestamp();
        conn.execute(
            "INSERT INTO driver_reports (
                timestamp, full_name, phone_number, username, user_id, zone,
                latitude, longitude, reason, plate_or_comment, photo_name,
                full_address, city, county, district, suburb, street, house_number
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                timestamp,
                row.full_name,
                row.phone_number,
                row.username,
                row.user_id,
                row.zone,
                row.latitude,
                row.longitude,
                row.reason,
                row.plate_or_comment,
                row.photo_name,
                row.full_address,
                row.city,
                row.county,
                row.district,
                row.suburb,
                row.street,
                row.house_number,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn count_driver_reports(&self) -> Result<i64, HaulbotError> {
        let conn = self.conn();
        let count = conn.query_row("SELECT COUNT(*) FROM driver_reports", [], |r| r.get(0))?;
        Ok(count)
    }

    // Test and ops helper: admins are provisioned out of band.
    pub fn add_admin(&self, user_id: i64) -> Result<(), HaulbotError> {
        self.conn().execute(
            "INSERT INTO admins (user_id) VALUES (?1)",
            params![user_id],
        )?;
        Ok(())
    }
}
