// EnergyDash Store - SQLite persistence adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Notification rows

use chrono::{DateTime, Utc};
use energydash::{NewNotification, NotificationCategory, NotificationEvent};
use log::debug;
use rusqlite::{params, OptionalExtension, Row};

use crate::error::{Result, StoreError};
use crate::{to_limit, SqliteStore};

const SELECT_NOTIFICATION: &str =
    "SELECT id, title, message, type, is_read, created_at FROM notifications";

type RawNotification = (i64, String, String, String, bool, String);

fn read_raw(row: &Row<'_>) -> rusqlite::Result<RawNotification> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_event(raw: RawNotification) -> Result<NotificationEvent> {
    let (id, title, message, category, read, created_at) = raw;
    let category = category
        .parse::<NotificationCategory>()
        .map_err(|_| StoreError::InvalidCategory(category))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidTimestamp {
            column: "created_at",
            value: created_at,
        })?;

    Ok(NotificationEvent {
        id,
        title,
        message,
        category,
        read,
        created_at,
    })
}

impl SqliteStore {
    /// Persist a notification; the store assigns id and creation time
    pub fn insert_notification(&self, new: &NewNotification) -> Result<NotificationEvent> {
        let created_at = Utc::now();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notifications (title, message, type, is_read, created_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![
                new.title,
                new.message,
                new.category.as_str(),
                created_at.to_rfc3339()
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Stored notification {} ({})", id, new.category);

        Ok(NotificationEvent {
            id,
            title: new.title.clone(),
            message: new.message.clone(),
            category: new.category,
            read: false,
            created_at,
        })
    }

    /// Look a notification up by id
    pub fn notification(&self, id: i64) -> Result<Option<NotificationEvent>> {
        let raw = {
            let conn = self.lock()?;
            conn.query_row(
                &format!("{SELECT_NOTIFICATION} WHERE id = ?1"),
                params![id],
                read_raw,
            )
            .optional()?
        };
        raw.map(into_event).transpose()
    }

    /// Newest notifications first
    pub fn notifications(&self, limit: usize) -> Result<Vec<NotificationEvent>> {
        let raw = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&format!(
                "{SELECT_NOTIFICATION} ORDER BY created_at DESC, id DESC LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map(params![to_limit(limit)], read_raw)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        raw.into_iter().map(into_event).collect()
    }

    /// Set the read flag. Returns `false` if no notification has this id.
    pub fn mark_notification_read(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(changed > 0)
    }
}
