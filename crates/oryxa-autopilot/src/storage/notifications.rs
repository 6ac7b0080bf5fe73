//! Notification outbox persistence.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::{fmt_ts, parse_ts, to_json, AutopilotDb};
use crate::notify::{Notification, NotificationPayload};

/// A notification as stored in the outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredNotification {
    pub id: i64,
    #[serde(flatten)]
    pub notification: Notification,
    pub created_at: DateTime<Utc>,
}

impl AutopilotDb {
    pub fn insert_notification(
        &self,
        notification: &Notification,
        now: DateTime<Utc>,
    ) -> Result<i64, rusqlite::Error> {
        self.conn().execute(
            "INSERT INTO notifications (owner_id, title, body, priority, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                notification.owner_id,
                notification.title,
                notification.body,
                notification.priority,
                to_json(&notification.payload)?,
                fmt_ts(now),
            ],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    /// Most recent notifications of `owner_id` first.
    pub fn list_notifications(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredNotification>, rusqlite::Error> {
        let mut stmt = self.conn().prepare(
            "SELECT id, owner_id, title, body, priority, payload, created_at
             FROM notifications WHERE owner_id = ?1
             ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![owner_id, limit as i64], |row| {
            let payload: String = row.get(5)?;
            let payload: NotificationPayload = serde_json::from_str(&payload).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
            })?;
            Ok(StoredNotification {
                id: row.get(0)?,
                notification: Notification {
                    owner_id: row.get(1)?,
                    title: row.get(2)?,
                    body: row.get(3)?,
                    priority: row.get(4)?,
                    payload,
                },
                created_at: parse_ts(6, &row.get::<_, String>(6)?)?,
            })
        })?;
        rows.collect()
    }
}
