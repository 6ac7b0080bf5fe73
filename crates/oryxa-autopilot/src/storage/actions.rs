//! Audit ledger persistence. Rows are only ever inserted.

use rusqlite::{params, OptionalExtension, Row};

use super::{fmt_ts, parse_enum, parse_opt_json, parse_ts, to_opt_json, AutopilotDb};
use crate::decision::Action;
use crate::ledger::{ActionKind, AutopilotAction};

const ACTION_COLUMNS: &str = "id, owner_id, conflict_id, kind, suggested_action, confidence,
     patch_before, patch_after, undo_token, consumes_token, created_at";

fn row_to_action(row: &Row) -> rusqlite::Result<AutopilotAction> {
    let suggested_action: Option<String> = row.get(4)?;
    Ok(AutopilotAction {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        conflict_id: row.get(2)?,
        kind: parse_enum(3, &row.get::<_, String>(3)?, ActionKind::parse)?,
        suggested_action: suggested_action
            .map(|s| parse_enum(4, &s, Action::parse))
            .transpose()?,
        confidence: row.get(5)?,
        patch_before: parse_opt_json(6, row.get(6)?)?,
        patch_after: parse_opt_json(7, row.get(7)?)?,
        undo_token: row.get(8)?,
        consumes_token: row.get(9)?,
        created_at: parse_ts(10, &row.get::<_, String>(10)?)?,
    })
}

impl AutopilotDb {
    /// Insert an audit row; `action.id` is ignored. Returns the new row id.
    pub fn insert_action(&self, action: &AutopilotAction) -> Result<i64, rusqlite::Error> {
        self.conn().execute(
            "INSERT INTO autopilot_actions (owner_id, conflict_id, kind, suggested_action, confidence,
                patch_before, patch_after, undo_token, consumes_token, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                action.owner_id,
                action.conflict_id,
                action.kind.as_str(),
                action.suggested_action.map(|a| a.as_str()),
                action.confidence,
                to_opt_json(action.patch_before.as_ref())?,
                to_opt_json(action.patch_after.as_ref())?,
                action.undo_token,
                action.consumes_token,
                fmt_ts(action.created_at),
            ],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    /// The apply/suggest row that issued `token`.
    pub fn find_action_by_token(&self, token: &str) -> Result<Option<AutopilotAction>, rusqlite::Error> {
        self.conn()
            .query_row(
                &format!("SELECT {ACTION_COLUMNS} FROM autopilot_actions WHERE undo_token = ?1"),
                params![token],
                row_to_action,
            )
            .optional()
    }

    /// Whether an undo row has already consumed `token`.
    pub fn is_token_consumed(&self, token: &str) -> Result<bool, rusqlite::Error> {
        self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM autopilot_actions WHERE consumes_token = ?1)",
            params![token],
            |row| row.get(0),
        )
    }

    /// Audit trail of a conflict, oldest first.
    pub fn list_actions(&self, conflict_id: &str) -> Result<Vec<AutopilotAction>, rusqlite::Error> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ACTION_COLUMNS} FROM autopilot_actions WHERE conflict_id = ?1 ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(params![conflict_id], row_to_action)?;
        rows.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use chrono::{TimeZone, Utc};

    fn action(kind: ActionKind, token: Option<&str>, consumes: Option<&str>) -> AutopilotAction {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        AutopilotAction {
            id: 0,
            owner_id: "u1".into(),
            conflict_id: "c1".into(),
            kind,
            suggested_action: Some(Action::MakeTentative),
            confidence: Some(81.0),
            patch_before: Some(Event::new("u1", "Gym", now, now + chrono::Duration::hours(1)).unwrap()),
            patch_after: None,
            undo_token: token.map(String::from),
            consumes_token: consumes.map(String::from),
            created_at: now,
        }
    }

    #[test]
    fn action_roundtrip_by_token() {
        let db = AutopilotDb::open_memory().unwrap();
        let original = action(ActionKind::Apply, Some("tok-1"), None);
        let id = db.insert_action(&original).unwrap();

        let found = db.find_action_by_token("tok-1").unwrap().unwrap();
        assert_eq!(found, AutopilotAction { id, ..original });
        assert!(db.find_action_by_token("tok-2").unwrap().is_none());
    }

    #[test]
    fn a_token_can_be_consumed_once() {
        let db = AutopilotDb::open_memory().unwrap();
        db.insert_action(&action(ActionKind::Apply, Some("tok-1"), None)).unwrap();
        assert!(!db.is_token_consumed("tok-1").unwrap());

        db.insert_action(&action(ActionKind::Undo, None, Some("tok-1"))).unwrap();
        assert!(db.is_token_consumed("tok-1").unwrap());
        assert!(db.insert_action(&action(ActionKind::Undo, None, Some("tok-1"))).is_err());

        let kinds: Vec<_> = db.list_actions("c1").unwrap().iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![ActionKind::Apply, ActionKind::Undo]);
    }

    #[test]
    fn issued_tokens_are_unique() {
        let db = AutopilotDb::open_memory().unwrap();
        db.insert_action(&action(ActionKind::Suggest, Some("dup"), None)).unwrap();
        assert!(db.insert_action(&action(ActionKind::Apply, Some("dup"), None)).is_err());
    }
}
