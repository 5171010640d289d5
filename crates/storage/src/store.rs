//! SQLite event store implementation.

use crate::{Event, EventKind, Result, SessionId};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use std::path::Path;

/// SQLite-backed event store.
pub struct EventStore {
    conn: Connection,
}

/// One row of `list_sessions` output.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: SessionId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub message_count: usize,
}

impl EventStore {
    /// Open or create an event store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory event store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                seq INTEGER,
                timestamp TEXT NOT NULL,
                kind TEXT NOT NULL,
                data TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_session
                ON events(session_id, seq);
            "#,
        )?;
        Ok(())
    }

    /// Append an event to the store.
    pub fn append(&self, event: &Event) -> Result<()> {
        // seq preserves append order even when timestamps collide
        self.conn.execute(
            "INSERT INTO events (id, session_id, seq, timestamp, kind, data)
             VALUES (?1, ?2,
                     (SELECT COALESCE(MAX(seq), 0) + 1 FROM events WHERE session_id = ?2),
                     ?3, ?4, ?5)",
            params![
                event.id.to_string(),
                event.session_id.to_string(),
                event.timestamp.to_rfc3339(),
                event_kind_name(&event.kind),
                serde_json::to_string(&event.kind)?,
            ],
        )?;
        Ok(())
    }

    /// Load events for a session in append order, optionally filtered by kind.
    pub fn load_events(&self, session_id: SessionId, kind: Option<&str>) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, timestamp, data FROM events
             WHERE session_id = ?1 AND (?2 IS NULL OR kind = ?2)
             ORDER BY seq",
        )?;

        let events = stmt
            .query_map(params![session_id.to_string(), kind], |row| {
                let id: String = row.get(0)?;
                let session_id: String = row.get(1)?;
                let timestamp: String = row.get(2)?;
                let data: String = row.get(3)?;
                Ok((id, session_id, timestamp, data))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(id, session_id, timestamp, data)| {
                Some(Event {
                    id: id.parse().ok()?,
                    session_id: SessionId(session_id.parse().ok()?),
                    timestamp: timestamp.parse::<DateTime<Utc>>().ok()?,
                    kind: serde_json::from_str(&data).ok()?,
                })
            })
            .collect();

        Ok(events)
    }

    /// List all sessions, most recently started first.
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id,
                    MIN(timestamp),
                    MAX(CASE WHEN kind = 'session_end' THEN timestamp END),
                    SUM(CASE WHEN kind = 'message' THEN 1 ELSE 0 END)
             FROM events
             GROUP BY session_id
             ORDER BY MIN(timestamp) DESC",
        )?;

        let sessions = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let started: String = row.get(1)?;
                let ended: Option<String> = row.get(2)?;
                let messages: i64 = row.get(3)?;
                Ok((id, started, ended, messages))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(id, started, ended, messages)| {
                Some(SessionSummary {
                    id: SessionId(id.parse().ok()?),
                    started_at: started.parse::<DateTime<Utc>>().ok()?,
                    ended_at: ended.and_then(|t| t.parse::<DateTime<Utc>>().ok()),
                    message_count: messages.max(0) as usize,
                })
            })
            .collect();

        Ok(sessions)
    }
}

fn event_kind_name(kind: &EventKind) -> &'static str {
    match kind {
        EventKind::SessionStart => "session_start",
        EventKind::SessionEnd => "session_end",
        EventKind::ProviderConnected { .. } => "provider_connected",
        EventKind::Message { .. } => "message",
        EventKind::ToolCall { .. } => "tool_call",
        EventKind::ToolResult { .. } => "tool_result",
        EventKind::HistoryCleared => "history_cleared",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    #[test]
    fn append_and_load_round_trip() {
        let store = EventStore::in_memory().unwrap();
        let session = SessionId::new();

        store
            .append(&Event::new(session, EventKind::SessionStart))
            .unwrap();
        store
            .append(&Event::message(session, Role::User, "order a pizza"))
            .unwrap();
        store
            .append(&Event::tool_call(
                session,
                "call-1",
                "add_to_order",
                serde_json::json!({"item_code": "14SCREEN"}),
            ))
            .unwrap();
        store
            .append(&Event::tool_result(
                session,
                "call-1",
                "add_to_order",
                false,
                "added 1x 14SCREEN",
            ))
            .unwrap();

        let events = store.load_events(session, None).unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0].kind, EventKind::SessionStart));
        assert!(matches!(
            &events[3].kind,
            EventKind::ToolResult { is_error: false, .. }
        ));
    }

    #[test]
    fn load_events_filters_by_kind() {
        let store = EventStore::in_memory().unwrap();
        let session = SessionId::new();

        store
            .append(&Event::message(session, Role::User, "hi"))
            .unwrap();
        store
            .append(&Event::tool_call(
                session,
                "call-1",
                "search_menu",
                serde_json::json!({"query": "wings"}),
            ))
            .unwrap();

        let calls = store.load_events(session, Some("tool_call")).unwrap();
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0].kind, EventKind::ToolCall { name, .. } if name == "search_menu"));
    }

    #[test]
    fn list_sessions_summarizes() {
        let store = EventStore::in_memory().unwrap();
        let open_session = SessionId::new();
        let ended_session = SessionId::new();

        store
            .append(&Event::new(ended_session, EventKind::SessionStart))
            .unwrap();
        store
            .append(&Event::message(ended_session, Role::User, "hello"))
            .unwrap();
        store
            .append(&Event::message(ended_session, Role::Assistant, "hi there"))
            .unwrap();
        store
            .append(&Event::new(ended_session, EventKind::SessionEnd))
            .unwrap();

        store
            .append(&Event::new(open_session, EventKind::SessionStart))
            .unwrap();

        let sessions = store.list_sessions().unwrap();
        assert_eq!(sessions.len(), 2);

        let ended = sessions.iter().find(|s| s.id == ended_session).unwrap();
        assert_eq!(ended.message_count, 2);
        assert!(ended.ended_at.is_some());

        let open = sessions.iter().find(|s| s.id == open_session).unwrap();
        assert_eq!(open.message_count, 0);
        assert!(open.ended_at.is_none());
    }

    #[test]
    fn events_come_back_in_append_order() {
        let store = EventStore::in_memory().unwrap();
        let session = SessionId::new();

        for i in 0..5 {
            store
                .append(&Event::message(session, Role::User, format!("msg {i}")))
                .unwrap();
        }

        let events = store.load_events(session, None).unwrap();
        let contents: Vec<String> = events
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::Message { content, .. } => Some(content.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(contents, vec!["msg 0", "msg 1", "msg 2", "msg 3", "msg 4"]);
    }
}
