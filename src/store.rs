use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ExplorerError;
use crate::presets::TeamCache;
use crate::types::{ApiResponse, HistoryItem, HttpMethod, RequestConfig, ResponseBody};

const ACTIVE_TEAM_KEY: &str = "active_team_id";
const TEAM_IDS_KEY: &str = "team_ids";

/// SQLite store for request history and the small key/value cache that
/// remembers team ids between runs.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, ExplorerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, ExplorerError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, ExplorerError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                method TEXT NOT NULL,
                url TEXT NOT NULL,
                request_headers TEXT,
                request_body TEXT,
                status_code INTEGER,
                status_text TEXT,
                duration_ms INTEGER,
                response_size INTEGER,
                response_headers TEXT,
                response_body TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_timestamp ON history(timestamp DESC)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a new history item
    pub fn insert_history(
        &self,
        method: HttpMethod,
        url: &str,
        request_headers: &[(String, String)],
        request_body: Option<&str>,
        response: Option<&ApiResponse>,
    ) -> Result<i64, ExplorerError> {
        let conn = self.conn();

        let timestamp = chrono::Utc::now().to_rfc3339();
        let request_headers = serde_json::to_string(request_headers)?;
        let response_headers = response
            .map(|r| serde_json::to_string(&r.headers))
            .transpose()?;
        let response_body = response.map(|r| serde_json::to_string(&r.body)).transpose()?;

        conn.execute(
            "INSERT INTO history (timestamp, method, url, request_headers, request_body, status_code,
                                  status_text, duration_ms, response_size, response_headers, response_body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                timestamp,
                method.as_str(),
                url,
                request_headers,
                request_body,
                response.map(|r| r.status as i64),
                response.map(|r| r.status_text.clone()),
                response.map(|r| r.timing as i64),
                response.and_then(|r| r.size).map(|s| s as i64),
                response_headers,
                response_body,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Record a sent request. Credential headers are stored masked.
    pub fn record_request(
        &self,
        config: &RequestConfig,
        response: Option<&ApiResponse>,
    ) -> Result<i64, ExplorerError> {
        self.insert_history(
            config.method(),
            config.url(),
            &config.recorded_headers(),
            config.outgoing_body(),
            response,
        )
    }

    /// Load recent history items, newest first
    pub fn load_recent_history(&self, limit: usize) -> Result<Vec<HistoryItem>, ExplorerError> {
        let conn = self.conn();

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, method, url, request_headers, request_body, status_code,
                    status_text, duration_ms, response_size, response_headers, response_body
             FROM history
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let items = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp: String = row.get(1)?;
            let method: String = row.get(2)?;
            let url: String = row.get(3)?;
            let request_headers: Option<String> = row.get(4)?;
            let request_body: Option<String> = row.get(5)?;
            let status_code: Option<i64> = row.get(6)?;
            let status_text: Option<String> = row.get(7)?;
            let duration_ms: Option<i64> = row.get(8)?;
            let response_size: Option<i64> = row.get(9)?;
            let response_headers: Option<String> = row.get(10)?;
            let response_body: Option<String> = row.get(11)?;

            let headers: Vec<(String, String)> = request_headers
                .and_then(|h| serde_json::from_str(&h).ok())
                .unwrap_or_default();

            let response = if let (Some(status), Some(duration)) = (status_code, duration_ms) {
                let resp_headers: Vec<(String, String)> = response_headers
                    .and_then(|h| serde_json::from_str(&h).ok())
                    .unwrap_or_default();
                let body: ResponseBody = response_body
                    .and_then(|b| serde_json::from_str(&b).ok())
                    .unwrap_or_else(|| ResponseBody::Text(String::new()));

                Some(ApiResponse {
                    status: status as u16,
                    status_text: status_text.unwrap_or_default(),
                    headers: resp_headers,
                    body,
                    timing: duration as u64,
                    size: response_size.map(|s| s as usize),
                })
            } else {
                None
            };

            Ok(HistoryItem {
                id,
                timestamp,
                method: HttpMethod::from_str(&method).unwrap_or(HttpMethod::GET),
                url,
                headers,
                body: request_body,
                response,
            })
        })?;

        let mut result = Vec::new();
        for item in items {
            result.push(item?);
        }

        Ok(result)
    }

    /// Delete a history item by ID; returns whether a row was removed
    pub fn delete_history(&self, id: i64) -> Result<bool, ExplorerError> {
        let conn = self.conn();
        let removed = conn.execute("DELETE FROM history WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    /// Clear all history
    pub fn clear_all_history(&self) -> Result<(), ExplorerError> {
        let conn = self.conn();
        conn.execute("DELETE FROM history", [])?;
        Ok(())
    }

    pub fn get_history_count(&self) -> Result<usize, ExplorerError> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ---- key/value cache ----

    pub fn kv_get(&self, key: &str) -> Result<Option<String>, ExplorerError> {
        let conn = self.conn();
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), ExplorerError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), ExplorerError> {
        let conn = self.conn();
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn active_team_id(&self) -> Result<Option<String>, ExplorerError> {
        self.kv_get(ACTIVE_TEAM_KEY)
    }

    /// Remember `team_id` as the active team and add it to the known teams.
    pub fn set_active_team_id(&self, team_id: &str) -> Result<(), ExplorerError> {
        self.kv_set(ACTIVE_TEAM_KEY, team_id)?;
        self.remember_team_ids(&[team_id.to_string()])
    }

    pub fn team_ids(&self) -> Result<Vec<String>, ExplorerError> {
        match self.kv_get(TEAM_IDS_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Add team ids to the known list, keeping first-seen order.
    pub fn remember_team_ids(&self, ids: &[String]) -> Result<(), ExplorerError> {
        let mut known = self.team_ids()?;
        for id in ids.iter().filter(|id| !id.trim().is_empty()) {
            if !known.contains(id) {
                known.push(id.clone());
            }
        }
        self.kv_set(TEAM_IDS_KEY, &serde_json::to_string(&known)?)
    }
}

impl TeamCache for Database {
    /// Active team first, then the other known teams.
    fn cached_team_ids(&self) -> Vec<String> {
        let active = match self.active_team_id() {
            Ok(active) => active,
            Err(e) => {
                log::error!("Failed to read active team: {}", e);
                None
            }
        };
        let known = self.team_ids().unwrap_or_else(|e| {
            log::error!("Failed to read cached teams: {}", e);
            Vec::new()
        });

        let mut ids: Vec<String> = active.into_iter().collect();
        for id in known {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AuthType;

    fn sample_response() -> ApiResponse {
        ApiResponse {
            status: 201,
            status_text: "Created".to_string(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: ResponseBody::Json(serde_json::json!({"id": 7})),
            timing: 35,
            size: Some(8),
        }
    }

    // ============ history tests ============

    #[test]
    fn test_insert_and_load_history() {
        let db = Database::open_in_memory().unwrap();
        let headers = vec![("x-team-id".to_string(), "team_1".to_string())];
        let response = sample_response();

        let id = db
            .insert_history(
                HttpMethod::POST,
                "http://localhost:3000/api/v1/items",
                &headers,
                Some(r#"{"name":"widget"}"#),
                Some(&response),
            )
            .unwrap();

        let items = db.load_recent_history(10).unwrap();
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.id, id);
        assert_eq!(item.method, HttpMethod::POST);
        assert_eq!(item.headers, headers);
        assert_eq!(item.body.as_deref(), Some(r#"{"name":"widget"}"#));
        assert_eq!(item.response.as_ref(), Some(&response));
    }

    #[test]
    fn test_record_request_does_not_store_credentials() {
        let db = Database::open_in_memory().unwrap();
        let config = RequestConfig::new(
            HttpMethod::POST,
            "http://localhost:3000/api/v1/items",
            vec![("x-team-id".to_string(), "team_1".to_string())],
            Some(r#"{"name":"widget"}"#.to_string()),
            AuthType::ApiKey,
        )
        .unwrap()
        .with_api_key(Some("sk_live_secret".to_string()))
        .with_session_cookie(Some("sid=abc".to_string()));

        db.record_request(&config, Some(&sample_response())).unwrap();

        let raw: String = db
            .conn()
            .query_row("SELECT request_headers FROM history", [], |row| row.get(0))
            .unwrap();
        assert!(!raw.contains("sk_live_secret"));
        assert!(!raw.contains("sid=abc"));

        let item = &db.load_recent_history(1).unwrap()[0];
        assert!(item
            .headers
            .contains(&("x-team-id".to_string(), "team_1".to_string())));
        assert!(item
            .headers
            .iter()
            .any(|(k, v)| k == "Authorization" && v == crate::types::MASKED_VALUE));
    }

    #[test]
    fn test_history_without_response() {
        let db = Database::open_in_memory().unwrap();
        db.insert_history(HttpMethod::GET, "http://localhost/x", &[], None, None)
            .unwrap();
        let items = db.load_recent_history(10).unwrap();
        assert!(items[0].response.is_none());
        assert!(items[0].body.is_none());
    }

    #[test]
    fn test_history_newest_first_and_limit() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..5 {
            db.insert_history(HttpMethod::GET, &format!("http://localhost/{}", i), &[], None, None)
                .unwrap();
        }
        let items = db.load_recent_history(2).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "http://localhost/4");
        assert_eq!(items[1].url, "http://localhost/3");
    }

    #[test]
    fn test_delete_and_clear_history() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .insert_history(HttpMethod::GET, "http://localhost/a", &[], None, None)
            .unwrap();
        db.insert_history(HttpMethod::GET, "http://localhost/b", &[], None, None)
            .unwrap();

        assert!(db.delete_history(id).unwrap());
        assert!(!db.delete_history(id).unwrap());
        assert_eq!(db.get_history_count().unwrap(), 1);

        db.clear_all_history().unwrap();
        assert_eq!(db.get_history_count().unwrap(), 0);
    }

    // ============ kv / team cache tests ============

    #[test]
    fn test_kv_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.kv_get("k").unwrap(), None);
        db.kv_set("k", "v1").unwrap();
        db.kv_set("k", "v2").unwrap();
        assert_eq!(db.kv_get("k").unwrap().as_deref(), Some("v2"));
        db.kv_delete("k").unwrap();
        assert_eq!(db.kv_get("k").unwrap(), None);
    }

    #[test]
    fn test_team_cache_puts_active_team_first() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.cached_team_ids().is_empty());

        db.remember_team_ids(&["team_a".to_string(), "team_b".to_string(), "team_a".to_string()])
            .unwrap();
        assert_eq!(db.team_ids().unwrap(), vec!["team_a", "team_b"]);

        db.set_active_team_id("team_b").unwrap();
        assert_eq!(db.active_team_id().unwrap().as_deref(), Some("team_b"));
        assert_eq!(db.cached_team_ids(), vec!["team_b", "team_a"]);
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = std::env::temp_dir().join(format!("api-explorer-db-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("explorer.db");
        let db = Database::open(&path).unwrap();
        db.kv_set("k", "v").unwrap();
        assert!(path.exists());
        drop(db);
        std::fs::remove_dir_all(&dir).ok();
    }
}
