use rusqlite::{Connection, OptionalExtension};
use serde_json::Value as JsonValue;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn now_ts() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

pub fn parse_opt_i64(v: Option<&JsonValue>) -> Result<Option<i64>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or("must be integer or null"),
    }
}

pub fn required_i64(v: Option<&JsonValue>, key: &str) -> Result<i64, String> {
    v.and_then(|x| x.as_i64())
        .ok_or_else(|| format!("{} must be an integer", key))
}

pub fn ensure_lecture_exists(conn: &Connection, lecture_id: &str) -> Result<(), &'static str> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM lectures WHERE id = ? LIMIT 1",
            [lecture_id],
            |_r| Ok(()),
        )
        .optional()
        .map_err(|_| "db_query_failed")?;
    if exists.is_some() {
        Ok(())
    } else {
        Err("not_found")
    }
}
