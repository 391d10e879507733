use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, ensure_lecture_exists, now_ts, parse_opt_i64, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params, Connection};
use serde_json::json;
use uuid::Uuid;

fn next_sort_order(conn: &Connection, lecture_id: &str) -> Result<i64, String> {
    let result: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM lessons WHERE lecture_id = ?",
            [lecture_id],
            |r| r.get(0),
        )
        .map_err(|e| e.to_string())?;
    Ok(result.max(1))
}

fn handle_lectures_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let title = match required_str(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let lecture_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO lectures(id, title, created_at) VALUES(?, ?, ?)",
        params![lecture_id, title, now_ts()],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "lectureId": lecture_id }))
}

fn handle_lectures_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare("SELECT id, title FROM lectures ORDER BY created_at, id") {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let lectures = match stmt.query_map([], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "title": r.get::<_, String>(1)?,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "lectures": lectures }))
}

fn handle_lessons_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let lecture_id = match required_str(req, "lectureId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(code) = ensure_lecture_exists(conn, &lecture_id) {
        return err(
            &req.id,
            code,
            if code == "not_found" {
                "lecture not found".to_string()
            } else {
                "failed to read lecture".to_string()
            },
            None,
        );
    }

    let Some(input) = req.params.get("input").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing input", None);
    };
    let title = match input.get("title").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "input.title is required", None),
    };
    if title.is_empty() {
        return err(&req.id, "bad_params", "input.title must not be empty", None);
    }
    let duration_minutes = match input.get("durationMinutes").and_then(|v| v.as_i64()) {
        Some(v) if v > 0 => v,
        Some(_) => {
            return err(
                &req.id,
                "bad_params",
                "input.durationMinutes must be > 0",
                None,
            )
        }
        None => {
            return err(
                &req.id,
                "bad_params",
                "input.durationMinutes is required",
                None,
            )
        }
    };
    let sort_order = match parse_opt_i64(input.get("sortOrder")) {
        Ok(Some(v)) if v >= 1 => v,
        Ok(Some(_)) => return err(&req.id, "bad_params", "input.sortOrder must be >= 1", None),
        Ok(None) => match next_sort_order(conn, &lecture_id) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e, None),
        },
        Err(m) => return err(&req.id, "bad_params", format!("input.sortOrder {}", m), None),
    };

    let lesson_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO lessons(id, lecture_id, sort_order, title, duration_minutes)
         VALUES(?, ?, ?, ?, ?)",
        params![lesson_id, lecture_id, sort_order, title, duration_minutes],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(
        &req.id,
        json!({ "lessonId": lesson_id, "sortOrder": sort_order }),
    )
}

fn handle_lessons_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let lecture_id = match required_str(req, "lectureId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(code) = ensure_lecture_exists(conn, &lecture_id) {
        return err(
            &req.id,
            code,
            if code == "not_found" {
                "lecture not found".to_string()
            } else {
                "failed to read lecture".to_string()
            },
            None,
        );
    }

    let mut stmt = match conn.prepare(
        "SELECT id, sort_order, title, duration_minutes
         FROM lessons
         WHERE lecture_id = ?
         ORDER BY sort_order",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let lessons = match stmt.query_map([&lecture_id], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "sortOrder": r.get::<_, i64>(1)?,
            "title": r.get::<_, String>(2)?,
            "durationMinutes": r.get::<_, i64>(3)?,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "lessons": lessons }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "lectures.create" => Some(handle_lectures_create(state, req)),
        "lectures.list" => Some(handle_lectures_list(state, req)),
        "lessons.create" => Some(handle_lessons_create(state, req)),
        "lessons.list" => Some(handle_lessons_list(state, req)),
        _ => None,
    }
}
