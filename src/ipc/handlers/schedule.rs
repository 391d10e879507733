use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, ensure_lecture_exists, now_ts, required_i64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::scheduler::{self, PlanConfig, PlanWindow};
use chrono::{Local, NaiveDate, Weekday};
use rusqlite::{params, OptionalExtension};
use serde_json::{json, Map, Value as JsonValue};

fn parse_iso_date(v: Option<&JsonValue>, key: &str) -> Result<NaiveDate, String> {
    let raw = v
        .and_then(|x| x.as_str())
        .ok_or_else(|| format!("{} must be a YYYY-MM-DD string", key))?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("{} must be a YYYY-MM-DD string", key))
}

fn parse_weekdays(v: Option<&JsonValue>) -> Result<Vec<Weekday>, String> {
    let Some(raw) = v else {
        return Err("missing plan.weekdays".to_string());
    };
    let arr = raw
        .as_array()
        .ok_or_else(|| "plan.weekdays must be an array of day codes".to_string())?;
    let mut out: Vec<Weekday> = Vec::with_capacity(arr.len());
    for item in arr {
        let s = item
            .as_str()
            .ok_or_else(|| "plan.weekdays must be an array of day codes".to_string())?;
        let w = scheduler::parse_weekday_code(s)
            .ok_or_else(|| format!("unknown weekday code: {}", s))?;
        if !out.contains(&w) {
            out.push(w);
        }
    }
    if out.is_empty() {
        return Err("plan.weekdays must contain at least one day".to_string());
    }
    Ok(out)
}

struct ParsedPlan {
    config: PlanConfig,
    start_order: i64,
    end_order: i64,
    anchor: NaiveDate,
}

fn parse_plan(plan: &Map<String, JsonValue>) -> Result<ParsedPlan, String> {
    let kind = plan
        .get("kind")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_ascii_lowercase())
        .ok_or_else(|| "plan.kind must be 'range' or 'budget'".to_string())?;

    let start_order = required_i64(plan.get("startOrder"), "plan.startOrder")?;
    let end_order = required_i64(plan.get("endOrder"), "plan.endOrder")?;
    if start_order > end_order {
        return Err("plan.startOrder must be <= plan.endOrder".to_string());
    }

    let weekdays = parse_weekdays(plan.get("weekdays"))?;

    let speed = match plan.get("speed") {
        None => 1.0,
        Some(v) if v.is_null() => 1.0,
        Some(v) => {
            let s = v
                .as_f64()
                .ok_or_else(|| "plan.speed must be a number".to_string())?;
            if s <= 0.0 {
                return Err("plan.speed must be > 0".to_string());
            }
            s
        }
    };

    let window = match kind.as_str() {
        "range" => {
            let start_date = parse_iso_date(plan.get("startDate"), "plan.startDate")?;
            let end_date = parse_iso_date(plan.get("endDate"), "plan.endDate")?;
            PlanWindow::Range {
                start_date,
                end_date,
            }
        }
        "budget" => {
            let daily = required_i64(plan.get("dailyBudgetMinutes"), "plan.dailyBudgetMinutes")?;
            if daily <= 0 {
                return Err("plan.dailyBudgetMinutes must be > 0".to_string());
            }
            PlanWindow::Budget {
                daily_minutes: daily,
            }
        }
        other => return Err(format!("unknown plan.kind: {}", other)),
    };

    // Budget plans start "today" unless the caller pins the anchor, which
    // keeps generation reproducible in tests.
    let anchor = match plan.get("startFrom") {
        None => Local::now().date_naive(),
        Some(v) if v.is_null() => Local::now().date_naive(),
        Some(_) => parse_iso_date(plan.get("startFrom"), "plan.startFrom")?,
    };

    Ok(ParsedPlan {
        config: PlanConfig {
            window,
            weekdays,
            speed,
        },
        start_order,
        end_order,
        anchor,
    })
}

fn handle_schedule_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let Some(plan) = req.params.get("plan").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing plan", None);
    };
    let parsed = match parse_plan(plan) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    let lessons = match db::fetch_lessons_in_range(
        conn,
        &lecture_id,
        parsed.start_order,
        parsed.end_order,
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let days = match scheduler::generate(&lessons, &parsed.config, parsed.anchor) {
        Ok(v) => v,
        Err(e) => return err(&req.id, &e.code, e.message, None),
    };

    if let Err(e) = db::replace_schedule(conn, &lecture_id, &days, &now_ts()) {
        return err(&req.id, "db_tx_failed", e.to_string(), None);
    }

    let scheduled: i64 = days.iter().map(|d| d.total_lessons).sum();
    let days_json = match serde_json::to_value(&days) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "internal", e.to_string(), None),
    };
    ok(
        &req.id,
        json!({
            "days": days_json,
            "totalDays": days.len(),
            "totalLessons": scheduled,
            "unscheduledLessons": lessons.len() as i64 - scheduled,
        }),
    )
}

fn handle_schedule_list(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    let mut day_stmt = match conn.prepare(
        "SELECT id, study_date, weekday, total_lessons, total_duration
         FROM daily_schedules
         WHERE lecture_id = ?
         ORDER BY study_date",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let day_rows = match day_stmt.query_map([&lecture_id], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, i64>(3)?,
            r.get::<_, i64>(4)?,
        ))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut entry_stmt = match conn.prepare(
        "SELECT ls.id, ls.lesson_id, l.title, ls.adjusted_duration, ls.display_order, ls.done, ls.done_at
         FROM lesson_schedules ls
         JOIN lessons l ON l.id = ls.lesson_id
         WHERE ls.daily_schedule_id = ?
         ORDER BY ls.display_order",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut days: Vec<JsonValue> = Vec::with_capacity(day_rows.len());
    for (day_id, study_date, weekday, total_lessons, total_duration) in day_rows {
        let entries = match entry_stmt.query_map([&day_id], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "lessonId": r.get::<_, String>(1)?,
                "title": r.get::<_, String>(2)?,
                "adjustedDuration": r.get::<_, i64>(3)?,
                "displayOrder": r.get::<_, i64>(4)?,
                "done": r.get::<_, i64>(5)? != 0,
                "doneAt": r.get::<_, Option<String>>(6)?,
            }))
        }) {
            Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
                Ok(v) => v,
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            },
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        days.push(json!({
            "id": day_id,
            "studyDate": study_date,
            "weekday": weekday,
            "totalLessons": total_lessons,
            "totalDuration": total_duration,
            "entries": entries,
        }));
    }

    ok(&req.id, json!({ "days": days }))
}

fn handle_schedule_toggle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let lecture_id = match required_str(req, "lectureId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let schedule_id = match required_str(req, "lessonScheduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    // Scoped to the lecture so an id from another lecture reads as missing.
    let current = match conn
        .query_row(
            "SELECT ls.done
             FROM lesson_schedules ls
             JOIN daily_schedules ds ON ds.id = ls.daily_schedule_id
             WHERE ls.id = ? AND ds.lecture_id = ?",
            params![schedule_id, lecture_id],
            |r| r.get::<_, i64>(0),
        )
        .optional()
    {
        Ok(Some(v)) => v != 0,
        Ok(None) => return err(&req.id, "not_found", "lesson schedule not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let new_done = !current;
    let ts = now_ts();
    if let Err(e) = conn.execute(
        "UPDATE lesson_schedules SET done = ?, done_at = ? WHERE id = ?",
        params![if new_done { 1 } else { 0 }, ts, schedule_id],
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "done": new_done, "doneAt": ts }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.generate" => Some(handle_schedule_generate(state, req)),
        "schedule.list" => Some(handle_schedule_list(state, req)),
        "schedule.toggle" => Some(handle_schedule_toggle(state, req)),
        _ => None,
    }
}
