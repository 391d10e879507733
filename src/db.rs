use rusqlite::{params, Connection};
use std::path::Path;
use uuid::Uuid;

use crate::scheduler::{DayPlan, LessonInput};

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("studyplanner.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lectures(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            created_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lessons(
            id TEXT PRIMARY KEY,
            lecture_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            title TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            FOREIGN KEY(lecture_id) REFERENCES lectures(id),
            UNIQUE(lecture_id, sort_order)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lessons_lecture ON lessons(lecture_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lessons_lecture_sort ON lessons(lecture_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS daily_schedules(
            id TEXT PRIMARY KEY,
            lecture_id TEXT NOT NULL,
            study_date TEXT NOT NULL,
            weekday TEXT NOT NULL,
            total_lessons INTEGER NOT NULL,
            total_duration INTEGER NOT NULL,
            created_at TEXT,
            FOREIGN KEY(lecture_id) REFERENCES lectures(id),
            UNIQUE(lecture_id, study_date)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_daily_schedules_lecture ON daily_schedules(lecture_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lesson_schedules(
            id TEXT PRIMARY KEY,
            daily_schedule_id TEXT NOT NULL,
            lesson_id TEXT NOT NULL,
            adjusted_duration INTEGER NOT NULL,
            display_order INTEGER NOT NULL,
            done INTEGER NOT NULL DEFAULT 0,
            done_at TEXT,
            FOREIGN KEY(daily_schedule_id) REFERENCES daily_schedules(id),
            FOREIGN KEY(lesson_id) REFERENCES lessons(id),
            UNIQUE(daily_schedule_id, display_order)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lesson_schedules_day ON lesson_schedules(daily_schedule_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lesson_schedules_lesson ON lesson_schedules(lesson_id)",
        [],
    )?;

    Ok(conn)
}

/// Lesson source: the inclusive `sort_order` sub-range of a lecture,
/// ascending by `sort_order`.
pub fn fetch_lessons_in_range(
    conn: &Connection,
    lecture_id: &str,
    start_order: i64,
    end_order: i64,
) -> anyhow::Result<Vec<LessonInput>> {
    let mut stmt = conn.prepare(
        "SELECT id, sort_order, title, duration_minutes
         FROM lessons
         WHERE lecture_id = ? AND sort_order >= ? AND sort_order <= ?
         ORDER BY sort_order",
    )?;
    let rows = stmt
        .query_map(params![lecture_id, start_order, end_order], |r| {
            Ok(LessonInput {
                lesson_id: r.get(0)?,
                sort_order: r.get(1)?,
                title: r.get(2)?,
                duration_minutes: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Schedule store: drop any previously generated agenda for the lecture and
/// write the new day aggregates plus their assignments in one transaction.
/// Aggregate rows go in before the assignments that reference them.
pub fn replace_schedule(
    conn: &Connection,
    lecture_id: &str,
    days: &[DayPlan],
    created_at: &str,
) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM lesson_schedules
         WHERE daily_schedule_id IN (SELECT id FROM daily_schedules WHERE lecture_id = ?)",
        [lecture_id],
    )?;
    tx.execute(
        "DELETE FROM daily_schedules WHERE lecture_id = ?",
        [lecture_id],
    )?;
    for day in days {
        let day_id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO daily_schedules(
                id, lecture_id, study_date, weekday, total_lessons, total_duration, created_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?)",
            params![
                day_id,
                lecture_id,
                day.study_date,
                day.weekday,
                day.total_lessons,
                day.total_duration,
                created_at
            ],
        )?;
        for entry in &day.entries {
            tx.execute(
                "INSERT INTO lesson_schedules(
                    id, daily_schedule_id, lesson_id, adjusted_duration, display_order
                 ) VALUES(?, ?, ?, ?, ?)",
                params![
                    Uuid::new_v4().to_string(),
                    day_id,
                    entry.lesson_id,
                    entry.adjusted_duration,
                    entry.display_order
                ],
            )?;
        }
    }
    tx.commit()?;
    Ok(())
}
