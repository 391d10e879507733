use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Weekday};
use serde::Serialize;

/// Inflation applied to the per-day average so range plans bias toward
/// fewer, fuller days instead of spreading short lessons thinly.
const RANGE_TARGET_INFLATION: f64 = 1.4;

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerError {
    pub code: String,
    pub message: String,
}

impl SchedulerError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// One lesson as fetched from the workspace, ascending by `sort_order`.
#[derive(Debug, Clone)]
pub struct LessonInput {
    pub lesson_id: String,
    pub sort_order: i64,
    pub title: String,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlanWindow {
    /// Fixed date range, inclusive on both ends.
    Range {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    /// Fixed per-day time budget, open-ended horizon.
    Budget { daily_minutes: i64 },
}

#[derive(Debug, Clone)]
pub struct PlanConfig {
    pub window: PlanWindow,
    pub weekdays: Vec<Weekday>,
    pub speed: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayEntry {
    pub lesson_id: String,
    pub title: String,
    pub adjusted_duration: i64,
    pub display_order: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    pub study_date: String,
    pub weekday: String,
    pub total_lessons: i64,
    pub total_duration: i64,
    pub entries: Vec<DayEntry>,
}

#[derive(Debug, Clone)]
struct AdjustedLesson {
    lesson: LessonInput,
    adjusted: i64,
}

#[derive(Debug, Clone)]
struct PackedDay {
    date: NaiveDate,
    total: i64,
    entries: Vec<AdjustedLesson>,
}

/// Raw minutes divided by the playback speed, rounded half-up to the
/// nearest whole minute: `Int(x + 0.5)`.
pub fn adjusted_minutes(raw_minutes: i64, speed: f64) -> i64 {
    ((raw_minutes as f64 / speed) + 0.5).floor() as i64
}

pub fn weekday_code(w: Weekday) -> &'static str {
    match w {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

pub fn parse_weekday_code(s: &str) -> Option<Weekday> {
    match s.trim().to_ascii_lowercase().as_str() {
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// All dates in `[start, end]` whose weekday is allowed, ascending.
/// An inverted range or no matching weekday yields an empty list, which
/// downstream packing treats as "no feasible schedule", not an error.
pub fn study_dates(start: NaiveDate, end: NaiveDate, weekdays: &[Weekday]) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut d = start;
    while d <= end {
        if weekdays.contains(&d.weekday()) {
            out.push(d);
        }
        d = d + ChronoDuration::days(1);
    }
    out
}

/// Fill state of the day currently being packed. `Overflow` marks the
/// final date of a range plan, which takes every remaining lesson.
#[derive(Debug, Clone, Copy, PartialEq)]
enum DayState {
    Empty,
    Filling,
    Full,
    Overflow,
}

fn day_accepts(state: DayState, running: i64, next: i64, limit: f64) -> bool {
    match state {
        // A day never stays empty just because its first lesson is long.
        DayState::Empty => true,
        DayState::Overflow => true,
        DayState::Filling => (running + next) as f64 <= limit,
        DayState::Full => false,
    }
}

fn adjust_all(lessons: &[LessonInput], speed: f64) -> Vec<AdjustedLesson> {
    lessons
        .iter()
        .map(|l| AdjustedLesson {
            lesson: l.clone(),
            adjusted: adjusted_minutes(l.duration_minutes, speed),
        })
        .collect()
}

/// Greedy range packing: lessons are consumed strictly in order, the day
/// boundary moves once the inflated per-day target would be exceeded, and
/// the last study date absorbs whatever is left. If the dates run out
/// before the lessons do, the tail is left unscheduled.
fn pack_range(adjusted: &[AdjustedLesson], dates: &[NaiveDate]) -> Vec<PackedDay> {
    if adjusted.is_empty() || dates.is_empty() {
        return Vec::new();
    }
    let total: i64 = adjusted.iter().map(|a| a.adjusted).sum();
    let target = (total as f64 / dates.len() as f64) * RANGE_TARGET_INFLATION;

    let mut days: Vec<PackedDay> = Vec::new();
    let mut cursor = 0usize;
    for (i, date) in dates.iter().enumerate() {
        if cursor >= adjusted.len() {
            break;
        }
        let last_date = i + 1 == dates.len();
        let mut state = if last_date {
            DayState::Overflow
        } else {
            DayState::Empty
        };
        let mut running = 0i64;
        let mut entries: Vec<AdjustedLesson> = Vec::new();
        while cursor < adjusted.len() && state != DayState::Full {
            let a = &adjusted[cursor];
            if !day_accepts(state, running, a.adjusted, target) {
                state = DayState::Full;
                continue;
            }
            running += a.adjusted;
            entries.push(a.clone());
            cursor += 1;
            if state == DayState::Empty {
                state = DayState::Filling;
            }
        }
        if !entries.is_empty() {
            days.push(PackedDay {
                date: *date,
                total: running,
                entries,
            });
        }
    }
    days
}

/// Greedy budget packing: walk the calendar forward from `anchor`, skip
/// disallowed weekdays, and on each study day take the first lesson
/// unconditionally, then keep taking while the daily budget holds. The
/// lesson cursor is strictly monotonic, which bounds the walk.
fn pack_budget(
    adjusted: &[AdjustedLesson],
    weekdays: &[Weekday],
    daily_minutes: i64,
    anchor: NaiveDate,
) -> Result<Vec<PackedDay>, SchedulerError> {
    if weekdays.is_empty() {
        // Without this the date walk below would never land on a study day.
        return Err(SchedulerError::new(
            "bad_params",
            "weekdays must not be empty",
        ));
    }
    let mut days: Vec<PackedDay> = Vec::new();
    let mut cursor = 0usize;
    let mut date = anchor;
    let limit = daily_minutes as f64;
    while cursor < adjusted.len() {
        if !weekdays.contains(&date.weekday()) {
            date = date + ChronoDuration::days(1);
            continue;
        }
        let mut state = DayState::Empty;
        let mut running = 0i64;
        let mut entries: Vec<AdjustedLesson> = Vec::new();
        while cursor < adjusted.len() && state != DayState::Full {
            let a = &adjusted[cursor];
            if !day_accepts(state, running, a.adjusted, limit) {
                state = DayState::Full;
                continue;
            }
            running += a.adjusted;
            entries.push(a.clone());
            cursor += 1;
            if state == DayState::Empty {
                state = DayState::Filling;
            }
        }
        days.push(PackedDay {
            date,
            total: running,
            entries,
        });
        date = date + ChronoDuration::days(1);
    }
    Ok(days)
}

fn materialize(packed: Vec<PackedDay>) -> Vec<DayPlan> {
    packed
        .into_iter()
        .map(|day| {
            let entries: Vec<DayEntry> = day
                .entries
                .iter()
                .enumerate()
                .map(|(i, a)| DayEntry {
                    lesson_id: a.lesson.lesson_id.clone(),
                    title: a.lesson.title.clone(),
                    adjusted_duration: a.adjusted,
                    display_order: (i + 1) as i64,
                })
                .collect();
            DayPlan {
                study_date: day.date.format("%Y-%m-%d").to_string(),
                weekday: weekday_code(day.date.weekday()).to_string(),
                total_lessons: entries.len() as i64,
                total_duration: day.total,
                entries,
            }
        })
        .collect()
}

/// Run one generation pass. Pure: `anchor` stands in for "today" so budget
/// plans never read a live clock. Empty lesson lists and infeasible date
/// windows produce an empty agenda, not an error.
pub fn generate(
    lessons: &[LessonInput],
    config: &PlanConfig,
    anchor: NaiveDate,
) -> Result<Vec<DayPlan>, SchedulerError> {
    let adjusted = adjust_all(lessons, config.speed);
    let packed = match config.window {
        PlanWindow::Range {
            start_date,
            end_date,
        } => {
            let dates = study_dates(start_date, end_date, &config.weekdays);
            pack_range(&adjusted, &dates)
        }
        PlanWindow::Budget { daily_minutes } => {
            pack_budget(&adjusted, &config.weekdays, daily_minutes, anchor)?
        }
    };
    Ok(materialize(packed))
}
