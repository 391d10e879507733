
use serde_json::json;
use test_support::{request_err, request_ok, seed_lessons, setup_lecture, spawn_sidecar, temp_dir};

#[test]
fn range_plan_splits_evenly_and_persists() {
    let workspace = temp_dir("studyplanner-range-even");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let lecture_id = setup_lecture(&mut stdin, &mut reader, &workspace, "Calculus");
    let _ = seed_lessons(&mut stdin, &mut reader, &lecture_id, &[60, 60, 60, 60, 60, 60]);

    // 2026-02-02..04 is Mon..Wed; six hour-long lessons over three study
    // dates pack as two per day.
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "gen",
        "schedule.generate",
        json!({
            "lectureId": lecture_id,
            "plan": {
                "kind": "range",
                "startOrder": 1,
                "endOrder": 6,
                "startDate": "2026-02-02",
                "endDate": "2026-02-04",
                "weekdays": ["mon", "tue", "wed"],
                "speed": 1.0
            }
        }),
    );
    assert_eq!(result.get("totalDays").and_then(|v| v.as_i64()), Some(3));
    assert_eq!(result.get("totalLessons").and_then(|v| v.as_i64()), Some(6));
    assert_eq!(
        result.get("unscheduledLessons").and_then(|v| v.as_i64()),
        Some(0)
    );
    let days = result
        .get("days")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(days.len(), 3);
    for d in &days {
        assert_eq!(d.get("totalLessons").and_then(|v| v.as_i64()), Some(2));
        assert_eq!(d.get("totalDuration").and_then(|v| v.as_i64()), Some(120));
    }
    assert_eq!(
        days[0].get("studyDate").and_then(|v| v.as_str()),
        Some("2026-02-02")
    );
    assert_eq!(days[0].get("weekday").and_then(|v| v.as_str()), Some("mon"));

    // The persisted agenda matches what generate returned.
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "list",
        "schedule.list",
        json!({ "lectureId": lecture_id }),
    );
    let stored = listed
        .get("days")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(stored.len(), 3);
    let mut display_orders = Vec::new();
    for d in &stored {
        let entries = d.get("entries").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        assert_eq!(
            d.get("totalLessons").and_then(|v| v.as_i64()),
            Some(entries.len() as i64)
        );
        for (i, e) in entries.iter().enumerate() {
            assert_eq!(
                e.get("displayOrder").and_then(|v| v.as_i64()),
                Some((i + 1) as i64)
            );
            assert_eq!(e.get("done").and_then(|v| v.as_bool()), Some(false));
            display_orders.push(e.get("lessonId").and_then(|v| v.as_str()).map(String::from));
        }
    }
    assert_eq!(display_orders.len(), 6);

    let _ = child.kill();
}

#[test]
fn range_plan_last_day_absorbs_remainder() {
    let workspace = temp_dir("studyplanner-range-tail");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let lecture_id = setup_lecture(&mut stdin, &mut reader, &workspace, "Statistics");
    let _ = seed_lessons(
        &mut stdin,
        &mut reader,
        &lecture_id,
        &[100, 100, 100, 100, 100],
    );

    // Two study dates, target 350/day: the first stops at three lessons,
    // the last takes everything left.
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "gen",
        "schedule.generate",
        json!({
            "lectureId": lecture_id,
            "plan": {
                "kind": "range",
                "startOrder": 1,
                "endOrder": 5,
                "startDate": "2026-02-02",
                "endDate": "2026-02-03",
                "weekdays": ["mon", "tue"],
                "speed": 1.0
            }
        }),
    );
    let days = result
        .get("days")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(days.len(), 2);
    assert_eq!(days[0].get("totalLessons").and_then(|v| v.as_i64()), Some(3));
    assert_eq!(
        days[0].get("totalDuration").and_then(|v| v.as_i64()),
        Some(300)
    );
    assert_eq!(days[1].get("totalLessons").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(
        days[1].get("totalDuration").and_then(|v| v.as_i64()),
        Some(200)
    );

    let _ = child.kill();
}

#[test]
fn regenerating_replaces_the_previous_agenda() {
    let workspace = temp_dir("studyplanner-range-regen");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let lecture_id = setup_lecture(&mut stdin, &mut reader, &workspace, "History");
    let _ = seed_lessons(&mut stdin, &mut reader, &lecture_id, &[60, 60, 60, 60]);

    let plan = json!({
        "kind": "range",
        "startOrder": 1,
        "endOrder": 4,
        "startDate": "2026-02-02",
        "endDate": "2026-02-03",
        "weekdays": ["mon", "tue"],
        "speed": 1.0
    });
    let first = request_ok(
        &mut stdin,
        &mut reader,
        "gen1",
        "schedule.generate",
        json!({ "lectureId": lecture_id, "plan": plan }),
    );
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "gen2",
        "schedule.generate",
        json!({ "lectureId": lecture_id, "plan": plan }),
    );
    // Identical inputs, structurally identical agenda.
    assert_eq!(first.get("days"), second.get("days"));

    // The store holds exactly one agenda, not two.
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "list",
        "schedule.list",
        json!({ "lectureId": lecture_id }),
    );
    let stored = listed
        .get("days")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let total: i64 = stored
        .iter()
        .filter_map(|d| d.get("totalLessons").and_then(|v| v.as_i64()))
        .sum();
    assert_eq!(total, 4);

    let _ = child.kill();
}

#[test]
fn empty_lesson_range_yields_empty_agenda() {
    let workspace = temp_dir("studyplanner-range-empty");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let lecture_id = setup_lecture(&mut stdin, &mut reader, &workspace, "Empty");

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "gen",
        "schedule.generate",
        json!({
            "lectureId": lecture_id,
            "plan": {
                "kind": "range",
                "startOrder": 1,
                "endOrder": 10,
                "startDate": "2026-02-02",
                "endDate": "2026-02-06",
                "weekdays": ["mon"],
                "speed": 1.0
            }
        }),
    );
    assert_eq!(result.get("totalDays").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(result.get("totalLessons").and_then(|v| v.as_i64()), Some(0));

    let _ = child.kill();
}

#[test]
fn range_plan_rejects_bad_params() {
    let workspace = temp_dir("studyplanner-range-bad");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let lecture_id = setup_lecture(&mut stdin, &mut reader, &workspace, "Broken");
    let _ = seed_lessons(&mut stdin, &mut reader, &lecture_id, &[60]);

    let base = |overrides: serde_json::Value| {
        let mut plan = json!({
            "kind": "range",
            "startOrder": 1,
            "endOrder": 1,
            "startDate": "2026-02-02",
            "endDate": "2026-02-06",
            "weekdays": ["mon"],
            "speed": 1.0
        });
        if let (Some(obj), Some(extra)) = (plan.as_object_mut(), overrides.as_object()) {
            for (k, v) in extra {
                obj.insert(k.clone(), v.clone());
            }
        }
        json!({ "lectureId": lecture_id, "plan": plan })
    };

    for (i, (label, overrides)) in [
        ("zero speed", json!({ "speed": 0.0 })),
        ("negative speed", json!({ "speed": -1.5 })),
        ("inverted orders", json!({ "startOrder": 5, "endOrder": 1 })),
        ("bad date", json!({ "startDate": "02/02/2026" })),
        ("bad weekday", json!({ "weekdays": ["monday"] })),
        ("empty weekdays", json!({ "weekdays": [] })),
        ("bad kind", json!({ "kind": "weekly" })),
    ]
    .into_iter()
    .enumerate()
    {
        let code = request_err(
            &mut stdin,
            &mut reader,
            &format!("bad-{}", i),
            "schedule.generate",
            base(overrides),
        );
        assert_eq!(code, "bad_params", "{}", label);
    }

    let code = request_err(
        &mut stdin,
        &mut reader,
        "missing-lecture",
        "schedule.generate",
        json!({
            "lectureId": "no-such-lecture",
            "plan": {
                "kind": "range",
                "startOrder": 1,
                "endOrder": 1,
                "startDate": "2026-02-02",
                "endDate": "2026-02-06",
                "weekdays": ["mon"],
                "speed": 1.0
            }
        }),
    );
    assert_eq!(code, "not_found");

    let _ = child.kill();
}
