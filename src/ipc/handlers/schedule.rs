use crate::ipc::error::{db_err, err, ok};
use crate::ipc::helpers::{db_conn, parse_title, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, ScheduleEntryRow};
use chrono::NaiveTime;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

const DAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

fn parse_time(v: Option<&JsonValue>) -> Result<NaiveTime, &'static str> {
    let s = v.and_then(|v| v.as_str()).ok_or("is required")?.trim();
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| "must be HH:MM")
}

/// Seven day buckets, Monday first; entries arrive sorted by start time.
fn group_days(entries: Vec<ScheduleEntryRow>) -> Vec<JsonValue> {
    let mut days: Vec<Vec<ScheduleEntryRow>> = vec![Vec::new(); DAYS.len()];
    for e in entries {
        if let Some(bucket) = usize::try_from(e.day).ok().and_then(|d| days.get_mut(d)) {
            bucket.push(e);
        }
    }
    days.into_iter()
        .enumerate()
        .map(|(day, entries)| {
            json!({
                "day": day,
                "name": DAYS[day],
                "entries": entries,
            })
        })
        .collect()
}

fn handle_schedule_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match store::load_schedule(conn) {
        Ok(entries) => ok(&req.id, json!({ "days": group_days(entries) })),
        Err(e) => db_err(&req.id, "db_query_failed", e),
    }
}

fn handle_schedule_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let day = match req.params.get("day").and_then(|v| v.as_i64()) {
        Some(d) if (0..DAYS.len() as i64).contains(&d) => d,
        _ => return err(&req.id, "bad_params", "day must be an integer in 0..=6", None),
    };
    let start = match parse_time(req.params.get("start")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("start {}", m), None),
    };
    let end = match parse_time(req.params.get("end")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("end {}", m), None),
    };
    if start >= end {
        return err(&req.id, "bad_params", "start must be before end", None);
    }
    let title = match parse_title(req.params.get("title")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("title {}", m), None),
    };

    let entry_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO schedule_entries(id, day, start_time, end_time, title) VALUES(?, ?, ?, ?, ?)",
        (
            &entry_id,
            day,
            start.format("%H:%M").to_string(),
            end.format("%H:%M").to_string(),
            &title,
        ),
    ) {
        return db_err(&req.id, "db_insert_failed", e);
    }
    ok(&req.id, json!({ "entryId": entry_id }))
}

fn handle_schedule_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let entry_id = match required_str(req, "entryId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conn.execute("DELETE FROM schedule_entries WHERE id = ?", [&entry_id]) {
        Ok(0) => err(&req.id, "not_found", "schedule entry not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => db_err(&req.id, "db_delete_failed", e),
    }
}

fn handle_schedule_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match conn.execute("DELETE FROM schedule_entries", []) {
        Ok(n) => ok(&req.id, json!({ "removed": n })),
        Err(e) => db_err(&req.id, "db_delete_failed", e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.list" => Some(handle_schedule_list(state, req)),
        "schedule.add" => Some(handle_schedule_add(state, req)),
        "schedule.delete" => Some(handle_schedule_delete(state, req)),
        "schedule.clear" => Some(handle_schedule_clear(state, req)),
        _ => None,
    }
}
