use crate::ipc::error::{db_err, err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{db_conn, parse_opt_date, parse_text, required_str, today};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, now_ts, ApplicationRow};
use crate::tasks::{self, Deadline};
use chrono::NaiveDate;
use rusqlite::OptionalExtension;
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use uuid::Uuid;

pub const STATUS_OPTIONS: [&str; 13] = [
    "Not Applied",
    "Interested",
    "Application Submitted",
    "Online Assessment",
    "Case Study",
    "HireVue",
    "Telephone Interview",
    "Video Interview",
    "Face-to-face Interview",
    "Assessment Centre",
    "Offer Received",
    "Rejected",
    "Not Interested",
];

pub const YES_NO: [&str; 3] = ["Yes", "No", "Optional"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationView {
    #[serde(flatten)]
    row: ApplicationRow,
    deadline: Deadline,
}

fn parse_choice(
    v: Option<&JsonValue>,
    options: &[&'static str],
    default: &'static str,
) -> Result<&'static str, String> {
    match v {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => {
            let s = v.as_str().ok_or("must be string")?.trim();
            options
                .iter()
                .find(|o| o.eq_ignore_ascii_case(s))
                .copied()
                .ok_or_else(|| format!("must be one of: {}", options.join(", ")))
        }
    }
}

fn parse_input(input: &Map<String, JsonValue>) -> Result<ApplicationRow, String> {
    let field = |k: &str| input.get(k);
    let text = |k: &str| parse_text(field(k)).map_err(|m| format!("input.{} {}", k, m));
    let date = |k: &str| parse_opt_date(field(k)).map_err(|m| format!("input.{} {}", k, m));
    let choice = |k: &str, options: &[&'static str], default: &'static str| {
        parse_choice(field(k), options, default)
            .map(str::to_string)
            .map_err(|m| format!("input.{} {}", k, m))
    };

    Ok(ApplicationRow {
        id: String::new(),
        status: choice("status", &STATUS_OPTIONS[..], STATUS_OPTIONS[0])?,
        company: text("company")?,
        programme: text("programme")?,
        opening: date("opening")?,
        closing: date("closing")?,
        cv: choice("cv", &YES_NO[..], YES_NO[0])?,
        cover: choice("cover", &YES_NO[..], YES_NO[0])?,
        written: choice("written", &YES_NO[..], YES_NO[0])?,
        notes: text("notes")?,
    })
}

fn application_views(rows: Vec<ApplicationRow>, today: NaiveDate, soon_days: i64) -> Vec<ApplicationView> {
    rows.into_iter()
        .map(|row| {
            let deadline = tasks::deadline_for(row.closing.as_deref(), today, soon_days);
            ApplicationView { row, deadline }
        })
        .collect()
}

fn handle_applications_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let rows = match store::load_applications(conn) {
        Ok(v) => v,
        Err(e) => return db_err(&req.id, "db_query_failed", e),
    };
    let views = application_views(rows, today(), setup::closing_soon_days(conn));
    ok(
        &req.id,
        json!({
            "applications": views,
            "statusOptions": STATUS_OPTIONS,
        }),
    )
}

fn handle_applications_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(input) = req.params.get("input").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing input", None);
    };
    let mut row = match parse_input(input) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let existing_id = input
        .get("applicationId")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let ts = now_ts();
    if let Some(id) = existing_id {
        let exists: Option<i64> = match conn
            .query_row("SELECT 1 FROM applications WHERE id = ?", [&id], |r| r.get(0))
            .optional()
        {
            Ok(v) => v,
            Err(e) => return db_err(&req.id, "db_query_failed", e),
        };
        if exists.is_none() {
            return err(&req.id, "not_found", "application not found", None);
        }
        row.id = id;
        if let Err(e) = conn.execute(
            "UPDATE applications
             SET status = ?, company = ?, programme = ?, opening = ?, closing = ?,
                 cv = ?, cover = ?, written = ?, notes = ?, updated_at = ?
             WHERE id = ?",
            rusqlite::params![
                row.status,
                row.company,
                row.programme,
                row.opening,
                row.closing,
                row.cv,
                row.cover,
                row.written,
                row.notes,
                ts,
                row.id
            ],
        ) {
            return db_err(&req.id, "db_update_failed", e);
        }
    } else {
        row.id = Uuid::new_v4().to_string();
        if let Err(e) = conn.execute(
            "INSERT INTO applications(
                id, status, company, programme, opening, closing, cv, cover, written, notes, created_at, updated_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                row.id,
                row.status,
                row.company,
                row.programme,
                row.opening,
                row.closing,
                row.cv,
                row.cover,
                row.written,
                row.notes,
                ts,
                ts
            ],
        ) {
            return db_err(&req.id, "db_insert_failed", e);
        }
    }
    ok(&req.id, json!({ "applicationId": row.id }))
}

fn handle_applications_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let application_id = match required_str(req, "applicationId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conn.execute("DELETE FROM applications WHERE id = ?", [&application_id]) {
        Ok(0) => err(&req.id, "not_found", "application not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => db_err(&req.id, "db_delete_failed", e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "applications.list" => Some(handle_applications_list(state, req)),
        "applications.upsert" => Some(handle_applications_upsert(state, req)),
        "applications.delete" => Some(handle_applications_delete(state, req)),
        _ => None,
    }
}
