//! Typed row loaders over the workspace database.
//!
//! Everything here returns fully materialized rows in a stable order; the
//! calc and tasks modules only ever see these snapshots.

use crate::tasks::{self, StageProgress};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRow {
    pub id: String,
    pub name: String,
    pub term: i64,
    pub credits: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRow {
    pub id: String,
    pub module_id: String,
    pub title: String,
    pub weight: Option<f64>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRow {
    pub id: String,
    pub title: String,
    pub due_date: Option<String>,
    pub notes: String,
    pub priority: i64,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRow {
    pub id: String,
    pub assignment_id: String,
    pub title: String,
    pub done: bool,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntryRow {
    pub id: String,
    pub day: i64,
    pub start: String,
    pub end: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRow {
    pub id: String,
    pub status: String,
    pub company: String,
    pub programme: String,
    pub opening: Option<String>,
    pub closing: Option<String>,
    pub cv: String,
    pub cover: String,
    pub written: String,
    pub notes: String,
}

pub fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn load_modules(conn: &Connection) -> anyhow::Result<Vec<ModuleRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, term, credits
         FROM modules
         ORDER BY term, name COLLATE NOCASE, rowid",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ModuleRow {
                id: r.get(0)?,
                name: r.get(1)?,
                term: r.get(2)?,
                credits: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_assessments(conn: &Connection) -> anyhow::Result<Vec<AssessmentRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, module_id, title, weight, score
         FROM assessments
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(AssessmentRow {
                id: r.get(0)?,
                module_id: r.get(1)?,
                title: r.get(2)?,
                weight: r.get(3)?,
                score: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn module_exists(conn: &Connection, module_id: &str) -> anyhow::Result<bool> {
    let hit: Option<i64> = conn
        .query_row("SELECT 1 FROM modules WHERE id = ?", [module_id], |r| r.get(0))
        .optional()?;
    Ok(hit.is_some())
}

pub fn load_assignments(conn: &Connection) -> anyhow::Result<Vec<AssignmentRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, due_date, notes, priority, status, created_at, updated_at
         FROM assignments
         ORDER BY created_at, rowid",
    )?;
    let rows = stmt
        .query_map([], map_assignment)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_assignment(conn: &Connection, assignment_id: &str) -> anyhow::Result<Option<AssignmentRow>> {
    let row = conn
        .query_row(
            "SELECT id, title, due_date, notes, priority, status, created_at, updated_at
             FROM assignments
             WHERE id = ?",
            [assignment_id],
            map_assignment,
        )
        .optional()?;
    Ok(row)
}

fn map_assignment(r: &rusqlite::Row<'_>) -> rusqlite::Result<AssignmentRow> {
    Ok(AssignmentRow {
        id: r.get(0)?,
        title: r.get(1)?,
        due_date: r.get(2)?,
        notes: r.get(3)?,
        priority: r.get(4)?,
        status: r.get(5)?,
        created_at: r.get(6)?,
        updated_at: r.get(7)?,
    })
}

/// Stages ordered by position, then id. `None` loads every assignment's.
pub fn load_stages(conn: &Connection, assignment_id: Option<&str>) -> anyhow::Result<Vec<StageRow>> {
    let map = |r: &rusqlite::Row<'_>| -> rusqlite::Result<StageRow> {
        Ok(StageRow {
            id: r.get(0)?,
            assignment_id: r.get(1)?,
            title: r.get(2)?,
            done: r.get::<_, i64>(3)? != 0,
            position: r.get(4)?,
        })
    };
    let rows = match assignment_id {
        Some(id) => {
            let mut stmt = conn.prepare(
                "SELECT id, assignment_id, title, done, position
                 FROM stages
                 WHERE assignment_id = ?
                 ORDER BY position, id",
            )?;
            let rows = stmt.query_map([id], map)?.collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id, assignment_id, title, done, position
                 FROM stages
                 ORDER BY assignment_id, position, id",
            )?;
            let rows = stmt.query_map([], map)?.collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}

/// Recomputes an assignment's status from its current stages and writes it
/// back with a fresh `updated_at`. Callers run this inside the same
/// transaction as the stage mutation.
pub fn sync_assignment_status(conn: &Connection, assignment_id: &str) -> anyhow::Result<StageProgress> {
    let stages = load_stages(conn, Some(assignment_id))?;
    let progress = tasks::stage_progress(stages.iter().map(|s| s.done));
    conn.execute(
        "UPDATE assignments SET status = ?, updated_at = ? WHERE id = ?",
        (progress.status.as_str(), now_ts(), assignment_id),
    )?;
    Ok(progress)
}

pub fn next_stage_position(conn: &Connection, assignment_id: &str) -> anyhow::Result<i64> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(position) FROM stages WHERE assignment_id = ?",
        [assignment_id],
        |r| r.get(0),
    )?;
    Ok(max.map(|m| m + 1).unwrap_or(0))
}

pub fn load_schedule(conn: &Connection) -> anyhow::Result<Vec<ScheduleEntryRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, day, start_time, end_time, title
         FROM schedule_entries
         ORDER BY day, start_time, rowid",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ScheduleEntryRow {
                id: r.get(0)?,
                day: r.get(1)?,
                start: r.get(2)?,
                end: r.get(3)?,
                title: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_applications(conn: &Connection) -> anyhow::Result<Vec<ApplicationRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, status, company, programme, opening, closing, cv, cover, written, notes
         FROM applications
         ORDER BY created_at, rowid",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ApplicationRow {
                id: r.get(0)?,
                status: r.get(1)?,
                company: r.get(2)?,
                programme: r.get(3)?,
                opening: r.get(4)?,
                closing: r.get(5)?,
                cv: r.get(6)?,
                cover: r.get(7)?,
                written: r.get(8)?,
                notes: r.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
