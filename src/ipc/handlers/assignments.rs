use crate::ipc::error::{db_err, err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{db_conn, parse_opt_date, parse_text, parse_title, required_str, today};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, now_ts, AssignmentRow, StageRow};
use crate::tasks::{self, DueThresholds, StageProgress, TaskStatus};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::json;
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignmentView {
    id: String,
    title: String,
    due_date: Option<String>,
    notes: String,
    priority: i64,
    status: TaskStatus,
    progress: i64,
    done_count: usize,
    stage_count: usize,
    stages: Vec<StageRow>,
    created_at: String,
    updated_at: String,
}

/// Priority and status are both recomputed here; the stored columns are
/// never trusted on read.
fn assignment_views(
    assignments: Vec<AssignmentRow>,
    stages: Vec<StageRow>,
    today: NaiveDate,
    thresholds: DueThresholds,
) -> Vec<AssignmentView> {
    let mut by_assignment: HashMap<String, Vec<StageRow>> = HashMap::new();
    for s in stages {
        by_assignment.entry(s.assignment_id.clone()).or_default().push(s);
    }

    let mut out: Vec<AssignmentView> = assignments
        .into_iter()
        .map(|a| {
            let stages = by_assignment.remove(&a.id).unwrap_or_default();
            let progress = tasks::stage_progress(stages.iter().map(|s| s.done));
            let priority = tasks::priority_for(a.due_date.as_deref(), today, thresholds);
            AssignmentView {
                id: a.id,
                title: a.title,
                due_date: a.due_date,
                notes: a.notes,
                priority,
                status: progress.status,
                progress: progress.progress,
                done_count: progress.done_count,
                stage_count: progress.stage_count,
                stages,
                created_at: a.created_at,
                updated_at: a.updated_at,
            }
        })
        .collect();

    // Most urgent first, then earliest due date; undated work sinks. The
    // sort is stable so creation order breaks remaining ties.
    out.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| match (&a.due_date, &b.due_date) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    });
    out
}

fn handle_assignments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assignments = match store::load_assignments(conn) {
        Ok(v) => v,
        Err(e) => return db_err(&req.id, "db_query_failed", e),
    };
    let stages = match store::load_stages(conn, None) {
        Ok(v) => v,
        Err(e) => return db_err(&req.id, "db_query_failed", e),
    };
    let views = assignment_views(assignments, stages, today(), setup::due_thresholds(conn));
    ok(&req.id, json!({ "assignments": views }))
}

fn handle_assignments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let title = match parse_title(req.params.get("title")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("title {}", m), None),
    };
    let due_date = match parse_opt_date(req.params.get("dueDate")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("dueDate {}", m), None),
    };
    let notes = match parse_text(req.params.get("notes")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("notes {}", m), None),
    };

    let priority = tasks::priority_for(due_date.as_deref(), today(), setup::due_thresholds(conn));
    let assignment_id = Uuid::new_v4().to_string();
    let ts = now_ts();
    if let Err(e) = conn.execute(
        "INSERT INTO assignments(id, title, due_date, notes, priority, status, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &assignment_id,
            &title,
            &due_date,
            &notes,
            priority,
            TaskStatus::Pending.as_str(),
            &ts,
            &ts,
        ),
    ) {
        return db_err(&req.id, "db_insert_failed", e);
    }
    ok(
        &req.id,
        json!({
            "assignmentId": assignment_id,
            "priority": priority,
            "status": TaskStatus::Pending,
        }),
    )
}

fn handle_assignments_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing patch", None);
    };
    let current = match store::load_assignment(conn, &assignment_id) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "assignment not found", None),
        Err(e) => return db_err(&req.id, "db_query_failed", e),
    };

    let mut title = current.title;
    let mut due_date = current.due_date;
    let mut notes = current.notes;
    for (k, v) in patch {
        match k.as_str() {
            "title" => match parse_title(Some(v)) {
                Ok(s) => title = s,
                Err(m) => return err(&req.id, "bad_params", format!("patch.title {}", m), None),
            },
            "dueDate" => match parse_opt_date(Some(v)) {
                Ok(d) => due_date = d,
                Err(m) => {
                    return err(&req.id, "bad_params", format!("patch.dueDate {}", m), None)
                }
            },
            "notes" => match parse_text(Some(v)) {
                Ok(s) => notes = s,
                Err(m) => return err(&req.id, "bad_params", format!("patch.notes {}", m), None),
            },
            _ => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown patch field: {}", k),
                    None,
                )
            }
        }
    }

    let priority = tasks::priority_for(due_date.as_deref(), today(), setup::due_thresholds(conn));
    if let Err(e) = conn.execute(
        "UPDATE assignments
         SET title = ?, due_date = ?, notes = ?, priority = ?, updated_at = ?
         WHERE id = ?",
        (&title, &due_date, &notes, priority, now_ts(), &assignment_id),
    ) {
        return db_err(&req.id, "db_update_failed", e);
    }
    ok(&req.id, json!({ "priority": priority }))
}

fn delete_assignment(conn: &Connection, assignment_id: &str) -> anyhow::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM stages WHERE assignment_id = ?", [assignment_id])?;
    let removed = tx.execute("DELETE FROM assignments WHERE id = ?", [assignment_id])?;
    tx.commit()?;
    Ok(removed)
}

fn handle_assignments_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match delete_assignment(conn, &assignment_id) {
        Ok(0) => err(&req.id, "not_found", "assignment not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => db_err(&req.id, "db_delete_failed", e),
    }
}

fn progress_json(p: &StageProgress) -> serde_json::Value {
    json!({
        "progress": p.progress,
        "status": p.status,
        "doneCount": p.done_count,
        "stageCount": p.stage_count,
    })
}

fn stage_owner(conn: &Connection, stage_id: &str) -> rusqlite::Result<Option<(String, bool)>> {
    conn.query_row(
        "SELECT assignment_id, done FROM stages WHERE id = ?",
        [stage_id],
        |r| Ok((r.get(0)?, r.get::<_, i64>(1)? != 0)),
    )
    .optional()
}

fn add_stage(conn: &Connection, assignment_id: &str, title: &str) -> anyhow::Result<(String, StageProgress)> {
    let tx = conn.unchecked_transaction()?;
    let position = store::next_stage_position(&tx, assignment_id)?;
    let stage_id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO stages(id, assignment_id, title, done, position) VALUES(?, ?, ?, 0, ?)",
        (&stage_id, assignment_id, title, position),
    )?;
    let progress = store::sync_assignment_status(&tx, assignment_id)?;
    tx.commit()?;
    Ok((stage_id, progress))
}

fn handle_stages_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let title = match parse_title(req.params.get("title")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("title {}", m), None),
    };
    match store::load_assignment(conn, &assignment_id) {
        Ok(Some(_)) => {}
        Ok(None) => return err(&req.id, "not_found", "assignment not found", None),
        Err(e) => return db_err(&req.id, "db_query_failed", e),
    }

    match add_stage(conn, &assignment_id, &title) {
        Ok((stage_id, progress)) => {
            let mut result = progress_json(&progress);
            result["stageId"] = json!(stage_id);
            ok(&req.id, result)
        }
        Err(e) => db_err(&req.id, "db_tx_failed", e),
    }
}

fn toggle_stage(conn: &Connection, stage_id: &str, assignment_id: &str) -> anyhow::Result<StageProgress> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE stages SET done = CASE WHEN done = 0 THEN 1 ELSE 0 END WHERE id = ?",
        [stage_id],
    )?;
    let progress = store::sync_assignment_status(&tx, assignment_id)?;
    tx.commit()?;
    Ok(progress)
}

fn handle_stages_toggle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let stage_id = match required_str(req, "stageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (assignment_id, was_done) = match stage_owner(conn, &stage_id) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "stage not found", None),
        Err(e) => return db_err(&req.id, "db_query_failed", e),
    };

    match toggle_stage(conn, &stage_id, &assignment_id) {
        Ok(progress) => {
            let mut result = progress_json(&progress);
            result["done"] = json!(!was_done);
            ok(&req.id, result)
        }
        Err(e) => db_err(&req.id, "db_tx_failed", e),
    }
}

fn delete_stage(conn: &Connection, stage_id: &str, assignment_id: &str) -> anyhow::Result<StageProgress> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM stages WHERE id = ?", [stage_id])?;
    let progress = store::sync_assignment_status(&tx, assignment_id)?;
    tx.commit()?;
    Ok(progress)
}

fn handle_stages_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let stage_id = match required_str(req, "stageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (assignment_id, _) = match stage_owner(conn, &stage_id) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "stage not found", None),
        Err(e) => return db_err(&req.id, "db_query_failed", e),
    };

    match delete_stage(conn, &stage_id, &assignment_id) {
        Ok(progress) => ok(&req.id, progress_json(&progress)),
        Err(e) => db_err(&req.id, "db_tx_failed", e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.list" => Some(handle_assignments_list(state, req)),
        "assignments.create" => Some(handle_assignments_create(state, req)),
        "assignments.update" => Some(handle_assignments_update(state, req)),
        "assignments.delete" => Some(handle_assignments_delete(state, req)),
        "stages.add" => Some(handle_stages_add(state, req)),
        "stages.toggle" => Some(handle_stages_toggle(state, req)),
        "stages.delete" => Some(handle_stages_delete(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, due: Option<&str>) -> AssignmentRow {
        AssignmentRow {
            id: id.to_string(),
            title: id.to_string(),
            due_date: due.map(str::to_string),
            notes: String::new(),
            priority: 3,
            status: "done".to_string(),
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            updated_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    fn stage(id: &str, assignment_id: &str, done: bool) -> StageRow {
        StageRow {
            id: id.to_string(),
            assignment_id: assignment_id.to_string(),
            title: id.to_string(),
            done,
            position: 0,
        }
    }

    #[test]
    fn views_recompute_priority_and_status_and_sort() {
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).expect("date");
        let views = assignment_views(
            vec![
                row("undated", None),
                row("later", Some("2026-06-01")),
                row("soon", Some("2026-05-02")),
                row("week", Some("2026-05-06")),
                row("overdue", Some("2026-04-20")),
            ],
            vec![stage("s1", "soon", true), stage("s2", "soon", false)],
            today,
            DueThresholds::default(),
        );
        let ids: Vec<&str> = views.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["overdue", "soon", "week", "later", "undated"]);

        let soon = &views[1];
        assert_eq!(soon.priority, 1);
        assert_eq!(soon.status, TaskStatus::InProgress);
        assert_eq!(soon.progress, 50);
        assert_eq!(views[2].priority, 2);
        assert_eq!(views[3].priority, 3);

        // Stored "done" with no stages is re-derived as pending.
        let undated = &views[4];
        assert_eq!(undated.status, TaskStatus::Pending);
        assert_eq!(undated.progress, 0);
    }

    #[test]
    fn stage_mutations_write_status_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = crate::db::open_db(dir.path()).expect("open");
        let ts = now_ts();
        conn.execute(
            "INSERT INTO assignments(id, title, due_date, notes, priority, status, created_at, updated_at)
             VALUES('a1', 'Report', NULL, '', 3, 'pending', ?, ?)",
            (&ts, &ts),
        )
        .expect("insert");

        let (s1, p) = add_stage(&conn, "a1", "Outline").expect("add");
        assert_eq!(p.status, TaskStatus::Pending);
        let (s2, _) = add_stage(&conn, "a1", "Draft").expect("add");

        let p = toggle_stage(&conn, &s1, "a1").expect("toggle");
        assert_eq!(p.status, TaskStatus::InProgress);
        let p = toggle_stage(&conn, &s2, "a1").expect("toggle");
        assert_eq!(p.status, TaskStatus::Done);
        assert_eq!(p.progress, 100);
        let stored = store::load_assignment(&conn, "a1").expect("load").expect("row");
        assert_eq!(stored.status, "done");

        let p = delete_stage(&conn, &s2, "a1").expect("delete");
        assert_eq!(p.status, TaskStatus::Done);
        let p = delete_stage(&conn, &s1, "a1").expect("delete");
        assert_eq!(p.status, TaskStatus::Pending);
        let stored = store::load_assignment(&conn, "a1").expect("load").expect("row");
        assert_eq!(stored.status, "pending");

        let positions: Vec<i64> = store::load_stages(&conn, Some("a1"))
            .expect("stages")
            .iter()
            .map(|s| s.position)
            .collect();
        assert!(positions.is_empty());
    }
}
