use crate::ipc::error::{db_err, err, ok};
use crate::ipc::handlers::grades::load_module_views;
use crate::ipc::helpers::{
    db_conn, parse_credits, parse_opt_percent, parse_percent, parse_term, parse_title,
    required_str,
};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, now_ts};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn handle_modules_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match load_module_views(conn) {
        Ok(modules) => ok(&req.id, json!({ "modules": modules })),
        Err(e) => db_err(&req.id, "db_query_failed", e),
    }
}

fn handle_modules_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match parse_title(req.params.get("name")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("name {}", m), None),
    };
    let term = match parse_term(req.params.get("term")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("term {}", m), None),
    };
    let credits = match parse_credits(req.params.get("credits")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("credits {}", m), None),
    };

    let module_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO modules(id, name, term, credits, created_at) VALUES(?, ?, ?, ?, ?)",
        (&module_id, &name, term, credits, now_ts()),
    ) {
        return db_err(&req.id, "db_insert_failed", e);
    }
    ok(&req.id, json!({ "moduleId": module_id }))
}

fn handle_modules_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let module_id = match required_str(req, "moduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing patch", None);
    };

    let current: Option<(String, i64, f64)> = match conn
        .query_row(
            "SELECT name, term, credits FROM modules WHERE id = ?",
            [&module_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return db_err(&req.id, "db_query_failed", e),
    };
    let Some((mut name, mut term, mut credits)) = current else {
        return err(&req.id, "not_found", "module not found", None);
    };

    for (k, v) in patch {
        match k.as_str() {
            "name" => match parse_title(Some(v)) {
                Ok(s) => name = s,
                Err(m) => return err(&req.id, "bad_params", format!("patch.name {}", m), None),
            },
            "term" => match parse_term(Some(v)) {
                Ok(n) => term = n,
                Err(m) => return err(&req.id, "bad_params", format!("patch.term {}", m), None),
            },
            "credits" => match parse_credits(Some(v)) {
                Ok(x) => credits = x,
                Err(m) => {
                    return err(&req.id, "bad_params", format!("patch.credits {}", m), None)
                }
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

    if let Err(e) = conn.execute(
        "UPDATE modules SET name = ?, term = ?, credits = ? WHERE id = ?",
        (&name, term, credits, &module_id),
    ) {
        return db_err(&req.id, "db_update_failed", e);
    }
    ok(&req.id, json!({ "ok": true }))
}

fn delete_module(conn: &Connection, module_id: &str) -> anyhow::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM assessments WHERE module_id = ?", [module_id])?;
    let removed = tx.execute("DELETE FROM modules WHERE id = ?", [module_id])?;
    tx.commit()?;
    Ok(removed)
}

fn handle_modules_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let module_id = match required_str(req, "moduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match delete_module(conn, &module_id) {
        Ok(0) => err(&req.id, "not_found", "module not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => db_err(&req.id, "db_delete_failed", e),
    }
}

fn handle_assessments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let module_id = match required_str(req, "moduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::module_exists(conn, &module_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "module not found", None),
        Err(e) => return db_err(&req.id, "db_query_failed", e),
    }
    let title = match parse_title(req.params.get("title")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("title {}", m), None),
    };
    let weight = match parse_percent(req.params.get("weight")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("weight {}", m), None),
    };
    let score = match parse_opt_percent(req.params.get("score")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("score {}", m), None),
    };

    let assessment_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO assessments(id, module_id, title, weight, score, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (&assessment_id, &module_id, &title, weight, score, now_ts()),
    ) {
        return db_err(&req.id, "db_insert_failed", e);
    }
    ok(&req.id, json!({ "assessmentId": assessment_id }))
}

fn handle_assessments_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assessment_id = match required_str(req, "assessmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing patch", None);
    };

    let current: Option<(String, Option<f64>, Option<f64>)> = match conn
        .query_row(
            "SELECT title, weight, score FROM assessments WHERE id = ?",
            [&assessment_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return db_err(&req.id, "db_query_failed", e),
    };
    let Some((mut title, mut weight, mut score)) = current else {
        return err(&req.id, "not_found", "assessment not found", None);
    };

    for (k, v) in patch {
        match k.as_str() {
            "title" => match parse_title(Some(v)) {
                Ok(s) => title = s,
                Err(m) => return err(&req.id, "bad_params", format!("patch.title {}", m), None),
            },
            "weight" => match parse_percent(Some(v)) {
                Ok(x) => weight = Some(x),
                Err(m) => {
                    return err(&req.id, "bad_params", format!("patch.weight {}", m), None)
                }
            },
            "score" => match parse_opt_percent(Some(v)) {
                Ok(x) => score = x,
                Err(m) => return err(&req.id, "bad_params", format!("patch.score {}", m), None),
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

    if let Err(e) = conn.execute(
        "UPDATE assessments SET title = ?, weight = ?, score = ? WHERE id = ?",
        (&title, weight, score, &assessment_id),
    ) {
        return db_err(&req.id, "db_update_failed", e);
    }
    ok(&req.id, json!({ "ok": true }))
}

fn handle_assessments_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assessment_id = match required_str(req, "assessmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conn.execute("DELETE FROM assessments WHERE id = ?", [&assessment_id]) {
        Ok(0) => err(&req.id, "not_found", "assessment not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => db_err(&req.id, "db_delete_failed", e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "modules.list" => Some(handle_modules_list(state, req)),
        "modules.create" => Some(handle_modules_create(state, req)),
        "modules.update" => Some(handle_modules_update(state, req)),
        "modules.delete" => Some(handle_modules_delete(state, req)),
        "assessments.create" => Some(handle_assessments_create(state, req)),
        "assessments.update" => Some(handle_assessments_update(state, req)),
        "assessments.delete" => Some(handle_assessments_delete(state, req)),
        _ => None,
    }
}
