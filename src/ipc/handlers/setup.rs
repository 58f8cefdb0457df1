use crate::db;
use crate::ipc::error::{db_err, err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use crate::tasks::DueThresholds;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Assignments,
    Applications,
    Grades,
}

impl SetupSection {
    const ALL: [SetupSection; 3] = [Self::Assignments, Self::Applications, Self::Grades];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "assignments" => Some(Self::Assignments),
            "applications" => Some(Self::Applications),
            "grades" => Some(Self::Grades),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Assignments => "assignments",
            Self::Applications => "applications",
            Self::Grades => "grades",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Assignments => "setup.assignments",
            Self::Applications => "setup.applications",
            Self::Grades => "setup.grades",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Assignments => {
            let t = DueThresholds::default();
            json!({
                "dueSoonDays": t.soon_days,
                "dueMidDays": t.mid_days
            })
        }
        SetupSection::Applications => json!({
            "closingSoonDays": 5
        }),
        SetupSection::Grades => json!({
            "showEmptyTerms": false
        }),
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Assignments => match k.as_str() {
                "dueSoonDays" | "dueMidDays" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 365)?));
                }
                _ => return Err(format!("unknown assignments field: {}", k)),
            },
            SetupSection::Applications => match k.as_str() {
                "closingSoonDays" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 365)?));
                }
                _ => return Err(format!("unknown applications field: {}", k)),
            },
            SetupSection::Grades => match k.as_str() {
                "showEmptyTerms" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown grades field: {}", k)),
            },
        }
    }

    if let SetupSection::Assignments = section {
        let soon = obj.get("dueSoonDays").and_then(|v| v.as_i64()).unwrap_or(0);
        let mid = obj.get("dueMidDays").and_then(|v| v.as_i64()).unwrap_or(0);
        if soon > mid {
            return Err("dueSoonDays must be <= dueMidDays".into());
        }
    }
    Ok(())
}

fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed stored values fall back to defaults.
            let mut merged = current.clone();
            if merge_section_patch(section, &mut merged, saved_obj).is_ok() {
                current = merged;
            }
        }
    }
    Ok(current)
}

/// Section for the engines to read. A store failure is logged and the
/// defaults are used.
fn section_or_default(conn: &Connection, section: SetupSection) -> Value {
    match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(
                section = section.name(),
                error = %e,
                "setup read failed, using defaults"
            );
            default_section(section)
        }
    }
}

/// Bucket cutoffs for assignment priority.
pub fn due_thresholds(conn: &Connection) -> DueThresholds {
    let fallback = DueThresholds::default();
    let obj = section_or_default(conn, SetupSection::Assignments);
    DueThresholds {
        soon_days: obj
            .get("dueSoonDays")
            .and_then(|v| v.as_i64())
            .unwrap_or(fallback.soon_days),
        mid_days: obj
            .get("dueMidDays")
            .and_then(|v| v.as_i64())
            .unwrap_or(fallback.mid_days),
    }
}

pub fn closing_soon_days(conn: &Connection) -> i64 {
    section_or_default(conn, SetupSection::Applications)
        .get("closingSoonDays")
        .and_then(|v| v.as_i64())
        .unwrap_or(5)
}

pub fn show_empty_terms(conn: &Connection) -> bool {
    section_or_default(conn, SetupSection::Grades)
        .get("showEmptyTerms")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mut out = Map::new();
    for section in SetupSection::ALL {
        match load_section(conn, section) {
            Ok(v) => {
                out.insert(section.name().to_string(), v);
            }
            Err(e) => return db_err(&req.id, "db_query_failed", e),
        }
    }
    ok(&req.id, Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return db_err(&req.id, "db_query_failed", e),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return db_err(&req.id, "db_update_failed", e);
    }
    tracing::info!(section = section.name(), "setup updated");
    ok(&req.id, json!({ "section": section.name(), "value": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
