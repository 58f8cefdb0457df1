use crate::calc::{self, GradedModule, TermSummary, WeightedScore};
use crate::ipc::error::{db_err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use crate::store::{self, AssessmentRow, ModuleRow};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleView {
    #[serde(flatten)]
    pub module: GradedModule,
    pub assessments: Vec<AssessmentRow>,
}

/// Attaches each module's assessments (in store order) and its computed grade.
pub fn module_views(modules: Vec<ModuleRow>, assessments: Vec<AssessmentRow>) -> Vec<ModuleView> {
    let mut by_module: HashMap<String, Vec<AssessmentRow>> = HashMap::new();
    for a in assessments {
        by_module.entry(a.module_id.clone()).or_default().push(a);
    }

    modules
        .into_iter()
        .map(|m| {
            let assessments = by_module.remove(&m.id).unwrap_or_default();
            let grade = calc::module_grade(assessments.iter().map(|a| WeightedScore {
                weight: a.weight,
                score: a.score,
            }));
            ModuleView {
                module: GradedModule {
                    module_id: m.id,
                    name: m.name,
                    term: m.term,
                    credits: m.credits,
                    grade,
                },
                assessments,
            }
        })
        .collect()
}

pub fn load_module_views(conn: &Connection) -> anyhow::Result<Vec<ModuleView>> {
    let modules = store::load_modules(conn)?;
    let assessments = store::load_assessments(conn)?;
    Ok(module_views(modules, assessments))
}

/// Adds empty summaries for terms `1..=max` that have no modules.
fn fill_empty_terms(summaries: Vec<TermSummary>) -> Vec<TermSummary> {
    let Some(max_term) = summaries.iter().map(|s| s.term).max() else {
        return summaries;
    };
    let mut by_term: HashMap<i64, TermSummary> =
        summaries.into_iter().map(|s| (s.term, s)).collect();
    (1..=max_term)
        .map(|term| {
            by_term.remove(&term).unwrap_or(TermSummary {
                term,
                module_count: 0,
                graded_count: 0,
                credits_total: 0.0,
                avg: None,
            })
        })
        .collect()
}

fn handle_grades_overview(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let views = match load_module_views(conn) {
        Ok(v) => v,
        Err(e) => return db_err(&req.id, "db_query_failed", e),
    };

    let graded: Vec<GradedModule> = views.iter().map(|v| v.module.clone()).collect();
    let mut term_summaries = calc::term_summaries(&graded);
    if setup::show_empty_terms(conn) {
        term_summaries = fill_empty_terms(term_summaries);
    }
    let courses = calc::course_rollups(&graded);
    let overall_avg = calc::overall_average(courses.iter().map(|c| Some(c.overall)));
    let modules_by_term = calc::group_by_term(views, |v| v.module.term);

    ok(
        &req.id,
        json!({
            "modulesByTerm": modules_by_term,
            "termSummaries": term_summaries,
            "coursesOverall": courses,
            "overallAvg": overall_avg,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.overview" => Some(handle_grades_overview(state, req)),
        _ => None,
    }
}
