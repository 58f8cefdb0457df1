use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

/// Round-half-to-even at two decimals. All grade, points and
/// average outputs pass through this.
pub fn round_2_decimals(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}

pub fn round_1_decimal(x: f64) -> f64 {
    (x * 10.0).round_ties_even() / 10.0
}

/// Credit totals are shown as whole numbers when they have no fractional part,
/// otherwise with one decimal.
pub fn display_credits(total: f64) -> serde_json::Value {
    if total.fract() == 0.0 && total.abs() < (i64::MAX as f64) {
        serde_json::Value::from(total as i64)
    } else {
        serde_json::Value::from(round_1_decimal(total))
    }
}

fn serialize_credits<S: Serializer>(total: &f64, s: S) -> Result<S::Ok, S::Error> {
    display_credits(*total).serialize(s)
}

/// One assessment as the calculator sees it. `None` weight counts as 0;
/// `None` score means "not yet graded".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedScore {
    pub weight: Option<f64>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleGrade {
    pub total_weight: f64,
    pub current_grade: Option<f64>,
    pub weight_with_score: f64,
    pub current_points: f64,
}

/// Points earned toward the course: `weighted_sum / 100`, on the 0..100
/// scale of the module's full weight. Not capped by the defined weight.
pub fn points_earned(weighted_sum: f64) -> f64 {
    round_2_decimals(weighted_sum / 100.0)
}

/// Weighted average of one module's assessments.
///
/// Unscored rows add to `total_weight` only. Input is assumed validated
/// (weights and scores in 0..=100); nothing is clamped here.
pub fn module_grade<I>(assessments: I) -> ModuleGrade
where
    I: IntoIterator<Item = WeightedScore>,
{
    let mut total_weight = 0.0_f64;
    let mut weight_with_score = 0.0_f64;
    let mut weighted_sum = 0.0_f64;

    for a in assessments {
        let weight = a.weight.filter(|w| w.is_finite()).unwrap_or(0.0);
        total_weight += weight;

        let Some(score) = a.score.filter(|s| s.is_finite()) else {
            continue;
        };
        weight_with_score += weight;
        weighted_sum += weight * score;
    }

    let current_grade = if weight_with_score > 0.0 {
        Some(round_2_decimals(weighted_sum / weight_with_score))
    } else {
        None
    };

    ModuleGrade {
        total_weight: round_2_decimals(total_weight),
        current_grade,
        weight_with_score: round_2_decimals(weight_with_score),
        current_points: points_earned(weighted_sum),
    }
}

/// A module with its derived grade attached; the unit every aggregator
/// below consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedModule {
    pub module_id: String,
    pub name: String,
    pub term: i64,
    pub credits: f64,
    #[serde(flatten)]
    pub grade: ModuleGrade,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermSummary {
    pub term: i64,
    pub module_count: usize,
    pub graded_count: usize,
    pub credits_total: f64,
    pub avg: Option<f64>,
}

#[derive(Default)]
struct TermAccumulator {
    module_count: usize,
    graded_count: usize,
    credits_total: f64,
    weighted: f64,
}

/// Credit-weighted average per term, ascending by term.
///
/// The denominator is every module's credits, graded or not, so ungraded
/// modules pull the average down until they get a score.
pub fn term_summaries(modules: &[GradedModule]) -> Vec<TermSummary> {
    let mut by_term: BTreeMap<i64, TermAccumulator> = BTreeMap::new();
    for m in modules {
        let acc = by_term.entry(m.term).or_default();
        let credits = if m.credits.is_finite() { m.credits } else { 0.0 };
        acc.module_count += 1;
        acc.credits_total += credits;
        if let Some(grade) = m.grade.current_grade {
            acc.graded_count += 1;
            acc.weighted += credits * grade;
        }
    }

    by_term
        .into_iter()
        .map(|(term, acc)| TermSummary {
            term,
            module_count: acc.module_count,
            graded_count: acc.graded_count,
            credits_total: round_2_decimals(acc.credits_total),
            avg: if acc.credits_total > 0.0 {
                Some(round_2_decimals(acc.weighted / acc.credits_total))
            } else {
                None
            },
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseTerm {
    pub term: i64,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRollup {
    pub name: String,
    #[serde(serialize_with = "serialize_credits")]
    pub ects_total: f64,
    pub terms: Vec<CourseTerm>,
    pub terms_count: usize,
    pub overall: f64,
}

#[derive(Default)]
struct CourseAccumulator {
    ects_total: f64,
    points_by_term: BTreeMap<i64, f64>,
}

/// Cross-term rollup keyed by trimmed, case-sensitive module name.
///
/// Per-term values are summed `current_points`, never averaged grades.
/// Blank names are skipped. Courses come back sorted case-insensitively.
pub fn course_rollups(modules: &[GradedModule]) -> Vec<CourseRollup> {
    let mut by_name: HashMap<&str, CourseAccumulator> = HashMap::new();
    for m in modules {
        let name = m.name.trim();
        if name.is_empty() {
            continue;
        }
        let acc = by_name.entry(name).or_default();
        if m.credits.is_finite() {
            acc.ects_total += m.credits;
        }
        *acc.points_by_term.entry(m.term).or_insert(0.0) += m.grade.current_points;
    }

    let mut out: Vec<CourseRollup> = by_name
        .into_iter()
        .map(|(name, acc)| {
            let terms: Vec<CourseTerm> = acc
                .points_by_term
                .into_iter()
                .map(|(term, points)| CourseTerm {
                    term,
                    points: round_2_decimals(points),
                })
                .collect();
            let overall = round_2_decimals(terms.iter().map(|t| t.points).sum());
            CourseRollup {
                name: name.to_string(),
                ects_total: acc.ects_total,
                terms_count: terms.len(),
                terms,
                overall,
            }
        })
        .collect();
    out.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
    out
}

/// Plain mean of course totals, unweighted (compare [`term_summaries`]).
pub fn overall_average<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut sum = 0.0_f64;
    let mut count = 0_usize;
    for v in values.into_iter().flatten() {
        if !v.is_finite() {
            continue;
        }
        sum += v;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(round_2_decimals(sum / count as f64))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermModules<T> {
    pub term: i64,
    pub modules: Vec<T>,
}

/// Groups items by term, ascending, keeping input order inside each term.
pub fn group_by_term<T, F>(items: Vec<T>, term_of: F) -> Vec<TermModules<T>>
where
    F: Fn(&T) -> i64,
{
    let mut by_term: BTreeMap<i64, Vec<T>> = BTreeMap::new();
    for item in items {
        by_term.entry(term_of(&item)).or_default().push(item);
    }
    by_term
        .into_iter()
        .map(|(term, modules)| TermModules { term, modules })
        .collect()
}
