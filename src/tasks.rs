use chrono::NaiveDate;
use serde::Serialize;

pub const PRIORITY_HIGH: i64 = 1;
pub const PRIORITY_MEDIUM: i64 = 2;
pub const PRIORITY_LOW: i64 = 3;

/// Day cutoffs for the urgency buckets, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueThresholds {
    pub soon_days: i64,
    pub mid_days: i64,
}

impl Default for DueThresholds {
    fn default() -> Self {
        Self {
            soon_days: 3,
            mid_days: 7,
        }
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Calendar days from `today` until `due`; negative when overdue.
pub fn days_until(due: NaiveDate, today: NaiveDate) -> i64 {
    (due - today).num_days()
}

/// Urgency bucket for a stored due date. Missing or unparsable dates are
/// lowest priority. Buckets are checked high first, so overdue work is high.
pub fn priority_for(due_date: Option<&str>, today: NaiveDate, t: DueThresholds) -> i64 {
    let Some(due) = due_date.and_then(parse_date) else {
        return PRIORITY_LOW;
    };
    let days = days_until(due, today);
    if days <= t.soon_days {
        PRIORITY_HIGH
    } else if days <= t.mid_days {
        PRIORITY_MEDIUM
    } else {
        PRIORITY_LOW
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageProgress {
    pub done_count: usize,
    pub stage_count: usize,
    pub progress: i64,
    pub status: TaskStatus,
}

/// Completion state of an assignment from the `done` flags of its stages.
/// No stages is `pending` at 0%.
pub fn stage_progress<I>(stages_done: I) -> StageProgress
where
    I: IntoIterator<Item = bool>,
{
    let mut done_count = 0_usize;
    let mut stage_count = 0_usize;
    for done in stages_done {
        stage_count += 1;
        if done {
            done_count += 1;
        }
    }

    let progress = if stage_count > 0 {
        (done_count as f64 / stage_count as f64 * 100.0).round_ties_even() as i64
    } else {
        0
    };
    let status = if stage_count > 0 && done_count == stage_count {
        TaskStatus::Done
    } else if done_count > 0 {
        TaskStatus::InProgress
    } else {
        TaskStatus::Pending
    };

    StageProgress {
        done_count,
        stage_count,
        progress,
        status,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum Deadline {
    None,
    Open {
        #[serde(rename = "daysLeft")]
        days_left: i64,
    },
    Soon {
        #[serde(rename = "daysLeft")]
        days_left: i64,
    },
    Passed {
        #[serde(rename = "daysAgo")]
        days_ago: i64,
    },
}

/// Closing-date state of a job application.
pub fn deadline_for(closing: Option<&str>, today: NaiveDate, soon_days: i64) -> Deadline {
    let Some(close) = closing.and_then(parse_date) else {
        return Deadline::None;
    };
    let days = days_until(close, today);
    if days < 0 {
        Deadline::Passed { days_ago: -days }
    } else if days <= soon_days {
        Deadline::Soon { days_left: days }
    } else {
        Deadline::Open { days_left: days }
    }
}
