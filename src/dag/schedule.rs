// src/dag/schedule.rs

//! Schedule calculator: pure date arithmetic over prerequisites.
//!
//! - A task starts the day after its latest prerequisite ends, at midnight
//!   UTC.
//! - Its normative deadline is the start plus its duration in calendar days.
//! - A prerequisite "ends" at its actual completion date once completed, and
//!   at its current normative deadline otherwise.

use chrono::{DateTime, Days, NaiveTime, Utc};

use crate::task::ProjectTask;
use crate::types::{TaskCode, TaskStatus};

/// Planned start and normative deadline of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub planned_start: DateTime<Utc>,
    pub normative_deadline: DateTime<Utc>,
}

impl Schedule {
    /// Schedule of a task that starts at `start` and lasts `duration_days`.
    pub fn starting_at(start: DateTime<Utc>, duration_days: u32) -> Self {
        Self {
            planned_start: start,
            normative_deadline: add_days(start, duration_days),
        }
    }

    /// Schedule of a task whose latest prerequisite ends at `latest_end`.
    pub fn after(latest_end: DateTime<Utc>, duration_days: u32) -> Self {
        Self::starting_at(next_midnight(latest_end), duration_days)
    }

    /// Whether `self` differs from the given stored dates, comparing by
    /// calendar date only.
    pub fn differs_from(
        &self,
        planned_start: Option<DateTime<Utc>>,
        normative_deadline: DateTime<Utc>,
    ) -> bool {
        let start_changed = match planned_start {
            Some(old) => !same_day(old, self.planned_start),
            None => true,
        };
        start_changed || !same_day(normative_deadline, self.normative_deadline)
    }
}

/// Midnight UTC of the day after `t`.
pub fn next_midnight(t: DateTime<Utc>) -> DateTime<Utc> {
    let day = t.date_naive() + Days::new(1);
    day.and_time(NaiveTime::MIN).and_utc()
}

/// `t` moved forward by whole calendar days.
pub fn add_days(t: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    t + Days::new(u64::from(days))
}

/// Date-only equality, ignoring time of day.
pub fn same_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

/// Effective end of a prerequisite: actual completion when completed,
/// otherwise its planned deadline.
pub fn effective_end(
    status: TaskStatus,
    actual_completion: Option<DateTime<Utc>>,
    normative_deadline: DateTime<Utc>,
) -> DateTime<Utc> {
    match (status, actual_completion) {
        (TaskStatus::Completed, Some(actual)) => actual,
        _ => normative_deadline,
    }
}

/// What a task's prerequisites currently say about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrerequisiteSummary {
    /// Latest effective end among resolvable prerequisites.
    pub latest_end: Option<DateTime<Utc>>,
    /// Number of prerequisites that resolved to a task.
    pub resolved: usize,
    /// Whether every resolvable prerequisite is completed.
    pub all_completed: bool,
}

impl PrerequisiteSummary {
    /// Summarise `depends_on`, resolving each code with `lookup`. Codes that
    /// do not resolve are skipped.
    pub fn collect<'a, F>(depends_on: &[TaskCode], lookup: F) -> Self
    where
        F: Fn(&str) -> Option<&'a ProjectTask>,
    {
        let mut latest_end: Option<DateTime<Utc>> = None;
        let mut resolved = 0;
        let mut all_completed = true;

        for dep in depends_on {
            let Some(task) = lookup(dep.as_str()) else {
                continue;
            };
            resolved += 1;
            if !task.is_completed() {
                all_completed = false;
            }
            let end = task.effective_end();
            latest_end = Some(latest_end.map_or(end, |cur| cur.max(end)));
        }

        Self {
            latest_end,
            resolved,
            all_completed,
        }
    }

    /// Whether at least one prerequisite was found.
    pub fn has_prerequisites(&self) -> bool {
        self.resolved > 0
    }

    /// Schedule for a task of `duration_days` behind these prerequisites, or
    /// `None` when nothing resolved.
    pub fn schedule(&self, duration_days: u32) -> Option<Schedule> {
        self.latest_end
            .map(|end| Schedule::after(end, duration_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn start_is_next_day_at_midnight() {
        let s = Schedule::after(at(2024, 1, 11, 15), 1);
        assert_eq!(s.planned_start, at(2024, 1, 12, 0));
        assert_eq!(s.normative_deadline, at(2024, 1, 13, 0));
    }

    #[test]
    fn crosses_month_and_leap_day() {
        let s = Schedule::after(at(2024, 2, 28, 23), 2);
        assert_eq!(s.planned_start, at(2024, 2, 29, 0));
        assert_eq!(s.normative_deadline, at(2024, 3, 2, 0));
    }

    #[test]
    fn effective_end_uses_actual_only_when_completed() {
        let deadline = at(2024, 1, 12, 0);
        let actual = Some(at(2024, 1, 11, 9));
        assert_eq!(effective_end(TaskStatus::Completed, actual, deadline), actual.unwrap());
        assert_eq!(effective_end(TaskStatus::Review, actual, deadline), deadline);
        assert_eq!(effective_end(TaskStatus::Completed, None, deadline), deadline);
    }

    #[test]
    fn differs_ignores_time_of_day() {
        let s = Schedule::starting_at(at(2024, 1, 12, 0), 1);
        assert!(!s.differs_from(Some(at(2024, 1, 12, 18)), at(2024, 1, 13, 7)));
        assert!(s.differs_from(None, at(2024, 1, 13, 0)));
        assert!(s.differs_from(Some(at(2024, 1, 12, 0)), at(2024, 1, 14, 0)));
    }
}
