//! Formulas for the KPIs derived from maintenance records.

use serde::Serialize;

use super::types::{Evaluation, Outcome};
use crate::catalog;
use crate::metrics::{AgeProfile, BacklogCounts, PmAdherenceCounts, WorkOrderCounts};

pub const PM_ADHERENCE_TARGET_PCT: f64 = 95.0;
pub const MAX_OPEN_WORK_ORDERS: u64 = 40;
pub const BACKLOG_LIMIT_PCT: f64 = 10.0;

/// The automatically collected KPIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoKpi {
    PmAdherence,
    WoOpenedVsClosed,
    WoBacklog,
    WoAgeProfile,
}

impl AutoKpi {
    pub const ALL: [AutoKpi; 4] = [
        AutoKpi::PmAdherence,
        AutoKpi::WoOpenedVsClosed,
        AutoKpi::WoBacklog,
        AutoKpi::WoAgeProfile,
    ];

    /// Short key used in batch reports.
    pub fn key(&self) -> &'static str {
        match self {
            AutoKpi::PmAdherence => "pm_adherence",
            AutoKpi::WoOpenedVsClosed => "wo_opened_closed",
            AutoKpi::WoBacklog => "wo_backlog",
            AutoKpi::WoAgeProfile => "wo_age_profile",
        }
    }

    /// Catalog name the result is stored under.
    pub fn kpi_name(&self) -> &'static str {
        match self {
            AutoKpi::PmAdherence => catalog::PM_ADHERENCE,
            AutoKpi::WoOpenedVsClosed => catalog::WO_OPENED_VS_CLOSED,
            AutoKpi::WoBacklog => catalog::WO_BACKLOG,
            AutoKpi::WoAgeProfile => catalog::WO_AGE_PROFILE,
        }
    }

    /// Resolve either the short key or the catalog name.
    pub fn lookup(name_or_key: &str) -> Option<Self> {
        AutoKpi::ALL
            .into_iter()
            .find(|k| k.key() == name_or_key || k.kpi_name() == name_or_key)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// completed / scheduled × 100, meets at ≥ 95%. Nothing scheduled yields 0
/// and an indeterminate outcome.
pub fn evaluate_pm_adherence(c: PmAdherenceCounts) -> Evaluation {
    let (value, outcome) = if c.scheduled > 0 {
        let adherence = round2(c.completed as f64 / c.scheduled as f64 * 100.0);
        (adherence, Outcome::from_check(adherence >= PM_ADHERENCE_TARGET_PCT))
    } else {
        (0.0, Outcome::Indeterminate)
    };
    Evaluation {
        value: Some(value),
        text: Some(format!("{}/{} completed", c.completed, c.scheduled)),
        target: Some(PM_ADHERENCE_TARGET_PCT),
        outcome,
        notes: Some(format!(
            "Scheduled: {}, Completed: {}",
            c.scheduled, c.completed
        )),
    }
}

/// Work orders raised in the period still open; meets at ≤ 40.
pub fn evaluate_wo_opened_vs_closed(c: WorkOrderCounts) -> Evaluation {
    Evaluation {
        value: Some(c.still_open as f64),
        text: Some(format!(
            "Opened: {}, Closed: {}, Currently Open: {}",
            c.opened, c.closed, c.still_open
        )),
        target: Some(MAX_OPEN_WORK_ORDERS as f64),
        outcome: Outcome::from_check(c.still_open <= MAX_OPEN_WORK_ORDERS),
        notes: Some(format!("Opened: {}, Closed: {}", c.opened, c.closed)),
    }
}

/// Open share of the work orders raised in the period; meets below 10%.
/// The stored value is the open count and the target is 10% of raised.
/// With nothing raised the KPI meets only if nothing is open.
pub fn evaluate_wo_backlog(c: BacklogCounts) -> Evaluation {
    let (backlog_pct, outcome) = if c.raised > 0 {
        let pct = c.open as f64 / c.raised as f64 * 100.0;
        (pct, Outcome::from_check(pct < BACKLOG_LIMIT_PCT))
    } else {
        (0.0, Outcome::from_check(c.open == 0))
    };
    Evaluation {
        value: Some(c.open as f64),
        text: Some(format!(
            "{} open ({:.1}% of {} raised)",
            c.open, backlog_pct, c.raised
        )),
        target: Some(c.raised as f64 * BACKLOG_LIMIT_PCT / 100.0),
        outcome,
        notes: Some(format!("Open: {}, Raised this month: {}", c.open, c.raised)),
    }
}

/// Count of open work orders past the age threshold; meets at zero.
pub fn evaluate_wo_age_profile(p: &AgeProfile) -> Evaluation {
    Evaluation {
        value: Some(p.over_threshold as f64),
        text: Some(format!(
            "{} WOs over {} days old (avg age: {:.1} days)",
            p.over_threshold, p.threshold_days, p.average_age_days
        )),
        target: Some(0.0),
        outcome: Outcome::from_check(p.over_threshold == 0),
        notes: Some(format!(
            "Total open WOs: {}, Average age: {:.1} days",
            p.total_open, p.average_age_days
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_key_or_name() {
        assert_eq!(AutoKpi::lookup("wo_backlog"), Some(AutoKpi::WoBacklog));
        assert_eq!(AutoKpi::lookup("WO Backlog"), Some(AutoKpi::WoBacklog));
        assert_eq!(
            AutoKpi::lookup("Preventive Maintenance Adherence"),
            Some(AutoKpi::PmAdherence)
        );
        assert_eq!(AutoKpi::lookup("FR1"), None);
    }

    #[test]
    fn test_pm_adherence_nothing_scheduled() {
        let e = evaluate_pm_adherence(PmAdherenceCounts {
            scheduled: 0,
            completed: 0,
        });
        assert_eq!(e.value, Some(0.0));
        assert_eq!(e.outcome, Outcome::Indeterminate);
    }

    #[test]
    fn test_pm_adherence_at_target() {
        let e = evaluate_pm_adherence(PmAdherenceCounts {
            scheduled: 20,
            completed: 19,
        });
        assert_eq!(e.value, Some(95.0));
        assert_eq!(e.outcome, Outcome::Meets);
        assert_eq!(e.text.as_deref(), Some("19/20 completed"));
        assert_eq!(e.target, Some(95.0));
    }

    #[test]
    fn test_pm_adherence_below_target_rounds() {
        let e = evaluate_pm_adherence(PmAdherenceCounts {
            scheduled: 3,
            completed: 2,
        });
        assert_eq!(e.value, Some(66.67));
        assert_eq!(e.outcome, Outcome::Fails);
    }

    #[test]
    fn test_wo_opened_vs_closed_limit() {
        let at_limit = evaluate_wo_opened_vs_closed(WorkOrderCounts {
            opened: 60,
            closed: 20,
            still_open: 40,
        });
        assert_eq!(at_limit.value, Some(40.0));
        assert_eq!(at_limit.outcome, Outcome::Meets);

        let over = evaluate_wo_opened_vs_closed(WorkOrderCounts {
            opened: 60,
            closed: 19,
            still_open: 41,
        });
        assert_eq!(over.outcome, Outcome::Fails);
        assert_eq!(
            over.text.as_deref(),
            Some("Opened: 60, Closed: 19, Currently Open: 41")
        );
    }

    #[test]
    fn test_wo_backlog_nothing_raised_meets() {
        let e = evaluate_wo_backlog(BacklogCounts { raised: 0, open: 0 });
        assert_eq!(e.outcome, Outcome::Meets);
        assert_eq!(e.value, Some(0.0));
        assert_eq!(e.target, Some(0.0));
    }

    #[test]
    fn test_wo_backlog_over_limit() {
        let e = evaluate_wo_backlog(BacklogCounts {
            raised: 100,
            open: 11,
        });
        assert_eq!(e.value, Some(11.0));
        assert_eq!(e.outcome, Outcome::Fails);
        assert_eq!(e.target, Some(10.0));
        assert_eq!(e.text.as_deref(), Some("11 open (11.0% of 100 raised)"));
    }

    #[test]
    fn test_wo_backlog_under_limit() {
        let e = evaluate_wo_backlog(BacklogCounts {
            raised: 100,
            open: 9,
        });
        assert_eq!(e.outcome, Outcome::Meets);
    }

    #[test]
    fn test_wo_age_profile() {
        let clean = AgeProfile {
            total_open: 3,
            aged: 3,
            threshold_days: 60,
            average_age_days: 12.0,
            ..Default::default()
        };
        assert_eq!(evaluate_wo_age_profile(&clean).outcome, Outcome::Meets);

        let aged = AgeProfile {
            over_threshold: 2,
            ..clean
        };
        let e = evaluate_wo_age_profile(&aged);
        assert_eq!(e.value, Some(2.0));
        assert_eq!(e.outcome, Outcome::Fails);
        assert_eq!(
            e.text.as_deref(),
            Some("2 WOs over 60 days old (avg age: 12.0 days)")
        );
    }
}
