use serde::Serialize;

/// Preventive maintenance scheduled vs completed within a range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PmAdherenceCounts {
    pub scheduled: u64,
    pub completed: u64,
}

/// Work orders created within a range, split by current status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkOrderCounts {
    pub opened: u64,
    /// Status `Closed` or `Completed`.
    pub closed: u64,
    /// Status `Open`.
    pub still_open: u64,
}

/// Work orders raised within a range and how many of that cohort are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BacklogCounts {
    pub raised: u64,
    pub open: u64,
}

/// Age of every currently open work order, measured against a given day.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgeProfile {
    /// All open work orders, including ones whose creation date is unusable.
    pub total_open: u64,
    /// Open work orders with a parseable creation date.
    pub aged: u64,
    /// Open work orders with a missing or unparseable creation date.
    pub skipped: u64,
    pub over_threshold: u64,
    pub threshold_days: i64,
    /// Mean age over `aged`; 0 when nothing could be aged.
    pub average_age_days: f64,
    pub oldest_age_days: Option<i64>,
}

/// Which aggregation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    PmAdherence,
    WorkOrderStatus,
    Backlog,
    AgeProfile,
}

impl AggregateKind {
    pub const ALL: [AggregateKind; 4] = [
        AggregateKind::PmAdherence,
        AggregateKind::WorkOrderStatus,
        AggregateKind::Backlog,
        AggregateKind::AgeProfile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateKind::PmAdherence => "pm_adherence",
            AggregateKind::WorkOrderStatus => "wo_status",
            AggregateKind::Backlog => "backlog",
            AggregateKind::AgeProfile => "age_profile",
        }
    }
}

impl std::str::FromStr for AggregateKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        AggregateKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                crate::error::Error::InvalidInput(format!(
                    "unknown aggregate '{s}' (expected one of: pm_adherence, wo_status, backlog, age_profile)"
                ))
            })
    }
}

/// Output of [`crate::metrics::aggregate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Aggregate {
    PmAdherence(PmAdherenceCounts),
    WorkOrderStatus(WorkOrderCounts),
    Backlog(BacklogCounts),
    AgeProfile(AgeProfile),
}

/// Hours booked by one technician within a range.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TechnicianWorkload {
    pub technician: String,
    pub pm_count: u64,
    pub pm_hours: f64,
    pub cm_count: u64,
    pub cm_hours: f64,
}

impl TechnicianWorkload {
    pub fn total_hours(&self) -> f64 {
        self.pm_hours + self.cm_hours
    }
}

/// Efficiency of one technician against available hours.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicianEfficiency {
    #[serde(flatten)]
    pub workload: TechnicianWorkload,
    pub total_hours: f64,
    pub available_hours: f64,
    pub efficiency_pct: f64,
    pub vs_target_pct: f64,
}

/// Team-wide efficiency over a range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EfficiencySummary {
    pub days: i64,
    pub available_hours_per_technician: f64,
    pub total_available_hours: f64,
    pub total_pm_hours: f64,
    pub total_cm_hours: f64,
    pub total_worked_hours: f64,
    pub overall_efficiency_pct: f64,
    pub target_pct: f64,
    pub technicians: Vec<TechnicianEfficiency>,
}
