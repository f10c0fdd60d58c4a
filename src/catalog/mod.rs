//! The KPI Definition catalog.
//!
//! Definitions are immutable to the computation engine. The seed list below
//! is written to `kpi_definitions` on database open with `INSERT OR IGNORE`,
//! so operators may edit descriptions or deactivate a KPI in the table
//! without the next start-up reverting it.

use serde::Serialize;

/// Where a KPI's inputs come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiSource {
    /// Derived from maintenance records by the aggregator.
    Auto,
    /// Computed from operator-entered manual data points.
    Manual,
}

impl KpiSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KpiSource::Auto => "auto",
            KpiSource::Manual => "manual",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "auto" => KpiSource::Auto,
            _ => KpiSource::Manual,
        }
    }
}

/// A catalog entry as stored in `kpi_definitions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiDefinition {
    pub kpi_name: String,
    pub function_code: String,
    pub description: String,
    pub formula: String,
    pub acceptance_criteria: String,
    pub frequency: String,
    pub source: KpiSource,
    pub is_active: bool,
}

/// Static seed row; converted to [`KpiDefinition`] when inserted.
#[derive(Debug, Clone, Copy)]
pub struct SeedDefinition {
    pub kpi_name: &'static str,
    pub function_code: &'static str,
    pub description: &'static str,
    pub formula: &'static str,
    pub acceptance_criteria: &'static str,
    pub source: KpiSource,
}

pub const MONTHLY: &str = "Monthly";

pub const PM_ADHERENCE: &str = "Preventive Maintenance Adherence";
pub const WO_OPENED_VS_CLOSED: &str = "WO opened vs WO closed";
pub const WO_BACKLOG: &str = "WO Backlog";
pub const WO_AGE_PROFILE: &str = "WO age profile";

pub const FR1: &str = "FR1";
pub const NEAR_MISS: &str = "Near Miss";
pub const TTR_ADHERENCE: &str = "TTR (Time to Repair) Adherence";
pub const MTBF: &str = "MTBF Mean Time Between Failure";
pub const TECHNICAL_AVAILABILITY: &str = "Technical Availability Adherence";
pub const MRT: &str = "MRT (Mean Response Time)";
pub const TOP_BREAKDOWN: &str = "Top Breakdown";
pub const PURCHASER_CONFIRMATION: &str = "Purchaser Monthly process Confirmation";
pub const PURCHASER_SATISFACTION: &str = "Purchaser satisfaction";
pub const NC_RAISED: &str = "Non Conformances raised";
pub const NC_CLOSED: &str = "Non Conformances closed";
pub const MEAN_TIME_TO_QUOTE: &str = "Mean Time to Deliver a Quote";

pub const SEED: &[SeedDefinition] = &[
    SeedDefinition {
        kpi_name: FR1,
        function_code: "HSE",
        description: "Accident frequency rate (accidents with sick leave > 24h)",
        formula: "accidents / hours worked x 1,000,000",
        acceptance_criteria: "0",
        source: KpiSource::Manual,
    },
    SeedDefinition {
        kpi_name: NEAR_MISS,
        function_code: "HSE",
        description: "Near miss reports raised in the month",
        formula: "count of near miss reports",
        acceptance_criteria: "Informational",
        source: KpiSource::Manual,
    },
    SeedDefinition {
        kpi_name: PM_ADHERENCE,
        function_code: "MNT",
        description: "Share of scheduled preventive maintenance completed",
        formula: "(WO completed / WO scheduled) x 100%",
        acceptance_criteria: ">= 95%",
        source: KpiSource::Auto,
    },
    SeedDefinition {
        kpi_name: WO_OPENED_VS_CLOSED,
        function_code: "MNT",
        description: "Work orders raised in the month that are still open",
        formula: "WO open vs WO closed",
        acceptance_criteria: "No more than 40 open WO",
        source: KpiSource::Auto,
    },
    SeedDefinition {
        kpi_name: WO_BACKLOG,
        function_code: "MNT",
        description: "Work orders raised in the month that remain open",
        formula: "open WO / WO raised x 100%",
        acceptance_criteria: "< 10% of the WO raised in the month",
        source: KpiSource::Auto,
    },
    SeedDefinition {
        kpi_name: WO_AGE_PROFILE,
        function_code: "MNT",
        description: "Open work orders older than 60 days",
        formula: "count of open WO with age > 60 days",
        acceptance_criteria: "0 WO over 60 days",
        source: KpiSource::Auto,
    },
    SeedDefinition {
        kpi_name: TTR_ADHERENCE,
        function_code: "MNT",
        description: "P1 assets repaired within the 2 hour target",
        formula: "P1 repaired within target / P1 failures x 100%",
        acceptance_criteria: ">= 95%",
        source: KpiSource::Manual,
    },
    SeedDefinition {
        kpi_name: MTBF,
        function_code: "MNT",
        description: "Mean operating hours between failures of P1 assets",
        formula: "P1 operating hours / P1 failure count",
        acceptance_criteria: "> 80 hours",
        source: KpiSource::Manual,
    },
    SeedDefinition {
        kpi_name: TECHNICAL_AVAILABILITY,
        function_code: "MNT",
        description: "P1 assets meeting the 95% availability target",
        formula: "P1 assets meeting target / P1 assets x 100%",
        acceptance_criteria: ">= 95%",
        source: KpiSource::Manual,
    },
    SeedDefinition {
        kpi_name: MRT,
        function_code: "MNT",
        description: "Mean response time to work orders",
        formula: "total response minutes / WO count",
        acceptance_criteria: "<= 15 minutes",
        source: KpiSource::Manual,
    },
    SeedDefinition {
        kpi_name: TOP_BREAKDOWN,
        function_code: "MNT",
        description: "Pareto analysis of the month's top breakdowns",
        formula: "free text",
        acceptance_criteria: "n/a",
        source: KpiSource::Manual,
    },
    SeedDefinition {
        kpi_name: PURCHASER_CONFIRMATION,
        function_code: "PUR",
        description: "Purchaser monthly process confirmation score",
        formula: "confirmation score",
        acceptance_criteria: ">= 90%",
        source: KpiSource::Manual,
    },
    SeedDefinition {
        kpi_name: PURCHASER_SATISFACTION,
        function_code: "PUR",
        description: "Purchaser satisfaction survey score",
        formula: "satisfaction score",
        acceptance_criteria: ">= 90%",
        source: KpiSource::Manual,
    },
    SeedDefinition {
        kpi_name: MEAN_TIME_TO_QUOTE,
        function_code: "PUR",
        description: "Mean time to deliver a quote",
        formula: "total quote hours / quote count",
        acceptance_criteria: "<= 48 hours",
        source: KpiSource::Manual,
    },
    SeedDefinition {
        kpi_name: NC_RAISED,
        function_code: "QUA",
        description: "Non-conformances raised against maintenance",
        formula: "count of non-conformances",
        acceptance_criteria: "0",
        source: KpiSource::Manual,
    },
    SeedDefinition {
        kpi_name: NC_CLOSED,
        function_code: "QUA",
        description: "Non-conformances closed by their due date",
        formula: "closed on time / due x 100%",
        acceptance_criteria: "100%",
        source: KpiSource::Manual,
    },
];

impl From<&SeedDefinition> for KpiDefinition {
    fn from(seed: &SeedDefinition) -> Self {
        KpiDefinition {
            kpi_name: seed.kpi_name.to_string(),
            function_code: seed.function_code.to_string(),
            description: seed.description.to_string(),
            formula: seed.formula.to_string(),
            acceptance_criteria: seed.acceptance_criteria.to_string(),
            frequency: MONTHLY.to_string(),
            source: seed.source,
            is_active: true,
        }
    }
}

/// Look up a seed entry by KPI name.
pub fn seed_definition(kpi_name: &str) -> Option<&'static SeedDefinition> {
    SEED.iter().find(|d| d.kpi_name == kpi_name)
}
