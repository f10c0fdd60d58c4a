//! Table-driven formulas for the KPIs computed from manual data points.
//!
//! Each entry in [`FORMULAS`] names the fields an operator fills in, how they
//! reduce to a value, and the acceptance check. Adding a KPI is adding a row.

use std::collections::BTreeMap;

use serde::Serialize;

use super::types::{Evaluation, ManualDataPoint, ManualValue, Outcome};
use crate::catalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Number,
    Text,
}

/// One input an operator supplies for a manual KPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub field: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn number(field: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec {
        field,
        label,
        kind: FieldKind::Number,
    }
}

const fn text(field: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec {
        field,
        label,
        kind: FieldKind::Text,
    }
}

/// How a formula's fields reduce to a value. `label` is the wording used in
/// the result's calculated text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reducer {
    /// numerator / denominator × 100, shown as `n/d label`.
    Percentage {
        numerator: &'static str,
        denominator: &'static str,
        label: &'static str,
    },
    /// numerator / denominator, shown as `v label`.
    Average {
        numerator: &'static str,
        denominator: &'static str,
        label: &'static str,
    },
    /// numerator × `per` / denominator, shown as `n unit per d base`.
    Rate {
        numerator: &'static str,
        denominator: &'static str,
        per: f64,
        unit: &'static str,
        base: &'static str,
    },
    /// The field's value as a count.
    Count {
        field: &'static str,
        label: &'static str,
    },
    /// The field's value as a percentage score.
    Score {
        field: &'static str,
        label: &'static str,
    },
    /// Free text carried through with no numeric value.
    Narrative { field: &'static str },
}

/// Acceptance check applied to a computed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Criterion {
    AtLeast(f64),
    AtMost(f64),
    Above(f64),
    Equals(f64),
    /// No numeric target; the outcome is always indeterminate.
    Informational,
}

impl Criterion {
    pub fn check(&self, value: f64) -> Outcome {
        match *self {
            Criterion::AtLeast(t) => Outcome::from_check(value >= t),
            Criterion::AtMost(t) => Outcome::from_check(value <= t),
            Criterion::Above(t) => Outcome::from_check(value > t),
            Criterion::Equals(t) => Outcome::from_check(value == t),
            Criterion::Informational => Outcome::Indeterminate,
        }
    }

    pub fn target(&self) -> Option<f64> {
        match *self {
            Criterion::AtLeast(t)
            | Criterion::AtMost(t)
            | Criterion::Above(t)
            | Criterion::Equals(t) => Some(t),
            Criterion::Informational => None,
        }
    }
}

/// A manual KPI: its input schema, reducer and acceptance check.
#[derive(Debug, Clone, Copy)]
pub struct ManualFormula {
    pub kpi_name: &'static str,
    pub fields: &'static [FieldSpec],
    pub reducer: Reducer,
    pub criterion: Criterion,
}

pub const FORMULAS: &[ManualFormula] = &[
    ManualFormula {
        kpi_name: catalog::FR1,
        fields: &[
            number("accident_count", "Number of Accidents (sick leave > 24h)"),
            number("hours_worked", "Number of Hours Worked"),
        ],
        reducer: Reducer::Rate {
            numerator: "accident_count",
            denominator: "hours_worked",
            per: 1_000_000.0,
            unit: "accidents",
            base: "hours worked",
        },
        criterion: Criterion::Equals(0.0),
    },
    ManualFormula {
        kpi_name: catalog::NEAR_MISS,
        fields: &[number("near_miss_count", "Number of Near Miss Reports")],
        reducer: Reducer::Count {
            field: "near_miss_count",
            label: "near miss reports",
        },
        criterion: Criterion::Informational,
    },
    ManualFormula {
        kpi_name: catalog::TTR_ADHERENCE,
        fields: &[
            number("p1_within_target", "P1 Assets Fixed Within 2 Hours"),
            number("p1_total", "Total P1 Asset Failures"),
            number("p2_within_target", "P2 Assets Fixed Within 4 Hours"),
            number("p2_total", "Total P2 Asset Failures"),
        ],
        reducer: Reducer::Percentage {
            numerator: "p1_within_target",
            denominator: "p1_total",
            label: "P1 assets within target",
        },
        criterion: Criterion::AtLeast(95.0),
    },
    ManualFormula {
        kpi_name: catalog::MTBF,
        fields: &[
            number("p1_operating_hours", "P1 Assets Total Operating Hours"),
            number("p1_failure_count", "P1 Assets Failure Count"),
            number("p2_operating_hours", "P2 Assets Total Operating Hours"),
            number("p2_failure_count", "P2 Assets Failure Count"),
        ],
        reducer: Reducer::Average {
            numerator: "p1_operating_hours",
            denominator: "p1_failure_count",
            label: "hours between failures (P1 assets)",
        },
        criterion: Criterion::Above(80.0),
    },
    ManualFormula {
        kpi_name: catalog::TECHNICAL_AVAILABILITY,
        fields: &[
            number("p1_assets_meeting_target", "P1 Assets Meeting >95% Availability"),
            number("p1_total_assets", "Total P1 Assets"),
        ],
        reducer: Reducer::Percentage {
            numerator: "p1_assets_meeting_target",
            denominator: "p1_total_assets",
            label: "P1 assets meeting >95% availability",
        },
        criterion: Criterion::AtLeast(95.0),
    },
    ManualFormula {
        kpi_name: catalog::MRT,
        fields: &[
            number("total_response_time_minutes", "Total Response Time (minutes)"),
            number("wo_count", "Number of Work Orders"),
        ],
        reducer: Reducer::Average {
            numerator: "total_response_time_minutes",
            denominator: "wo_count",
            label: "minutes average response time",
        },
        criterion: Criterion::AtMost(15.0),
    },
    ManualFormula {
        kpi_name: catalog::NC_RAISED,
        fields: &[number("nc_count", "Number of Non-Conformances Raised")],
        reducer: Reducer::Count {
            field: "nc_count",
            label: "non-conformances raised",
        },
        criterion: Criterion::Equals(0.0),
    },
    ManualFormula {
        kpi_name: catalog::NC_CLOSED,
        fields: &[
            number("nc_closed_on_time", "Non-Conformances Closed On Time"),
            number("nc_total", "Total Non-Conformances Due"),
        ],
        reducer: Reducer::Percentage {
            numerator: "nc_closed_on_time",
            denominator: "nc_total",
            label: "closed on time",
        },
        criterion: Criterion::Equals(100.0),
    },
    ManualFormula {
        kpi_name: catalog::MEAN_TIME_TO_QUOTE,
        fields: &[
            number("total_quote_time_hours", "Total Quote Delivery Time (hours)"),
            number("quote_count", "Number of Quotes Requested"),
        ],
        reducer: Reducer::Average {
            numerator: "total_quote_time_hours",
            denominator: "quote_count",
            label: "hours average delivery time",
        },
        criterion: Criterion::AtMost(48.0),
    },
    ManualFormula {
        kpi_name: catalog::PURCHASER_SATISFACTION,
        fields: &[number("satisfaction_score", "Satisfaction Score (0-100)")],
        reducer: Reducer::Score {
            field: "satisfaction_score",
            label: "satisfaction score",
        },
        criterion: Criterion::AtLeast(90.0),
    },
    ManualFormula {
        kpi_name: catalog::PURCHASER_CONFIRMATION,
        fields: &[number("confirmation_score", "Confirmation Score (%)")],
        reducer: Reducer::Score {
            field: "confirmation_score",
            label: "confirmation score",
        },
        criterion: Criterion::AtLeast(90.0),
    },
    ManualFormula {
        kpi_name: catalog::TOP_BREAKDOWN,
        fields: &[text("breakdown_analysis", "Breakdown Analysis (Pareto)")],
        reducer: Reducer::Narrative {
            field: "breakdown_analysis",
        },
        criterion: Criterion::Informational,
    },
];

/// Look up the manual formula for a KPI name.
pub fn formula(kpi_name: &str) -> Option<&'static ManualFormula> {
    FORMULAS.iter().find(|f| f.kpi_name == kpi_name)
}

/// Names of the KPIs that need manual data.
pub fn manual_kpis() -> Vec<&'static str> {
    FORMULAS.iter().map(|f| f.kpi_name).collect()
}

/// Input schema for a manual KPI; empty for names without a formula.
pub fn required_fields(kpi_name: &str) -> &'static [FieldSpec] {
    formula(kpi_name).map(|f| f.fields).unwrap_or(&[])
}

/// The latest stored value for each field of one (KPI, period).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualInputs {
    values: BTreeMap<String, ManualValue>,
}

impl ManualInputs {
    pub fn from_points(points: &[ManualDataPoint]) -> Self {
        let values = points
            .iter()
            .map(|p| (p.data_field.clone(), p.value.clone()))
            .collect();
        Self { values }
    }

    pub fn insert(&mut self, field: &str, value: ManualValue) {
        self.values.insert(field.to_string(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Numeric value of a field. Absent or non-numeric fields read as 0.
    pub fn number(&self, field: &str) -> f64 {
        self.values
            .get(field)
            .and_then(ManualValue::as_number)
            .unwrap_or(0.0)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(ManualValue::as_text)
    }

    /// `field=value` pairs in field order, for result notes.
    pub fn summary(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Render a number without a trailing `.0` when it is whole.
fn fmt_num(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

/// Whole-number rendering with comma thousands separators, e.g. `500,000`.
fn group_thousands(v: f64) -> String {
    let digits = format!("{:.0}", v.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if v < 0.0 {
        out.insert(0, '-');
    }
    out
}

impl ManualFormula {
    /// Apply the formula to the inputs. A zero denominator produces no value
    /// and an indeterminate outcome rather than an error.
    pub fn evaluate(&self, inputs: &ManualInputs) -> Evaluation {
        let notes = Some(format!("Inputs: {}", inputs.summary()));
        let target = self.criterion.target();

        // Scales before dividing so whole-number inputs stay exact.
        let ratio = |numerator: &str, denominator: &str, scale: f64| {
            let n = inputs.number(numerator);
            let d = inputs.number(denominator);
            (n, d, if d != 0.0 { Some(n * scale / d) } else { None })
        };
        let no_data = |denominator: &str| Evaluation {
            value: None,
            text: Some(format!("no data: {denominator} is 0")),
            target,
            outcome: Outcome::Indeterminate,
            notes: notes.clone(),
        };

        let (value, text) = match self.reducer {
            Reducer::Percentage {
                numerator,
                denominator,
                label,
            } => match ratio(numerator, denominator, 100.0) {
                (n, d, Some(r)) => (r, format!("{}/{} {label}", fmt_num(n), fmt_num(d))),
                (_, _, None) => return no_data(denominator),
            },
            Reducer::Average {
                numerator,
                denominator,
                label,
            } => match ratio(numerator, denominator, 1.0) {
                (_, _, Some(r)) => (r, format!("{r:.1} {label}")),
                (_, _, None) => return no_data(denominator),
            },
            Reducer::Rate {
                numerator,
                denominator,
                per,
                unit,
                base,
            } => match ratio(numerator, denominator, per) {
                (n, d, Some(r)) => (
                    r,
                    format!("{} {unit} per {} {base}", fmt_num(n), group_thousands(d)),
                ),
                (_, _, None) => return no_data(denominator),
            },
            Reducer::Count { field, label } => {
                let v = inputs.number(field);
                (v, format!("{} {label}", fmt_num(v)))
            }
            Reducer::Score { field, label } => {
                let v = inputs.number(field);
                (v, format!("{}% {label}", fmt_num(v)))
            }
            Reducer::Narrative { field } => {
                return Evaluation {
                    value: None,
                    text: Some(inputs.text(field).unwrap_or("N/A").to_string()),
                    target,
                    outcome: Outcome::Indeterminate,
                    notes,
                };
            }
        };

        Evaluation {
            value: Some(value),
            text: Some(text),
            target,
            outcome: self.criterion.check(value),
            notes,
        }
    }
}
