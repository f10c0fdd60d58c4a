use serde::Serialize;

/// Tri-state pass/fail classification of a KPI result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Meets,
    Fails,
    /// Zero denominator, or the KPI has no numeric target.
    Indeterminate,
}

impl Outcome {
    pub fn from_check(passed: bool) -> Self {
        if passed {
            Outcome::Meets
        } else {
            Outcome::Fails
        }
    }

    /// Column representation: 1, 0 or NULL.
    pub fn to_db(self) -> Option<bool> {
        match self {
            Outcome::Meets => Some(true),
            Outcome::Fails => Some(false),
            Outcome::Indeterminate => None,
        }
    }

    pub fn from_db(value: Option<bool>) -> Self {
        match value {
            Some(true) => Outcome::Meets,
            Some(false) => Outcome::Fails,
            None => Outcome::Indeterminate,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Meets => "meets",
            Outcome::Fails => "fails",
            Outcome::Indeterminate => "indeterminate",
        };
        f.write_str(s)
    }
}

/// A manual input value: numeric or free text, never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ManualValue {
    Number(f64),
    Text(String),
}

impl ManualValue {
    /// Numeric reading of the value. Text that parses as a finite number
    /// counts; `NaN` and infinities do not.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ManualValue::Number(n) => Some(*n),
            ManualValue::Text(t) => t.trim().parse().ok().filter(|n: &f64| n.is_finite()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ManualValue::Number(_) => None,
            ManualValue::Text(t) => Some(t),
        }
    }

    /// Split into the `(data_value, data_text)` column pair.
    pub fn to_columns(&self) -> (Option<f64>, Option<&str>) {
        match self {
            ManualValue::Number(n) => (Some(*n), None),
            ManualValue::Text(t) => (None, Some(t.as_str())),
        }
    }

    /// Rebuild from the column pair. A row with neither column set reads
    /// as zero.
    pub fn from_columns(value: Option<f64>, text: Option<String>) -> Self {
        match (value, text) {
            (Some(n), _) => ManualValue::Number(n),
            (None, Some(t)) => ManualValue::Text(t),
            (None, None) => ManualValue::Number(0.0),
        }
    }
}

impl std::fmt::Display for ManualValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManualValue::Number(n) => write!(f, "{n}"),
            ManualValue::Text(t) => f.write_str(t),
        }
    }
}

/// One stored manual input, unique per (KPI, period, field).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManualDataPoint {
    pub kpi_name: String,
    pub measurement_period: String,
    pub data_field: String,
    pub value: ManualValue,
    pub notes: Option<String>,
    pub entered_by: Option<String>,
    pub entered_date: String,
}

/// The latest calculation of a KPI for one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiResult {
    pub kpi_name: String,
    pub measurement_period: String,
    pub calculated_value: Option<f64>,
    pub calculated_text: Option<String>,
    pub target_value: Option<f64>,
    pub meets_criteria: Outcome,
    pub calculated_by: Option<String>,
    pub notes: Option<String>,
    /// Set by the store; `None` on a result that has not been persisted.
    pub calculation_date: Option<String>,
}

/// A formula's output before it is stamped with KPI name, period and user.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: Option<f64>,
    pub text: Option<String>,
    pub target: Option<f64>,
    pub outcome: Outcome,
    pub notes: Option<String>,
}

impl Evaluation {
    pub fn into_result(
        self,
        kpi_name: &str,
        measurement_period: &str,
        calculated_by: Option<&str>,
    ) -> KpiResult {
        KpiResult {
            kpi_name: kpi_name.to_string(),
            measurement_period: measurement_period.to_string(),
            calculated_value: self.value,
            calculated_text: self.text,
            target_value: self.target,
            meets_criteria: self.outcome,
            calculated_by: calculated_by.map(str::to_string),
            notes: self.notes,
            calculation_date: None,
        }
    }
}

/// A stored result joined with its catalog metadata, as listed for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportedResult {
    #[serde(flatten)]
    pub result: KpiResult,
    pub function_code: String,
    pub description: String,
    pub acceptance_criteria: String,
    pub frequency: String,
}

/// Pass/fail counts for one period's dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub measurement_period: String,
    pub total: u64,
    pub passing: u64,
    pub failing: u64,
    pub indeterminate: u64,
    /// Active catalog entries with no result yet for the period.
    pub pending: u64,
    pub catalog_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_db_mapping() {
        for outcome in [Outcome::Meets, Outcome::Fails, Outcome::Indeterminate] {
            assert_eq!(Outcome::from_db(outcome.to_db()), outcome);
        }
        assert_eq!(Outcome::from_check(true), Outcome::Meets);
        assert_eq!(Outcome::from_check(false), Outcome::Fails);
    }

    #[test]
    fn test_manual_value_columns() {
        let n = ManualValue::Number(12.5);
        assert_eq!(n.to_columns(), (Some(12.5), None));
        let t = ManualValue::Text("pump 3 seal".into());
        assert_eq!(t.to_columns(), (None, Some("pump 3 seal")));

        assert_eq!(ManualValue::from_columns(Some(4.0), None), ManualValue::Number(4.0));
        assert_eq!(
            ManualValue::from_columns(None, Some("x".into())),
            ManualValue::Text("x".into())
        );
        assert_eq!(ManualValue::from_columns(None, None), ManualValue::Number(0.0));
    }

    #[test]
    fn test_manual_value_as_number() {
        assert_eq!(ManualValue::Number(3.0).as_number(), Some(3.0));
        assert_eq!(ManualValue::Text(" 42 ".into()).as_number(), Some(42.0));
        assert_eq!(ManualValue::Text("n/a".into()).as_number(), None);
        assert_eq!(ManualValue::Number(3.0).as_text(), None);
    }

    #[test]
    fn test_manual_value_non_finite_text_is_not_a_number() {
        for raw in ["NaN", "inf", "-infinity", " Infinity "] {
            assert_eq!(ManualValue::Text(raw.into()).as_number(), None, "{raw}");
        }
        assert_eq!(ManualValue::Text("1e3".into()).as_number(), Some(1000.0));
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        let json = serde_json::to_string(&Outcome::Indeterminate).unwrap();
        assert_eq!(json, "\"indeterminate\"");
    }
}
