//! The KPI Evaluator: applies formulas to aggregates or manual inputs and
//! persists one result per (KPI, period).

pub mod auto;
pub mod manual;
pub mod types;

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::metrics;
use crate::period::MeasurementPeriod;
use crate::storage::repository;
use crate::storage::Database;
use auto::AutoKpi;
use manual::{FieldKind, ManualInputs};
use types::{DashboardSummary, Evaluation, KpiResult, ManualValue};

/// Upsert a result and return the stored row, calculation timestamp included.
async fn persist(db: &Database, result: KpiResult) -> Result<KpiResult> {
    let (kpi_name, period) = (result.kpi_name.clone(), result.measurement_period.clone());
    let stored = db
        .writer()
        .call(move |conn| {
            repository::upsert_kpi_result(conn, &result)?;
            repository::get_kpi_result(conn, &result.kpi_name, &result.measurement_period)
        })
        .await?;
    stored.ok_or_else(|| Error::NotFound(format!("result for {kpi_name} in {period}")))
}

/// Aggregate, evaluate and store one automatic KPI. The age profile is
/// measured against `today` whatever the period.
pub async fn evaluate_automatic(
    db: &Database,
    kpi: AutoKpi,
    period: &MeasurementPeriod,
    calculated_by: Option<&str>,
    today: NaiveDate,
) -> Result<KpiResult> {
    let (start, end) = period.date_range();
    let evaluation: Evaluation = match kpi {
        AutoKpi::PmAdherence => {
            auto::evaluate_pm_adherence(metrics::pm_adherence_counts(db, start, end).await?)
        }
        AutoKpi::WoOpenedVsClosed => {
            auto::evaluate_wo_opened_vs_closed(metrics::work_order_counts(db, start, end).await?)
        }
        AutoKpi::WoBacklog => {
            auto::evaluate_wo_backlog(metrics::backlog_counts(db, start, end).await?)
        }
        AutoKpi::WoAgeProfile => {
            auto::evaluate_wo_age_profile(&metrics::age_profile(db, today).await?)
        }
    };
    let result = persist(
        db,
        evaluation.into_result(kpi.kpi_name(), &period.to_key(), calculated_by),
    )
    .await?;
    log::info!(
        "{} {}: {} ({})",
        kpi.kpi_name(),
        result.measurement_period,
        result.calculated_text.as_deref().unwrap_or("-"),
        result.meets_criteria
    );
    Ok(result)
}

/// Evaluate every automatic KPI for the period token. Each KPI is attempted
/// independently; failures are logged and returned under its key.
pub async fn evaluate_all_automatic(
    db: &Database,
    period: &str,
    calculated_by: Option<&str>,
    today: NaiveDate,
) -> BTreeMap<&'static str, Result<KpiResult>> {
    let mut results = BTreeMap::new();
    for kpi in AutoKpi::ALL {
        let outcome = match MeasurementPeriod::parse(period) {
            Ok(p) => evaluate_automatic(db, kpi, &p, calculated_by, today).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &outcome {
            log::error!("Failed to calculate {}: {e}", kpi.key());
        }
        results.insert(kpi.key(), outcome);
    }
    results
}

/// Evaluate a manual KPI from its stored inputs. Nothing is written when
/// the period has no inputs.
pub async fn evaluate_manual(
    db: &Database,
    kpi_name: &str,
    period: &MeasurementPeriod,
    calculated_by: Option<&str>,
) -> Result<KpiResult> {
    let formula =
        manual::formula(kpi_name).ok_or_else(|| Error::UnknownKpi(kpi_name.to_string()))?;
    let key = period.to_key();

    let points = {
        let (name, key) = (kpi_name.to_string(), key.clone());
        db.reader()
            .call(move |conn| repository::get_manual_data(conn, &name, &key))
            .await?
    };
    if points.is_empty() {
        return Err(Error::NoInputData {
            kpi_name: kpi_name.to_string(),
            period: key,
        });
    }

    let evaluation = formula.evaluate(&ManualInputs::from_points(&points));
    let result = persist(db, evaluation.into_result(kpi_name, &key, calculated_by)).await?;
    log::info!(
        "{kpi_name} {key}: {} ({})",
        result.calculated_text.as_deref().unwrap_or("-"),
        result.meets_criteria
    );
    Ok(result)
}

/// Check a manual input against the KPI's field schema.
pub fn validate_manual_input(kpi_name: &str, field: &str, value: &ManualValue) -> Result<()> {
    let formula =
        manual::formula(kpi_name).ok_or_else(|| Error::UnknownKpi(kpi_name.to_string()))?;
    let spec = formula
        .fields
        .iter()
        .find(|f| f.field == field)
        .ok_or_else(|| Error::UnknownField {
            kpi_name: kpi_name.to_string(),
            field: field.to_string(),
        })?;
    match (spec.kind, value) {
        (FieldKind::Number, ManualValue::Number(n)) if n.is_finite() => Ok(()),
        (FieldKind::Number, ManualValue::Number(n)) => Err(Error::InvalidInput(format!(
            "{field} must be a finite number, got {n}"
        ))),
        (FieldKind::Text, ManualValue::Text(_)) => Ok(()),
        (FieldKind::Number, ManualValue::Text(_)) => {
            Err(Error::InvalidInput(format!("{field} expects a number")))
        }
        (FieldKind::Text, ManualValue::Number(_)) => {
            Err(Error::InvalidInput(format!("{field} expects text")))
        }
    }
}

/// Validate and store one manual data point, replacing any earlier value
/// for the same (KPI, period, field).
pub async fn save_manual_input(
    db: &Database,
    kpi_name: &str,
    period: &MeasurementPeriod,
    field: &str,
    value: ManualValue,
    entered_by: Option<&str>,
    notes: Option<&str>,
) -> Result<()> {
    validate_manual_input(kpi_name, field, &value)?;
    let (name, key, field) = (kpi_name.to_string(), period.to_key(), field.to_string());
    let (entered_by, notes) = (entered_by.map(str::to_string), notes.map(str::to_string));
    log::debug!("saving {name}/{field} for {key}: {value}");
    db.writer()
        .call(move |conn| {
            repository::upsert_manual_data(
                conn,
                &name,
                &key,
                &field,
                &value,
                notes.as_deref(),
                entered_by.as_deref(),
            )
        })
        .await?;
    Ok(())
}

/// Pass/fail tally for a period against the active catalog.
pub async fn dashboard_summary(
    db: &Database,
    period: &MeasurementPeriod,
) -> Result<DashboardSummary> {
    let key = period.to_key();
    let summary = db
        .reader()
        .call({
            let key = key.clone();
            move |conn| {
                let catalog_size = repository::count_active_definitions(conn)?;
                let (total, passing, failing, indeterminate) =
                    repository::count_results_by_outcome(conn, &key)?;
                Ok::<DashboardSummary, rusqlite::Error>(DashboardSummary {
                    measurement_period: key,
                    total,
                    passing,
                    failing,
                    indeterminate,
                    pending: catalog_size.saturating_sub(total),
                    catalog_size,
                })
            }
        })
        .await?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::kpi::types::Outcome;

    fn nov() -> MeasurementPeriod {
        MeasurementPeriod::new(2025, 11).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 30).unwrap()
    }

    async fn put(db: &Database, kpi: &str, field: &str, value: ManualValue) -> Result<()> {
        save_manual_input(db, kpi, &nov(), field, value, Some("bo"), None).await
    }

    async fn seed_records(db: &Database) {
        db.writer()
            .call(|conn| {
                for week in ["2025-11-03", "2025-11-10", "2025-11-17", "2025-11-24"] {
                    conn.execute(
                        "INSERT INTO weekly_pm_schedules (week_start_date) VALUES (?1)",
                        [week],
                    )?;
                }
                conn.execute(
                    "INSERT INTO weekly_pm_schedules (week_start_date) VALUES ('2025-10-27')",
                    [],
                )?;
                for day in ["2025-11-04", "2025-11-12", "2025-11-19"] {
                    conn.execute(
                        "INSERT INTO pm_completions (completion_date, labor_hours)
                         VALUES (?1, 1.5)",
                        [day],
                    )?;
                }
                for (status, created) in [
                    ("Open", "2025-11-02"),
                    ("Closed", "2025-11-05 08:30:00"),
                    ("Completed", "2025-11-20"),
                    ("Open", "2025-08-01"),
                ] {
                    conn.execute(
                        "INSERT INTO corrective_maintenance (status, created_date) VALUES (?1, ?2)",
                        [status, created],
                    )?;
                }
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_evaluate_pm_adherence_from_records() {
        let db = Database::open_memory().await.unwrap();
        seed_records(&db).await;

        let r = evaluate_automatic(&db, AutoKpi::PmAdherence, &nov(), Some("ana"), today())
            .await
            .unwrap();
        assert_eq!(r.kpi_name, catalog::PM_ADHERENCE);
        assert_eq!(r.measurement_period, "2025-11");
        assert_eq!(r.calculated_value, Some(75.0));
        assert_eq!(r.meets_criteria, Outcome::Fails);
        assert_eq!(r.calculated_text.as_deref(), Some("3/4 completed"));
        assert_eq!(r.calculated_by.as_deref(), Some("ana"));
        assert!(r.calculation_date.is_some());
    }

    #[tokio::test]
    async fn test_evaluate_work_order_kpis() {
        let db = Database::open_memory().await.unwrap();
        seed_records(&db).await;

        let status = evaluate_automatic(&db, AutoKpi::WoOpenedVsClosed, &nov(), None, today())
            .await
            .unwrap();
        assert_eq!(status.calculated_value, Some(1.0));
        assert_eq!(status.meets_criteria, Outcome::Meets);

        let backlog = evaluate_automatic(&db, AutoKpi::WoBacklog, &nov(), None, today())
            .await
            .unwrap();
        // 1 of 3 raised in November is still open.
        assert_eq!(backlog.calculated_value, Some(1.0));
        assert_eq!(backlog.meets_criteria, Outcome::Fails);

        let age = evaluate_automatic(&db, AutoKpi::WoAgeProfile, &nov(), None, today())
            .await
            .unwrap();
        // The August work order is 121 days old.
        assert_eq!(age.calculated_value, Some(1.0));
        assert_eq!(age.meets_criteria, Outcome::Fails);
    }

    #[tokio::test]
    async fn test_reevaluation_keeps_one_row() {
        let db = Database::open_memory().await.unwrap();
        seed_records(&db).await;

        evaluate_automatic(&db, AutoKpi::PmAdherence, &nov(), None, today())
            .await
            .unwrap();
        db.writer()
            .call(|conn| {
                conn.execute(
                    "INSERT INTO pm_completions (completion_date) VALUES ('2025-11-26')",
                    [],
                )
            })
            .await
            .unwrap();
        let second = evaluate_automatic(&db, AutoKpi::PmAdherence, &nov(), None, today())
            .await
            .unwrap();
        assert_eq!(second.calculated_value, Some(100.0));
        assert_eq!(second.meets_criteria, Outcome::Meets);

        let rows: i64 = db
            .reader()
            .call(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM kpi_results WHERE kpi_name = ?1",
                    [catalog::PM_ADHERENCE],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_evaluate_all_isolates_failures() {
        let db = Database::open_memory().await.unwrap();
        seed_records(&db).await;
        db.writer()
            .call(|conn| conn.execute_batch("DROP TABLE weekly_pm_schedules"))
            .await
            .unwrap();

        let results = evaluate_all_automatic(&db, "2025-11", None, today()).await;
        assert_eq!(results.len(), 4);
        assert!(matches!(
            results["pm_adherence"],
            Err(Error::DataAccess(_))
        ));
        for key in ["wo_opened_closed", "wo_backlog", "wo_age_profile"] {
            assert!(results[key].is_ok(), "{key} should succeed");
        }
    }

    #[tokio::test]
    async fn test_evaluate_all_malformed_period() {
        let db = Database::open_memory().await.unwrap();

        let results = evaluate_all_automatic(&db, "2025-13", None, today()).await;
        assert_eq!(results.len(), 4);
        assert!(results
            .values()
            .all(|r| matches!(r, Err(Error::MalformedPeriod(_)))));

        let summary = dashboard_summary(&db, &nov()).await.unwrap();
        assert_eq!(summary.total, 0);
    }

    #[tokio::test]
    async fn test_evaluate_manual_without_inputs() {
        let db = Database::open_memory().await.unwrap();

        let err = evaluate_manual(&db, catalog::FR1, &nov(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoInputData { .. }));

        let stored = db
            .reader()
            .call(|conn| repository::get_kpi_result(conn, catalog::FR1, "2025-11"))
            .await
            .unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_evaluate_manual_unknown_kpi() {
        let db = Database::open_memory().await.unwrap();
        let err = evaluate_manual(&db, catalog::WO_BACKLOG, &nov(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownKpi(_)));
    }

    #[tokio::test]
    async fn test_manual_input_then_evaluate() {
        let db = Database::open_memory().await.unwrap();
        let p = nov();

        put(&db, catalog::MRT, "total_response_time_minutes", ManualValue::Number(240.0))
            .await
            .unwrap();
        put(&db, catalog::MRT, "wo_count", ManualValue::Number(20.0))
            .await
            .unwrap();

        let r = evaluate_manual(&db, catalog::MRT, &p, Some("bo")).await.unwrap();
        assert_eq!(r.calculated_value, Some(12.0));
        assert_eq!(r.meets_criteria, Outcome::Meets);
        assert_eq!(r.target_value, Some(15.0));

        // A corrected input replaces the earlier value.
        put(&db, catalog::MRT, "wo_count", ManualValue::Number(10.0))
            .await
            .unwrap();
        let r = evaluate_manual(&db, catalog::MRT, &p, Some("bo")).await.unwrap();
        assert_eq!(r.calculated_value, Some(24.0));
        assert_eq!(r.meets_criteria, Outcome::Fails);
    }

    #[tokio::test]
    async fn test_manual_zero_denominator_is_stored_indeterminate() {
        let db = Database::open_memory().await.unwrap();
        put(&db, catalog::NC_CLOSED, "nc_total", ManualValue::Number(0.0))
            .await
            .unwrap();

        let r = evaluate_manual(&db, catalog::NC_CLOSED, &nov(), None).await.unwrap();
        assert_eq!(r.calculated_value, None);
        assert_eq!(r.meets_criteria, Outcome::Indeterminate);
    }

    #[tokio::test]
    async fn test_legacy_non_finite_text_is_indeterminate() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                conn.execute_batch(
                    "INSERT INTO kpi_manual_data (kpi_name, measurement_period, data_field, data_text)
                     VALUES ('Non Conformances closed', '2025-11', 'nc_total', 'NaN'),
                            ('Non Conformances closed', '2025-11', 'nc_closed_on_time', '5');",
                )
            })
            .await
            .unwrap();

        let r = evaluate_manual(&db, catalog::NC_CLOSED, &nov(), None).await.unwrap();
        assert_eq!(r.calculated_value, None);
        assert_eq!(r.meets_criteria, Outcome::Indeterminate);
        assert_eq!(r.calculated_text.as_deref(), Some("no data: nc_total is 0"));
    }

    #[tokio::test]
    async fn test_save_manual_input_validation() {
        let db = Database::open_memory().await.unwrap();

        let err = put(&db, "Coffee consumption", "cups", ManualValue::Number(1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownKpi(_)));

        let err = put(&db, catalog::FR1, "cups", ManualValue::Number(1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownField { .. }));

        let err = put(&db, catalog::FR1, "hours_worked", ManualValue::Text("lots".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = put(&db, catalog::TOP_BREAKDOWN, "breakdown_analysis", ManualValue::Number(3.0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = put(&db, catalog::FR1, "hours_worked", ManualValue::Number(f64::NAN))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let stored = db
            .reader()
            .call(|conn| repository::get_manual_data(conn, catalog::FR1, "2025-11"))
            .await
            .unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_summary_counts() {
        let db = Database::open_memory().await.unwrap();
        seed_records(&db).await;

        for kpi in AutoKpi::ALL {
            evaluate_automatic(&db, kpi, &nov(), None, today()).await.unwrap();
        }
        put(&db, catalog::NEAR_MISS, "near_miss_count", ManualValue::Number(2.0))
            .await
            .unwrap();
        evaluate_manual(&db, catalog::NEAR_MISS, &nov(), None).await.unwrap();

        let s = dashboard_summary(&db, &nov()).await.unwrap();
        assert_eq!(s.catalog_size, catalog::SEED.len() as u64);
        assert_eq!(s.total, 5);
        // PM adherence, backlog and age profile fail; opened vs closed meets.
        assert_eq!(s.passing, 1);
        assert_eq!(s.failing, 3);
        assert_eq!(s.indeterminate, 1);
        assert_eq!(s.pending, s.catalog_size - 5);
    }
}
