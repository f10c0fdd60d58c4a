pub mod catalog;
pub mod date_util;
pub mod error;
pub mod kpi;
pub mod metrics;
pub mod period;
pub mod storage;

use std::collections::BTreeMap;

use chrono::NaiveDate;

pub use catalog::{KpiDefinition, KpiSource};
pub use error::{Error, Result};
pub use kpi::auto::AutoKpi;
pub use kpi::manual::{FieldKind, FieldSpec};
pub use kpi::types::{
    DashboardSummary, KpiResult, ManualDataPoint, ManualValue, Outcome, ReportedResult,
};
pub use metrics::{Aggregate, AggregateKind, EfficiencySummary, TechnicianWorkload};
pub use period::{resolve_period, MeasurementPeriod};
pub use storage::Database;

use storage::repository;

/// Config key holding the default user recorded on results and inputs.
pub const CONFIG_USER_NAME: &str = "user_name";
/// Config key overriding the weekly hours each technician is available.
pub const CONFIG_WEEKLY_HOURS: &str = "weekly_hours_per_technician";

/// Main entry point for KPI computation and collection.
pub struct KpiEngine {
    db: Database,
    user: Option<String>,
    today: Option<NaiveDate>,
}

impl KpiEngine {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            user: None,
            today: None,
        }
    }

    /// Record `user` as calculated_by / entered_by unless a call names one.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Fix the reference day for work order ages instead of the local date.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    /// The configured user, falling back to the `user_name` config key.
    async fn user(&self) -> Result<Option<String>> {
        if self.user.is_some() {
            return Ok(self.user.clone());
        }
        self.config_get(CONFIG_USER_NAME).await
    }

    /// Resolve a `YYYY-MM` token to its inclusive (start, end) dates.
    pub fn resolve_period(&self, token: &str) -> Result<(NaiveDate, NaiveDate)> {
        resolve_period(token)
    }

    pub async fn aggregate(
        &self,
        kind: AggregateKind,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Aggregate> {
        metrics::aggregate(&self.db, kind, start, end, self.today()).await
    }

    /// Evaluate one automatic KPI, by catalog name or short key.
    pub async fn evaluate_automatic(&self, name_or_key: &str, period: &str) -> Result<KpiResult> {
        let kpi = AutoKpi::lookup(name_or_key)
            .ok_or_else(|| Error::UnknownKpi(name_or_key.to_string()))?;
        let period = MeasurementPeriod::parse(period)?;
        let user = self.user().await?;
        kpi::evaluate_automatic(&self.db, kpi, &period, user.as_deref(), self.today()).await
    }

    pub async fn evaluate_manual(&self, kpi_name: &str, period: &str) -> Result<KpiResult> {
        let period = MeasurementPeriod::parse(period)?;
        let user = self.user().await?;
        kpi::evaluate_manual(&self.db, kpi_name, &period, user.as_deref()).await
    }

    /// Evaluate the four automatic KPIs. A failure in one is reported under
    /// its key and does not stop the others.
    pub async fn evaluate_all_automatic(
        &self,
        period: &str,
    ) -> BTreeMap<&'static str, Result<KpiResult>> {
        let user = match self.user().await {
            Ok(user) => user,
            Err(e) => {
                log::warn!("Could not read {CONFIG_USER_NAME}: {e}");
                None
            }
        };
        kpi::evaluate_all_automatic(&self.db, period, user.as_deref(), self.today()).await
    }

    /// Evaluate every manual KPI that has inputs for the period. KPIs with no
    /// inputs are skipped; other failures are reported under the KPI name.
    pub async fn evaluate_all_manual(
        &self,
        period: &str,
    ) -> BTreeMap<&'static str, Result<KpiResult>> {
        let mut results = BTreeMap::new();
        for kpi_name in kpi::manual::manual_kpis() {
            match self.evaluate_manual(kpi_name, period).await {
                Err(Error::NoInputData { .. }) => {
                    log::debug!("No manual data for {kpi_name} in {period}, skipping");
                }
                Err(e) => {
                    log::error!("Failed to calculate {kpi_name}: {e}");
                    results.insert(kpi_name, Err(e));
                }
                Ok(result) => {
                    results.insert(kpi_name, Ok(result));
                }
            }
        }
        results
    }

    pub async fn save_manual_input(
        &self,
        kpi_name: &str,
        period: &str,
        field: &str,
        value: ManualValue,
        entered_by: Option<&str>,
        notes: Option<&str>,
    ) -> Result<()> {
        let period = MeasurementPeriod::parse(period)?;
        let entered_by = match entered_by {
            Some(u) => Some(u.to_string()),
            None => self.user().await?,
        };
        kpi::save_manual_input(
            &self.db,
            kpi_name,
            &period,
            field,
            value,
            entered_by.as_deref(),
            notes,
        )
        .await
    }

    /// Stored manual inputs for a KPI and period, ordered by field.
    pub async fn manual_inputs(
        &self,
        kpi_name: &str,
        period: &str,
    ) -> Result<Vec<ManualDataPoint>> {
        let key = MeasurementPeriod::parse(period)?.to_key();
        let kpi_name = kpi_name.to_string();
        let points = self
            .db
            .reader()
            .call(move |conn| repository::get_manual_data(conn, &kpi_name, &key))
            .await?;
        Ok(points)
    }

    /// Stored results with catalog metadata, ordered by function code, name,
    /// then period descending.
    pub async fn list_results(
        &self,
        period: Option<&str>,
        kpi_name: Option<&str>,
    ) -> Result<Vec<ReportedResult>> {
        let period = period
            .map(|p| MeasurementPeriod::parse(p).map(|p| p.to_key()))
            .transpose()?;
        let kpi_name = kpi_name.map(str::to_string);
        let rows = self
            .db
            .reader()
            .call(move |conn| {
                repository::list_kpi_results(conn, period.as_deref(), kpi_name.as_deref())
            })
            .await?;
        Ok(rows)
    }

    pub async fn list_definitions(&self) -> Result<Vec<KpiDefinition>> {
        let defs = self
            .db
            .reader()
            .call(|conn| repository::list_definitions(conn))
            .await?;
        Ok(defs)
    }

    pub async fn get_definition(&self, kpi_name: &str) -> Result<KpiDefinition> {
        let name = kpi_name.to_string();
        self.db
            .reader()
            .call(move |conn| repository::get_definition(conn, &name))
            .await?
            .ok_or_else(|| Error::NotFound(format!("KPI definition '{kpi_name}'")))
    }

    pub fn manual_kpis(&self) -> Vec<&'static str> {
        kpi::manual::manual_kpis()
    }

    pub fn required_fields(&self, kpi_name: &str) -> &'static [FieldSpec] {
        kpi::manual::required_fields(kpi_name)
    }

    pub async fn dashboard_summary(&self, period: &str) -> Result<DashboardSummary> {
        let period = MeasurementPeriod::parse(period)?;
        kpi::dashboard_summary(&self.db, &period).await
    }

    pub async fn technician_workload(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TechnicianWorkload>> {
        metrics::technician_workload(&self.db, start, end).await
    }

    /// Technician efficiency over `[start, end]`. Weekly availability comes
    /// from `weekly_hours_per_technician` when configured.
    pub async fn efficiency(&self, start: NaiveDate, end: NaiveDate) -> Result<EfficiencySummary> {
        let weekly_hours = match self.config_get(CONFIG_WEEKLY_HOURS).await? {
            Some(v) => v.trim().parse::<f64>().map_err(|_| {
                Error::Config(format!("{CONFIG_WEEKLY_HOURS} must be a number, got '{v}'"))
            })?,
            None => metrics::DEFAULT_WEEKLY_HOURS_PER_TECHNICIAN,
        };
        let workload = self.technician_workload(start, end).await?;
        let days = date_util::days_between(start, end) + 1;
        Ok(metrics::efficiency(workload, days, weekly_hours))
    }

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        let value = self
            .db
            .reader()
            .call(move |conn| repository::get_config(conn, &key))
            .await?;
        Ok(value)
    }

    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        let (key, value) = (key.to_string(), value.to_string());
        self.db
            .writer()
            .call(move |conn| repository::set_config(conn, &key, &value))
            .await?;
        Ok(())
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        let entries = self
            .db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await?;
        Ok(entries)
    }
}
