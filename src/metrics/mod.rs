//! Read-only aggregation of maintenance records into the counts and sums the
//! KPI formulas consume. Every call re-queries; nothing is cached.

pub mod types;

pub use types::*;

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, Connection};

use crate::date_util::{date_key, days_between, parse_record_date};
use crate::error::Result;
use crate::storage::Database;

/// Open work orders older than this many days count against the age profile.
pub const AGE_THRESHOLD_DAYS: i64 = 60;

/// Team availability used by the efficiency report when not configured:
/// 342.69 weekly hours shared by 9 technicians.
pub const DEFAULT_WEEKLY_HOURS_PER_TECHNICIAN: f64 = 342.69 / 9.0;

pub const TARGET_EFFICIENCY_PCT: f64 = 80.0;

/// Scheduled vs completed preventive maintenance within `[start, end]`.
pub async fn pm_adherence_counts(
    db: &Database,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PmAdherenceCounts> {
    let (start, end) = (date_key(start), date_key(end));
    let counts = db
        .reader()
        .call(move |conn| {
            Ok::<PmAdherenceCounts, rusqlite::Error>(PmAdherenceCounts {
                scheduled: count_scheduled_pm_sql(conn, &start, &end)?,
                completed: count_completed_pm_sql(conn, &start, &end)?,
            })
        })
        .await?;
    log::debug!(
        "pm adherence counts: scheduled={} completed={}",
        counts.scheduled,
        counts.completed
    );
    Ok(counts)
}

/// Work orders created within `[start, end]`, split by current status.
pub async fn work_order_counts(
    db: &Database,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<WorkOrderCounts> {
    let (start, end) = (date_key(start), date_key(end));
    let counts = db
        .reader()
        .call(move |conn| {
            Ok::<WorkOrderCounts, rusqlite::Error>(WorkOrderCounts {
                opened: count_work_orders_sql(conn, &start, &end, StatusFilter::Any)?,
                closed: count_work_orders_sql(conn, &start, &end, StatusFilter::Closed)?,
                still_open: count_work_orders_sql(conn, &start, &end, StatusFilter::Open)?,
            })
        })
        .await?;
    log::debug!(
        "work order counts: opened={} closed={} open={}",
        counts.opened,
        counts.closed,
        counts.still_open
    );
    Ok(counts)
}

/// Work orders raised within `[start, end]` and how many of them are still open.
pub async fn backlog_counts(
    db: &Database,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BacklogCounts> {
    let (start, end) = (date_key(start), date_key(end));
    let counts = db
        .reader()
        .call(move |conn| {
            Ok::<BacklogCounts, rusqlite::Error>(BacklogCounts {
                raised: count_work_orders_sql(conn, &start, &end, StatusFilter::Any)?,
                open: count_work_orders_sql(conn, &start, &end, StatusFilter::Open)?,
            })
        })
        .await?;
    log::debug!("backlog counts: raised={} open={}", counts.raised, counts.open);
    Ok(counts)
}

/// Age profile of every currently open work order, regardless of when it was
/// created, measured against `today`.
pub async fn age_profile(db: &Database, today: NaiveDate) -> Result<AgeProfile> {
    let created = db
        .reader()
        .call(|conn| open_work_order_dates_sql(conn))
        .await?;
    let profile = compute_age_profile(&created, today, AGE_THRESHOLD_DAYS);
    if profile.skipped > 0 {
        log::warn!(
            "skipped {} open work orders with unparseable creation dates",
            profile.skipped
        );
    }
    Ok(profile)
}

/// Run one aggregation by kind. The age profile ignores the range and is
/// measured against `today`.
pub async fn aggregate(
    db: &Database,
    kind: AggregateKind,
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> Result<Aggregate> {
    Ok(match kind {
        AggregateKind::PmAdherence => {
            Aggregate::PmAdherence(pm_adherence_counts(db, start, end).await?)
        }
        AggregateKind::WorkOrderStatus => {
            Aggregate::WorkOrderStatus(work_order_counts(db, start, end).await?)
        }
        AggregateKind::Backlog => Aggregate::Backlog(backlog_counts(db, start, end).await?),
        AggregateKind::AgeProfile => Aggregate::AgeProfile(age_profile(db, today).await?),
    })
}

/// PM and corrective hours per active technician within `[start, end]`,
/// ordered by name.
pub async fn technician_workload(
    db: &Database,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<TechnicianWorkload>> {
    let (start, end) = (date_key(start), date_key(end));
    let rows = db
        .reader()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT full_name FROM users
                 WHERE is_active = 1 AND role = 'Technician'
                 ORDER BY full_name",
            )?;
            let technicians: Vec<String> = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<_, _>>()?;

            let mut out = Vec::with_capacity(technicians.len());
            for technician in technicians {
                out.push(technician_workload_sql(conn, technician, &start, &end)?);
            }
            Ok::<Vec<TechnicianWorkload>, rusqlite::Error>(out)
        })
        .await?;
    Ok(rows)
}

/// Efficiency of each technician over a range of `days`, given the hours
/// each technician is available per five-day week.
pub fn efficiency(
    workload: Vec<TechnicianWorkload>,
    days: i64,
    weekly_hours_per_technician: f64,
) -> EfficiencySummary {
    let available = (weekly_hours_per_technician / 5.0 * days.max(0) as f64).max(0.0);
    let total_available = available * workload.len() as f64;
    let total_pm_hours: f64 = workload.iter().map(|w| w.pm_hours).sum();
    let total_cm_hours: f64 = workload.iter().map(|w| w.cm_hours).sum();
    let total_worked = total_pm_hours + total_cm_hours;

    let technicians = workload
        .into_iter()
        .map(|w| {
            let total_hours = w.total_hours();
            let efficiency_pct = percentage(total_hours, available);
            TechnicianEfficiency {
                workload: w,
                total_hours,
                available_hours: available,
                efficiency_pct,
                vs_target_pct: efficiency_pct - TARGET_EFFICIENCY_PCT,
            }
        })
        .collect();

    EfficiencySummary {
        days,
        available_hours_per_technician: available,
        total_available_hours: total_available,
        total_pm_hours,
        total_cm_hours,
        total_worked_hours: total_worked,
        overall_efficiency_pct: percentage(total_worked, total_available),
        target_pct: TARGET_EFFICIENCY_PCT,
        technicians,
    }
}

fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

/// Age each creation date against `today`. Entries that are missing or do
/// not parse are counted in `skipped` and otherwise ignored.
pub fn compute_age_profile(
    created: &[Option<String>],
    today: NaiveDate,
    threshold_days: i64,
) -> AgeProfile {
    let ages: Vec<i64> = created
        .iter()
        .filter_map(|c| c.as_deref().and_then(parse_record_date))
        .map(|d| days_between(d, today))
        .collect();

    let over_threshold = ages.iter().filter(|&&age| age > threshold_days).count() as u64;
    let average_age_days = if ages.is_empty() {
        0.0
    } else {
        ages.iter().sum::<i64>() as f64 / ages.len() as f64
    };

    AgeProfile {
        total_open: created.len() as u64,
        aged: ages.len() as u64,
        skipped: (created.len() - ages.len()) as u64,
        over_threshold,
        threshold_days,
        average_age_days,
        oldest_age_days: ages.iter().copied().max(),
    }
}

// ── Internal SQL helpers ───────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum StatusFilter {
    Any,
    Open,
    Closed,
}

impl StatusFilter {
    fn clause(self) -> &'static str {
        match self {
            StatusFilter::Any => "",
            StatusFilter::Open => " AND status = 'Open'",
            StatusFilter::Closed => " AND status IN ('Closed', 'Completed')",
        }
    }
}

fn count_scheduled_pm_sql(
    conn: &Connection,
    start: &str,
    end: &str,
) -> std::result::Result<u64, rusqlite::Error> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM weekly_pm_schedules
         WHERE date(week_start_date) >= date(?1) AND date(week_start_date) <= date(?2)",
        params![start, end],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

fn count_completed_pm_sql(
    conn: &Connection,
    start: &str,
    end: &str,
) -> std::result::Result<u64, rusqlite::Error> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pm_completions
         WHERE date(completion_date) >= date(?1) AND date(completion_date) <= date(?2)",
        params![start, end],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

fn count_work_orders_sql(
    conn: &Connection,
    start: &str,
    end: &str,
    status: StatusFilter,
) -> std::result::Result<u64, rusqlite::Error> {
    let sql = format!(
        "SELECT COUNT(*) FROM corrective_maintenance
         WHERE date(created_date) >= date(?1) AND date(created_date) <= date(?2){}",
        status.clause()
    );
    let n: i64 = conn.query_row(&sql, params![start, end], |row| row.get(0))?;
    Ok(n as u64)
}

/// Creation dates of all open work orders. Non-text values come back as
/// `None` so the caller can skip them.
fn open_work_order_dates_sql(
    conn: &Connection,
) -> std::result::Result<Vec<Option<String>>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT created_date FROM corrective_maintenance WHERE status = 'Open'")?;
    let rows = stmt.query_map([], |row| {
        Ok(match row.get::<_, Value>(0)? {
            Value::Text(s) => Some(s),
            _ => None,
        })
    })?;
    rows.collect()
}

fn technician_workload_sql(
    conn: &Connection,
    technician: String,
    start: &str,
    end: &str,
) -> std::result::Result<TechnicianWorkload, rusqlite::Error> {
    let (pm_count, pm_hours): (i64, f64) = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(COALESCE(labor_hours, 0) + COALESCE(labor_minutes, 0) / 60.0), 0)
         FROM pm_completions
         WHERE technician_name = ?1
           AND date(completion_date) >= date(?2) AND date(completion_date) <= date(?3)",
        params![technician, start, end],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    // Closed work orders sometimes lack a closure date; those still count.
    let (cm_count, cm_hours): (i64, f64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(COALESCE(labor_hours, 0)), 0)
         FROM corrective_maintenance
         WHERE assigned_technician = ?1
           AND status = 'Closed'
           AND (closed_date IS NULL
                OR (date(closed_date) >= date(?2) AND date(closed_date) <= date(?3)))",
        params![technician, start, end],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(TechnicianWorkload {
        technician,
        pm_count: pm_count as u64,
        pm_hours,
        cm_count: cm_count as u64,
        cm_hours,
    })
}
