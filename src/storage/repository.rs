use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::catalog::{KpiDefinition, KpiSource};
use crate::kpi::types::{KpiResult, ManualDataPoint, ManualValue, Outcome, ReportedResult};

// ── KPI definitions ────────────────────────────────────────────────

const DEFINITION_COLUMNS: &str = "kpi_name, function_code, description, formula,
    acceptance_criteria, frequency, source, is_active";

fn definition_from_row(row: &Row<'_>) -> Result<KpiDefinition, rusqlite::Error> {
    let source: String = row.get(6)?;
    Ok(KpiDefinition {
        kpi_name: row.get(0)?,
        function_code: row.get(1)?,
        description: row.get(2)?,
        formula: row.get(3)?,
        acceptance_criteria: row.get(4)?,
        frequency: row.get(5)?,
        source: KpiSource::from_db(&source),
        is_active: row.get(7)?,
    })
}

/// Active definitions ordered by function code, then name.
pub fn list_definitions(conn: &Connection) -> Result<Vec<KpiDefinition>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DEFINITION_COLUMNS} FROM kpi_definitions
         WHERE is_active = 1
         ORDER BY function_code, kpi_name"
    ))?;
    let rows = stmt.query_map([], definition_from_row)?;
    rows.collect()
}

pub fn get_definition(
    conn: &Connection,
    kpi_name: &str,
) -> Result<Option<KpiDefinition>, rusqlite::Error> {
    conn.query_row(
        &format!(
            "SELECT {DEFINITION_COLUMNS} FROM kpi_definitions
             WHERE kpi_name = ?1 AND is_active = 1"
        ),
        params![kpi_name],
        definition_from_row,
    )
    .optional()
}

pub fn count_active_definitions(conn: &Connection) -> Result<u64, rusqlite::Error> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM kpi_definitions WHERE is_active = 1",
        [],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

// ── Manual data ────────────────────────────────────────────────────

/// Insert or overwrite the value for (kpi, period, field). The entry
/// timestamp is refreshed on every save; no history is kept.
pub fn upsert_manual_data(
    conn: &Connection,
    kpi_name: &str,
    measurement_period: &str,
    data_field: &str,
    value: &ManualValue,
    notes: Option<&str>,
    entered_by: Option<&str>,
) -> Result<(), rusqlite::Error> {
    let (data_value, data_text) = value.to_columns();
    conn.execute(
        "INSERT INTO kpi_manual_data (
            kpi_name, measurement_period, data_field, data_value, data_text,
            notes, entered_by, entered_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))
        ON CONFLICT(kpi_name, measurement_period, data_field) DO UPDATE SET
            data_value=excluded.data_value, data_text=excluded.data_text,
            notes=excluded.notes, entered_by=excluded.entered_by,
            entered_date=excluded.entered_date",
        params![
            kpi_name,
            measurement_period,
            data_field,
            data_value,
            data_text,
            notes,
            entered_by,
        ],
    )?;
    Ok(())
}

/// Stored manual inputs for one KPI and period, ordered by field.
pub fn get_manual_data(
    conn: &Connection,
    kpi_name: &str,
    measurement_period: &str,
) -> Result<Vec<ManualDataPoint>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT kpi_name, measurement_period, data_field, data_value, data_text,
                notes, entered_by, entered_date
         FROM kpi_manual_data
         WHERE kpi_name = ?1 AND measurement_period = ?2
         ORDER BY data_field",
    )?;
    let rows = stmt.query_map(params![kpi_name, measurement_period], |row| {
        Ok(ManualDataPoint {
            kpi_name: row.get(0)?,
            measurement_period: row.get(1)?,
            data_field: row.get(2)?,
            value: ManualValue::from_columns(row.get(3)?, row.get(4)?),
            notes: row.get(5)?,
            entered_by: row.get(6)?,
            entered_date: row.get(7)?,
        })
    })?;
    rows.collect()
}

// ── KPI results ────────────────────────────────────────────────────

/// Insert or overwrite the result for (kpi, period). Only the latest
/// calculation per period is retained.
pub fn upsert_kpi_result(conn: &Connection, result: &KpiResult) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO kpi_results (
            kpi_name, measurement_period, calculated_value, calculated_text,
            target_value, meets_criteria, calculated_by, notes, calculation_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))
        ON CONFLICT(kpi_name, measurement_period) DO UPDATE SET
            calculated_value=excluded.calculated_value,
            calculated_text=excluded.calculated_text,
            target_value=excluded.target_value,
            meets_criteria=excluded.meets_criteria,
            calculated_by=excluded.calculated_by,
            notes=excluded.notes,
            calculation_date=excluded.calculation_date",
        params![
            result.kpi_name,
            result.measurement_period,
            result.calculated_value,
            result.calculated_text,
            result.target_value,
            result.meets_criteria.to_db(),
            result.calculated_by,
            result.notes,
        ],
    )?;
    Ok(())
}

const RESULT_COLUMNS: &str = "r.kpi_name, r.measurement_period, r.calculated_value,
    r.calculated_text, r.target_value, r.meets_criteria, r.calculated_by, r.notes,
    r.calculation_date";

fn result_from_row(row: &Row<'_>) -> Result<KpiResult, rusqlite::Error> {
    Ok(KpiResult {
        kpi_name: row.get(0)?,
        measurement_period: row.get(1)?,
        calculated_value: row.get(2)?,
        calculated_text: row.get(3)?,
        target_value: row.get(4)?,
        meets_criteria: Outcome::from_db(row.get(5)?),
        calculated_by: row.get(6)?,
        notes: row.get(7)?,
        calculation_date: row.get(8)?,
    })
}

pub fn get_kpi_result(
    conn: &Connection,
    kpi_name: &str,
    measurement_period: &str,
) -> Result<Option<KpiResult>, rusqlite::Error> {
    conn.query_row(
        &format!(
            "SELECT {RESULT_COLUMNS} FROM kpi_results r
             WHERE r.kpi_name = ?1 AND r.measurement_period = ?2"
        ),
        params![kpi_name, measurement_period],
        result_from_row,
    )
    .optional()
}

/// Results joined with their definitions, optionally filtered by period
/// and/or KPI name, ordered by function code, name, then period descending.
pub fn list_kpi_results(
    conn: &Connection,
    measurement_period: Option<&str>,
    kpi_name: Option<&str>,
) -> Result<Vec<ReportedResult>, rusqlite::Error> {
    let mut sql = format!(
        "SELECT {RESULT_COLUMNS}, d.function_code, d.description,
                d.acceptance_criteria, d.frequency
         FROM kpi_results r
         JOIN kpi_definitions d ON r.kpi_name = d.kpi_name
         WHERE 1=1"
    );
    let mut binds: Vec<&str> = Vec::new();
    if let Some(period) = measurement_period {
        binds.push(period);
        sql.push_str(&format!(" AND r.measurement_period = ?{}", binds.len()));
    }
    if let Some(name) = kpi_name {
        binds.push(name);
        sql.push_str(&format!(" AND r.kpi_name = ?{}", binds.len()));
    }
    sql.push_str(" ORDER BY d.function_code, r.kpi_name, r.measurement_period DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(binds), |row| {
        Ok(ReportedResult {
            result: result_from_row(row)?,
            function_code: row.get(9)?,
            description: row.get(10)?,
            acceptance_criteria: row.get(11)?,
            frequency: row.get(12)?,
        })
    })?;
    rows.collect()
}

/// Outcome tally for one period over active definitions:
/// `(total, passing, failing, indeterminate)`.
pub fn count_results_by_outcome(
    conn: &Connection,
    measurement_period: &str,
) -> Result<(u64, u64, u64, u64), rusqlite::Error> {
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN r.meets_criteria = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN r.meets_criteria = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN r.meets_criteria IS NULL THEN 1 ELSE 0 END), 0)
         FROM kpi_results r
         JOIN kpi_definitions d ON r.kpi_name = d.kpi_name
         WHERE r.measurement_period = ?1 AND d.is_active = 1",
        params![measurement_period],
        |row| {
            let (total, pass, fail, none): (i64, i64, i64, i64) =
                (row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?);
            Ok((total as u64, pass as u64, fail as u64, none as u64))
        },
    )
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}
