use rusqlite::params;

use crate::catalog::{KpiDefinition, SEED};

/// Insert any seed KPI definitions that are not yet present.
/// Existing rows are left untouched.
pub fn ensure_kpi_catalog(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO kpi_definitions (
            kpi_name, function_code, description, formula,
            acceptance_criteria, frequency, source, is_active
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;

    let mut inserted = 0;
    for seed in SEED {
        let def = KpiDefinition::from(seed);
        inserted += stmt.execute(params![
            def.kpi_name,
            def.function_code,
            def.description,
            def.formula,
            def.acceptance_criteria,
            def.frequency,
            def.source.as_str(),
            def.is_active as i32,
        ])?;
    }
    if inserted > 0 {
        log::info!("seeded {inserted} KPI definitions");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[tokio::test]
    async fn test_ensure_catalog_does_not_clobber_edits() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                conn.execute(
                    "UPDATE kpi_definitions SET description = 'edited', is_active = 0
                     WHERE kpi_name = 'FR1'",
                    [],
                )?;

                ensure_kpi_catalog(conn)?;

                let (description, active): (String, i32) = conn.query_row(
                    "SELECT description, is_active FROM kpi_definitions WHERE kpi_name = 'FR1'",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                assert_eq!(description, "edited");
                assert_eq!(active, 0);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ensure_catalog_restores_deleted_rows() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                conn.execute("DELETE FROM kpi_definitions WHERE kpi_name = 'WO Backlog'", [])?;
                ensure_kpi_catalog(conn)?;
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM kpi_definitions WHERE kpi_name = 'WO Backlog'",
                    [],
                    |row| row.get(0),
                )?;
                assert_eq!(count, 1);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }
}
