use std::collections::BTreeMap;

use clap::{Parser, Subcommand};

use cmms_kpi::{KpiEngine, KpiResult, ManualValue, MeasurementPeriod, Outcome};

#[derive(Parser)]
#[command(name = "cmms-kpi", about = "Maintenance KPI calculation and collection")]
struct Cli {
    /// Database path (default: ~/.cmms-kpi/cmms.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// User recorded on results and inputs (default: config user_name)
    #[arg(long)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List active KPI definitions
    Definitions {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the input fields a manual KPI needs
    Fields {
        /// KPI name, e.g. "FR1"
        kpi: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Enter a manual data point
    Input {
        /// KPI name
        kpi: String,
        /// Field key (see `fields`)
        field: String,
        /// Value; numeric unless --text is given
        value: String,
        /// Store the value as text
        #[arg(long)]
        text: bool,
        /// Measurement period, YYYY-MM (default: current month)
        #[arg(long)]
        period: Option<String>,
        /// Free-form notes stored with the value
        #[arg(long)]
        notes: Option<String>,
    },
    /// Calculate KPIs for a period
    Calc {
        #[command(subcommand)]
        target: CalcTarget,
    },
    /// List stored KPI results
    Results {
        /// Filter by period, YYYY-MM
        #[arg(long)]
        period: Option<String>,
        /// Filter by KPI name
        #[arg(long)]
        kpi: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Pass/fail summary for a period
    Summary {
        /// Measurement period, YYYY-MM (default: current month)
        #[arg(long)]
        period: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show raw aggregate counts
    Aggregate {
        /// One of: pm_adherence, wo_status, backlog, age_profile
        kind: String,
        /// Measurement period, YYYY-MM (default: current month)
        #[arg(long)]
        period: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Technician workload and efficiency
    Workload {
        /// Measurement period, YYYY-MM (default: current month)
        #[arg(long)]
        period: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CalcTarget {
    /// Calculate the automatic KPIs from maintenance records
    Auto {
        /// Measurement period, YYYY-MM (default: current month)
        #[arg(long)]
        period: Option<String>,
        /// Calculate only this KPI (name or key)
        #[arg(long)]
        kpi: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Calculate manual KPIs from entered data
    Manual {
        /// Measurement period, YYYY-MM (default: current month)
        #[arg(long)]
        period: Option<String>,
        /// Calculate only this KPI
        #[arg(long)]
        kpi: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Calculate automatic and manual KPIs
    All {
        /// Measurement period, YYYY-MM (default: current month)
        #[arg(long)]
        period: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

fn period_or_current(period: Option<String>) -> String {
    period.unwrap_or_else(|| MeasurementPeriod::current().to_key())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => cmms_kpi::Database::open_at(path).await?,
        None => cmms_kpi::Database::open().await?,
    };
    let mut engine = KpiEngine::new(db);
    if let Some(user) = cli.user {
        engine = engine.with_user(user);
    }

    match cli.command {
        Commands::Definitions { json } => handle_definitions(&engine, json).await?,
        Commands::Fields { kpi, json } => handle_fields(&engine, &kpi, json)?,
        Commands::Input {
            kpi,
            field,
            value,
            text,
            period,
            notes,
        } => {
            let period = period_or_current(period);
            let value = if text {
                ManualValue::Text(value)
            } else {
                let n: f64 = value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("'{value}' is not a number; use --text"))?;
                ManualValue::Number(n)
            };
            engine
                .save_manual_input(&kpi, &period, &field, value, None, notes.as_deref())
                .await?;
            println!("Saved {kpi} / {field} for {period}");
        }
        Commands::Calc { target } => handle_calc(&engine, target).await?,
        Commands::Results { period, kpi, json } => {
            let rows = engine.list_results(period.as_deref(), kpi.as_deref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("No results.");
            } else {
                for row in &rows {
                    println!(
                        "[{}] {} {}",
                        row.function_code, row.result.measurement_period, row.result.kpi_name
                    );
                    print_result_detail(&row.result);
                }
            }
        }
        Commands::Summary { period, json } => {
            let period = period_or_current(period);
            let s = engine.dashboard_summary(&period).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&s)?);
            } else {
                println!("KPI Summary: {}", s.measurement_period);
                println!("  Calculated:    {}/{}", s.total, s.catalog_size);
                println!("  Passing:       {}", s.passing);
                println!("  Failing:       {}", s.failing);
                println!("  Indeterminate: {}", s.indeterminate);
                println!("  Pending:       {}", s.pending);
            }
        }
        Commands::Aggregate { kind, period, json } => {
            let kind: cmms_kpi::AggregateKind = kind.parse()?;
            let (start, end) = engine.resolve_period(&period_or_current(period))?;
            let agg = engine.aggregate(kind, start, end).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&agg)?);
            } else {
                print_aggregate(&agg);
            }
        }
        Commands::Workload { period, json } => {
            let (start, end) = engine.resolve_period(&period_or_current(period))?;
            let summary = engine.efficiency(start, end).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Technician Workload: {start} to {end} ({} days)", summary.days);
                for t in &summary.technicians {
                    println!(
                        "  {:<24} PM {:>3} ({:>6.1}h)  CM {:>3} ({:>6.1}h)  {:>5.1}% ({:+.1})",
                        t.workload.technician,
                        t.workload.pm_count,
                        t.workload.pm_hours,
                        t.workload.cm_count,
                        t.workload.cm_hours,
                        t.efficiency_pct,
                        t.vs_target_pct
                    );
                }
                println!(
                    "  Overall: {:.1}h of {:.1}h available ({:.1}%, target {:.0}%)",
                    summary.total_worked_hours,
                    summary.total_available_hours,
                    summary.overall_efficiency_pct,
                    summary.target_pct
                );
            }
        }
        Commands::Config { action } => handle_config(&engine, action).await?,
    }

    Ok(())
}

async fn handle_definitions(engine: &KpiEngine, json: bool) -> anyhow::Result<()> {
    let defs = engine.list_definitions().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&defs)?);
        return Ok(());
    }
    for d in &defs {
        println!("[{}] {} ({})", d.function_code, d.kpi_name, d.source.as_str());
        println!("    {}", d.acceptance_criteria);
    }
    Ok(())
}

fn handle_fields(engine: &KpiEngine, kpi: &str, json: bool) -> anyhow::Result<()> {
    let fields = engine.required_fields(kpi);
    if fields.is_empty() {
        anyhow::bail!(
            "{kpi} takes no manual input. Manual KPIs: {}",
            engine.manual_kpis().join(", ")
        );
    }
    if json {
        println!("{}", serde_json::to_string_pretty(fields)?);
    } else {
        for f in fields {
            let kind = match f.kind {
                cmms_kpi::FieldKind::Number => "number",
                cmms_kpi::FieldKind::Text => "text",
            };
            println!("  {:<30} {:<7} {}", f.field, kind, f.label);
        }
    }
    Ok(())
}

async fn handle_calc(engine: &KpiEngine, target: CalcTarget) -> anyhow::Result<()> {
    match target {
        CalcTarget::Auto { period, kpi, json } => {
            let period = period_or_current(period);
            match kpi {
                Some(name) => {
                    let result = engine.evaluate_automatic(&name, &period).await?;
                    print_single(&result, json)?;
                }
                None => {
                    let results = engine.evaluate_all_automatic(&period).await;
                    print_batch(&results, json)?;
                }
            }
        }
        CalcTarget::Manual { period, kpi, json } => {
            let period = period_or_current(period);
            match kpi {
                Some(name) => {
                    let result = engine.evaluate_manual(&name, &period).await?;
                    print_single(&result, json)?;
                }
                None => {
                    let results = engine.evaluate_all_manual(&period).await;
                    if results.is_empty() && !json {
                        println!("No manual data entered for {period}.");
                    }
                    print_batch(&results, json)?;
                }
            }
        }
        CalcTarget::All { period, json } => {
            let period = period_or_current(period);
            let mut results = engine.evaluate_all_automatic(&period).await;
            results.extend(engine.evaluate_all_manual(&period).await);
            print_batch(&results, json)?;
        }
    }
    Ok(())
}

async fn handle_config(engine: &KpiEngine, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match engine.config_get(&key).await? {
            Some(value) => println!("{key} = {value}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            engine.config_set(&key, &value).await?;
            println!("{key} = {value}");
        }
        ConfigAction::List => {
            let items = engine.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}

fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Meets => "PASS",
        Outcome::Fails => "FAIL",
        Outcome::Indeterminate => "N/A",
    }
}

fn print_result_detail(r: &KpiResult) {
    let value = r
        .calculated_value
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "    {:<4} value {value}  {}",
        outcome_label(r.meets_criteria),
        r.calculated_text.as_deref().unwrap_or("")
    );
    if let Some(ref notes) = r.notes {
        println!("    {notes}");
    }
}

fn print_single(result: &KpiResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("{} ({})", result.kpi_name, result.measurement_period);
        print_result_detail(result);
    }
    Ok(())
}

fn print_batch(
    results: &BTreeMap<&'static str, cmms_kpi::Result<KpiResult>>,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        let out: serde_json::Map<String, serde_json::Value> = results
            .iter()
            .map(|(key, r)| {
                let value = match r {
                    Ok(result) => serde_json::to_value(result)?,
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                };
                Ok::<_, serde_json::Error>((key.to_string(), value))
            })
            .collect::<Result<_, _>>()?;
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    for (key, r) in results {
        match r {
            Ok(result) => {
                println!("{key}: {}", result.kpi_name);
                print_result_detail(result);
            }
            Err(e) => println!("{key}: ERROR {e}"),
        }
    }
    Ok(())
}

fn print_aggregate(agg: &cmms_kpi::Aggregate) {
    match agg {
        cmms_kpi::Aggregate::PmAdherence(c) => {
            println!("PM Adherence:");
            println!("  Scheduled: {}", c.scheduled);
            println!("  Completed: {}", c.completed);
        }
        cmms_kpi::Aggregate::WorkOrderStatus(c) => {
            println!("Work Orders:");
            println!("  Opened:     {}", c.opened);
            println!("  Closed:     {}", c.closed);
            println!("  Still open: {}", c.still_open);
        }
        cmms_kpi::Aggregate::Backlog(c) => {
            println!("Backlog:");
            println!("  Raised: {}", c.raised);
            println!("  Open:   {}", c.open);
        }
        cmms_kpi::Aggregate::AgeProfile(p) => {
            println!("Open Work Order Age:");
            println!("  Open:        {}", p.total_open);
            println!("  Over {} days: {}", p.threshold_days, p.over_threshold);
            println!("  Average age: {:.1} days", p.average_age_days);
            if let Some(oldest) = p.oldest_age_days {
                println!("  Oldest:      {oldest} days");
            }
            if p.skipped > 0 {
                println!("  Skipped:     {} (no usable creation date)", p.skipped);
            }
        }
    }
}
