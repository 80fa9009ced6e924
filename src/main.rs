use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use smokecalc::core::db::{
    HistoryRepository, InterchangeRepository, ProjectRepository, ShutterRepository,
};
use smokecalc::{CalcDb, ProjectExport, StoreConfig, calculate_compliance, is_measurable};

#[derive(Parser)]
#[command(name = "smokecalc")]
#[command(about = "Record and evaluate smoke-extraction shutter flow measurements")]
struct Cli {
    /// Directory holding the data blobs
    #[arg(long, value_name = "DIR", env = "SMOKECALC_DATA_DIR", default_value = smokecalc::core::config::DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a measured flow against its reference flow
    Calc {
        /// Reference flow (m³/h)
        reference: f64,
        /// Measured flow (m³/h)
        measured: f64,
        /// Keep the result in the quick-calc history
        #[arg(long)]
        save: bool,
    },
    /// List the quick-calc history, newest first
    History,
    /// Show counts and storage size
    Info,
    /// List projects with their compliance summary
    Projects,
    /// Find shutters by name, zone, building, project, city or remarks
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Import a .calcprojet file under fresh ids
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Export a project and its related notes to a .calcprojet file
    Export {
        project_id: String,
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Erase all stored data
    Clear {
        /// Confirm the erase
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    if let Command::Calc {
        reference,
        measured,
        save: false,
    } = args.command
    {
        print_calculation(reference, measured)?;
        return Ok(());
    }

    let db = CalcDb::open(StoreConfig::default().with_data_dir(&args.data_dir)).await?;

    match args.command {
        Command::Calc {
            reference,
            measured,
            ..
        } => {
            print_calculation(reference, measured)?;
            db.record_quick_calc(reference, measured).await?;
        }
        Command::History => {
            let history = db.quick_calc_history();
            if history.is_empty() {
                println!("No calculations recorded.");
            }
            for entry in history {
                println!(
                    "{}  ref {:>8.1}  measured {:>8.1}  {:+.1}%  {}",
                    entry.timestamp.date(),
                    entry.reference_flow,
                    entry.measured_flow,
                    smokecalc::compliance::round_one_decimal(entry.deviation),
                    entry.status
                );
            }
        }
        Command::Info => {
            let info = db.storage_info();
            println!("Projects:  {}", info.project_count);
            println!("Buildings: {}", info.building_count);
            println!("Zones:     {}", info.zone_count);
            println!("Shutters:  {}", info.shutter_count);
            println!("Notes:     {}", info.note_count);
            println!("Size:      {:.1} KB", info.approx_size_bytes as f64 / 1024.0);
        }
        Command::Projects => {
            for project in db.projects() {
                let summary = project.compliance_summary();
                println!(
                    "{}  {}  ({} shutters: {} compliant, {} acceptable, {} non-compliant, {} unmeasured)",
                    project.id,
                    project.name,
                    summary.total,
                    summary.compliant,
                    summary.acceptable,
                    summary.non_compliant,
                    summary.unmeasured
                );
            }
        }
        Command::Search { query } => {
            let hits = db.search_shutters(&query.join(" "));
            println!("{} match(es)", hits.len());
            for hit in hits {
                let status = if hit.shutter.is_measured() {
                    hit.shutter.compliance().status.to_string()
                } else {
                    "not measured".to_string()
                };
                println!(
                    "  {} / {} / {} / {}  [{}]",
                    hit.project.name, hit.building.name, hit.zone.name, hit.shutter.name, status
                );
            }
        }
        Command::Import { file } => {
            let export = ProjectExport::read_from(&file).await?;
            let imported = db.try_import_project(export).await?;
            println!(
                "Imported \"{}\" as {} ({} shutters, {} notes)",
                imported.project.name,
                imported.project.id,
                imported.project.shutter_count(),
                imported.notes.len()
            );
        }
        Command::Export { project_id, out } => {
            let Some(export) = db.export_project(&project_id) else {
                anyhow::bail!("No project with id {}", project_id);
            };
            let out = out.unwrap_or_else(|| PathBuf::from(export.default_file_name()));
            export.write_to(&out).await?;
            println!("Exported to {:?}", out);
        }
        Command::Clear { yes } => {
            if !yes {
                anyhow::bail!("Refusing to erase data without --yes");
            }
            db.clear_all_data().await?;
            println!("All data erased.");
        }
    }

    Ok(())
}

fn print_calculation(reference: f64, measured: f64) -> anyhow::Result<()> {
    if !reference.is_finite() || !measured.is_finite() || reference < 0.0 || measured < 0.0 {
        anyhow::bail!("Flows must be non-negative numbers");
    }
    if !is_measurable(reference) {
        println!("Enter a reference flow greater than zero.");
        return Ok(());
    }
    let result = calculate_compliance(reference, measured);
    println!("Deviation: {:+.1}%", result.rounded_deviation());
    println!("Status:    {} ({})", result.status, result.color);
    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_deref()
        .unwrap_or("warn")
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level.to_string()))
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
