use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use supply_guardian::config::{Config, ConfigOverrides};
use supply_guardian::hazard::assessor::HazardAssessor;
use supply_guardian::hazard::events::EventFeed;
use supply_guardian::inventory::shipment::ShipmentUpdate;
use supply_guardian::inventory::{normalize_product_id, NewShipment};
use supply_guardian::output::csv::{
    alerts_to_csv, delays_to_csv, events_to_csv, products_to_csv, reorders_to_csv,
};
use supply_guardian::output::json::{render_json, render_json_line};
use supply_guardian::output::table::{
    render_alerts_table, render_delays_table, render_events_table, render_products_table,
    render_reorder_table, render_resilience_table, render_risk_table, render_scan_summary,
};
use supply_guardian::scan::ScanEngine;
use supply_guardian::server::{run_server, ApiState};
use supply_guardian::store::seed::seed_sample_data;
use supply_guardian::store::sqlite::SqliteStore;
use supply_guardian::types::Severity;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "supply-guardian",
    about = "Supply chain risk assessment and alerting"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// SQLite database path, overriding `[storage] db_path`
    #[arg(long)]
    db: Option<String>,
    /// Use synthetic hazard data only
    #[arg(long)]
    offline: bool,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one full scan: risk, delays, reorders, alerts, resilience
    Scan,
    Risk {
        location: String,
    },
    Delays {
        #[arg(long)]
        product: Option<String>,
    },
    Reorder,
    Resilience,
    /// Supply-chain news graded by headline keywords
    Events {
        #[arg(long)]
        min_severity: Option<Severity>,
    },
    Alerts {
        /// Include resolved alerts, newest first
        #[arg(long)]
        all: bool,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    Products {
        #[arg(long)]
        id: Option<String>,
    },
    UpdateStock {
        product_id: String,
        quantity: u32,
    },
    Shipment {
        #[command(subcommand)]
        action: ShipmentAction,
    },
    Seed,
    Watch {
        #[arg(long)]
        interval_secs: Option<u64>,
        /// 0 runs until Ctrl-C
        #[arg(long, default_value_t = 0)]
        iterations: u32,
    },
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 3001)]
        port: u16,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[derive(Debug, Subcommand)]
enum ShipmentAction {
    Register {
        #[arg(long)]
        product: String,
        #[arg(long)]
        quantity: u32,
        #[arg(long)]
        origin: String,
        #[arg(long)]
        destination: String,
        #[arg(long, default_value_t = 7)]
        due_in_days: i64,
    },
    Delay {
        id: i64,
        #[arg(long)]
        days: u32,
        #[arg(long)]
        reason: Option<String>,
    },
    Deliver {
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("supply_guardian=info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(Config::env_overrides());
    config.apply_overrides(ConfigOverrides {
        db_path: cli.db.clone(),
        offline: cli.offline,
        ..ConfigOverrides::default()
    });

    if let Commands::Config { init, show } = &cli.command {
        return handle_config_command(*init, *show, &config, &config_path);
    }

    let engine = Arc::new(build_engine(&config)?);

    match &cli.command {
        Commands::Scan => {
            let report = engine.run().await?;
            match cli.output {
                OutputFormat::Table => {
                    println!("{}", render_scan_summary(&report));
                    if !report.reorders.is_empty() {
                        println!("{}", render_reorder_table(&report.reorders));
                    }
                }
                OutputFormat::Json => println!("{}", render_json(&report)?),
                OutputFormat::Csv => {
                    warn!("CSV output for scan not implemented, using JSON");
                    println!("{}", render_json(&report)?);
                }
            }
        }
        Commands::Risk { location } => {
            let assessment = engine.risk(location).await;
            match cli.output {
                OutputFormat::Table => println!("{}", render_risk_table(&[assessment])),
                _ => println!("{}", render_json(&assessment)?),
            }
        }
        Commands::Delays { product } => {
            let product = product.as_deref().map(normalize_product_id);
            let predictions = engine.delays(product.as_deref()).await?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_delays_table(&predictions)),
                OutputFormat::Json => println!("{}", render_json(&predictions)?),
                OutputFormat::Csv => print!("{}", delays_to_csv(&predictions)?),
            }
        }
        Commands::Reorder => {
            let recommendations = engine.reorders().await?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_reorder_table(&recommendations)),
                OutputFormat::Json => println!("{}", render_json(&recommendations)?),
                OutputFormat::Csv => print!("{}", reorders_to_csv(&recommendations)?),
            }
        }
        Commands::Resilience => {
            let score = engine.resilience().await?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_resilience_table(&score)),
                _ => println!("{}", render_json(&score)?),
            }
        }
        Commands::Events { min_severity } => {
            let mut digest = EventFeed::from_config(&config.events).digest().await;
            if let Some(floor) = min_severity {
                digest.events.retain(|e| e.severity >= *floor);
            }
            match cli.output {
                OutputFormat::Table => println!("{}", render_events_table(&digest)),
                OutputFormat::Json => println!("{}", render_json(&digest)?),
                OutputFormat::Csv => print!("{}", events_to_csv(&digest.events)?),
            }
        }
        Commands::Alerts { all, limit } => {
            if *all {
                let alerts = engine.store().recent_alerts(*limit)?;
                match cli.output {
                    OutputFormat::Csv => print!("{}", alerts_to_csv(&alerts)?),
                    _ => println!("{}", render_json(&alerts)?),
                }
            } else {
                let summary = engine.alert_summary()?;
                match cli.output {
                    OutputFormat::Table => println!("{}", render_alerts_table(&summary)),
                    OutputFormat::Json => println!("{}", render_json(&summary)?),
                    OutputFormat::Csv => {
                        print!("{}", alerts_to_csv(&engine.store().active_alerts()?)?)
                    }
                }
            }
        }
        Commands::Products { id } => {
            let products = match id {
                Some(id) => vec![engine.product(&normalize_product_id(id))?],
                None => engine.store().list_products()?,
            };
            match cli.output {
                OutputFormat::Table => println!("{}", render_products_table(&products)),
                OutputFormat::Json => println!("{}", render_json(&products)?),
                OutputFormat::Csv => print!("{}", products_to_csv(&products)?),
            }
        }
        Commands::UpdateStock {
            product_id,
            quantity,
        } => {
            let product = engine
                .store()
                .update_stock(&normalize_product_id(product_id), *quantity)?;
            info!(product = %product.id, stock = product.stock_level, status = %product.status(), "stock updated");
            match cli.output {
                OutputFormat::Table => println!("{}", render_products_table(&[product])),
                _ => println!("{}", render_json(&product)?),
            }
        }
        Commands::Shipment { action } => {
            let record = match action {
                ShipmentAction::Register {
                    product,
                    quantity,
                    origin,
                    destination,
                    due_in_days,
                } => engine.store().register_shipment(&NewShipment {
                    product_id: normalize_product_id(product),
                    quantity: *quantity,
                    origin: origin.clone(),
                    destination: destination.clone(),
                    expected_date: Utc::now() + chrono::Duration::days(*due_in_days),
                })?,
                ShipmentAction::Delay { id, days, reason } => engine.store().update_shipment(
                    *id,
                    ShipmentUpdate::Delay {
                        days: *days,
                        reason: reason.clone(),
                    },
                )?,
                ShipmentAction::Deliver { id } => engine
                    .store()
                    .update_shipment(*id, ShipmentUpdate::Deliver { at: Utc::now() })?,
            };
            println!("{}", render_json(&record)?);
        }
        Commands::Seed => {
            let report = seed_sample_data(engine.store().as_ref())?;
            println!(
                "Seeded {} products ({} already present), {} shipments into {}",
                report.products_added.len(),
                report.products_skipped.len(),
                report.shipments_added,
                config.resolved_db_path().display()
            );
        }
        Commands::Watch {
            interval_secs,
            iterations,
        } => {
            let interval = interval_secs.unwrap_or(config.scan.interval_secs);
            run_watch_loop(&engine, Duration::from_secs(interval.max(1)), *iterations, cli.output)
                .await?;
        }
        Commands::Serve { host, port } => {
            let bind = format!("{host}:{port}");
            let addr: SocketAddr = bind
                .parse()
                .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
            let events = Arc::new(EventFeed::from_config(&config.events));
            run_server(
                ApiState::new(config.clone(), Arc::clone(&engine), events),
                addr,
            )
            .await?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn build_engine(config: &Config) -> Result<ScanEngine> {
    let db_path = config.resolved_db_path();
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("failed opening database: {}", db_path.display()))?;
    let assessor = Arc::new(HazardAssessor::from_config(&config.hazard));
    info!(provider = assessor.provider_name(), db = %db_path.display(), "engine ready");
    Ok(ScanEngine::from_config(config, Arc::new(store), assessor)?)
}

fn handle_config_command(init: bool, show: bool, config: &Config, config_path: &Path) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

/// Scans every `interval` until `iterations` is reached (0 = unbounded) or
/// Ctrl-C. Shutdown drops the in-flight scan; alert writes are individually atomic.
async fn run_watch_loop(
    engine: &ScanEngine,
    interval: Duration,
    iterations: u32,
    format: OutputFormat,
) -> Result<()> {
    let mut completed = 0u32;
    loop {
        completed += 1;
        info!("watch iteration {completed}");
        tokio::select! {
            result = engine.run() => match result {
                Ok(report) => match format {
                    OutputFormat::Table => println!("{}", render_scan_summary(&report)),
                    _ => println!("{}", render_json_line(&report)?),
                },
                Err(e) => error!("scan failed: {e}"),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested, abandoning scan");
                return Ok(());
            }
        }

        if iterations != 0 && completed >= iterations {
            return Ok(());
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                return Ok(());
            }
        }
    }
}
