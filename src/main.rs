//! FlowLens - Network Flow Log Analytics CLI
//!
//! Wires an object store source into the ingestion pipeline and prints
//! analytics over the concatenated result. The heavy lifting lives in the
//! library; this binary only parses arguments, configures logging and
//! renders result tables.

use anyhow::{bail, Context, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};
use serde::Serialize;

use flowlens::analytics::{
    denied_flows, detect_spikes, flows_per_hour, persistent_connections, top_listeners,
    top_talkers, AggregationResult,
};
use flowlens::constants;
use flowlens::ingest::Ingestor;
use flowlens::store::{AzureBlobStore, LocalDirStore, ObjectStore};
use flowlens::table::FlowTable;

#[derive(Parser)]
#[command(
    name = "flowlens",
    version,
    about = "Network flow log ingestion and traffic analytics"
)]
struct Cli {
    /// Local directory holding flow log files (offline mode)
    #[arg(long, value_name = "PATH", conflicts_with = "account")]
    dir: Option<String>,

    /// Storage account name (or FLOWLENS_STORAGE_ACCOUNT)
    #[arg(long, value_name = "ACCOUNT")]
    account: Option<String>,

    /// Blob container name (or FLOWLENS_CONTAINER)
    #[arg(long, value_name = "CONTAINER")]
    container: Option<String>,

    /// SAS token for the container (or FLOWLENS_SAS_TOKEN)
    #[arg(long, value_name = "TOKEN")]
    sas_token: Option<String>,

    /// Only ingest objects whose name starts with this prefix
    #[arg(long, default_value = "")]
    prefix: String,

    /// Emit results as JSON instead of text tables
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Full report: talkers, listeners, denials, hourly series, anomalies
    Summary {
        #[arg(long, default_value_t = constants::DEFAULT_TOP_N)]
        top: usize,
        #[arg(long, default_value_t = constants::DEFAULT_SPIKE_WINDOW)]
        window: usize,
        #[arg(long, default_value_t = constants::DEFAULT_Z_THRESHOLD)]
        z_threshold: f64,
        #[arg(long, default_value_t = constants::DEFAULT_MIN_OCCURRENCES)]
        min_occurrences: u64,
        #[arg(long, default_value_t = constants::DEFAULT_PERSISTENCE_WINDOW_HOURS)]
        window_hours: i64,
    },
    /// Top sources by traffic volume
    Talkers {
        #[arg(long, default_value_t = constants::DEFAULT_TOP_N)]
        top: usize,
    },
    /// Top destinations by traffic volume
    Listeners {
        #[arg(long, default_value_t = constants::DEFAULT_TOP_N)]
        top: usize,
    },
    /// Denied / dropped flows
    Denied,
    /// Hourly flow counts
    Hourly,
    /// Hour buckets with anomalous flow counts
    Spikes {
        #[arg(long, default_value_t = constants::DEFAULT_SPIKE_WINDOW)]
        window: usize,
        #[arg(long, default_value_t = constants::DEFAULT_Z_THRESHOLD)]
        z_threshold: f64,
    },
    /// Connection tuples recurring within a time window
    Persistent {
        #[arg(long, default_value_t = constants::DEFAULT_MIN_OCCURRENCES)]
        min_occurrences: u64,
        #[arg(long, default_value_t = constants::DEFAULT_PERSISTENCE_WINDOW_HOURS)]
        window_hours: i64,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let store = open_store(&cli)?;

    let ingestor = Ingestor::new(store.as_ref());
    let stats = ingestor.stats();
    let table = ingestor
        .ingest_all(&cli.prefix)
        .context("listing objects failed")?;

    if stats.objects_skipped() > 0 {
        log::warn!(
            "skipped {} unreachable objects: {}",
            stats.objects_skipped(),
            stats.skipped_names().join(", ")
        );
    }
    if stats.members_skipped() > 0 {
        log::warn!("skipped {} undecodable members", stats.members_skipped());
    }
    if table.is_empty() {
        log::warn!("no flow records found under prefix '{}'", cli.prefix);
    }

    match &cli.command {
        Command::Summary {
            top,
            window,
            z_threshold,
            min_occurrences,
            window_hours,
        } => {
            print_aggregation("Top talkers", &top_talkers(&table, *top), cli.json)?;
            print_aggregation("Top listeners", &top_listeners(&table, *top), cli.json)?;
            print_denied(&table, cli.json)?;
            let series = flows_per_hour(&table);
            print_hourly(&series, cli.json)?;
            print_json_or(cli.json, &detect_spikes(&series, *window, *z_threshold), |spikes| {
                println!("\nSpikes ({} flagged):", spikes.len());
                for ts in spikes {
                    println!("  {}", ts);
                }
            })?;
            let persistent =
                persistent_connections(&table, *min_occurrences, Duration::hours(*window_hours));
            print_json_or(cli.json, &persistent, |records| {
                println!("\nPersistent connections ({} tuples):", records.len());
                for r in records {
                    println!(
                        "  {} {}:{} -> {}:{} x{} @ {}",
                        r.protocol, r.src_ip, r.src_port, r.dst_ip, r.dst_port, r.occurrences,
                        r.window_start
                    );
                }
            })?;
        }
        Command::Talkers { top } => {
            print_aggregation("Top talkers", &top_talkers(&table, *top), cli.json)?;
        }
        Command::Listeners { top } => {
            print_aggregation("Top listeners", &top_listeners(&table, *top), cli.json)?;
        }
        Command::Denied => print_denied(&table, cli.json)?,
        Command::Hourly => print_hourly(&flows_per_hour(&table), cli.json)?,
        Command::Spikes {
            window,
            z_threshold,
        } => {
            let spikes = detect_spikes(&flows_per_hour(&table), *window, *z_threshold);
            print_json_or(cli.json, &spikes, |spikes| {
                for ts in spikes {
                    println!("{}", ts);
                }
            })?;
        }
        Command::Persistent {
            min_occurrences,
            window_hours,
        } => {
            let records =
                persistent_connections(&table, *min_occurrences, Duration::hours(*window_hours));
            print_json_or(cli.json, &records, |records| {
                for r in records {
                    println!(
                        "{} {}:{} -> {}:{} x{} @ {}",
                        r.protocol, r.src_ip, r.src_port, r.dst_ip, r.dst_port, r.occurrences,
                        r.window_start
                    );
                }
            })?;
        }
    }
    Ok(())
}

/// Pick the object store from CLI flags, falling back to the environment.
fn open_store(cli: &Cli) -> Result<Box<dyn ObjectStore>> {
    if let Some(dir) = &cli.dir {
        return Ok(Box::new(LocalDirStore::new(dir)));
    }
    let account = match cli.account.clone().or_else(constants::get_storage_account) {
        Some(a) => a,
        None => bail!("no source: pass --dir, or --account/--container for blob storage"),
    };
    let container = cli
        .container
        .clone()
        .or_else(constants::get_container)
        .context("--container (or FLOWLENS_CONTAINER) is required with --account")?;
    let sas = cli.sas_token.clone().or_else(constants::get_sas_token);
    Ok(Box::new(AzureBlobStore::new(&account, &container, sas)))
}

fn print_json_or<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text(value);
    }
    Ok(())
}

fn print_aggregation(title: &str, result: &AggregationResult, json: bool) -> Result<()> {
    print_json_or(json, result, |result| {
        println!("\n{} ({} by {}):", title, result.key_column, result.measure_column);
        for (key, sum) in &result.rows {
            println!("  {:<40} {:>16.0}", key, sum);
        }
    })
}

fn print_denied(table: &FlowTable, json: bool) -> Result<()> {
    let denied = denied_flows(table);
    print_json_or(json, &denied, |denied| {
        println!("\nDenied / dropped flows: {}", denied.len());
        let mut counts: Vec<(String, usize)> = Vec::new();
        for row in 0..denied.len() {
            if let Some(decision) = denied.text(row, "flow_decision") {
                match counts.iter_mut().find(|(d, _)| d == decision) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((decision.to_string(), 1)),
                }
            }
        }
        for (decision, n) in counts {
            println!("  {:<24} {:>8}", decision, n);
        }
    })
}

fn print_hourly(series: &flowlens::analytics::HourlySeries, json: bool) -> Result<()> {
    print_json_or(json, series, |series| {
        println!("\nFlows per hour ({} buckets):", series.len());
        for (bucket, count) in &series.points {
            println!("  {} {:>10}", bucket, count);
        }
    })
}
