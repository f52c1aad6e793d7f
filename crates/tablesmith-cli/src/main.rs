mod summary;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tablesmith_config::{AppConfig, ConfigLoader, LogConfig};
use tablesmith_db::{
    MemoryVersionStore, MigrationEngine, SimulatedClient, SqlClient, SqliteVersionStore,
    VersionStore,
};
use tablesmith_db::engine::version_key;
use tablesmith_schema::{SchemaDescriptor, SchemaVersion, TableManifest};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tablesmith")]
#[command(about = "Validate, preview and version MySQL table schemas", version)]
struct Cli {
    /// Config file (.toml, .yml or .yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Table prefix, overriding config and TABLESMITH_TABLE_PREFIX
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a table manifest against the naming and definition rules
    Validate {
        /// Manifest file (.toml, .yml or .yaml)
        manifest: PathBuf,
    },

    /// Show the statements a fresh install of a manifest would execute
    Plan {
        /// Manifest file (.toml, .yml or .yaml)
        manifest: PathBuf,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read or write recorded schema versions
    Version {
        #[command(subcommand)]
        version_command: VersionCommands,
    },
}

#[derive(Subcommand)]
enum VersionCommands {
    /// Print the recorded version of a table
    Get {
        /// Full table name, prefix included
        table: String,
    },

    /// Record a version for a table
    Set {
        /// Full table name, prefix included
        table: String,

        /// Version in x.y.z form
        version: String,
    },

    /// List every recorded marker
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(prefix) = cli.prefix {
        config.database.table_prefix = prefix;
    }
    init_tracing(&config.log, cli.verbose);

    match cli.command {
        Commands::Validate { manifest } => validate(&config, &manifest),
        Commands::Plan { manifest, json } => plan(&config, &manifest, json),
        Commands::Version { version_command } => version(&config, version_command),
    }
}

fn init_tracing(log: &LogConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_descriptor(prefix: &str, path: &Path) -> Result<SchemaDescriptor> {
    let manifest = TableManifest::load(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let descriptor = manifest
        .to_descriptor(prefix)
        .with_context(|| format!("invalid manifest {}", path.display()))?;
    debug!("loaded descriptor for {}", descriptor.table_name());
    Ok(descriptor)
}

fn validate(config: &AppConfig, path: &Path) -> Result<()> {
    let descriptor = load_descriptor(&config.database.table_prefix, path)?;
    let version = descriptor
        .version()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unversioned".to_string());

    println!(
        "{}: ok ({} columns, {} indexes, {} foreign keys, {version})",
        descriptor.table_name(),
        descriptor.columns().len(),
        descriptor.indexes().count(),
        descriptor.foreign_keys().len()
    );
    Ok(())
}

fn plan(config: &AppConfig, path: &Path, json: bool) -> Result<()> {
    let mut client = SimulatedClient::new()
        .with_prefix(config.database.table_prefix.clone())
        .with_charset_collate(config.database.charset_collate());
    let descriptor = load_descriptor(client.table_prefix(), path)?;
    // Referenced tables belong to the host; stand them in so the plan can resolve them.
    for fk in descriptor.foreign_keys() {
        if fk.ref_table != descriptor.table_name() && client.table(&fk.ref_table).is_none() {
            debug!("assuming referenced table {} exists", fk.ref_table);
            client.add_table(&fk.ref_table, &[fk.ref_column.as_str()]);
        }
    }
    let mut store = MemoryVersionStore::new();

    let outcome = MigrationEngine::new(&mut client, &mut store).create_or_update(&descriptor);

    if json {
        let rendered =
            serde_json::to_string_pretty(&outcome).context("failed to serialize outcome")?;
        println!("{rendered}");
    } else {
        summary::print_summary(&descriptor, &outcome);
        for statement in &outcome.statements {
            println!();
            println!("{statement};");
        }
        for warning in &outcome.warnings {
            eprintln!("warning: {warning}");
        }
    }

    if !outcome.is_success() {
        bail!("plan failed: {}", outcome.errors.join("; "));
    }
    Ok(())
}

fn version(config: &AppConfig, command: VersionCommands) -> Result<()> {
    let path = ConfigLoader::versions_path(config);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut store = SqliteVersionStore::open(&path)
        .with_context(|| format!("failed to open version store {}", path.display()))?;

    match command {
        VersionCommands::Get { table } => match store.get(&version_key(&table))? {
            Some(value) => println!("{value}"),
            None => println!("{table}: no version recorded"),
        },
        VersionCommands::Set { table, version } => {
            let parsed: SchemaVersion = version
                .parse()
                .with_context(|| format!("cannot record version {version:?}"))?;
            store.set(&version_key(&table), &parsed.to_string())?;
            info!("recorded {parsed} for {table}");
            println!("{table}: {parsed}");
        }
        VersionCommands::List => {
            let entries = store.entries()?;
            if entries.is_empty() {
                println!("no markers recorded in {}", path.display());
            }
            for entry in entries {
                println!(
                    "{:<40} {:<12} {}",
                    entry.key,
                    entry.value,
                    entry.updated_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }
    Ok(())
}
