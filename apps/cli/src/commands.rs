//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use ushanka_archivematica::StorageService;
use ushanka_archivesspace::ArchivesSpace;
use ushanka_core::{Ingestor, ProgressReporter};
use ushanka_fedora::Fedora;
use ushanka_metadata::TechPairs;
use ushanka_mets::MetsFile;
use ushanka_model::RelsExt;
use ushanka_shared::{Pid, config_dir, init_config, load_config};
use ushanka_storage::Registry;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Ushanka — move Archivematica packages into Fedora.
#[derive(Parser)]
#[command(
    name = "ushanka",
    version,
    about = "Deposit stored Archivematica AIP/DIP pairs into Fedora as compound objects.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Ingest stored AIP/DIP pairs into Fedora.
    Ingest {
        /// Ingest only the pair whose AIP has this UUID.
        #[arg(long)]
        aip: Option<String>,

        /// Registry database path (defaults to ~/.ushanka/registry.db).
        #[arg(long)]
        registry: Option<PathBuf>,
    },

    /// Storage Service packages.
    Packages {
        /// Packages subcommand.
        #[command(subcommand)]
        action: PackagesAction,
    },

    /// Objects deposited on previous runs.
    Objects {
        /// Objects subcommand.
        #[command(subcommand)]
        action: ObjectsAction,
    },

    /// Check the relationship shape of a RELS-EXT Turtle file.
    Validate {
        /// Path to a Turtle (.ttl) file.
        file: PathBuf,
    },

    /// Summarize the files described by an Archivematica METS document.
    Mets {
        /// Path to a METS XML file.
        file: PathBuf,
    },

    /// Ask GSearch to reindex one object.
    Index {
        /// Pid of the object to reindex.
        pid: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Packages subcommands.
#[derive(Subcommand)]
pub(crate) enum PackagesAction {
    /// List packages held by the Storage Service.
    List {
        /// List locally downloaded packages from the registry instead.
        #[arg(long)]
        downloaded: bool,

        /// Registry database path (defaults to ~/.ushanka/registry.db).
        #[arg(long)]
        registry: Option<PathBuf>,
    },
}

/// Objects subcommands.
#[derive(Subcommand)]
pub(crate) enum ObjectsAction {
    /// List compound objects and parts from the registry.
    List {
        /// Registry database path (defaults to ~/.ushanka/registry.db).
        #[arg(long)]
        registry: Option<PathBuf>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "ushanka=info",
        1 => "ushanka=debug",
        _ => "ushanka=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ingest { aip, registry } => {
            cmd_ingest(aip.as_deref(), registry.as_deref()).await
        }
        Command::Packages { action } => match action {
            PackagesAction::List {
                downloaded,
                registry,
            } => cmd_packages(downloaded, registry.as_deref()).await,
        },
        Command::Objects { action } => match action {
            ObjectsAction::List { registry } => cmd_objects(registry.as_deref()).await,
        },
        Command::Validate { file } => cmd_validate(&file).await,
        Command::Mets { file } => cmd_mets(&file).await,
        Command::Index { pid } => cmd_index(&pid).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Resolve the registry database path, creating its directory if needed.
fn registry_db_path(flag: Option<&Path>) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path.to_path_buf()),
        None => {
            let dir = config_dir()?;
            std::fs::create_dir_all(&dir)
                .map_err(|e| eyre!("cannot create '{}': {e}", dir.display()))?;
            Ok(dir.join("registry.db"))
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ingest(aip: Option<&str>, registry: Option<&Path>) -> Result<()> {
    let config = load_config()?;

    let storage_service = StorageService::from_config(&config.archivematica)?;
    let fedora = Fedora::from_config(&config.fedora)?;

    // ArchivesSpace only feeds descriptive records; an unreachable backend
    // downgrades every transfer to a default record rather than aborting.
    let repo_id = config.archivesspace.repository;
    let (accessions, publisher) = match ArchivesSpace::from_config(&config.archivesspace).await {
        Ok(aspace) => {
            let repository = aspace.repository(repo_id).await?;
            let accessions = aspace.all_accessions(repo_id).await?;
            info!(
                repository = %repository.name,
                accessions = accessions.len(),
                "loaded accessions"
            );
            (accessions, repository.name)
        }
        Err(e) => {
            warn!(error = %e, "ArchivesSpace unavailable; using default descriptive records");
            (Vec::new(), String::new())
        }
    };

    let db_path = registry_db_path(registry)?;
    let registry = Registry::open(&db_path).await?;

    let ingestor = Ingestor {
        storage_service: &storage_service,
        fedora: &fedora,
        registry: &registry,
        accessions,
        publisher,
        config: config.clone(),
    };

    info!(only_aip = ?aip, "starting ingest");

    let reporter = CliProgress::new();
    let summary = ingestor.run(aip, &reporter).await?;
    reporter.finish();

    println!();
    println!("  Ingest run finished.");
    println!("  Ingested: {}", summary.ingested.len());
    println!("  Skipped:  {}", summary.skipped);
    println!("  Failed:   {}", summary.errors.len());
    println!("  Time:     {:.1}s", summary.elapsed.as_secs_f64());
    for pid in &summary.ingested {
        println!("    {pid}");
    }
    for (uuid, error) in &summary.errors {
        println!("    {uuid}: {error}");
    }
    println!();

    Ok(())
}

async fn cmd_packages(downloaded: bool, registry: Option<&Path>) -> Result<()> {
    if downloaded {
        let db_path = registry_db_path(registry)?;
        let registry = Registry::open_readonly(&db_path).await?;
        let packages = registry.list_packages().await?;

        if packages.is_empty() {
            println!("No packages downloaded yet.");
            return Ok(());
        }
        for package in packages {
            println!(
                "{}  {:4}  {:>12}  {}",
                package.uuid,
                package.package_type,
                ushanka_mets::pretty_bytes(package.size),
                package.file_name
            );
        }
        return Ok(());
    }

    let config = load_config()?;
    let storage_service = StorageService::from_config(&config.archivematica)?;
    let packages = storage_service.list_packages(None).await?;

    if packages.is_empty() {
        println!("The Storage Service holds no packages.");
        return Ok(());
    }
    for package in packages {
        println!(
            "{}  {:8}  {:9}  {:>12}  {}",
            package.uuid,
            package.package_type,
            package.status,
            ushanka_mets::pretty_bytes(package.size),
            package.file_name()
        );
    }

    Ok(())
}

async fn cmd_objects(registry: Option<&Path>) -> Result<()> {
    let db_path = registry_db_path(registry)?;
    let registry = Registry::open_readonly(&db_path).await?;
    let objects = registry.list_objects().await?;

    if objects.is_empty() {
        println!("No objects deposited yet.");
        return Ok(());
    }

    for object in objects {
        let parent = object
            .parent_pid
            .map(|pid| format!("  part of {pid}"))
            .unwrap_or_default();
        println!(
            "{}  {:8}  {}{}",
            object.pid, object.kind, object.label, parent
        );
    }

    Ok(())
}

async fn cmd_validate(file: &Path) -> Result<()> {
    let turtle = std::fs::read_to_string(file)
        .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?;
    let rels = RelsExt::from_turtle(&turtle)?;

    if let Some(parent) = &rels.constituent_of {
        rels.check_part_shape()?;
        println!("{}: valid part relationships", rels.subject);
        println!("  model:          {}", rels.model);
        println!("  constituent of: {parent}");
    } else {
        rels.check_compound_shape()?;
        println!("{}: valid compound relationships", rels.subject);
        println!("  model:          {}", rels.model);
        for collection in &rels.collections {
            println!("  member of:      {collection}");
        }
    }

    Ok(())
}

async fn cmd_mets(file: &Path) -> Result<()> {
    let xml = std::fs::read_to_string(file)
        .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?;
    let mets = MetsFile::parse(&xml)?;
    let files = mets.original_files();

    println!(
        "{}: {} original file(s), {}",
        file.display(),
        files.len(),
        mets.pretty_total_size()
    );

    for original in files {
        let admin = &original.admin;
        let mut pairs = TechPairs::default();
        pairs.push("File", &original.name);
        if let Some(name) = &admin.original_name {
            pairs.push("Original name", name);
        }
        pairs.push("Size", &admin.pretty_size());
        if let Some(fixity) = &admin.fixity {
            pairs.push("Fixity", &format!("{}:{}", fixity.algorithm, fixity.digest));
        }
        if let Some(format) = &admin.format {
            pairs.push("Format", &format!("{} {}", format.name, format.version));
        }
        if let Some(link) = admin.pronom_link() {
            pairs.push("PRONOM", &link);
        }
        if let Some(modified) = &admin.last_modified {
            pairs.push("Modified", modified);
        }

        println!();
        println!("{pairs}");
    }

    Ok(())
}

async fn cmd_index(pid: &str) -> Result<()> {
    let config = load_config()?;
    let fedora = Fedora::from_config(&config.fedora)?;
    let pid = Pid::new(pid)?;

    fedora.update_index(&pid).await?;
    println!("reindexed {pid}");

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("wrote default config to {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let rendered =
        toml::to_string_pretty(&config).map_err(|e| eyre!("cannot render config: {e}"))?;
    println!("{rendered}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, aip_uuid: &str, name: &str) {
        self.spinner.set_message(format!("[{aip_uuid}] {name}"));
    }

    fn pair_done(&self, aip_uuid: &str, pid: &Pid, parts: usize) {
        self.spinner
            .println(format!("  {aip_uuid} → {pid} ({parts} part(s))"));
    }

    fn pair_skipped(&self, aip_uuid: &str, reason: &str) {
        self.spinner.println(format!("  {aip_uuid} skipped: {reason}"));
    }
}
