use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use salesheet_tools::config::SyncConfig;
use salesheet_tools::io::records::JsonRecordSource;
use salesheet_tools::io::store::Spreadsheet;
use salesheet_tools::io::workbook::{XlsxSpreadsheet, create_workbook};
use salesheet_tools::model::DocumentKind;
use salesheet_tools::project::Schema;
use salesheet_tools::sync::{SyncReport, sync_from_source};
use salesheet_tools::{Result, ToolError};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| ToolError::Logging(err.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Sync(args) => execute_sync(args),
        Command::Init(args) => execute_init(args),
    }
}

fn load_config(path: &Path, spreadsheet: Option<&PathBuf>) -> Result<SyncConfig> {
    let mut config = SyncConfig::from_path(path)?;
    if let Some(spreadsheet) = spreadsheet {
        config.spreadsheet = spreadsheet.display().to_string();
        config.validate()?;
    }
    Ok(config)
}

fn execute_sync(args: SyncArgs) -> Result<()> {
    let config = load_config(&args.config, args.spreadsheet.as_ref())?;
    let source = JsonRecordSource::from_path(&args.records)?;
    let rates = config.rate_table();
    let kind = DocumentKind::from(args.kind);

    let workbook = XlsxSpreadsheet::open(Path::new(&config.spreadsheet))?;
    let report = if args.dry_run {
        info!("dry run, the workbook will not be saved");
        let mut store = workbook.into_memory();
        sync_from_source(&source, kind, &config, &rates, &mut store)?
    } else {
        let mut store = workbook;
        let report = sync_from_source(&source, kind, &config, &rates, &mut store)?;
        info!(location = store.location(), "workbook updated");
        report
    };

    print_report(&report, args.json)
}

fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}

fn execute_init(args: InitArgs) -> Result<()> {
    let config = load_config(&args.config, args.spreadsheet.as_ref())?;
    let path = PathBuf::from(&config.spreadsheet);

    let mut worksheets: Vec<(&str, &Schema)> = vec![
        (config.order_worksheet.as_str(), &Schema::ORDER),
        (config.invoice_worksheet.as_str(), &Schema::INVOICE),
    ];
    let order_mapping = config.mapping_for(DocumentKind::Order);
    let invoice_mapping = config.mapping_for(DocumentKind::Invoice);
    worksheets.extend(order_mapping.worksheets().into_iter().map(|name| (name, &Schema::ORDER)));
    worksheets.extend(invoice_mapping.worksheets().into_iter().map(|name| (name, &Schema::INVOICE)));

    create_workbook(&path, &worksheets)?;
    println!("created {}", path.display());
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Push sale orders and invoices into a spreadsheet, replacing rows already present."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synchronise records of one kind into the spreadsheet.
    Sync(SyncArgs),
    /// Create a workbook with the configured worksheets and their headers.
    Init(InitArgs),
}

#[derive(clap::Args)]
struct SyncArgs {
    /// Kind of record to synchronise.
    #[arg(long, value_enum)]
    kind: KindArg,

    /// JSON export of the source records.
    #[arg(long)]
    records: PathBuf,

    /// JSON configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Overrides the configured spreadsheet path.
    #[arg(long)]
    spreadsheet: Option<PathBuf>,

    /// Reconcile in memory without saving the workbook.
    #[arg(long)]
    dry_run: bool,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct InitArgs {
    /// JSON configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Overrides the configured spreadsheet path.
    #[arg(long)]
    spreadsheet: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum KindArg {
    Orders,
    Invoices,
}

impl From<KindArg> for DocumentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Orders => DocumentKind::Order,
            KindArg::Invoices => DocumentKind::Invoice,
        }
    }
}
