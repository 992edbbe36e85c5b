//! catalog-harvest main entry point
//!
//! This is the command-line interface for the catalog-harvest crawler.

use anyhow::{bail, Context};
use catalog_harvest::config::{
    load_site_config_with_hash, validate_run, AccountConfig, Config, IdSource, OutputConfig,
    RunOptions,
};
use catalog_harvest::output::print_summary;
use catalog_harvest::{Coordinator, HttpFetcher, RunOutcome};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// catalog-harvest: an id-range catalog crawler
///
/// Fetches every item of a catalog by numeric id through a pool of proxies
/// and logged-in accounts, recording each item's hash and title and saving
/// the raw page.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version = "1.0.0")]
#[command(about = "An id-range catalog crawler", long_about = None)]
#[command(group(ArgGroup::new("input").required(true).args(["ids", "ids_file"])))]
struct Cli {
    /// Id range to fetch; START is included, END is not
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    ids: Option<Vec<u64>>,

    /// File with one id per line
    #[arg(long = "ids-file", value_name = "PATH")]
    ids_file: Option<PathBuf>,

    /// Folder for the raw item pages
    #[arg(long, default_value = "descr")]
    folder: PathBuf,

    /// Log of finished ids, appended to and read on resume
    #[arg(long = "ids-finished", value_name = "PATH", default_value = "finished.txt")]
    ids_finished: PathBuf,

    /// File listing the ids known to exist; unlisted ids below its maximum are skipped
    #[arg(long = "ids-ignore", value_name = "PATH")]
    ids_ignore: Option<PathBuf>,

    /// File with `username password` lines
    #[arg(long = "login-file", value_name = "PATH", default_value = "login.txt")]
    login_file: PathBuf,

    /// Connect directly instead of through proxies
    #[arg(long = "noproxy", visible_alias = "direct")]
    no_proxy: bool,

    /// Single account to use instead of the login file
    #[arg(long)]
    user: Option<String>,

    /// Password for --user
    #[arg(long, requires = "user")]
    password: Option<String>,

    /// Port of the local proxy used when no proxy file exists
    #[arg(long, default_value_t = 9150)]
    port: u16,

    /// Load and print the inputs, then exit
    #[arg(long)]
    print: bool,

    /// File with `ip port` lines
    #[arg(long = "proxy-file", value_name = "PATH", default_value = "proxy.txt")]
    proxy_file: PathBuf,

    /// Task queue size; 0 derives it from the worker count
    #[arg(long, default_value_t = 0)]
    qsize: usize,

    /// Fetch ids in random order
    #[arg(long)]
    random: bool,

    /// Skip ids already in the finished log
    #[arg(long, visible_alias = "restore")]
    resume: bool,

    /// Number of workers
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Table log of `id<TAB>hash<TAB>title` lines
    #[arg(long = "table-file", value_name = "PATH", default_value = "table.txt")]
    table_file: PathBuf,

    /// Site configuration file
    #[arg(long, value_name = "PATH", default_value = "harvest.toml")]
    config: PathBuf,

    /// Saved session cookies
    #[arg(long = "cookies-file", value_name = "PATH", default_value = "cookies.json")]
    cookies_file: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn id_source(&self) -> anyhow::Result<IdSource> {
        match (self.ids.as_deref(), &self.ids_file) {
            (Some(&[start, end]), _) => Ok(IdSource::Range { start, end }),
            (_, Some(path)) => Ok(IdSource::File(path.clone())),
            _ => bail!("either --ids START END or --ids-file is required"),
        }
    }

    fn run_options(&self) -> anyhow::Result<RunOptions> {
        Ok(RunOptions {
            ids: self.id_source()?,
            output: OutputConfig {
                folder: self.folder.clone(),
                finished_path: self.ids_finished.clone(),
                table_path: self.table_file.clone(),
                cookies_path: self.cookies_file.clone(),
            },
            ignore_ids: self.ids_ignore.clone(),
            login_file: self.login_file.clone(),
            login: self.user.clone().map(|username| AccountConfig {
                username,
                password: self.password.clone().unwrap_or_default(),
            }),
            no_proxy: self.no_proxy,
            proxy_file: self.proxy_file.clone(),
            default_proxy_port: self.port,
            print_only: self.print,
            queue_size: self.qsize,
            shuffle: self.random,
            resume: self.resume,
            workers: self.threads,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);
    tracing::info!("========== Program started ==========");

    let run = cli.run_options()?;
    validate_run(&run)?;

    tracing::info!("Loading site configuration from: {}", cli.config.display());
    let (site, hash) = load_site_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Site configuration loaded (hash: {})", hash);

    let config = Config { run, site };
    let fetcher = Arc::new(HttpFetcher::new(&config.site)?);

    let cancel = CancellationToken::new();
    watch_interrupt(cancel.clone());

    let mut coordinator = Coordinator::new(config, fetcher, cancel)?;
    let report = coordinator.run().await?;

    match report.outcome {
        RunOutcome::PrintOnly | RunOutcome::EmptyInput => {}
        _ => print_summary(&report.summary),
    }

    if report.outcome == RunOutcome::WorkersLost {
        bail!("all workers exited before the run finished");
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Cancels `cancel` on the first Ctrl-C
fn watch_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupt received, shutting down");
                cancel.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}
