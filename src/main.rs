//! xray-sync CLI - push test-run results to Jira XRAY.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use xray_sync::collector::{MetadataSources, PluginOptions, SettingsFile, XrayPlugin};
use xray_sync::config::{CliOptions, ConfigResolver, IniOptions, SyncSettings, options as opt};
use xray_sync::publisher;
use xray_sync::session::{print_summary, run_session};

#[derive(Parser)]
#[command(name = "xray-sync")]
#[command(about = "Push test-run results to Jira XRAY", long_about = None)]
#[command(version)]
struct Cli {
    /// Project defaults file (flat [xray] table)
    #[arg(short, long, default_value = "xray-sync.toml", global = true)]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    options: SyncOptions,

    #[command(subcommand)]
    command: Commands,
}

/// Options a test runner would accept on its own command line.
#[derive(Args)]
struct SyncOptions {
    /// Enable synchronization with XRAY
    #[arg(long = "xray-sync", global = true)]
    enable: bool,

    /// Path to the config file containing information about the XRAY server
    #[arg(long = "xr_config", global = true)]
    config: Option<String>,

    /// Username for XRAY authentication
    #[arg(long = "xr_username", global = true)]
    username: Option<String>,

    /// Password for XRAY authentication
    #[arg(long = "xr_password", global = true)]
    password: Option<String>,

    /// URL or hostname of the XRAY server
    #[arg(long = "xr_url", global = true)]
    url: Option<String>,

    /// XRAY server port
    #[arg(long = "xr_port", global = true)]
    port: Option<String>,

    /// XRAY connection timeout in seconds
    #[arg(long = "xr_timeout", global = true)]
    timeout: Option<String>,

    /// Push a report after each test instead of once at the end of the run [true|false]
    #[arg(long = "xr_interactive_push", global = true, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    interactive_push: Option<String>,

    /// Push the final report even if no test passed [true|false]
    #[arg(long = "xr_all_fails_allowed", global = true, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    all_fails_allowed: Option<String>,

    /// Runner options to attach to every record (option: field lines)
    #[arg(long = "xr_pytest_fields_to_push", global = true)]
    pytest_fields: Option<String>,

    /// Environment variables to attach to every record (VAR: field lines)
    #[arg(long = "xr_osenv_fields_to_push", global = true)]
    osenv_fields: Option<String>,

    /// TLS verification: true, false, or a path to a CA bundle
    #[arg(long = "xr_ssl_verification", global = true)]
    ssl_verification: Option<String>,

    /// Test plan key attached to every execution
    #[arg(long = "xr_testplan", global = true)]
    test_plan: Option<String>,

    /// Existing test execution key to update
    #[arg(long = "xr_execution_id", global = true)]
    execution_id: Option<String>,

    /// Print reports instead of sending them [true|false]
    #[arg(long = "xr_dry_run", global = true, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    dry_run: Option<String>,
}

impl SyncOptions {
    /// Converts the given options into the command-line tier.
    ///
    /// Options not given on the command line are left unset so the lower
    /// tiers can supply them. A bare `--xr_dry_run` means `true`; an explicit
    /// value such as `--xr_dry_run false` overrides the files.
    fn into_cli_options(self) -> CliOptions {
        let mut cli = CliOptions::default();
        let values = [
            (opt::CONFIG, self.config),
            (opt::USERNAME, self.username),
            (opt::PASSWORD, self.password),
            (opt::URL, self.url),
            (opt::PORT, self.port),
            (opt::TIMEOUT, self.timeout),
            (opt::PYTEST_FIELDS, self.pytest_fields),
            (opt::OSENV_FIELDS, self.osenv_fields),
            (opt::SSL_VERIFICATION, self.ssl_verification),
            (opt::TEST_PLAN, self.test_plan),
            (opt::EXECUTION_ID, self.execution_id),
            (opt::INTERACTIVE, self.interactive_push),
            (opt::ALL_FAILS_ALLOWED, self.all_fails_allowed),
            (opt::DRY_RUN, self.dry_run),
        ];
        for (name, value) in values {
            if let Some(value) = value {
                cli.set(name, value);
            }
        }

        if self.enable {
            cli.set(opt::ENABLE, "true");
        }
        cli
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Process a runner event stream and push the results
    Push {
        /// JSON-lines event file, or - for stdin
        #[arg(short, long, default_value = "-")]
        events: String,

        /// Shared settings file (JSON object) supplying extra metadata
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },

    /// Show the resolved settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let ini = IniOptions::load(&cli.project);
    let resolver = ConfigResolver::new(cli.options.into_cli_options(), ini);

    match cli.command {
        Commands::Push { events, settings } => push(resolver, &events, settings.as_deref()).await,
        Commands::Config => show_config(&resolver),
    }
}

async fn push(resolver: ConfigResolver, events: &str, settings_file: Option<&Path>) -> Result<()> {
    let settings = SyncSettings::resolve(&resolver).context("Invalid xray-sync settings")?;
    if !settings.enabled {
        info!("xray-sync is disabled (pass --xray-sync to enable it)");
        return Ok(());
    }

    let publisher = publisher::from_settings(&settings).context("Failed to set up publisher")?;

    let mut sources = MetadataSources::new(resolver, &settings);
    if let Some(path) = settings_file {
        let shared = SettingsFile::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        sources = sources.with_settings(shared);
    }

    let mut plugin = XrayPlugin::new(publisher, PluginOptions::from_settings(&settings), sources);
    println!("{}", plugin.report_header());

    let reader: Box<dyn BufRead> = if events == "-" {
        Box::new(std::io::stdin().lock())
    } else {
        let file = File::open(events).with_context(|| format!("Failed to open events file {}", events))?;
        Box::new(BufReader::new(file))
    };

    let summary = run_session(&mut plugin, reader)
        .await
        .context("Failed to process runner events")?;
    print_summary(&summary);
    Ok(())
}

fn show_config(resolver: &ConfigResolver) -> Result<()> {
    let settings = SyncSettings::resolve(resolver).context("Invalid xray-sync settings")?;

    match resolver.config_file_path() {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: none"),
    }
    println!();
    println!("Settings:");
    for (name, value) in settings.describe() {
        println!("  {:<18} {}", format!("{}:", name), console::style(value).bold());
    }
    Ok(())
}
