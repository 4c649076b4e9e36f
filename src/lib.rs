//! xray-sync: push test-run results to Jira XRAY test executions.
//!
//! The test runner reports its lifecycle as a stream of events. Tests
//! marked `xray("PROJ-123")` are turned into records, converted into XRAY
//! execution reports and posted to the XRAY import endpoint, either once at
//! the end of the run or after every test.
//!
//! # Architecture
//!
//! The main components are:
//!
//! - **Config**: Resolve options from the CLI, the project file and an
//!   external sectioned config file
//! - **Events**: Read the runner's JSON-lines event stream
//! - **Collector**: Track marked tests, build records and decide when to push
//! - **Report**: The XRAY report model and its wire form
//! - **Publisher**: Send reports to XRAY (or print them in dry runs)
//!
//! # Example
//!
//! ```no_run
//! use xray_sync::collector::{MetadataSources, PluginOptions, XrayPlugin};
//! use xray_sync::config::{CliOptions, ConfigResolver, IniOptions, SyncSettings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ini = IniOptions::load(std::path::Path::new("xray-sync.toml"));
//!     let resolver = ConfigResolver::new(CliOptions::default(), ini);
//!     let settings = SyncSettings::resolve(&resolver)?;
//!
//!     let publisher = xray_sync::publisher::from_settings(&settings)?;
//!     let sources = MetadataSources::new(resolver, &settings);
//!     let mut plugin = XrayPlugin::new(publisher, PluginOptions::from_settings(&settings), sources);
//!
//!     let events = std::io::stdin().lock();
//!     let summary = xray_sync::session::run_session(&mut plugin, events).await?;
//!     xray_sync::session::print_summary(&summary);
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod events;
pub mod publisher;
pub mod report;
pub mod session;

pub use collector::{PluginOptions, SyncSummary, XrayPlugin};
pub use config::{ConfigResolver, SyncSettings};
pub use publisher::Publisher;
pub use report::{Batch, Case, Status};
