//! Names of every option xray-sync understands.

/// Prefix stripped from option names when reading the config file.
pub const PREFIX: &str = "xr_";

/// Enables syncing at all. Without it events are read and ignored.
pub const ENABLE: &str = "xray-sync";
pub const CONFIG: &str = "xr_config";
pub const USERNAME: &str = "xr_username";
pub const PASSWORD: &str = "xr_password";
pub const URL: &str = "xr_url";
pub const PORT: &str = "xr_port";
pub const TIMEOUT: &str = "xr_timeout";
pub const INTERACTIVE: &str = "xr_interactive_push";
pub const ALL_FAILS_ALLOWED: &str = "xr_all_fails_allowed";
pub const PYTEST_FIELDS: &str = "xr_pytest_fields_to_push";
pub const OSENV_FIELDS: &str = "xr_osenv_fields_to_push";
pub const SSL_VERIFICATION: &str = "xr_ssl_verification";
pub const TEST_PLAN: &str = "xr_testplan";
pub const EXECUTION_ID: &str = "xr_execution_id";
pub const DRY_RUN: &str = "xr_dry_run";

/// Every option with its help text, in the order `--help` lists them.
pub const OPTIONS: &[(&str, &str)] = &[
    (CONFIG, "Path to the config file containing information about the XRAY server"),
    (USERNAME, "Username for XRAY authentication"),
    (PASSWORD, "Password for XRAY authentication"),
    (URL, "URL or hostname of the XRAY server"),
    (PORT, "XRAY server port"),
    (TIMEOUT, "XRAY connection timeout in seconds"),
    (INTERACTIVE, "Push a report after each test instead of once at the end of the run"),
    (ALL_FAILS_ALLOWED, "Push the final report even if no test passed"),
    (PYTEST_FIELDS, "Runner options to attach to every record (option: field lines)"),
    (OSENV_FIELDS, "Environment variables to attach to every record (VAR: field lines)"),
    (SSL_VERIFICATION, "TLS verification: true, false, or a path to a CA bundle"),
    (TEST_PLAN, "Test plan key attached to every execution"),
    (EXECUTION_ID, "Existing test execution key to update"),
    (DRY_RUN, "Print reports instead of sending them"),
];
