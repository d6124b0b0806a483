use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_ENV: &str = "TABNORM_LOG";

/// Filter directive: `$TABNORM_LOG`, else `$RUST_LOG`, else `warn` (`info` when verbose).
pub fn filter_directive<F>(verbose: bool, get_env: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    [LOG_ENV, "RUST_LOG"]
        .into_iter()
        .filter_map(|key| get_env(key))
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| if verbose { "info" } else { "warn" }.to_owned())
}

/// Install the stderr subscriber. Stdout stays reserved for JSON reports.
pub fn init(verbose: bool) {
    let directive = filter_directive(verbose, |key| std::env::var(key).ok());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
