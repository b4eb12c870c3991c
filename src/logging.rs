use tracing_subscriber::EnvFilter;

/// Dependencies that are chatty at info level.
const QUIET_TARGETS: &[&str] = &["rustls", "reqwest", "hyper", "electrum_client", "lwk_wollet"];

/// Directive string for `level`, with noisy dependencies held at warn.
pub fn filter_directives(level: &str) -> String {
    let mut directives = vec![level.trim().to_lowercase()];
    directives.extend(QUIET_TARGETS.iter().map(|t| format!("{t}=warn")));
    directives.join(",")
}

/// Install the global fmt subscriber. `RUST_LOG` takes precedence over
/// `level`. Records emitted through the `log` facade are bridged in.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(level)));

    // Logs go to stderr; stdout carries the protocol.
    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
    if let Err(e) = result {
        eprintln!("logging already initialized: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_quiet_dependencies() {
        let directives = filter_directives(" DEBUG ");
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("rustls=warn"));
        assert!(directives.contains("lwk_wollet=warn"));
        EnvFilter::try_new(&directives).unwrap();
    }
}
