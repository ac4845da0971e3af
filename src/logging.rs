use tracing_subscriber::EnvFilter;

/// Workspace crates whose events are shown.
const CRATE_TARGETS: &[&str] = &[
    "mixall",
    "mixall_stats",
    "mixall_components",
    "mixall_composer",
    "mixall_estimation",
    "mixall_criteria",
];

/// Installs the global subscriber on stderr, so a report printed to stdout
/// stays clean.
///
/// `-v` shows candidate and strategy summaries, `-vv` one line per
/// algorithm iteration, `-vvv` every E-step. `RUST_LOG` wins when set.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(verbosity)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn directives(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    CRATE_TARGETS
        .iter()
        .map(|t| format!("{t}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert!(directives(0).starts_with("mixall=warn,"));
        assert!(directives(2).contains("mixall_estimation=debug"));
        assert!(directives(9).ends_with("mixall_criteria=trace"));
    }
}
