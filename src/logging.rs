use tracing_subscriber::EnvFilter;

/// Map `-v` verbosity to an env filter; `RUST_LOG` wins when set so the
/// SSH layers can be debugged independently.
fn env_filter(verbosity: u8) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbosity {
            0 => EnvFilter::new("trinoctl=warn"),
            1 => EnvFilter::new("trinoctl=info"),
            2 => EnvFilter::new("trinoctl=debug,russh=debug"),
            _ => EnvFilter::new("trinoctl=trace,russh=trace,russh_sftp=debug"),
        }
    }
}

pub fn init_logging(verbosity: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels_build_valid_filters() {
        for verbosity in 0..4 {
            let _ = env_filter(verbosity);
        }
    }
}
