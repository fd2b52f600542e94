use tracing_subscriber::EnvFilter;

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "kickmates_client=debug"
    } else {
        "kickmates_client=info"
    }
}

/// Installs the global fmt subscriber on stderr. `RUST_LOG` wins over
/// `verbose`; later calls are no-ops.
pub fn init_tracing(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
