use tracing_subscriber::{prelude::*, EnvFilter, Registry};

/// Initialize tracing, matching the teacher's compact-formatter +
/// env-filter setup.
pub async fn init() {
    let logger = tracing_subscriber::fmt::layer().compact();
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    let collector = Registry::default().with(logger).with(env_filter);

    tracing::subscriber::set_global_default(collector).unwrap();
}
