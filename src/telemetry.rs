use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

static INIT: OnceLock<()> = OnceLock::new();

/// Install a fmt subscriber driven by RUST_LOG.
///
/// Intended for binaries and test harnesses; libraries embedding this crate
/// normally bring their own subscriber. Safe to call more than once.
pub fn init_tracing() {
    let _ = INIT.get_or_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::registry()
            .with(fmt::layer())
            .with(env_filter)
            .try_init();
    });
}
