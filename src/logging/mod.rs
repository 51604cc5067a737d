//! Tracing subscriber setup
//!
//! `RUST_LOG` wins when set; otherwise the crate logs at the configured level
//! and dependencies at `info`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub fn default_directive(log_level: &str) -> String {
    format!("grievance_portal={},info", log_level.trim().to_ascii_lowercase())
}

/// Install the global subscriber (text or JSON lines)
pub fn init(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
