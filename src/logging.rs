use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, LogFormat};

/// Filter directives for `config`; `RUST_LOG` wins when set.
pub fn filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(config)))
}

fn directives(config: &LogConfig) -> String {
    let level = config.level.to_ascii_lowercase();
    let mut directives = format!("{level},tower_http={level}");
    if let Some(store) = &config.store_level {
        directives.push_str(&format!(",notes_service::store={}", store.to_ascii_lowercase()));
    }
    directives
}

/// Install the global subscriber, writing to stderr. A second call keeps the
/// first subscriber.
pub fn init(config: &LogConfig) {
    let registry = tracing_subscriber::registry().with(filter(config));
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Json => registry.with(layer.json()).try_init(),
        LogFormat::Text => registry.with(layer).try_init(),
    };
    if let Err(err) = installed {
        debug!(error = %err, "subscriber already installed");
    }
}
