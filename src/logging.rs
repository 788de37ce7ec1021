use crate::config::Config;
use tracing_subscriber::{EnvFilter, fmt};

/// tracingのsubscriberを設定する。二度目以降の呼び出しは何もしない。
pub fn init(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|e| {
        eprintln!("pipesh: invalid log filter {:?}: {e}", config.log_filter);
        EnvFilter::new("warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
