use std::io::Write;

use chrono::Local;
use log::LevelFilter;

/// Installs the process logger.
///
/// `default_level` applies when `RUST_LOG` is unset or does not mention a
/// module. Calling this twice keeps the first logger.
pub fn init(default_level: &str) {
    let level = default_level.parse().unwrap_or(LevelFilter::Info);

    let result = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();

    if result.is_ok() {
        log::info!("Logging initialized at {}", level);
    }
}
