use env_logger::{Builder, Target};
use log::LevelFilter;
use std::io::Write;

// Resolve the log level from an explicit setting, then `RUST_LOG`,
// falling back to `info`.
pub fn resolve_level(level: Option<&str>) -> LevelFilter {
    level
        .and_then(|l| l.parse::<LevelFilter>().ok())
        .or_else(|| {
            std::env::var("RUST_LOG")
                .ok()
                .and_then(|v| v.parse::<LevelFilter>().ok())
        })
        .unwrap_or(LevelFilter::Info)
}

pub fn init_logging(level: Option<&str>) {
    Builder::new()
        .filter_level(resolve_level(level))
        .target(Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:5} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        // a second call (e.g. from tests) keeps the first logger
        .try_init()
        .ok();
}
