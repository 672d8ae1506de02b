use std::io::Write;

use env_logger::{Builder, Env, Target};
use jiff::{Timestamp, Zoned};
use log::debug;
use serde_json::json;

use crate::LogFormat;

/// Installs the global logger. Level comes from `RUST_LOG`, `info` by default.
///
/// A second call keeps the first logger.
pub fn init(format: LogFormat) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.target(Target::Stdout);

    match format {
        LogFormat::Console => builder.format(|buf, record| {
            let level = buf.default_styled_level(record.level());
            writeln!(
                buf,
                "{} {level} {}",
                Zoned::now().strftime("%H:%M:%S"),
                record.args()
            )
        }),
        LogFormat::Json => builder.format(|buf, record| {
            let line = json!({
                "time": Timestamp::now().to_string(),
                "level": record.level().as_str().to_lowercase(),
                "target": record.target(),
                "message": record.args().to_string(),
            });
            writeln!(buf, "{line}")
        }),
    };

    if let Err(e) = builder.try_init() {
        debug!("Keeping the installed logger: {e}");
    }
}

#[cfg(test)]
mod tests {
    use log::{Level, info};

    use super::*;

    #[test]
    fn test_second_init_keeps_first_logger() {
        init(LogFormat::Json);
        init(LogFormat::Console);
        info!("still logging");
        if std::env::var_os("RUST_LOG").is_none() {
            let error = log::Metadata::builder().level(Level::Error).build();
            assert!(log::logger().enabled(&error));
        }
    }
}
