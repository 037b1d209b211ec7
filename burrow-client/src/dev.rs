use env_logger::{Builder, Env};
use std::io::Write;

/// Installs an `env_logger` logger for examples and tests. `RUST_LOG` selects the levels, without
/// it only warnings and errors are shown. Calling it more than once is harmless.
pub fn setup_logger() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn"))
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());

            writeln!(
                buf,
                "{} {style}{:<5}{style:#} {} {}",
                buf.timestamp_millis(),
                record.level(),
                record.module_path().unwrap_or("?"),
                record.args()
            )
        })
        .try_init();
}
