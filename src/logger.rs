use env_logger::{Builder, Env};
use std::io::Write;

/// `RUST_LOG` wins over the configured level when set.
pub fn start_log(level: &str) {
    let mut builder = Builder::from_env(Env::default().default_filter_or(level));
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{}: {}: {}: {}",
                buf.timestamp(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
