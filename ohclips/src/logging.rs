use std::io::Write;

/// Installs the global `env_logger`. `RUST_LOG` wins over `default_level`.
/// Calling it twice is harmless.
pub fn init(default_level: &str, production: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));
    if production {
        builder.format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {} {}",
                buf.timestamp_millis(),
                record.level(),
                record.target(),
                record.args()
            )
        });
    }
    if let Err(err) = builder.try_init() {
        log::debug!("logger already initialized: {err}");
    }
}
