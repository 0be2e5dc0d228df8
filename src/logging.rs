use chrono::Local;
use env_logger::{Builder, Env, Target};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Installs the global logger.
///
/// Level defaults to `info` (`debug` when requested) and can be overridden with `RUST_LOG`.
/// When `log_file` is given, records are appended to it instead of stderr.
pub fn init(debug: bool, log_file: Option<&Path>) -> std::io::Result<()> {
    let default_level = if debug { LevelFilter::Debug } else { LevelFilter::Info };

    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.args()
        )
    });

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    // A logger may already be installed, e.g. by the test harness.
    let _ = builder.try_init();
    Ok(())
}
