use anyhow::Result;
use std::{
    fs::{create_dir_all, OpenOptions},
    path::Path,
};

/// Log to stderr at `info` by default, or to `log_file` at `debug`.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let Some(log_path) = log_file else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_secs()
            .init();
        return Ok(());
    };

    if let Some(parent) = log_path.parent() {
        create_dir_all(parent)?;
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter_level(log::LevelFilter::Debug)
        .format_timestamp_millis()
        .init();

    Ok(())
}
