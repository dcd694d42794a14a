use anyhow::Result;
use gazelog_core::{config::get_config_path, Config};

pub fn show_config() -> Result<()> {
    let config = Config::load()?;
    print!("{}", config.to_toml()?);
    Ok(())
}

pub fn show_path() -> Result<()> {
    let path = get_config_path()?;
    let state = if path.exists() { "" } else { " (not created)" };
    println!("{}{state}", path.display());
    Ok(())
}
