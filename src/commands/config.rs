use anyhow::Result;

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::{self, DscrunConfig};
use crate::ui;

pub fn run(_ctx: &Context, cmd: Option<ConfigCommand>) -> Result<()> {
    match cmd.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => show(),
        ConfigCommand::Init { force } => init(force),
        ConfigCommand::Path => {
            println!("{}", config::config_path()?.display());
            Ok(())
        }
    }
}

fn show() -> Result<()> {
    let loaded = DscrunConfig::load()?;

    ui::header("Configuration");
    match &loaded.source {
        Some(path) => ui::kv("Source", &path.display().to_string()),
        None => {
            ui::kv("Source", "built-in defaults");
            ui::dim(&format!(
                "No {} found at {}",
                config::CONFIG_FILE,
                config::config_path()?.display()
            ));
        }
    }

    ui::section("Effective settings");
    println!("{}", loaded.config.to_toml()?);
    Ok(())
}

fn init(force: bool) -> Result<()> {
    let path = config::config_path()?;
    if path.exists() && !force {
        ui::warn(&format!("{} already exists", path.display()));
        ui::dim("Use --force to overwrite it");
        return Ok(());
    }

    DscrunConfig::default().save_to(&path)?;
    ui::success(&format!("Wrote {}", path.display()));
    Ok(())
}
