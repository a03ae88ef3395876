//! Config command handler.

use super::ConfigAction;
use posturelog::config::PostureConfig;

/// Config command.
pub fn cmd_config(config: &PostureConfig, action: &ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("# Effective configuration (defaults, file, then environment)");
            print!("{}", toml::to_string_pretty(&config.to_config_file())?);
        },
        ConfigAction::Path => {
            if let Ok(path) = std::env::var("POSTURELOG_CONFIG_PATH") {
                println!("{path} (POSTURELOG_CONFIG_PATH)");
            }
            if let Some(dirs) = directories::BaseDirs::new() {
                println!("{}", dirs.config_dir().join("posturelog").join("config.toml").display());
                println!(
                    "{}",
                    dirs.home_dir()
                        .join(".config")
                        .join("posturelog")
                        .join("config.toml")
                        .display()
                );
            }
            println!("database: {}", config.database_path().display());
        },
    }
    Ok(())
}
