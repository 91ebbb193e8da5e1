use std::fs;

use anyhow::{Context, Result};
use fern::{
    colors::{Color, ColoredLevelConfig},
    Dispatch,
};
use log::LevelFilter;

use crate::config::LogConfig;

// Install the global logger: colored terminal output and an optional log file
pub fn setup_logger(config: &LogConfig) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Cyan)
        .trace(Color::Magenta);

    let use_colors = !config.disable_log_color;
    let datetime_format = config.datetime_format.clone();
    let stdout = Dispatch::new()
        .format(move |out, message, record| {
            let level = if use_colors {
                colors.color(record.level()).to_string()
            } else {
                record.level().to_string()
            };
            out.finish(format_args!(
                "[{}] [{}] [{}] {}",
                chrono::Local::now().format(&datetime_format),
                level,
                record.target(),
                message
            ))
        })
        .level(LevelFilter::from(config.log_level))
        .chain(std::io::stdout());

    let mut base = Dispatch::new().chain(stdout);

    if !config.disable_file_logging {
        fs::create_dir_all(&config.logs_path)
            .with_context(|| format!("Error while creating logs directory {}", config.logs_path))?;

        let datetime_format = config.datetime_format.clone();
        let file = Dispatch::new()
            .format(move |out, message, record| {
                out.finish(format_args!(
                    "[{}] [{}] [{}] {}",
                    chrono::Local::now().format(&datetime_format),
                    record.level(),
                    record.target(),
                    message
                ))
            })
            .level(LevelFilter::from(
                config.file_log_level.unwrap_or(config.log_level),
            ));

        let file = if config.disable_file_log_date_based {
            let path = format!("{}{}", config.logs_path, config.filename_log);
            file.chain(
                fern::log_file(&path)
                    .with_context(|| format!("Error while opening log file {}", path))?,
            )
        } else {
            file.chain(fern::DateBased::new(
                &config.logs_path,
                format!("%Y-%m-%d.{}", config.filename_log),
            ))
        };

        base = base.chain(file);
    }

    // tokio internals are too verbose below info
    base.level_for("tokio", LevelFilter::Info)
        .apply()
        .context("Error while installing the logger")?;

    Ok(())
}
