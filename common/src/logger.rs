use std::fs::{create_dir_all, metadata};

use fern::{
    colors::{Color, ColoredLevelConfig},
    DateBased, Dispatch,
};

use log::LevelFilter;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error(transparent)]
    LogError(#[from] log::SetLoggerError),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// Installs the global logger.
///
/// Records go to stdout and, when `path` is set, to a daily rotated file in
/// that directory. Rayon's own chatter is capped at `Warn` since the scaler
/// runs on its pool for every frame.
pub fn init_logger(level: LevelFilter, path: Option<&str>) -> Result<(), LoggerInitError> {
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    let mut logger = Dispatch::new()
        .level(level)
        .level_for("rayon", LevelFilter::Warn)
        .level_for("rayon_core", LevelFilter::Warn)
        .chain(
            Dispatch::new()
                .format(move |out, message, record| {
                    out.finish(format_args!(
                        "{} [{}] - ({}) - {}",
                        chrono::Local::now().format("%H:%M:%S%.3f"),
                        colors.color(record.level()),
                        record.file_static().unwrap_or("*"),
                        message
                    ))
                })
                .chain(std::io::stdout()),
        );

    if let Some(path) = path {
        if metadata(path).is_err() {
            create_dir_all(path)?;
        }

        logger = logger.chain(
            Dispatch::new()
                .format(move |out, message, record| {
                    out.finish(format_args!(
                        "{} [{}] - ({}) - {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                        record.level(),
                        record.file_static().unwrap_or("*"),
                        message
                    ))
                })
                .chain(DateBased::new(path, "%Y-%m-%d-framestream.log")),
        );
    }

    logger.apply()?;
    Ok(())
}

/// Routes panics through the logger so they end up in the log file as well.
pub fn enable_panic_logger() {
    std::panic::set_hook(Box::new(|info| {
        log::error!(
            "panic: location={:?}, message={:?}",
            info.location(),
            info.payload()
                .downcast_ref::<&str>()
                .map(|it| Some(it.to_string()))
                .unwrap_or_else(|| info.payload().downcast_ref::<String>().cloned())
        );
    }));
}
