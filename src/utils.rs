use std::{
    env, fs,
    io::{self, Write},
    path::PathBuf,
};

use chrono::Utc;
use env_logger::Builder;
use log::LevelFilter;

use crate::HOME;

pub fn init_logger(debug: bool, systemd: bool) {
    let mut builder = Builder::new();

    if systemd {
        builder.format(|formatter, record| {
            writeln!(formatter, "[{}]: {}", record.level(), record.args())
        });
    } else {
        builder.format(|formatter, record| {
            writeln!(
                formatter,
                "{} [{}] ({}): {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S %z"),
                record.level(),
                record.target(),
                record.args()
            )
        });
    }

    if let Ok(var) = env::var("RUST_LOG") {
        builder.parse_filters(&var);
    } else if debug {
        builder.filter(None, LevelFilter::Debug);
    } else {
        // if no RUST_LOG provided, default to logging at the Info level
        builder.filter(None, LevelFilter::Info);
    }

    // Tests and benches may try to install the logger more than once.
    let _ok = builder.try_init();
}

/// The folder tournaments are saved in, falling back to the working
/// directory when the platform has no data directory.
#[must_use]
pub fn data_folder() -> PathBuf {
    dirs::data_dir().map_or_else(|| PathBuf::from("."), |dir| dir.join(HOME))
}

/// # Errors
///
/// If the folder can't be created.
pub fn create_data_folder() -> io::Result<PathBuf> {
    let folder = data_folder();
    fs::create_dir_all(&folder)?;
    Ok(folder)
}

#[must_use]
pub fn data_file(name: &str) -> PathBuf {
    data_folder().join(name)
}
