//! Runtime configuration resolved from CLI flags and environment.

use std::path::PathBuf;

use tovalley_core::chat::ChatSettings;
use tovalley_infra::sqlite::pool::{database_url_in, default_data_dir};

use crate::cli::Cli;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub database_url: String,
    pub chat: ChatSettings,
    pub bus_capacity: usize,
}

impl AppConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
        let database_url = cli
            .database_url
            .clone()
            .unwrap_or_else(|| database_url_in(&data_dir));

        Self {
            data_dir,
            database_url,
            chat: ChatSettings {
                notification_concurrency: cli.notification_concurrency,
                ..ChatSettings::default()
            },
            bus_capacity: cli.bus_capacity,
        }
    }
}
