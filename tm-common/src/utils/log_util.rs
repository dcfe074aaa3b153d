use std::fs;

use log4rs::config::RawConfig;

use crate::{config::runtime_config::RuntimeConfig, error::Error};

const LOG_LEVEL_PLACEHODLER: &str = "LOG_LEVEL_PLACEHODLER";
const LOG_DIR_PLACEHODLER: &str = "LOG_DIR_PLACEHODLER";

pub struct LogUtil {}

impl LogUtil {
    /// Does nothing when the log4rs file is missing, the caller keeps whatever logger it has.
    pub fn init_log4rs(runtime: &RuntimeConfig) -> anyhow::Result<()> {
        if fs::metadata(&runtime.log4rs_file).is_err() {
            return Ok(());
        }

        let config_str = fs::read_to_string(&runtime.log4rs_file).map_err(Error::IoError)?;
        let config_str = Self::render(&config_str, runtime);
        let config: RawConfig = serde_yaml::from_str(&config_str).map_err(Error::YamlError)?;
        log4rs::init_raw_config(config)?;
        Ok(())
    }

    pub fn render(config_str: &str, runtime: &RuntimeConfig) -> String {
        config_str
            .replace(LOG_DIR_PLACEHODLER, &runtime.log_dir)
            .replace(LOG_LEVEL_PLACEHODLER, &runtime.log_level)
    }
}
