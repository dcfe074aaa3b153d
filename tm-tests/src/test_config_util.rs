use std::fs;

use anyhow::bail;
use tm_common::{
    config::{connection_config::ConnectionConfig, ini_loader::IniLoader},
    error::Error,
};

const TEST_PROJECT: &str = "tm-tests";
const ENV_FILE: &str = ".env.ini";
const ENV_LOCAL_FILE: &str = ".env.local.ini";

pub struct TestConfigUtil {}

impl TestConfigUtil {
    pub fn get_project_root() -> anyhow::Result<String> {
        let root = project_root::get_project_root()?;
        Ok(root.to_string_lossy().to_string())
    }

    pub fn get_absolute_path(relative_path: &str) -> anyhow::Result<String> {
        Ok(format!(
            "{}/{}/tests/{}",
            Self::get_project_root()?,
            TEST_PROJECT,
            relative_path
        ))
    }

    /// Connection settings of the live server, `.env.local.ini` wins over `.env.ini`.
    pub fn load_connection_config() -> anyhow::Result<ConnectionConfig> {
        for env_file in [ENV_LOCAL_FILE, ENV_FILE] {
            let path = Self::get_absolute_path(env_file)?;
            if fs::metadata(&path).is_err() {
                continue;
            }

            let mut config = ConnectionConfig::from_loader(&IniLoader::new(&path)?)?;
            // relative to the workspace root, as in the shipped ini files
            if config.runtime.log4rs_file.starts_with("./") {
                config.runtime.log4rs_file = format!(
                    "{}/{}",
                    Self::get_project_root()?,
                    config.runtime.log4rs_file.trim_start_matches("./")
                );
            }
            return Ok(config);
        }

        bail! {Error::ConfigError(format!(
            "no {} or {} under {}/tests",
            ENV_LOCAL_FILE, ENV_FILE, TEST_PROJECT
        ))}
    }
}
