use std::{any::type_name, fs, str::FromStr};

use anyhow::{bail, Context};
use configparser::ini::Ini;

use crate::error::Error;

#[derive(Debug)]
pub struct IniLoader {
    pub ini: Ini,
}

impl IniLoader {
    pub fn new(ini_file: &str) -> anyhow::Result<Self> {
        let config_str = fs::read_to_string(ini_file)
            .map_err(Error::IoError)
            .with_context(|| format!("failed to read ini file: {}", ini_file))?;
        Self::from_str_content(&config_str)
    }

    pub fn from_str_content(config_str: &str) -> anyhow::Result<Self> {
        let mut ini = Ini::new();
        // connection strings may carry `;` and `#`, keep them in values
        let no_inline_comments: &[char] = &[];
        ini.set_inline_comment_symbols(Some(no_inline_comments));
        if let Err(e) = ini.read(config_str.to_string()) {
            bail! {Error::ConfigError(format!("failed to read content as ini: {}", e))}
        }
        Ok(Self { ini })
    }

    pub fn get_required<T>(&self, section: &str, key: &str) -> anyhow::Result<T>
    where
        T: FromStr,
    {
        match self.get_raw(section, key) {
            Some(value) => Self::parse_value(section, key, &value),
            None => bail! {Error::ConfigError(format!(
                "config [{}].{} does not exist or is empty",
                section, key
            ))},
        }
    }

    pub fn get_optional<T>(&self, section: &str, key: &str) -> anyhow::Result<T>
    where
        T: Default + FromStr,
    {
        self.get_with_default(section, key, T::default())
    }

    pub fn get_with_default<T>(&self, section: &str, key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
    {
        match self.get_raw(section, key) {
            Some(value) => Self::parse_value(section, key, &value),
            None => Ok(default),
        }
    }

    fn get_raw(&self, section: &str, key: &str) -> Option<String> {
        self.ini
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_value<T>(section: &str, key: &str, value: &str) -> anyhow::Result<T>
    where
        T: FromStr,
    {
        match value.parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => bail! {Error::ConfigError(format!(
                "config [{}].{}={}, can not be parsed as {}",
                section,
                key,
                value,
                type_name::<T>(),
            ))},
        }
    }
}
