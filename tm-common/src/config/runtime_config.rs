#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log4rs_file: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_dir: "./logs".into(),
            log4rs_file: "./log4rs.yaml".into(),
        }
    }
}
