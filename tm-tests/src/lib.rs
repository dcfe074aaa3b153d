pub mod test_config_util;
pub mod test_runner;
