/// SQL Server refuses requests carrying more than 2100 parameters.
pub const SERVER_MAX_BIND_PARAMS: usize = 2100;
/// A single `VALUES` list accepts at most 1000 row constructors.
pub const SERVER_MAX_VALUES_ROWS: usize = 1000;

pub const DEFAULT_MAX_BIND_PARAMS: usize = 2000;
pub const DEFAULT_BULK_PARAM_NAME: &str = "@TVP";

#[derive(Clone, Debug)]
pub struct BulkConfig {
    pub max_bind_params: usize,
    pub bulk_param_name: String,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_bind_params: DEFAULT_MAX_BIND_PARAMS,
            bulk_param_name: DEFAULT_BULK_PARAM_NAME.into(),
        }
    }
}
