use strum::{Display, EnumString};

/// Deployment environment, read from `APP_ENVIRONMENT`.
///
/// Each one has its own `config/{environment}.yaml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Production,
    /// Used by the test suite: in-memory storage, quiet logs.
    Test,
}

impl Environment {
    /// Config file base name, without extension.
    pub fn config_file(&self) -> String {
        format!("config/{self}")
    }
}
