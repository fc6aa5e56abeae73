use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    Read(String, String),
    Parse(String, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(path, e) => write!(f, "failed to read config file {path}: {e}"),
            ConfigError::Parse(path, e) => write!(f, "failed to parse config file {path}: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
