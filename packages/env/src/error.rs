use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Config(#[from] serde_json::Error),
}
