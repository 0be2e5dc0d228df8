use std::io;
use std::result::Result as StdResult;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Upstream decode error: {0}")]
    UpstreamDecode(String),
    #[error("Fund not found: {0}")]
    FundNotFound(String),
    #[error("Sink unavailable: {0}")]
    SinkUnavailable(String),
    #[error("Sink write rejected: {0}")]
    SinkWriteRejected(String),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::MalformedUrl(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl Error {
    /// Prefixes the message with the fund it was raised for, keeping the variant.
    pub fn for_fund(self, fund_name: &str) -> Self {
        match self {
            Error::UpstreamUnavailable(msg) => {
                Error::UpstreamUnavailable(format!("fundName={} {}", fund_name, msg))
            }
            Error::UpstreamDecode(msg) => {
                Error::UpstreamDecode(format!("fundName={} {}", fund_name, msg))
            }
            Error::FundNotFound(msg) => Error::FundNotFound(format!("fundName={} {}", fund_name, msg)),
            other => other,
        }
    }
}

pub type Result<T> = StdResult<T, Error>;
