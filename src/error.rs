use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration file {0} is missing the [{1}] section")]
    MissingSection(String, &'static str),

    #[error("missing option \"{0}\" in [{1}] section of {2}")]
    MissingOption(&'static str, &'static str, String),

    #[error("option {0} in section [{1}] of {2} must be an integer")]
    NotAnInteger(&'static str, &'static str, String),

    #[error("unknown option \"{0}\" in [{1}] section of {2}")]
    UnknownOption(String, &'static str, String),

    #[error("could not read configuration file {0}")]
    ConfigNotFound(String),

    #[error("malformed secret: {0}")]
    MalformedSecret(String),

    #[error("corrupt store entry: {0}")]
    CorruptEntry(String),

    #[error("storage backend error: {0}")]
    Storage(String),

    #[error("connection failure: {0}")]
    Connection(String),

    #[error("operation timed out")]
    Timeout,

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("log error: {0}")]
    Log(#[from] log::SetLoggerError),
}
