use std::fmt;

#[derive(Debug)]
pub enum ReviewError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// A symbolic id referenced by the workflow is absent from configuration.
    MissingConfiguration(String),
    /// A linked record could not be resolved by the record store.
    NotFound { id: String },
    /// The requested workflow transition is not valid for the report's current state.
    PreconditionFailed(String),
    /// Both "scored" and "unscored" were requested.
    AmbiguousFilter,
    /// The record store rejected the credentials.
    Unauthorized(String),
    /// Any other record store failure (network, HTTP, malformed response).
    Store(String),
}

impl fmt::Display for ReviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::MissingConfiguration(name) => write!(f, "missing configuration: {name}"),
            Self::NotFound { id } => write!(f, "record '{id}' not found"),
            Self::PreconditionFailed(msg) => write!(f, "{msg}"),
            Self::AmbiguousFilter => {
                write!(f, "--scored and --unscored are mutually exclusive")
            }
            Self::Unauthorized(msg) => write!(f, "record store rejected credentials: {msg}"),
            Self::Store(msg) => write!(f, "record store error: {msg}"),
        }
    }
}

impl std::error::Error for ReviewError {}
