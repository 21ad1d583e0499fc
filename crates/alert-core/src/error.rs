use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

/// Closed taxonomy of failure kinds a rule can produce.
///
/// `Config` is fatal to the rule it was raised from (construction never
/// completed); `UnsupportedMode` and `Shape` are per-call and recoverable —
/// the driver chose the wrong ingestion path or handed over malformed data.
#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum CoreReason {
    #[error("rule configuration error")]
    Config,
    #[error("unsupported ingestion mode for this rule")]
    UnsupportedMode,
    #[error("malformed ingestion data")]
    Shape,
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for CoreReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::Config => 2001,
            Self::UnsupportedMode => 2002,
            Self::Shape => 2003,
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type CoreError = StructError<CoreReason>;
pub type CoreResult<T> = Result<T, CoreError>;
