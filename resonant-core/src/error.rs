use thiserror::Error;

/// Error kinds surfaced to callers of the runtime (spec §7).
///
/// The mix thread never constructs or propagates these directly while
/// holding the mixer critical section — conditions noticed there are
/// recorded and reported once the section is released.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("out of memory")]
    OutOfMemory,

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, Error>;
