use thiserror::Error;

/// Errors raised by the nullable entry points of the context store.
///
/// Every other operation is total over thread-local memory and cannot fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum MdcError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

pub type Result<T, E = MdcError> = std::result::Result<T, E>;
