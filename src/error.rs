//! Error taxonomy for the client layer

use thiserror::Error;

use crate::api::ApiError;

/// Argument errors raised by the record accessors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid argument for `{field}`: expected {expected} elements, got {actual}")]
    InvalidArgument {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("unknown camera model id {0}")]
    UnknownCameraModel(i32),
}

/// Errors returned by [`VideoClient`](crate::client::VideoClient) operations.
///
/// `Api` carries a non-success status from the native client. Those are
/// operational failures the caller may retry, not faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("video client handle has been released")]
    Closed,

    #[error("native client could not be created")]
    CreateFailed,

    #[error("url contains an interior NUL byte")]
    InvalidUrl,

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Checks that a caller-supplied slice has exactly `N` elements.
pub(crate) fn exact<T: Copy, const N: usize>(
    field: &'static str,
    value: &[T],
) -> Result<[T; N], CodecError> {
    <[T; N]>::try_from(value).map_err(|_| CodecError::InvalidArgument {
        field,
        expected: N,
        actual: value.len(),
    })
}
