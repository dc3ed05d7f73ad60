//! Maps downstream failures onto the error kinds surfaced to callers.

use error_handling::{Error, ErrorKind};

use crate::downstream::DownstreamFailure;

/// Total, side-effect-free mapping from a downstream failure to an error kind
pub fn classify(failure: &DownstreamFailure) -> ErrorKind {
    match failure {
        DownstreamFailure::NotFound(_) => ErrorKind::NotFound,
        DownstreamFailure::InvalidInput(_) => ErrorKind::InvalidInput,
        DownstreamFailure::CircuitOpen { .. }
        | DownstreamFailure::RetriesExhausted { .. }
        | DownstreamFailure::BulkheadClosed { .. }
        | DownstreamFailure::Timeout(_) => ErrorKind::ServiceUnavailable,
        DownstreamFailure::Other(_) => ErrorKind::Internal,
    }
}

/// Wraps a failure into an [`Error`] carrying its kind, the request path and
/// the original failure message
pub fn classify_failure(failure: &DownstreamFailure, path: &str) -> Error {
    Error::new(classify(failure), failure.to_string())
        .path(path)
        .cause(failure.clone())
}
