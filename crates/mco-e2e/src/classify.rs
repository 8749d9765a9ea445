//! Maps Kubernetes API failures onto retryable or fatal probe results.

use converge::ProbeResult;

/// True when the API server answered 404.
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}

/// Classify a failed request made while probing.
///
/// A missing object, a conflict, throttling, server-side and transport errors
/// may go away with time. Rejected or unauthorized requests and responses that
/// do not decode never will.
pub fn classify(err: &kube::Error) -> ProbeResult {
    match err {
        kube::Error::Api(response) => match response.code {
            404 | 409 | 429 => ProbeResult::retryable(err),
            code if code >= 500 => ProbeResult::retryable(err),
            400 | 401 | 403 | 405 | 410 | 422 => ProbeResult::fatal(err),
            _ => ProbeResult::retryable(err),
        },
        kube::Error::SerdeError(_) | kube::Error::Auth(_) | kube::Error::BuildRequest(_) => {
            ProbeResult::fatal(err)
        }
        _ => ProbeResult::retryable(err),
    }
}
