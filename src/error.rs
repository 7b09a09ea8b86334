/// Failures from the campaign API client.
///
/// Everything here is treated as transient by the poll loop: the detector
/// that hit it is abandoned for this cycle and retried on the next one.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {endpoint}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
    },
    #[error("unauthorized on {0} (access token expired? run `setup-account --refresh`)")]
    Unauthorized(String),
    #[error("malformed response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),
}
