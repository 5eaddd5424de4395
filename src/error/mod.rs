mod tributary;

pub use tributary::{ApiErrorBody, ApiErrorObject, TributaryError};

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
