use thiserror::Error;

/// Why a lookup did not produce a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupFailure {
    /// Network error, non-2xx status or an unreadable response body.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The API rejected the submitted captcha answer.
    #[error("captcha rejected: {0}")]
    CaptchaRejected(String),

    /// Any other semantic rejection (record not found, rate limited, ...).
    #[error("api failure: {0}")]
    OtherApi(String),

    /// The resolver produced no answer for the challenge image.
    #[error("no captcha answer: {0}")]
    Resolver(String),

    /// The interactive operator aborted the current query.
    #[error("operator cancelled")]
    OperatorCancelled,

    /// The attempt budget ran out without a success.
    #[error("gave up after {attempts} attempts{}", last_suffix(.last))]
    Exhausted {
        attempts: u32,
        last: Option<Box<LookupFailure>>,
    },
}

fn last_suffix(last: &Option<Box<LookupFailure>>) -> String {
    match last {
        Some(failure) => format!(" (last: {failure})"),
        None => String::new(),
    }
}
