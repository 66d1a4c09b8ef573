mod failure;
pub mod types;

pub use failure::LookupFailure;
pub use types::{
    Challenge, GatedOutcome, LookupOutcome, LookupRecord, Query, RetryBudget,
    BIRTH_DATE_FORMAT,
};
