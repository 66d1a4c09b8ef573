mod captcha;
mod client;
mod config;
mod header_profile;
mod outcome;
mod transport;

pub use captcha::decode_inline_image;
pub use client::{ClientError, JagaClient};
pub use config::normalize_base_url;
pub use header_profile::{build_jaga_headers, JagaHeaderInput};
pub use outcome::{classify_detail_response, is_captcha_rejection};
