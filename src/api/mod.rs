mod client;
mod error;

pub use client::{parse_login_body, ApiClient, ApiClientBuilder, DEFAULT_BASE_URL};
pub use error::ApiError;

#[cfg(test)]
pub(crate) use client::tests as test_support;
