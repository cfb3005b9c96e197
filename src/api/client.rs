//! Client for the remote authentication endpoint.
//!
//! ## Example
//!
//! ```rust,no_run
//! use aggregator_lib::api::ApiClient;
//!
//! # async fn demo() -> Result<(), aggregator_lib::api::ApiError> {
//! let client = ApiClient::builder().base_url("https://inlyten.com").build()?;
//! let (account, groups) = client.login("jdoe", "secret").await?;
//! println!("{} ({} groups)", account.full_name(), groups.len());
//! # Ok(())
//! # }
//! ```

use chrono::NaiveDate;
use log::debug;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::models::{AccountType, Group, UserAccount};

use super::ApiError;

pub const DEFAULT_BASE_URL: &str = "https://inlyten.com";

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Authenticate against `{base_url}/auth/`. One request, no retry.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(UserAccount, Vec<Group>), ApiError> {
        let url = Url::parse(&format!("{}/auth/", self.base_url.trim_end_matches('/')))
            .map_err(|_| ApiError::InvalidUrl)?;

        let response = self
            .client
            .post(url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let body = response.bytes().await?;
        debug!("Raw login response: {}", String::from_utf8_lossy(&body));

        parse_login_body(&body)
    }
}

/// Builder for [`ApiClient`].
#[derive(Debug, Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    no_proxy: bool,
}

impl ApiClientBuilder {
    /// Set the server root (default: `https://inlyten.com`).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Ignore system proxy settings.
    pub fn no_proxy(mut self) -> Self {
        self.no_proxy = true;
        self
    }

    pub fn build(self) -> Result<ApiClient, ApiError> {
        let mut builder = Client::builder();
        if self.no_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;

        Ok(ApiClient {
            client,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResponseStatus {
    message: String,
    code: i64,
}

/// `user` and `group` stay untyped until the status code has been checked,
/// so a failed login reports the server's message even when the rest of the
/// body does not match.
#[derive(Debug, Deserialize)]
struct LoginEnvelope {
    status: ResponseStatus,
    #[serde(default)]
    user: Option<Value>,
    #[serde(default)]
    group: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    first_name: String,
    last_name: String,
    dob: String,
    mrn: i64,
    auth_token: String,
    #[serde(rename = "type")]
    account_type: String,
}

#[derive(Debug, Deserialize)]
struct GroupPayload {
    id: i64,
    name: String,
}

/// Decode a login response body into the account and its groups.
pub fn parse_login_body(body: &[u8]) -> Result<(UserAccount, Vec<Group>), ApiError> {
    let envelope: LoginEnvelope = serde_json::from_slice(body)?;

    if envelope.status.code != 200 {
        return Err(ApiError::Server(envelope.status.message));
    }

    let user = match envelope.user {
        Some(Value::Null) | None => {
            return Err(ApiError::Server("No user data in response".to_string()))
        }
        Some(user) => serde_json::from_value::<UserPayload>(user)?,
    };

    // A malformed group list is treated as no groups.
    let groups: Vec<Group> = envelope
        .group
        .and_then(|value| serde_json::from_value::<Vec<GroupPayload>>(value).ok())
        .unwrap_or_default()
        .into_iter()
        .map(|group| Group {
            id: group.id,
            name: group.name,
        })
        .collect();

    let date_of_birth = NaiveDate::parse_from_str(&user.dob, "%Y-%m-%d")
        .map_err(|err| ApiError::Decoding(format!("invalid dob '{}': {err}", user.dob)))?;

    let account = UserAccount {
        id: None,
        first_name: user.first_name,
        last_name: user.last_name,
        date_of_birth,
        mrn: user.mrn.to_string(),
        account_type: AccountType::from_raw(&user.account_type),
        auth_token: Some(user.auth_token),
        groups: groups.clone(),
    };

    Ok((account, groups))
}
