//! Account and group models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Patient,
    Staff,
    Admin,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Patient => "patient",
            AccountType::Staff => "staff",
            AccountType::Admin => "admin",
        }
    }

    /// Unknown values fall back to `Patient`.
    pub fn from_raw(value: &str) -> Self {
        match value {
            "staff" => AccountType::Staff,
            "admin" => AccountType::Admin,
            _ => AccountType::Patient,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    /// Row id, `None` until stored.
    pub id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    /// Medical record number.
    pub mrn: String,
    pub account_type: AccountType,
    pub auth_token: Option<String>,
    pub groups: Vec<Group>,
}

impl UserAccount {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
