//! Account DTOs as they appear on the wire.
//!
//! # Design
//! These mirror the mock-server's schema but are defined independently, so
//! the integration tests catch schema drift between the two crates. Optional
//! request fields are left out of the JSON entirely when unset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resource type sent in every account request.
pub const ACCOUNT_TYPE: &str = "accounts";

/// Envelope for account creation: the payload travels under `data`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateAccountRequest<'a> {
    pub data: &'a AccountRequest,
}

/// Account to create.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountRequest {
    pub id: Uuid,
    pub organisation_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AccountAttributesRequest>,
}

impl AccountRequest {
    pub fn new(id: Uuid, organisation_id: Uuid, attributes: AccountAttributesRequest) -> Self {
        Self {
            id,
            organisation_id,
            kind: ACCOUNT_TYPE.to_string(),
            version: None,
            attributes: Some(attributes),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountAttributesRequest {
    pub country: String,
    pub name: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_classification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_matching_opt_out: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_id_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iban: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joint_account: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_identification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switched: Option<bool>,
}

/// An account returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub organisation_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub version: i64,
    pub attributes: AccountAttributes,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountAttributes {
    pub country: String,
    #[serde(default)]
    pub name: Vec<String>,
    #[serde(default)]
    pub alternative_names: Vec<String>,
}

/// Body of a successful fetch or create.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountResponse {
    pub data: Account,
    #[serde(default)]
    pub links: Links,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Links {
    #[serde(rename = "self", default)]
    pub self_link: String,
}

/// Body of an error response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    #[serde(default)]
    pub error_message: String,
}
