//! Customer fields, their validation, and the content hash derived from them.
//!
//! The content hash is `sha256_hex` of the compact JSON object
//!
//! ```text
//! {"name":…,"address":…,"phone":…,"email":…,"dob":…,"gender":…,"country":…}
//! ```
//!
//! Key order is the struct's declaration order, never the order a client
//! happened to send, so two writes of the same values always anchor the
//! same digest.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::sha256_hex;

/// Field names in canonical order.
pub const FIELD_NAMES: [&str; 7] = [
    "name", "address", "phone", "email", "dob", "gender", "country",
];

/// A required field was absent or empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required parameters: {}", .missing.join(", "))]
pub struct FieldError {
    /// Names of the offending fields, in canonical order.
    pub missing: Vec<&'static str>,
}

/// The validated attributes of a customer. Every field is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerFields {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub dob: String,
    pub gender: String,
    pub country: String,
}

impl CustomerFields {
    /// Canonical serialization hashed into the content hash.
    pub fn canonical_json(&self) -> String {
        // Serializing a struct of plain strings cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Deterministic SHA-256 content hash, lowercase hex.
    pub fn content_hash(&self) -> String {
        sha256_hex(self.canonical_json().as_bytes())
    }
}

/// Unvalidated customer fields as they arrive over the wire.
///
/// Every attribute is optional here; [`CustomerDraft::validate`] turns it
/// into [`CustomerFields`] or reports which fields are missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDraft {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub dob: Option<String>,
    pub gender: Option<String>,
    pub country: Option<String>,
}

impl CustomerDraft {
    /// Require every field to be present and non-empty.
    pub fn validate(self) -> Result<CustomerFields, FieldError> {
        let values = [
            self.name,
            self.address,
            self.phone,
            self.email,
            self.dob,
            self.gender,
            self.country,
        ];

        let missing: Vec<&'static str> = values
            .iter()
            .zip(FIELD_NAMES)
            .filter(|(v, _)| v.as_deref().map_or(true, str::is_empty))
            .map(|(_, name)| name)
            .collect();
        if !missing.is_empty() {
            return Err(FieldError { missing });
        }

        let [name, address, phone, email, dob, gender, country] =
            values.map(Option::unwrap_or_default);
        Ok(CustomerFields {
            name,
            address,
            phone,
            email,
            dob,
            gender,
            country,
        })
    }
}

impl From<CustomerFields> for CustomerDraft {
    fn from(f: CustomerFields) -> Self {
        Self {
            name: Some(f.name),
            address: Some(f.address),
            phone: Some(f.phone),
            email: Some(f.email),
            dob: Some(f.dob),
            gender: Some(f.gender),
            country: Some(f.country),
        }
    }
}
