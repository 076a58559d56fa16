//! # Customer Records
//!
//! The data model shared by the record store, the anchoring protocol and the
//! HTTP API.
//!
//! ```text
//! fields.rs — CustomerFields / CustomerDraft, validation, content hash
//! ```
//!
//! A [`CustomerRecord`] is exactly the document persisted per customer:
//! `{id, fields: {name,address,phone,email,dob,gender,country}, hash}`.

pub mod fields;

use serde::{Deserialize, Serialize};

pub use fields::{CustomerDraft, CustomerFields, FieldError, FIELD_NAMES};

/// One stored customer document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// Store-assigned identifier, immutable after creation.
    pub id: String,
    /// Current attribute values.
    pub fields: CustomerFields,
    /// Content hash of `fields` at the moment of the last write.
    pub hash: String,
}

impl CustomerRecord {
    /// Builds a record whose hash is derived from `fields`, so the two can
    /// never disagree at construction time.
    pub fn new(id: impl Into<String>, fields: CustomerFields) -> Self {
        let hash = fields.content_hash();
        Self {
            id: id.into(),
            fields,
            hash,
        }
    }

    /// `true` if the stored hash still matches the stored fields.
    pub fn is_consistent(&self) -> bool {
        self.fields.content_hash() == self.hash
    }
}
