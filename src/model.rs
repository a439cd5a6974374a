//! # Data Model
//!
//! Core data structures for identity reconciliation: the contact row, its
//! link precedence, and the request/response wire types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Compact identifier for contacts.
///
/// Assigned by the store on insert, monotonically increasing. Because ids
/// follow creation order, they double as the tie-breaker when two contacts
/// share a creation timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactId(pub i64);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// Whether a contact is the canonical representative of its cluster or a
/// linked member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
    Primary,
    Secondary,
}

impl LinkPrecedence {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkPrecedence::Primary => "primary",
            LinkPrecedence::Secondary => "secondary",
        }
    }
}

impl fmt::Display for LinkPrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single contact row.
///
/// A contact is a primary iff `linked_id` is absent. Secondaries always
/// reference their cluster's current primary directly (links are flattened
/// at merge time, never chained through another secondary).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    /// Optional and not unique. `None` and `Some("")` are distinct values.
    pub email: Option<String>,
    /// Optional and not unique. `None` and `Some("")` are distinct values.
    pub phone_number: Option<String>,
    /// Present iff `link_precedence` is `Secondary`; points at the primary.
    pub linked_id: Option<ContactId>,
    pub link_precedence: LinkPrecedence,
    /// Creation time in Unix-epoch milliseconds; defines cluster seniority.
    pub created_at_ms: i64,
    /// Bumped whenever `linked_id`/`link_precedence` change.
    pub updated_at_ms: i64,
    /// Soft-delete marker. All queries exclude deleted rows; the identify
    /// flow never sets it.
    pub deleted_at_ms: Option<i64>,
}

impl Contact {
    pub fn is_primary(&self) -> bool {
        self.linked_id.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at_ms.is_some()
    }

    /// Exact (email, phone) pair equality against an incoming request.
    pub fn matches_pair(&self, email: Option<&str>, phone: Option<&str>) -> bool {
        self.email.as_deref() == email && self.phone_number.as_deref() == phone
    }
}

/// Incoming identify request. At least one field must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(
        default,
        rename = "phoneNumber",
        skip_serializing_if = "Option::is_none"
    )]
    pub phone_number: Option<String>,
}

impl IdentifyRequest {
    pub fn new(email: Option<&str>, phone_number: Option<&str>) -> Self {
        Self {
            email: email.map(str::to_string),
            phone_number: phone_number.map(str::to_string),
        }
    }
}

/// Identify response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyResponse {
    pub contact: ContactSummary,
}

/// Deterministic summary of a finalized cluster.
///
/// `emails` and `phone_numbers` carry the primary's value first, then each
/// secondary's in creation order, de-duplicated (first occurrence wins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSummary {
    /// The misspelling is the wire contract; downstream consumers parse
    /// this exact field name.
    #[serde(rename = "primaryContatctId")]
    pub primary_contact_id: ContactId,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub secondary_contact_ids: Vec<ContactId>,
}
