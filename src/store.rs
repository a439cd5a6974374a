//! # Store Contract
//!
//! The data-access capability the reconciliation core depends on but does
//! not implement. All operations of one identify call run against the same
//! transaction: [`ContactStore::transaction`] commits when the closure
//! returns `Ok` and rolls back otherwise, so a failed call never leaves
//! partial writes behind.

use crate::model::{Contact, ContactId};
use anyhow::Result;
use thiserror::Error;

/// Errors surfaced by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient backend fault (connection loss, busy database, conflict).
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    /// A lookup an invariant depends on found nothing.
    #[error("contact {0} not found")]
    MissingContact(ContactId),
    /// A secondary's `linked_id` resolves to no row.
    #[error("secondary {secondary} links to missing contact {linked}")]
    BrokenLink {
        secondary: ContactId,
        linked: ContactId,
    },
}

/// Operations available inside one active transaction.
///
/// Missing inputs never match: `find_matches(None, Some(p))` constrains on
/// the phone alone. Callers must supply at least one field.
pub trait ContactTx {
    /// All non-deleted contacts whose email or phone equals the given
    /// values, ordered by creation time (ties broken by id).
    fn find_matches(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>, StoreError>;

    /// All non-deleted contacts where `id = primary` or
    /// `linked_id = primary`, ordered by creation time (ties broken by id).
    fn find_cluster(&mut self, primary: ContactId) -> Result<Vec<Contact>, StoreError>;

    /// Insert a new primary contact and return the stored row.
    fn create_primary(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Contact, StoreError>;

    /// Insert a new secondary linked to `primary` and return the stored row.
    fn create_secondary(
        &mut self,
        primary: ContactId,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Contact, StoreError>;

    /// Demote (or re-point) contact `id` into a secondary of `primary`,
    /// bumping its update timestamp.
    fn update_to_secondary(
        &mut self,
        id: ContactId,
        primary: ContactId,
    ) -> Result<(), StoreError>;

    /// Point lookup, used to resolve a secondary's current primary.
    fn find_by_id(&mut self, id: ContactId) -> Result<Option<Contact>, StoreError>;
}

/// A store capable of scoping work to a single atomic transaction.
pub trait ContactStore {
    /// Run `f` inside one transaction. Commits on `Ok`, rolls back on
    /// `Err`; if the commit itself fails nothing is persisted either.
    fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut dyn ContactTx) -> Result<T>,
    ) -> Result<T>;
}
