//! # Contactlink
//!
//! An identity reconciliation engine: merges contact records that share
//! partial identifying information (email, phone) into a single logical
//! cluster with one canonical primary and zero or more secondaries.
//!
//! Given an incoming (email, phone) pair it answers "who is this customer,
//! and what other contact points do we know for them?", incrementally
//! creating and merging clusters as new partial matches arrive. Each
//! identify call is one atomic unit of work: match lookup, primary
//! resolution, cluster merging, gap-fill insertion and the response read
//! all execute inside a single store transaction.

pub mod gapfill;
pub mod memory;
pub mod merge;
pub mod model;
pub mod resolver;
pub mod response;
pub mod sqlite;
pub mod store;

// Re-export main types for convenience
pub use memory::MemoryStore;
pub use model::{
    Contact, ContactId, ContactSummary, IdentifyRequest, IdentifyResponse, LinkPrecedence,
};
pub use resolver::Resolution;
pub use sqlite::{JournalMode, SqliteStore, SqliteStoreOptions};
pub use store::{ContactStore, ContactTx, StoreError};

use anyhow::Result;
use tracing::{debug, info};

/// Main API for identity reconciliation.
///
/// Owns a [`ContactStore`] and runs the whole reconciliation sequence per
/// identify call. The store is injected explicitly; there is no ambient
/// global state.
pub struct Reconciler<S: ContactStore> {
    store: S,
}

impl<S: ContactStore> Reconciler<S> {
    /// Create a reconciler over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Resolve the identity behind an (email, phone) pair.
    ///
    /// Either the full reconciliation commits and the finalized cluster
    /// summary is returned, or nothing is persisted and the error
    /// propagates. A request carrying neither field is rejected before any
    /// store work happens.
    pub fn identify(&mut self, request: &IdentifyRequest) -> Result<IdentifyResponse> {
        anyhow::ensure!(
            request.email.is_some() || request.phone_number.is_some(),
            "identify request must carry an email or a phone number"
        );
        let email = request.email.as_deref();
        let phone = request.phone_number.as_deref();

        self.store.transaction(|tx| {
            let matches = tx.find_matches(email, phone)?;
            debug!(matches = matches.len(), "partial match lookup");

            let primary = if matches.is_empty() {
                let created = tx.create_primary(email, phone)?;
                info!(id = %created.id, "created new primary contact");
                created.id
            } else {
                let resolution = resolver::resolve(tx, &matches)?;
                merge::execute(tx, &resolution)?;
                if let Some(created) =
                    gapfill::apply(tx, resolution.true_primary.id, email, phone)?
                {
                    info!(
                        id = %created.id,
                        primary = %resolution.true_primary.id,
                        "created gap-fill secondary"
                    );
                }
                resolution.true_primary.id
            };

            response::build(tx, primary)
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
