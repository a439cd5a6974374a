//! # Cluster Resolver
//!
//! Turns a raw partial-match list into the set of primary contacts it
//! touches and selects the one true primary. Read-only: the merge executor
//! applies the outcome.

use crate::model::{Contact, ContactId};
use crate::store::{ContactTx, StoreError};
use anyhow::{Context, Result};
use std::collections::BTreeMap;

/// Outcome of cluster resolution over one match list.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The canonical primary: earliest creation time, lowest id on ties.
    pub true_primary: Contact,
    /// Losing primary candidates, in id order; the merge executor demotes
    /// these under the true primary.
    pub demoted: Vec<Contact>,
}

/// Resolve the primaries touched by `matches` and pick the true primary.
///
/// Matches that are themselves primaries are candidates directly;
/// secondaries contribute their current primary, resolved via
/// [`ContactTx::find_by_id`]. A secondary whose link resolves to nothing is
/// an invariant violation and aborts the call.
///
/// The zero-match case never reaches this function: the identify flow
/// short-circuits it into primary creation.
pub fn resolve(tx: &mut dyn ContactTx, matches: &[Contact]) -> Result<Resolution> {
    let mut candidates: BTreeMap<ContactId, Contact> = BTreeMap::new();

    for contact in matches {
        match contact.linked_id {
            None => {
                candidates.insert(contact.id, contact.clone());
            }
            Some(linked) => {
                let parent = tx.find_by_id(linked)?.ok_or(StoreError::BrokenLink {
                    secondary: contact.id,
                    linked,
                })?;
                candidates.insert(parent.id, parent);
            }
        }
    }

    let true_primary = oldest(&candidates)
        .cloned()
        .context("no primary candidates for a non-empty match set")?;

    let demoted = candidates
        .into_values()
        .filter(|c| c.id != true_primary.id)
        .collect();

    Ok(Resolution {
        true_primary,
        demoted,
    })
}

/// Earliest `created_at_ms` wins; equal timestamps fall back to the lowest
/// id, which is exact creation order since ids are assigned monotonically.
fn oldest(candidates: &BTreeMap<ContactId, Contact>) -> Option<&Contact> {
    candidates.values().min_by_key(|c| (c.created_at_ms, c.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::model::LinkPrecedence;

    fn primary_at(id: i64, created_at_ms: i64) -> Contact {
        Contact {
            id: ContactId(id),
            email: None,
            phone_number: None,
            linked_id: None,
            link_precedence: LinkPrecedence::Primary,
            created_at_ms,
            updated_at_ms: created_at_ms,
            deleted_at_ms: None,
        }
    }

    #[test]
    fn test_oldest_prefers_earliest_creation() {
        let mut candidates = BTreeMap::new();
        candidates.insert(ContactId(5), primary_at(5, 100));
        candidates.insert(ContactId(2), primary_at(2, 300));

        assert_eq!(oldest(&candidates).map(|c| c.id), Some(ContactId(5)));
    }

    #[test]
    fn test_oldest_breaks_timestamp_ties_by_lowest_id() {
        let mut candidates = BTreeMap::new();
        candidates.insert(ContactId(9), primary_at(9, 100));
        candidates.insert(ContactId(3), primary_at(3, 100));
        candidates.insert(ContactId(7), primary_at(7, 100));

        assert_eq!(oldest(&candidates).map(|c| c.id), Some(ContactId(3)));
    }

    #[test]
    fn test_resolve_dedups_candidates_across_secondaries() {
        let mut store = MemoryStore::new();
        let primary = store.create_primary(Some("a@x.com"), None).unwrap();
        let s1 = store
            .create_secondary(primary.id, Some("b@x.com"), None)
            .unwrap();
        let s2 = store
            .create_secondary(primary.id, None, Some("111111"))
            .unwrap();

        // Both secondaries and the primary itself matched: one candidate.
        let matches = vec![primary.clone(), s1, s2];
        let resolution = resolve(&mut store, &matches).unwrap();
        assert_eq!(resolution.true_primary.id, primary.id);
        assert!(resolution.demoted.is_empty());
    }

    #[test]
    fn test_resolve_two_clusters_oldest_wins() {
        let mut store = MemoryStore::new();
        let a = store.create_primary(Some("a@x.com"), Some("111111")).unwrap();
        let b = store.create_primary(Some("b@x.com"), Some("222222")).unwrap();

        let matches = vec![b.clone(), a.clone()];
        let resolution = resolve(&mut store, &matches).unwrap();
        assert_eq!(resolution.true_primary.id, a.id);
        assert_eq!(resolution.demoted.len(), 1);
        assert_eq!(resolution.demoted[0].id, b.id);
    }

    #[test]
    fn test_resolve_broken_link_is_an_error() {
        let mut store = MemoryStore::new();
        let orphan = Contact {
            id: ContactId(10),
            email: Some("x@x.com".to_string()),
            phone_number: None,
            linked_id: Some(ContactId(404)),
            link_precedence: LinkPrecedence::Secondary,
            created_at_ms: 100,
            updated_at_ms: 100,
            deleted_at_ms: None,
        };

        let err = resolve(&mut store, &[orphan]).unwrap_err();
        let store_err = err.downcast::<StoreError>().unwrap();
        assert!(matches!(
            store_err,
            StoreError::BrokenLink {
                secondary: ContactId(10),
                linked: ContactId(404),
            }
        ));
    }
}
