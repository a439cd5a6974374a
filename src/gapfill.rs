//! # Gap-Fill Decider
//!
//! Decides whether an incoming request carries identifying information the
//! resolved cluster does not yet know, and if so records it as exactly one
//! new secondary. Repeating a request the cluster already covers creates
//! nothing, which is what makes identify calls idempotent.

use crate::model::{Contact, ContactId};
use crate::store::ContactTx;
use anyhow::Result;
use tracing::debug;

/// Create at most one new secondary under `primary` if the request supplies
/// a novel email or phone. Returns the created contact, if any.
///
/// Rules, checked against a fresh post-merge cluster read:
/// 1. some member carries exactly the request's (email, phone) pair →
///    nothing new, no write;
/// 2. otherwise, if the request's email is present and unknown to the
///    cluster, or its phone is, insert one secondary carrying both request
///    fields — one row per request, not one per novel field.
pub fn apply(
    tx: &mut dyn ContactTx,
    primary: ContactId,
    email: Option<&str>,
    phone: Option<&str>,
) -> Result<Option<Contact>> {
    let cluster = tx.find_cluster(primary)?;

    if cluster.iter().any(|c| c.matches_pair(email, phone)) {
        debug!(%primary, "exact pair already known, no gap-fill");
        return Ok(None);
    }

    let has_new_email = match email {
        Some(wanted) => !cluster.iter().any(|c| c.email.as_deref() == Some(wanted)),
        None => false,
    };
    let has_new_phone = match phone {
        Some(wanted) => !cluster
            .iter()
            .any(|c| c.phone_number.as_deref() == Some(wanted)),
        None => false,
    };

    if !has_new_email && !has_new_phone {
        return Ok(None);
    }

    let created = tx.create_secondary(primary, email, phone)?;
    Ok(Some(created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::ContactTx;

    #[test]
    fn test_exact_pair_creates_nothing() {
        let mut store = MemoryStore::new();
        let p = store.create_primary(Some("a@x.com"), Some("111111")).unwrap();

        let created = apply(&mut store, p.id, Some("a@x.com"), Some("111111")).unwrap();
        assert!(created.is_none());
        assert_eq!(store.contact_count(), 1);
    }

    #[test]
    fn test_new_email_creates_one_secondary() {
        let mut store = MemoryStore::new();
        let p = store.create_primary(Some("a@x.com"), Some("111111")).unwrap();

        let created = apply(&mut store, p.id, Some("b@x.com"), Some("111111"))
            .unwrap()
            .unwrap();
        assert_eq!(created.linked_id, Some(p.id));
        assert_eq!(created.email.as_deref(), Some("b@x.com"));
        // The duplicated phone still rides along on the new row.
        assert_eq!(created.phone_number.as_deref(), Some("111111"));
        assert_eq!(store.contact_count(), 2);
    }

    #[test]
    fn test_known_fields_in_new_combination_create_nothing() {
        let mut store = MemoryStore::new();
        let p = store.create_primary(Some("a@x.com"), Some("111111")).unwrap();
        store
            .create_secondary(p.id, Some("b@x.com"), Some("222222"))
            .unwrap();

        // Both values exist somewhere in the cluster, just never together.
        let created = apply(&mut store, p.id, Some("b@x.com"), Some("111111")).unwrap();
        assert!(created.is_none());
        assert_eq!(store.contact_count(), 2);
    }

    #[test]
    fn test_absent_request_field_is_not_novel() {
        let mut store = MemoryStore::new();
        let p = store.create_primary(Some("a@x.com"), Some("111111")).unwrap();

        // Phone-only request whose phone is known: nothing to record even
        // though no member carries the exact (None, phone) pair.
        let created = apply(&mut store, p.id, None, Some("111111")).unwrap();
        assert!(created.is_none());
    }
}
