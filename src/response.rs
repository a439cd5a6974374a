//! # Response Builder
//!
//! Re-reads the finalized cluster and shapes it into the deterministic
//! summary callers receive. Pure with respect to store state: this module
//! performs no writes.

use crate::model::{ContactId, ContactSummary, IdentifyResponse};
use crate::store::{ContactTx, StoreError};
use anyhow::Result;
use std::collections::HashSet;

/// Build the response for the cluster anchored at `primary`.
///
/// The cluster is read fresh so every merge and gap-fill write of the
/// current transaction is reflected. Emails and phones list the primary's
/// value first, then secondaries' in creation order, first occurrence wins.
pub fn build(tx: &mut dyn ContactTx, primary: ContactId) -> Result<IdentifyResponse> {
    let cluster = tx.find_cluster(primary)?;

    let primary_row = cluster
        .iter()
        .find(|c| c.id == primary)
        .ok_or(StoreError::MissingContact(primary))?;
    let secondaries: Vec<_> = cluster.iter().filter(|c| c.id != primary).collect();

    let mut emails = Vec::new();
    let mut seen_emails = HashSet::new();
    push_unique(&mut emails, &mut seen_emails, primary_row.email.as_deref());

    let mut phone_numbers = Vec::new();
    let mut seen_phones = HashSet::new();
    push_unique(
        &mut phone_numbers,
        &mut seen_phones,
        primary_row.phone_number.as_deref(),
    );

    for contact in &secondaries {
        push_unique(&mut emails, &mut seen_emails, contact.email.as_deref());
        push_unique(
            &mut phone_numbers,
            &mut seen_phones,
            contact.phone_number.as_deref(),
        );
    }

    Ok(IdentifyResponse {
        contact: ContactSummary {
            primary_contact_id: primary,
            emails,
            phone_numbers,
            secondary_contact_ids: secondaries.iter().map(|c| c.id).collect(),
        },
    })
}

fn push_unique(values: &mut Vec<String>, seen: &mut HashSet<String>, value: Option<&str>) {
    if let Some(value) = value {
        if seen.insert(value.to_string()) {
            values.push(value.to_string());
        }
    }
}
