//! # In-Memory Store
//!
//! Contact storage over a plain ordered map, with snapshot-based
//! transactions. Timestamps come from a logical millisecond clock that
//! ticks once per insert, so cluster seniority is reproducible under test.

use crate::model::{Contact, ContactId, LinkPrecedence};
use crate::store::{ContactStore, ContactTx, StoreError};
use anyhow::Result;
use std::collections::BTreeMap;

/// Starting point for the logical clock; any fixed epoch works, this one
/// keeps generated timestamps in a realistic range.
const CLOCK_BASE_MS: i64 = 1_700_000_000_000;

/// In-memory contact store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    contacts: BTreeMap<ContactId, Contact>,
    next_id: i64,
    clock_ms: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            contacts: BTreeMap::new(),
            next_id: 1,
            clock_ms: CLOCK_BASE_MS,
        }
    }

    /// Number of stored contacts, deleted rows included.
    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    /// All stored contacts in id (creation) order.
    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.values()
    }

    pub fn get(&self, id: ContactId) -> Option<&Contact> {
        self.contacts.get(&id)
    }

    fn tick(&mut self) -> i64 {
        self.clock_ms += 1;
        self.clock_ms
    }

    fn insert(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
        linked_id: Option<ContactId>,
    ) -> Contact {
        let id = ContactId(self.next_id);
        self.next_id += 1;
        let now = self.tick();

        let contact = Contact {
            id,
            email: email.map(str::to_string),
            phone_number: phone.map(str::to_string),
            linked_id,
            link_precedence: if linked_id.is_some() {
                LinkPrecedence::Secondary
            } else {
                LinkPrecedence::Primary
            },
            created_at_ms: now,
            updated_at_ms: now,
            deleted_at_ms: None,
        };
        self.contacts.insert(id, contact.clone());
        contact
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn by_seniority(contacts: &mut Vec<Contact>) {
    contacts.sort_by_key(|c| (c.created_at_ms, c.id));
}

impl ContactTx for MemoryStore {
    fn find_matches(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>, StoreError> {
        let mut hits: Vec<Contact> = self
            .contacts
            .values()
            .filter(|c| !c.is_deleted())
            .filter(|c| {
                let email_hit = match (email, c.email.as_deref()) {
                    (Some(wanted), Some(stored)) => wanted == stored,
                    _ => false,
                };
                let phone_hit = match (phone, c.phone_number.as_deref()) {
                    (Some(wanted), Some(stored)) => wanted == stored,
                    _ => false,
                };
                email_hit || phone_hit
            })
            .cloned()
            .collect();
        by_seniority(&mut hits);
        Ok(hits)
    }

    fn find_cluster(&mut self, primary: ContactId) -> Result<Vec<Contact>, StoreError> {
        let mut members: Vec<Contact> = self
            .contacts
            .values()
            .filter(|c| !c.is_deleted())
            .filter(|c| c.id == primary || c.linked_id == Some(primary))
            .cloned()
            .collect();
        by_seniority(&mut members);
        Ok(members)
    }

    fn create_primary(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Contact, StoreError> {
        Ok(self.insert(email, phone, None))
    }

    fn create_secondary(
        &mut self,
        primary: ContactId,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Contact, StoreError> {
        Ok(self.insert(email, phone, Some(primary)))
    }

    fn update_to_secondary(
        &mut self,
        id: ContactId,
        primary: ContactId,
    ) -> Result<(), StoreError> {
        let now = self.tick();
        let contact = self
            .contacts
            .get_mut(&id)
            .ok_or(StoreError::MissingContact(id))?;
        contact.linked_id = Some(primary);
        contact.link_precedence = LinkPrecedence::Secondary;
        contact.updated_at_ms = now;
        Ok(())
    }

    fn find_by_id(&mut self, id: ContactId) -> Result<Option<Contact>, StoreError> {
        Ok(self.contacts.get(&id).cloned())
    }
}

impl ContactStore for MemoryStore {
    fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut dyn ContactTx) -> Result<T>,
    ) -> Result<T> {
        let snapshot = self.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                *self = snapshot;
                Err(err)
            }
        }
    }
}
