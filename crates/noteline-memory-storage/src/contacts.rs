//! Memory-based storage implementation of the ContactStorage trait

use noteline_storage_traits::contacts::ContactStorage;
use noteline_storage_traits::contacts::error::ContactError;
use noteline_storage_traits::contacts::types::{Contact, Promotion};

use crate::NotelineMemoryStorage;

impl ContactStorage for NotelineMemoryStorage {
    fn save_contact(&self, mut contact: Contact) -> Result<(), ContactError> {
        if contact.id.is_empty() {
            return Err(ContactError::InvalidParameters(
                "Contact id must not be empty".to_string(),
            ));
        }

        let mut inner = self.inner.write();

        // The stored address and counters win over whatever the caller holds
        if let Some(previous) = inner.contacts.get(&contact.id) {
            if previous.mobile_address.is_some() {
                contact.mobile_address = previous.mobile_address.clone();
            }
            contact.outbound_counter = contact.outbound_counter.max(previous.outbound_counter);
            contact.inbound_counter = contact.inbound_counter.max(previous.inbound_counter);
        }

        if let Some(address) = &contact.mobile_address
            && let Some(owner_id) = inner.address_index.get(address)
            && owner_id != &contact.id
        {
            return Err(ContactError::AddressConflict {
                address: address.clone(),
                owner_id: owner_id.clone(),
            });
        }

        if let Some(address) = &contact.mobile_address {
            inner
                .address_index
                .insert(address.clone(), contact.id.clone());
        }
        inner.contacts.insert(contact.id.clone(), contact);

        Ok(())
    }

    fn find_contact(&self, id: &str) -> Result<Option<Contact>, ContactError> {
        let inner = self.inner.read();
        Ok(inner.contacts.get(id).cloned())
    }

    fn find_contact_by_address(&self, address: &str) -> Result<Option<Contact>, ContactError> {
        let inner = self.inner.read();
        Ok(inner
            .address_index
            .get(address)
            .and_then(|id| inner.contacts.get(id))
            .cloned())
    }

    fn all_contacts(&self) -> Result<Vec<Contact>, ContactError> {
        let inner = self.inner.read();
        let mut contacts: Vec<Contact> = inner.contacts.values().cloned().collect();
        contacts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(contacts)
    }

    fn unmatched_contacts(&self, network: &str) -> Result<Vec<Contact>, ContactError> {
        let mut contacts = self.all_contacts()?;
        contacts.retain(|c| c.active && !c.is_matched() && c.network == network);
        Ok(contacts)
    }

    fn promote_contact(&self, id: &str, address: &str) -> Result<Promotion, ContactError> {
        let mut inner = self.inner.write();

        let current = match inner.contacts.get(id) {
            Some(contact) => contact.mobile_address.clone(),
            None => return Err(ContactError::NotFound(id.to_string())),
        };

        match current {
            Some(existing) if existing == address => return Ok(Promotion::AlreadyMatched),
            Some(existing) => {
                return Err(ContactError::AlreadyMatched {
                    id: id.to_string(),
                    address: existing,
                });
            }
            None => {}
        }

        if let Some(owner_id) = inner.address_index.get(address) {
            return Err(ContactError::AddressConflict {
                address: address.to_string(),
                owner_id: owner_id.clone(),
            });
        }

        inner
            .address_index
            .insert(address.to_string(), id.to_string());
        if let Some(contact) = inner.contacts.get_mut(id) {
            contact.mobile_address = Some(address.to_string());
        }

        Ok(Promotion::Promoted)
    }

    fn deactivate_contact(&self, id: &str) -> Result<(), ContactError> {
        let mut inner = self.inner.write();
        match inner.contacts.get_mut(id) {
            Some(contact) => {
                contact.active = false;
                Ok(())
            }
            None => Err(ContactError::NotFound(id.to_string())),
        }
    }

    fn next_outbound_counter(&self, id: &str) -> Result<u64, ContactError> {
        let mut inner = self.inner.write();
        let contact = inner
            .contacts
            .get_mut(id)
            .ok_or_else(|| ContactError::NotFound(id.to_string()))?;

        let counter = contact.outbound_counter;
        contact.outbound_counter = counter
            .checked_add(1)
            .ok_or_else(|| ContactError::InvalidParameters("Outbound counter exhausted".into()))?;
        Ok(counter)
    }

    fn record_inbound_counter(&self, id: &str, counter: u64) -> Result<(), ContactError> {
        let mut inner = self.inner.write();
        let contact = inner
            .contacts
            .get_mut(id)
            .ok_or_else(|| ContactError::NotFound(id.to_string()))?;

        contact.inbound_counter = contact.inbound_counter.max(Some(counter));
        Ok(())
    }
}
