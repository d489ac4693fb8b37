//! Implementation of ContactStorage trait for SQLite storage.

use noteline_storage_traits::contacts::ContactStorage;
use noteline_storage_traits::contacts::error::ContactError;
use noteline_storage_traits::contacts::types::{Contact, Promotion};
use rusqlite::{Connection, OptionalExtension, params};

use crate::{NotelineSqliteStorage, db};

#[inline]
fn into_contact_err<T>(e: T) -> ContactError
where
    T: std::error::Error,
{
    ContactError::DatabaseError(e.to_string())
}

/// Id of the contact owning `address`, excluding `except_id`
fn address_owner(
    conn: &Connection,
    address: &str,
    except_id: &str,
) -> Result<Option<String>, ContactError> {
    conn.query_row(
        "SELECT id FROM contacts WHERE mobile_address = ? AND id != ?",
        params![address, except_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(into_contact_err)
}

impl ContactStorage for NotelineSqliteStorage {
    fn save_contact(&self, contact: Contact) -> Result<(), ContactError> {
        if contact.id.is_empty() {
            return Err(ContactError::InvalidParameters(
                "Contact id must not be empty".to_string(),
            ));
        }

        self.with_connection(|conn| {
            let stored: Option<Option<String>> = conn
                .query_row(
                    "SELECT mobile_address FROM contacts WHERE id = ?",
                    [&contact.id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(into_contact_err)?;
            let address = stored.flatten().or(contact.mobile_address);

            if let Some(address) = &address
                && let Some(owner_id) = address_owner(conn, address, &contact.id)?
            {
                return Err(ContactError::AddressConflict {
                    address: address.clone(),
                    owner_id,
                });
            }

            // The stored address and counters win over whatever the caller holds
            conn.execute(
                "INSERT INTO contacts
             (id, nickname, initial_secret, mobile_address, active, network,
              outbound_counter, inbound_counter, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                nickname = excluded.nickname,
                initial_secret = excluded.initial_secret,
                mobile_address = COALESCE(contacts.mobile_address, excluded.mobile_address),
                active = excluded.active,
                network = excluded.network,
                outbound_counter = MAX(contacts.outbound_counter, excluded.outbound_counter),
                inbound_counter = MAX(
                    COALESCE(contacts.inbound_counter, excluded.inbound_counter),
                    COALESCE(excluded.inbound_counter, contacts.inbound_counter)
                )",
                params![
                    contact.id,
                    contact.nickname,
                    contact.initial_secret.as_slice(),
                    address,
                    contact.active,
                    contact.network,
                    contact.outbound_counter,
                    contact.inbound_counter,
                    contact.created_at,
                ],
            )
            .map_err(into_contact_err)?;

            Ok(())
        })
    }

    fn find_contact(&self, id: &str) -> Result<Option<Contact>, ContactError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM contacts WHERE id = ?")
                .map_err(into_contact_err)?;

            stmt.query_row([id], db::row_to_contact)
                .optional()
                .map_err(into_contact_err)
        })
    }

    fn find_contact_by_address(&self, address: &str) -> Result<Option<Contact>, ContactError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM contacts WHERE mobile_address = ?")
                .map_err(into_contact_err)?;

            stmt.query_row([address], db::row_to_contact)
                .optional()
                .map_err(into_contact_err)
        })
    }

    fn all_contacts(&self) -> Result<Vec<Contact>, ContactError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM contacts ORDER BY created_at ASC, id ASC")
                .map_err(into_contact_err)?;

            let contacts_iter = stmt
                .query_map([], db::row_to_contact)
                .map_err(into_contact_err)?;

            let mut contacts: Vec<Contact> = Vec::new();
            for contact_result in contacts_iter {
                match contact_result {
                    Ok(contact) => contacts.push(contact),
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "Failed to deserialize contact row, skipping"
                        );
                    }
                }
            }

            Ok(contacts)
        })
    }

    fn unmatched_contacts(&self, network: &str) -> Result<Vec<Contact>, ContactError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM contacts
                     WHERE network = ? AND active = 1 AND mobile_address IS NULL
                     ORDER BY created_at ASC, id ASC",
                )
                .map_err(into_contact_err)?;

            let contacts_iter = stmt
                .query_map([network], db::row_to_contact)
                .map_err(into_contact_err)?;

            contacts_iter
                .collect::<Result<Vec<_>, _>>()
                .map_err(into_contact_err)
        })
    }

    fn promote_contact(&self, id: &str, address: &str) -> Result<Promotion, ContactError> {
        self.with_connection(|conn| {
            let current: Option<Option<String>> = conn
                .query_row(
                    "SELECT mobile_address FROM contacts WHERE id = ?",
                    [id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(into_contact_err)?;

            match current {
                None => return Err(ContactError::NotFound(id.to_string())),
                Some(Some(existing)) if existing == address => {
                    return Ok(Promotion::AlreadyMatched);
                }
                Some(Some(existing)) => {
                    return Err(ContactError::AlreadyMatched {
                        id: id.to_string(),
                        address: existing,
                    });
                }
                Some(None) => {}
            }

            if let Some(owner_id) = address_owner(conn, address, id)? {
                return Err(ContactError::AddressConflict {
                    address: address.to_string(),
                    owner_id,
                });
            }

            let updated = conn
                .execute(
                    "UPDATE contacts SET mobile_address = ? WHERE id = ? AND mobile_address IS NULL",
                    params![address, id],
                )
                .map_err(into_contact_err)?;

            if updated == 0 {
                return Err(ContactError::DatabaseError(format!(
                    "Contact {id} changed during promotion"
                )));
            }

            Ok(Promotion::Promoted)
        })
    }

    fn deactivate_contact(&self, id: &str) -> Result<(), ContactError> {
        self.with_connection(|conn| {
            let updated = conn
                .execute("UPDATE contacts SET active = 0 WHERE id = ?", [id])
                .map_err(into_contact_err)?;

            if updated == 0 {
                return Err(ContactError::NotFound(id.to_string()));
            }
            Ok(())
        })
    }

    fn next_outbound_counter(&self, id: &str) -> Result<u64, ContactError> {
        self.with_connection(|conn| {
            conn.query_row(
                "UPDATE contacts SET outbound_counter = outbound_counter + 1
                 WHERE id = ?
                 RETURNING outbound_counter - 1",
                [id],
                |row| row.get::<_, u64>(0),
            )
            .optional()
            .map_err(into_contact_err)?
            .ok_or_else(|| ContactError::NotFound(id.to_string()))
        })
    }

    fn record_inbound_counter(&self, id: &str, counter: u64) -> Result<(), ContactError> {
        self.with_connection(|conn| {
            let updated = conn
                .execute(
                    "UPDATE contacts
                     SET inbound_counter = MAX(COALESCE(inbound_counter, ?1), ?1)
                     WHERE id = ?2",
                    params![counter, id],
                )
                .map_err(into_contact_err)?;

            if updated == 0 {
                return Err(ContactError::NotFound(id.to_string()));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use noteline_storage_traits::test_utils::create_test_contact;

    use super::*;

    #[test]
    fn test_secret_round_trips_as_blob() {
        let storage = NotelineSqliteStorage::new_in_memory().unwrap();
        let contact = Contact::new("bin", "binary", &[0, 159, 146, 150, 255], "testnet");
        storage.save_contact(contact).unwrap();

        let found = storage.find_contact("bin").unwrap().unwrap();
        assert_eq!(found.initial_secret.as_slice(), &[0, 159, 146, 150, 255]);
    }

    #[test]
    fn test_unique_index_rejects_direct_conflict() {
        let storage = NotelineSqliteStorage::new_in_memory().unwrap();
        storage.save_contact(create_test_contact("a")).unwrap();
        storage.save_contact(create_test_contact("b")).unwrap();
        storage.promote_contact("a", "ADDR").unwrap();

        // Bypass the pre-check to confirm the schema itself enforces uniqueness
        let result = storage.with_connection(|conn| {
            conn.execute(
                "UPDATE contacts SET mobile_address = 'ADDR' WHERE id = 'b'",
                [],
            )
        });
        assert!(result.is_err());
    }
}
