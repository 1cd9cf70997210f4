//! In-process contact store.
//!
//! Contacts are keyed by lowercased email. An update overwrites names,
//! overwrites the phone when one is given, and unions tags and lists, which
//! mirrors how FluentCRM treats a forced update.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{ContactRepository, CrmContact, CrmError};
use crate::attendee::ContactRecord;

/// Status assigned to contacts created by this store.
pub const DEFAULT_STATUS: &str = "subscribed";

/// A contact as held by [`InMemoryContactRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContact {
    pub id: u64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub tags: BTreeSet<String>,
    pub lists: BTreeSet<String>,
    pub status: String,
}

impl StoredContact {
    fn to_crm_contact(&self) -> CrmContact {
        CrmContact {
            id: self.id,
            email: self.email.clone(),
            status: self.status.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    contacts: HashMap<String, StoredContact>,
    next_id: u64,
    writes: usize,
    failure: Option<String>,
}

/// Email-keyed contact store living in process memory.
#[derive(Debug, Clone)]
pub struct InMemoryContactRepository {
    state: Arc<Mutex<MemoryState>>,
    active: Arc<AtomicBool>,
}

impl Default for InMemoryContactRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryContactRepository {
    /// Create an empty, active store.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                next_id: 1,
                ..Default::default()
            })),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Switch the store on or off.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// Make every following write fail with `message`, or stop failing.
    pub async fn set_failure(&self, message: Option<String>) {
        self.state.lock().await.failure = message;
    }

    /// Look a contact up by email, ignoring case.
    pub async fn get(&self, email: &str) -> Option<StoredContact> {
        self.state
            .lock()
            .await
            .contacts
            .get(&normalize_email(email))
            .cloned()
    }

    /// Number of distinct contacts.
    pub async fn len(&self) -> usize {
        self.state.lock().await.contacts.len()
    }

    /// Whether the store holds no contacts.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of successful create-or-update calls.
    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes
    }
}

#[async_trait]
impl ContactRepository for InMemoryContactRepository {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn create_or_update(&self, record: &ContactRecord) -> Result<CrmContact, CrmError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if let Some(message) = &state.failure {
            return Err(CrmError::Unavailable {
                message: message.clone(),
            });
        }

        let key = normalize_email(&record.email);
        if key.is_empty() {
            return Err(CrmError::Rejected {
                status: 422,
                message: "Email is required".to_string(),
            });
        }

        let contact = match state.contacts.get_mut(&key) {
            Some(existing) => {
                existing.first_name = record.first_name.clone();
                existing.last_name = record.last_name.clone();
                if let Some(phone) = &record.phone {
                    existing.phone = Some(phone.clone());
                }
                existing.tags.extend(record.tags.iter().flatten().cloned());
                existing.lists.extend(record.lists.iter().flatten().cloned());
                existing.to_crm_contact()
            }
            None => {
                let id = state.next_id;
                state.next_id += 1;

                let stored = StoredContact {
                    id,
                    email: key.clone(),
                    first_name: record.first_name.clone(),
                    last_name: record.last_name.clone(),
                    phone: record.phone.clone(),
                    tags: record.tags.iter().flatten().cloned().collect(),
                    lists: record.lists.iter().flatten().cloned().collect(),
                    status: DEFAULT_STATUS.to_string(),
                };
                let contact = stored.to_crm_contact();
                state.contacts.insert(key, stored);
                contact
            }
        };

        state.writes += 1;
        Ok(contact)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
