//! CRM synchronisation.
//!
//! The CRM is reached only through the [`ContactRepository`] trait, injected
//! when the pipeline is built. Two implementations ship with the crate:
//!
//! - [`fluent::FluentCrmClient`] talks to the FluentCRM REST API
//! - [`memory::InMemoryContactRepository`] keeps contacts in process, for
//!   development and tests
//!
//! Merge semantics of an update (which fields are overwritten, how tags and
//! lists combine) belong to the repository, not to the pipeline.

pub mod fluent;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

use crate::attendee::ContactRecord;
use crate::error::SyncError;

pub use fluent::{FluentCrmClient, FluentCrmConfig};
pub use memory::{InMemoryContactRepository, StoredContact};

// ============================================================================
// Types
// ============================================================================

/// A contact as stored by the CRM after a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmContact {
    /// CRM-assigned identifier
    pub id: u64,
    /// Canonical email as stored by the CRM
    pub email: String,
    /// Subscription status, e.g. `subscribed` or `pending`
    pub status: String,
}

/// Outcome of a successful sync, returned to the webhook sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub contact_id: u64,
    pub email: String,
    pub status: String,
}

impl From<CrmContact> for SyncResult {
    fn from(contact: CrmContact) -> Self {
        Self {
            contact_id: contact.id,
            email: contact.email,
            status: contact.status,
        }
    }
}

/// Failures reported by a [`ContactRepository`].
#[derive(Debug, Error)]
pub enum CrmError {
    /// The CRM integration is switched off or not installed.
    #[error("FluentCRM is not active")]
    NotActive,

    /// The CRM refused the write.
    #[error("CRM rejected the contact (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The CRM could not be reached.
    #[error("CRM unavailable: {message}")]
    Unavailable { message: String },

    /// The CRM answered with something that is not a contact.
    #[error("Unexpected CRM response: {message}")]
    InvalidResponse { message: String },
}

// ============================================================================
// Repository trait
// ============================================================================

/// Create-or-update access to the CRM contact store.
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// Whether the CRM can currently accept writes.
    fn is_active(&self) -> bool;

    /// Insert the contact, or update the existing contact with the same email.
    async fn create_or_update(&self, record: &ContactRecord) -> Result<CrmContact, CrmError>;
}

// ============================================================================
// Sync client
// ============================================================================

/// Pipeline stage persisting mapped contacts.
#[derive(Clone)]
pub struct CrmSyncClient {
    repository: Arc<dyn ContactRepository>,
}

impl CrmSyncClient {
    /// Create a sync client over the given repository.
    pub fn new(repository: Arc<dyn ContactRepository>) -> Self {
        Self { repository }
    }

    /// Whether the underlying CRM can currently accept writes.
    pub fn is_active(&self) -> bool {
        self.repository.is_active()
    }

    /// Upsert a contact keyed by email.
    ///
    /// # Errors
    ///
    /// - [`SyncError::CrmNotActive`] if the repository reports itself inactive;
    ///   no write is attempted
    /// - [`SyncError::CrmSync`] for every failure of the write itself
    #[instrument(skip(self, record))]
    pub async fn sync_contact(&self, record: &ContactRecord) -> Result<SyncResult, SyncError> {
        if !self.repository.is_active() {
            error!("CRM integration is not active");
            return Err(SyncError::CrmNotActive);
        }

        let contact = self
            .repository
            .create_or_update(record)
            .await
            .map_err(|e| {
                error!(error = %e, "CRM sync failed");
                SyncError::from(e)
            })?;

        debug!(email = %contact.email, "CRM accepted contact");
        info!(contact_id = contact.id, status = %contact.status, "Contact synced to CRM");

        Ok(contact.into())
    }
}

impl std::fmt::Debug for CrmSyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrmSyncClient")
            .field("active", &self.repository.is_active())
            .finish()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
