//! Mapping of Eventbrite attendee data onto a CRM contact.

use serde::Serialize;

use crate::error::SyncError;
use crate::fetcher::EventPayload;
use crate::settings::ContactDefaults;

/// Contact fields handed to the CRM for a create-or-update.
///
/// `email` is the natural key. Optional fields are `None` rather than empty
/// so that an upsert never overwrites existing CRM data with blanks; they
/// are left out of the serialized form entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactRecord {
    pub email: String,
    pub first_name: String,
    pub last_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lists: Option<Vec<String>>,
}

impl ContactRecord {
    /// Create a record with only the identifying fields set.
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone: None,
            tags: None,
            lists: None,
        }
    }

    /// Set the phone number unless it is empty.
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = non_empty(phone.into());
        self
    }

    /// Set the tags unless there are none.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = non_empty_list(tags);
        self
    }

    /// Set the lists unless there are none.
    pub fn with_lists(mut self, lists: Vec<String>) -> Self {
        self.lists = non_empty_list(lists);
        self
    }
}

/// Build the contact for an attendee payload.
///
/// # Errors
///
/// Returns [`SyncError::NoEmail`] when `profile.email` is missing or empty.
/// No partial record is ever produced.
pub fn map_attendee(
    payload: &EventPayload,
    defaults: &ContactDefaults,
) -> Result<ContactRecord, SyncError> {
    let email = payload
        .profile_str("email")
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .ok_or(SyncError::NoEmail)?;

    let first_name = payload.profile_str("first_name").unwrap_or_default();
    let last_name = payload.profile_str("last_name").unwrap_or_default();

    let mut record = ContactRecord::new(email, first_name, last_name)
        .with_tags(defaults.tags.clone())
        .with_lists(defaults.lists.clone());

    if let Some(phone) = payload.profile_str("cell_phone") {
        record = record.with_phone(phone);
    }

    Ok(record)
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn non_empty_list(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

#[cfg(test)]
#[path = "attendee_tests.rs"]
mod tests;
