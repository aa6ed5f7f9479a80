//! User records and the validation shared by the direct CRUD endpoints
//! and the natural-language dispatcher.

pub mod store;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::ValidateEmail;

use crate::errors::ApiError;

/// Upper bound for a plausible age value.
pub const MAX_AGE: u32 = 150;

/// A stored user record. `mail` is unique across the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub mail: String,
    pub age: u32,
}

/// Payload for creating a user. All fields are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub mail: String,
    pub age: u32,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::InvalidCommand(
                "field 'name' must not be blank".to_string(),
            ));
        }
        validate_mail(&self.mail)?;
        validate_age(self.age)?;
        Ok(())
    }
}

/// Partial update payload. Only the provided fields are applied; an empty
/// patch is a no-op that returns the record unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.mail.is_none() && self.age.is_none()
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ApiError::InvalidCommand(
                    "field 'name' must not be blank".to_string(),
                ));
            }
        }
        if let Some(mail) = &self.mail {
            validate_mail(mail)?;
        }
        if let Some(age) = self.age {
            validate_age(age)?;
        }
        Ok(())
    }

    /// Applies the patch to a record in place.
    pub fn apply(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(mail) = &self.mail {
            user.mail = mail.clone();
        }
        if let Some(age) = self.age {
            user.age = age;
        }
    }
}

fn validate_mail(mail: &str) -> Result<(), ApiError> {
    if !mail.validate_email() {
        return Err(ApiError::InvalidCommand(format!(
            "field 'mail' is not a valid email address: '{}'",
            mail
        )));
    }
    Ok(())
}

fn validate_age(age: u32) -> Result<(), ApiError> {
    if age > MAX_AGE {
        return Err(ApiError::InvalidCommand(format!(
            "field 'age' must be between 0 and {}",
            MAX_AGE
        )));
    }
    Ok(())
}
