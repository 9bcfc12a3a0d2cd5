/// User model and field validation
///
/// This module defines the User record as it is stored and returned, the
/// payloads accepted for creation and partial update, and the validation
/// that runs before either reaches the store.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name TEXT NOT NULL,
///     email TEXT NOT NULL,
///     age BIGINT CHECK (age >= 0),
///     city TEXT NOT NULL DEFAULT 'Portmore',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// CREATE UNIQUE INDEX users_email_key ON users (email);
/// ```
///
/// # Field Rules
///
/// - `name`: required, trimmed, at least 2 characters
/// - `email`: required, trimmed, lowercased, must look like `local@domain.tld`
/// - `age`: optional, must be >= 0
/// - `city`: optional, trimmed, defaults to [`DEFAULT_CITY`]
///
/// Validation reports every violated field, not just the first one.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::LazyLock;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

/// City assigned when a record does not name one
pub const DEFAULT_CITY: &str = "Portmore";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\S+@\S+\.\S+$").unwrap());

/// A persisted user record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Store-assigned identifier
    pub id: Uuid,

    /// Display name (trimmed, at least 2 characters)
    pub name: String,

    /// Email address (trimmed, lowercased, unique)
    pub email: String,

    /// Optional age, never negative
    pub age: Option<i64>,

    /// City, [`DEFAULT_CITY`] unless set
    pub city: String,

    /// When the record was created
    pub created_at: DateTime<Utc>,

    /// When the record was last written
    pub updated_at: DateTime<Utc>,
}

/// Candidate record for creation
///
/// Every field is optional at the deserialization level so that a missing
/// `name` or `email` is reported as a field-level validation message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i64>,
    pub city: Option<String>,
}

/// Candidate partial update
///
/// Only fields present in the payload are touched. `age: null` clears the
/// age and `city: null` resets the city to [`DEFAULT_CITY`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,

    #[serde(default, deserialize_with = "present")]
    pub age: Option<Option<i64>>,

    #[serde(default, deserialize_with = "present")]
    pub city: Option<Option<String>>,
}

/// A creation payload that passed validation, ready for the store
#[derive(Debug, Clone, PartialEq)]
pub struct ValidNewUser {
    pub name: String,
    pub email: String,
    pub age: Option<i64>,
    pub city: String,
}

/// A partial update that passed validation, ready for the store
///
/// `age` is `Some(None)` when the payload cleared it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<Option<i64>>,
    pub city: Option<String>,
}

impl UserPatch {
    /// Whether the patch changes nothing but `updated_at`
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.age.is_none() && self.city.is_none()
    }
}

/// A single field-level violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field that failed validation
    pub field: String,

    /// Human-readable message
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validation failure listing every violated field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Validation failed: {} errors", .0.len())]
pub struct ValidationFailure(pub Vec<FieldError>);

impl ValidationFailure {
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.0
    }
}

impl From<ValidationErrors> for ValidationFailure {
    fn from(errors: ValidationErrors) -> Self {
        ValidationFailure(
            errors
                .field_errors()
                .into_iter()
                .flat_map(|(field, errors)| {
                    errors.iter().map(move |error| {
                        FieldError::new(
                            field.to_string(),
                            error
                                .message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| "Validation failed".to_string()),
                        )
                    })
                })
                .collect(),
        )
    }
}

/// Constraints shared by creation and update
#[derive(Debug, Validate)]
struct FieldRules {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    name: Option<String>,

    #[validate(regex(path = *EMAIL_RE, message = "Please use a valid email address"))]
    email: Option<String>,

    #[validate(range(min = 0, message = "Age must be >= 0"))]
    age: Option<i64>,
}

impl FieldRules {
    fn check(self) -> Vec<FieldError> {
        match self.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => ValidationFailure::from(errors).into_errors(),
        }
    }
}

fn trimmed(value: String) -> String {
    value.trim().to_string()
}

fn normalized_email(value: String) -> String {
    value.trim().to_lowercase()
}

/// Treats a blank string the same as a missing one
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Keeps an explicit `null` distinguishable from an absent field
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn failure(mut errors: Vec<FieldError>) -> ValidationFailure {
    errors.sort_by(|a, b| a.field.cmp(&b.field));
    ValidationFailure(errors)
}

/// Normalizes and validates a creation payload
///
/// # Errors
///
/// Returns every violated field when `name` or `email` is missing, `name`
/// is shorter than 2 characters, `email` is malformed or `age` is negative.
pub fn validate_new(candidate: NewUser) -> Result<ValidNewUser, ValidationFailure> {
    let name = non_blank(candidate.name.map(trimmed));
    let email = non_blank(candidate.email.map(normalized_email));
    let city = non_blank(candidate.city.map(trimmed)).unwrap_or_else(|| DEFAULT_CITY.to_string());

    let mut errors = FieldRules {
        name: name.clone(),
        email: email.clone(),
        age: candidate.age,
    }
    .check();

    if name.is_none() {
        errors.push(FieldError::new("name", "Name is required"));
    }
    if email.is_none() {
        errors.push(FieldError::new("email", "Email is required"));
    }

    match (name, email) {
        (Some(name), Some(email)) if errors.is_empty() => Ok(ValidNewUser {
            name,
            email,
            age: candidate.age,
            city,
        }),
        _ => Err(failure(errors)),
    }
}

/// Normalizes and validates a partial update
///
/// Only the fields present in the payload are checked; stored values of the
/// remaining fields are left alone.
///
/// # Errors
///
/// Returns every violated field among those present.
pub fn validate_changes(changes: UserChanges) -> Result<UserPatch, ValidationFailure> {
    let name = changes.name.map(trimmed);
    let email = changes.email.map(normalized_email);
    let city = changes.city.map(|city| {
        non_blank(city.map(trimmed)).unwrap_or_else(|| DEFAULT_CITY.to_string())
    });

    let errors = FieldRules {
        name: name.clone(),
        email: email.clone(),
        age: changes.age.flatten(),
    }
    .check();

    if !errors.is_empty() {
        return Err(failure(errors));
    }

    Ok(UserPatch {
        name,
        email,
        age: changes.age,
        city,
    })
}
