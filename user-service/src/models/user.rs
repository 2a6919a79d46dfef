//! User persistence model

use mongodb::bson::{self, oid::ObjectId, Document};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DocumentValidationError, Error, Result};
use crate::query::{Field, FieldKind, Model, NumericField};

/// Access role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every role
pub const USER_ROLES: &[Role] = &[Role::SuperAdmin, Role::Admin, Role::User];

/// Roles allowed to manage other users
pub const ADMIN_ROLES: &[Role] = &[Role::SuperAdmin, Role::Admin];

/// Stored user document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// bcrypt hash
    pub password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profession: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

fn default_active() -> bool {
    true
}

impl User {
    /// Build a fresh document from validated input
    pub fn create(new: NewUser, user_name: String, password_hash: String) -> Self {
        let now = bson::DateTime::now();
        Self {
            id: ObjectId::new(),
            user_name,
            email: new.email,
            first_name: new.first_name,
            last_name: new.last_name,
            password: password_hash,
            role: Role::User,
            is_active: true,
            phone_number: new.phone_number,
            profession: new.profession,
            profile_image: new.profile_image,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_document(&self) -> Result<Document> {
        bson::to_document(self).map_err(|err| Error::Internal(err.to_string()))
    }

    pub fn from_document(document: Document) -> Result<Self> {
        bson::from_document(document).map_err(|err| Error::Internal(err.to_string()))
    }
}

/// Registration input, trimmed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Plain text; hashed before the document is stored
    pub password: String,
    pub phone_number: Option<String>,
    pub profession: Option<String>,
    pub profile_image: Option<String>,
}

impl NewUser {
    /// Required-field check applied before a document is stored
    pub fn validate(&self) -> std::result::Result<(), DocumentValidationError> {
        let required = [
            ("email", &self.email),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("password", &self.password),
        ];

        let errors = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .fold(DocumentValidationError::new(), |errors, (path, _)| {
                errors.with_field(*path, format!("Path `{}` is required.", path))
            });

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// First candidate user name: first name lower-cased, whitespace runs
    /// replaced by `_`
    pub fn user_name_base(&self) -> String {
        self.first_name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase()
    }
}

/// Candidate user name for the given attempt (`base`, `base_1`, `base_2`, ...)
pub fn user_name_candidate(base: &str, attempt: u32) -> String {
    match attempt {
        0 => base.to_string(),
        n => format!("{}_{}", base, n),
    }
}

/// A user row as returned by listing queries; any field may be projected out
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "_id")]
    pub id: Option<ObjectId>,
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub phone_number: Option<String>,
    pub profession: Option<String>,
    pub profile_image: Option<String>,
    pub created_at: Option<bson::DateTime>,
    pub updated_at: Option<bson::DateTime>,
}

impl UserRecord {
    pub fn from_document(document: Document) -> Result<Self> {
        bson::from_document(document).map_err(|err| Error::Internal(err.to_string()))
    }
}

/// JSON representation of a user; never carries the password
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profession: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn rfc3339(value: bson::DateTime) -> String {
    value
        .try_to_rfc3339_string()
        .unwrap_or_else(|_| value.timestamp_millis().to_string())
}

impl From<UserRecord> for UserView {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id.map(|id| id.to_hex()),
            user_name: record.user_name,
            email: record.email,
            first_name: record.first_name,
            last_name: record.last_name,
            role: record.role,
            is_active: record.is_active,
            phone_number: record.phone_number,
            profession: record.profession,
            profile_image: record.profile_image,
            created_at: record.created_at.map(rfc3339),
            updated_at: record.updated_at.map(rfc3339),
        }
    }
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: Some(user.id.to_hex()),
            user_name: Some(user.user_name.clone()),
            email: Some(user.email.clone()),
            first_name: Some(user.first_name.clone()),
            last_name: Some(user.last_name.clone()),
            role: Some(user.role),
            is_active: Some(user.is_active),
            phone_number: user.phone_number.clone(),
            profession: user.profession.clone(),
            profile_image: user.profile_image.clone(),
            created_at: Some(rfc3339(user.created_at)),
            updated_at: Some(rfc3339(user.updated_at)),
        }
    }
}

/// Queryable user fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Id,
    UserName,
    Email,
    FirstName,
    LastName,
    Password,
    Role,
    IsActive,
    PhoneNumber,
    Profession,
    ProfileImage,
    CreatedAt,
    UpdatedAt,
}

impl Field for UserField {
    const ALL: &'static [Self] = &[
        Self::Id,
        Self::UserName,
        Self::Email,
        Self::FirstName,
        Self::LastName,
        Self::Password,
        Self::Role,
        Self::IsActive,
        Self::PhoneNumber,
        Self::Profession,
        Self::ProfileImage,
        Self::CreatedAt,
        Self::UpdatedAt,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Id => "_id",
            Self::UserName => "user_name",
            Self::Email => "email",
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Password => "password",
            Self::Role => "role",
            Self::IsActive => "is_active",
            Self::PhoneNumber => "phone_number",
            Self::Profession => "profession",
            Self::ProfileImage => "profile_image",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    fn kind(self) -> FieldKind {
        match self {
            Self::Id => FieldKind::ObjectId,
            Self::IsActive => FieldKind::Boolean,
            Self::CreatedAt | Self::UpdatedAt => FieldKind::DateTime,
            _ => FieldKind::String,
        }
    }
}

/// Users have no numeric fields
#[derive(Debug, Clone, Copy)]
pub enum UserNumeric {}

impl NumericField for UserNumeric {
    fn name(self) -> &'static str {
        match self {}
    }
}

impl Model for User {
    const COLLECTION: &'static str = "users";
    const HIDDEN_FIELDS: &'static [&'static str] = &["password"];
    type Field = UserField;
    type Numeric = UserNumeric;
}
