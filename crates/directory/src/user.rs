use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orgdir_core::EntityId;

/// An account holder with a set of granted roles.
///
/// `password_hash` is write-only: it is set exactly once at creation (from
/// the plaintext carried by [`CreateUserDto`]) and never appears in any
/// transfer representation. Updates do not touch it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct User {
    pub id: Option<EntityId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub roles: BTreeSet<EntityId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-loading reference: a handle carrying only the id.
    pub fn with_id(id: EntityId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Copy scalar attributes from the transfer shape. The role set and the
    /// password hash are untouched.
    pub fn copy_scalars(&mut self, dto: &UserDto) {
        self.first_name = dto.first_name.clone();
        self.last_name = dto.last_name.clone();
        self.email = dto.email.clone();
    }
}

/// A permission label attachable to users.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Role {
    pub id: Option<EntityId>,
    pub authority: Option<String>,
}

impl Role {
    pub fn named(authority: impl Into<String>) -> Self {
        Self {
            id: None,
            authority: Some(authority.into()),
        }
    }
}

/// Wire-facing projection of a [`User`]. Carries no credential material.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<RoleDto>,
}

/// Creation-only transfer shape: a [`UserDto`] plus the plaintext password
/// to be hashed once before the first save. Updates use [`UserDto`] and can
/// never overwrite credentials.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateUserDto {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: String,
    pub roles: Vec<RoleDto>,
}

impl CreateUserDto {
    /// The scalar shape shared with updates, for one scalar-copy path.
    pub fn as_user_dto(&self) -> UserDto {
        UserDto {
            id: None,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            roles: self.roles.clone(),
        }
    }
}

/// Wire-facing projection of a [`Role`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoleDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub authority: Option<String>,
}

impl RoleDto {
    pub fn shallow(role: &Role) -> Self {
        Self {
            id: role.id,
            authority: role.authority.clone(),
        }
    }
}

impl UserDto {
    /// Scalar attributes only; `roles` stays empty.
    pub fn shallow(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            roles: Vec::new(),
        }
    }

    /// Shallow projection plus the user's roles.
    pub fn detailed(user: &User, roles: &[Role]) -> Self {
        let mut dto = Self::shallow(user);
        dto.roles = roles.iter().map(RoleDto::shallow).collect();
        dto
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_projection_never_carries_credentials() {
        let mut user = User::with_id(EntityId::new(1));
        user.email = Some("ada@example.com".to_string());
        user.password_hash = Some("$argon2id$...".to_string());

        let json = serde_json::to_value(UserDto::shallow(&user)).unwrap();
        assert_eq!(json["email"], "ada@example.com");
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
    }

    #[test]
    fn create_shape_requires_password_field() {
        let ok: CreateUserDto = serde_json::from_str(
            r#"{"firstName":"Ada","email":"ada@example.com","password":"s3cret"}"#,
        )
        .unwrap();
        assert_eq!(ok.password, "s3cret");

        // defaulted struct: an absent password deserializes to empty, which
        // the service rejects as a validation failure
        let missing: CreateUserDto =
            serde_json::from_str(r#"{"firstName":"Ada"}"#).unwrap();
        assert!(missing.password.is_empty());
    }

    #[test]
    fn detailed_projection_lists_role_authorities() {
        let user = User::with_id(EntityId::new(1));
        let mut admin = Role::named("ROLE_ADMIN");
        admin.id = Some(EntityId::new(2));

        let dto = UserDto::detailed(&user, &[admin]);
        assert_eq!(dto.roles.len(), 1);
        assert_eq!(dto.roles[0].authority.as_deref(), Some("ROLE_ADMIN"));
    }
}
