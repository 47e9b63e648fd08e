//! Caller identity and delivery profiles
//!
//! Identity is issued by the auth service in front of this one and handed to
//! every operation as a [`CustomerContext`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::value_objects::ContactSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role { User, Staff, Admin }

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches("ROLE_").to_ascii_uppercase().as_str() {
            "USER" => Ok(Role::User),
            "STAFF" => Ok(Role::Staff),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// Verified caller, as supplied by the auth collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomerContext {
    pub user_id: Uuid,
    pub email: String,
    pub roles: Vec<Role>,
}

impl CustomerContext {
    pub fn customer(user_id: Uuid, email: impl Into<String>) -> Self {
        Self { user_id, email: email.into(), roles: vec![Role::User] }
    }

    pub fn staff(user_id: Uuid, email: impl Into<String>) -> Self {
        Self { user_id, email: email.into(), roles: vec![Role::Staff] }
    }

    pub fn is_staff(&self) -> bool {
        self.roles.iter().any(|r| matches!(r, Role::Staff | Role::Admin))
    }

    pub fn owns(&self, customer_id: Uuid) -> bool { self.user_id == customer_id }
}

/// A saved delivery address belonging to one customer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryProfile {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub address: String,
}

impl DeliveryProfile {
    pub fn snapshot(&self) -> ContactSnapshot {
        ContactSnapshot {
            full_name: self.full_name.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
        }
    }
}
