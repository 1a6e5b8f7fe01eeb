use super::ids::{CompanyId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    CompanyOwner,
    CompanyEmployee,
    Admin,
}

/// A resolved identity as supplied by the authentication layer.
///
/// `company` is the dealership the user belongs to, if any. Owners and
/// employees both carry it; customers and admins usually do not.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
    #[serde(default)]
    pub company: Option<CompanyId>,
}

impl Actor {
    pub fn customer(id: UserId) -> Self {
        Self {
            id,
            role: Role::Customer,
            company: None,
        }
    }

    pub fn owner(id: UserId, company: CompanyId) -> Self {
        Self {
            id,
            role: Role::CompanyOwner,
            company: Some(company),
        }
    }

    pub fn employee(id: UserId, company: CompanyId) -> Self {
        Self {
            id,
            role: Role::CompanyEmployee,
            company: Some(company),
        }
    }

    pub fn admin(id: UserId) -> Self {
        Self {
            id,
            role: Role::Admin,
            company: None,
        }
    }
}

/// The slice of a dealership the engine needs: who owns it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct Company {
    pub id: CompanyId,
    pub owner: UserId,
}
