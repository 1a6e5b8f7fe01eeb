//! Authorization predicates for engine operations.
//!
//! Each predicate takes the resolved actor plus the company relationship as
//! plain inputs; the engine calls exactly one of them per operation.

use super::identity::{Actor, Company, Role};
use super::transaction::{Transaction, TransactionAction};
use super::vehicle::Vehicle;
use crate::error::{MarketError, Result};

/// Which side of a transaction an actor is acting for.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Party {
    Buyer,
    Seller,
}

/// True when the buyer belongs to the company selling the vehicle.
pub fn is_self_trade(buyer: &Actor, vehicle: &Vehicle, company: &Company) -> bool {
    if buyer.id == company.owner {
        return true;
    }
    matches!(buyer.role, Role::CompanyOwner | Role::CompanyEmployee)
        && buyer.company == Some(vehicle.company)
}

/// Only the owning company's owner may approve, reject or complete.
pub fn can_manage(actor: &Actor, company: &Company) -> bool {
    actor.id == company.owner
}

pub fn party_of(actor: &Actor, transaction: &Transaction, company: &Company) -> Option<Party> {
    if actor.id == transaction.buyer {
        Some(Party::Buyer)
    } else if can_manage(actor, company) {
        Some(Party::Seller)
    } else {
        None
    }
}

/// Resolves the actor's party for `action`, or `Forbidden`.
pub fn authorize(
    actor: &Actor,
    action: TransactionAction,
    transaction: &Transaction,
    company: &Company,
) -> Result<Party> {
    match action {
        TransactionAction::Approve | TransactionAction::Reject | TransactionAction::Complete => {
            if can_manage(actor, company) {
                Ok(Party::Seller)
            } else {
                Err(MarketError::forbidden(
                    "only the owning company's owner may manage this transaction",
                ))
            }
        }
        TransactionAction::Cancel => party_of(actor, transaction, company).ok_or_else(|| {
            MarketError::forbidden("only the buyer or the seller may cancel this transaction")
        }),
    }
}
