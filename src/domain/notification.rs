use super::ids::UserId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TransactionRequest,
    TransactionApproved,
    TransactionRejected,
    TransactionCompleted,
    TransactionCancelled,
    SettlementCompleted,
    ListingExpired,
}

impl NotificationKind {
    pub fn title(&self) -> &'static str {
        match self {
            Self::TransactionRequest => "Purchase request",
            Self::TransactionApproved => "Purchase approved",
            Self::TransactionRejected => "Purchase rejected",
            Self::TransactionCompleted => "Purchase completed",
            Self::TransactionCancelled => "Purchase cancelled",
            Self::SettlementCompleted => "Settlement completed",
            Self::ListingExpired => "Listing expired",
        }
    }
}

/// One outbound message produced by an engine transition.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Notification {
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub message: String,
    /// Deep-link target inside the marketplace UI.
    pub link: String,
}

impl Notification {
    pub fn new(
        recipient: UserId,
        kind: NotificationKind,
        message: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            recipient,
            kind,
            message: message.into(),
            link: link.into(),
        }
    }
}

pub const SALES_LINK: &str = "/company/sales";
pub const PURCHASES_LINK: &str = "/mypage/purchases";

pub fn settlement_link(id: impl std::fmt::Display) -> String {
    format!("/settlements/{id}")
}

pub fn vehicle_link(id: impl std::fmt::Display) -> String {
    format!("/vehicles/{id}")
}
