//! Point-transfer orders.
//!
//! Every attempt to pay points through the external platform is tracked by a
//! [`PointsOrder`]. Legal transitions:
//!
//! ```text
//! Pending --succeed--> Success
//! Pending --fail-----> Failed
//! Failed  --retry----> Pending
//! ```
//!
//! `Success` is terminal.

use crate::records::{HistoryId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Success,
    Failed,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Success => "success",
            OrderStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("order {order} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub order: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsOrder {
    pub id: OrderId,
    pub user: UserId,
    /// Originating play; absent for grants not tied to a single play.
    pub history: Option<HistoryId>,
    pub points: u64,
    pub status: OrderStatus,
    pub memo: String,
    pub error: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl PointsOrder {
    fn transition(&mut self, expected: OrderStatus, to: OrderStatus) -> Result<(), TransitionError> {
        if self.status != expected {
            return Err(TransitionError {
                order: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Record a successful transfer.
    pub fn succeed(&mut self) -> Result<(), TransitionError> {
        self.transition(OrderStatus::Pending, OrderStatus::Success)?;
        self.error = None;
        Ok(())
    }

    /// Record a failed transfer, keeping the collaborator's error text.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(OrderStatus::Pending, OrderStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Re-arm a failed order for another attempt.
    pub fn retry(&mut self) -> Result<(), TransitionError> {
        self.transition(OrderStatus::Failed, OrderStatus::Pending)?;
        self.error = None;
        Ok(())
    }

    /// Memo sent to the external ledger, tagged with the order id.
    pub fn distribution_memo(&self) -> String {
        format!("{} order #{}", self.memo, self.id)
    }
}

/// An order about to be inserted; always starts `Pending`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderDraft {
    pub user: UserId,
    pub history: Option<HistoryId>,
    pub points: u64,
    pub memo: String,
}

impl OrderDraft {
    pub fn into_order(self, id: OrderId, now_ms: u64) -> PointsOrder {
        PointsOrder {
            id,
            user: self.user,
            history: self.history,
            points: self.points,
            status: OrderStatus::Pending,
            memo: self.memo,
            error: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }
}
