//! Order states and the rules for moving between them.
//!
//! ```text
//! open ──┬─> paid_debit
//!        ├─> paid_credit
//!        └─> paid_pix
//! ```
//!
//! Terminal states never change again. Closing is applied to all open orders
//! of a client at once by the invoice service.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::ServiceError;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "paid_debit")]
    PaidDebit,
    #[sea_orm(string_value = "paid_credit")]
    PaidCredit,
    #[sea_orm(string_value = "paid_pix")]
    PaidPix,
}

impl OrderStatus {
    pub fn is_open(self) -> bool {
        self == OrderStatus::Open
    }

    pub fn is_terminal(self) -> bool {
        !self.is_open()
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self.is_open() && next.is_terminal()
    }

    /// Validates a transition, naming both states on failure.
    pub fn transition_to(self, next: OrderStatus) -> Result<OrderStatus, ServiceError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ServiceError::validation(format!(
                "cannot move order from '{self}' to '{next}'"
            )))
        }
    }

    pub fn parse(raw: &str) -> Result<OrderStatus, ServiceError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(OrderStatus::Open),
            "paid_debit" => Ok(OrderStatus::PaidDebit),
            "paid_credit" => Ok(OrderStatus::PaidCredit),
            "paid_pix" => Ok(OrderStatus::PaidPix),
            other => Err(ServiceError::validation(format!(
                "unknown order status: {other}"
            ))),
        }
    }
}

/// How an invoice was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    Debit,
    Credit,
    Pix,
}

impl PaymentMethod {
    pub fn settled_status(self) -> OrderStatus {
        match self {
            PaymentMethod::Debit => OrderStatus::PaidDebit,
            PaymentMethod::Credit => OrderStatus::PaidCredit,
            PaymentMethod::Pix => OrderStatus::PaidPix,
        }
    }
}

/// Refuses edits on orders that already left the open state.
pub fn ensure_mutable(status: OrderStatus) -> Result<(), ServiceError> {
    if status.is_open() {
        Ok(())
    } else {
        Err(ServiceError::validation(format!(
            "order is already closed ({status}) and can no longer be changed"
        )))
    }
}
