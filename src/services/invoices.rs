use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, QueryFilter,
    QueryResult, Statement, Value,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cache::{DataCache, Dataset};
use crate::db::Gateway;
use crate::entities::{client, order};
use crate::errors::ServiceError;
use crate::invoice::{Invoice, LineItem};
use crate::lifecycle::{OrderStatus, PaymentMethod};

/// Open order lines of one client, oldest first.
const OPEN_LINES_SQL: &str = "SELECT product_name, quantity, unit_value \
     FROM order_product_view \
     WHERE client_id = $1 AND status = $2 \
     ORDER BY ordered_at, order_id";

#[derive(Debug, FromQueryResult)]
struct LineRow {
    product_name: String,
    quantity: i32,
    unit_value: Decimal,
}

fn open_lines_params(client_id: Uuid) -> Vec<Value> {
    vec![client_id.into(), OrderStatus::Open.to_value().into()]
}

fn line_items(rows: &[QueryResult]) -> Result<Vec<LineItem>, ServiceError> {
    rows.iter()
        .map(|row| -> Result<LineItem, ServiceError> {
            let line = LineRow::from_query_result(row, "")?;
            Ok(LineItem::new(
                line.product_name,
                i64::from(line.quantity),
                line.unit_value,
            ))
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvoicePreview {
    pub client_id: Uuid,
    pub invoice: Invoice,
    /// Fixed-width text receipt
    pub receipt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CloseInvoice {
    pub payment_method: PaymentMethod,
}

/// What closing an invoice did.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CloseOutcome {
    /// Every open order of the client moved to `status` at `closed_at`.
    Closed {
        client_id: Uuid,
        status: OrderStatus,
        closed_at: DateTime<Utc>,
        orders_closed: u64,
        invoice: Invoice,
        receipt: String,
    },
    /// The client had no open orders; nothing was written.
    NothingToClose { client_id: Uuid },
}

#[derive(Clone)]
pub struct InvoiceService {
    gateway: Arc<Gateway>,
    cache: DataCache,
}

impl InvoiceService {
    pub fn new(gateway: Arc<Gateway>, cache: DataCache) -> Self {
        Self { gateway, cache }
    }

    /// Aggregates the client's open orders without changing them.
    #[instrument(skip(self))]
    pub async fn preview(&self, client_id: Uuid) -> Result<InvoicePreview, ServiceError> {
        let conn = self.gateway.connection().await?;
        let client = client::Entity::find_by_id(client_id)
            .one(&conn)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("client {client_id}")))?;

        let rows = self
            .gateway
            .try_query(OPEN_LINES_SQL, open_lines_params(client_id))
            .await?;
        let items = line_items(&rows)?;

        let invoice = Invoice::build(client.full_name, Utc::now().trunc_subsecs(0), &items)?;
        let receipt = invoice.render();
        Ok(InvoicePreview {
            client_id,
            invoice,
            receipt,
        })
    }

    /// Settles every open order of the client in one transaction.
    ///
    /// The invoice returned is the one captured inside that transaction, so it
    /// lists exactly the orders that were closed.
    #[instrument(skip(self), fields(payment_method = %payment_method))]
    pub async fn close(
        &self,
        client_id: Uuid,
        payment_method: PaymentMethod,
    ) -> Result<CloseOutcome, ServiceError> {
        let status = OrderStatus::Open.transition_to(payment_method.settled_status())?;
        let closed_at = Utc::now().trunc_subsecs(6);

        let outcome = self
            .gateway
            .transaction(move |txn| {
                Box::pin(async move {
                    let client = client::Entity::find_by_id(client_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::not_found(format!("client {client_id}")))?;

                    let stmt = Statement::from_sql_and_values(
                        txn.get_database_backend(),
                        OPEN_LINES_SQL,
                        open_lines_params(client_id),
                    );
                    let items = line_items(&txn.query_all(stmt).await?)?;
                    if items.is_empty() {
                        return Ok(CloseOutcome::NothingToClose { client_id });
                    }
                    let invoice = Invoice::build(client.full_name, closed_at, &items)?;

                    let result = order::Entity::update_many()
                        .col_expr(order::Column::Status, Expr::value(status.to_value()))
                        .col_expr(order::Column::ClosedAt, Expr::value(closed_at))
                        .filter(order::Column::ClientId.eq(client_id))
                        .filter(order::Column::Status.eq(OrderStatus::Open))
                        .exec(txn)
                        .await?;

                    let expected = items.len() as u64;
                    if result.rows_affected != expected {
                        error!(
                            client_id = %client_id,
                            expected,
                            rows = result.rows_affected,
                            "Open order count changed while closing"
                        );
                        return Err(ServiceError::InternalError(format!(
                            "expected to close {expected} orders, updated {}",
                            result.rows_affected
                        )));
                    }

                    let receipt = invoice.render();
                    Ok(CloseOutcome::Closed {
                        client_id,
                        status,
                        closed_at,
                        orders_closed: expected,
                        invoice,
                        receipt,
                    })
                })
            })
            .await?;

        match &outcome {
            CloseOutcome::Closed { orders_closed, invoice, .. } => {
                self.cache.invalidate(&[Dataset::Orders]).await;
                metrics::counter!("club_invoice.closed", 1);
                info!(
                    client_id = %client_id,
                    orders_closed = *orders_closed,
                    status = %status,
                    grand_total = %invoice.grand_total,
                    "Invoice closed"
                );
            }
            CloseOutcome::NothingToClose { .. } => {
                info!(client_id = %client_id, "No open orders to close");
            }
        }
        Ok(outcome)
    }
}
