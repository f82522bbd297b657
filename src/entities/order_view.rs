//! Read-only mapping of `order_product_view`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::invoice::LineItem;
use crate::lifecycle::OrderStatus;
use crate::locator::{Locatable, RecordKey};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "order_product_view")]
#[schema(as = OrderLine)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_id: Uuid,
    pub client_id: Uuid,
    pub client_name: String,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_value: Decimal,
    /// Computed by the view; informational only
    pub total: Decimal,
    pub ordered_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn line_item(&self) -> LineItem {
        LineItem::new(self.product_name.clone(), i64::from(self.quantity), self.unit_value)
    }
}

impl Locatable for Model {
    fn record_key(&self) -> Result<RecordKey, ServiceError> {
        RecordKey::for_order(&self.client_name, &self.product_name, &self.ordered_at)
    }
}
