use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::{Set, Unchanged};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::money::checked_amount;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "products")]
#[schema(as = Product)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub supplier: String,
    pub product_name: String,
    /// On-hand quantity as recorded
    pub quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub unit_value: Decimal,
    /// `quantity × unit_value` at the last write
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_value: Decimal,
    pub creation_date: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
    #[sea_orm(has_many = "super::stock_movement::Entity")]
    StockMovements,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::stock_movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockMovements.def()
    }
}

/// Stock value of `quantity` units, rounded to cents. `None` when it does not
/// fit the money column.
pub fn stock_value(quantity: i32, unit_value: Decimal) -> Option<Decimal> {
    checked_amount(i64::from(quantity), unit_value)
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        // total_value is derived on every write and never re-checked on read
        let total = match (&active_model.quantity, &active_model.unit_value) {
            (Set(qty) | Unchanged(qty), Set(unit) | Unchanged(unit)) => Some(
                stock_value(*qty, *unit)
                    .ok_or_else(|| DbErr::Custom("total_value out of range".to_string()))?,
            ),
            _ => None,
        };
        if let Some(total) = total {
            active_model.total_value = Set(total);
        }

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn stock_value_is_exact_to_the_cent() {
        assert_eq!(stock_value(4, dec!(2.50)), Some(dec!(10.00)));
        assert_eq!(stock_value(3, dec!(0.1)), Some(dec!(0.30)));
        assert_eq!(stock_value(0, dec!(99.99)), Some(Decimal::ZERO));
    }

    #[test]
    fn stock_value_refuses_amounts_the_column_cannot_hold() {
        assert_eq!(stock_value(2000, dec!(79228162514264337593543950.33)), None);
        assert_eq!(stock_value(i32::MAX, dec!(9999999999.99)), None);
    }
}
