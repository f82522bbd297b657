use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::cache::{DataCache, Dataset};
use crate::db::Gateway;
use crate::entities::{order, product, stock_movement};
use crate::errors::ServiceError;
use crate::locator::ensure_key_safe;
use crate::money::MAX_AMOUNT;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProduct {
    #[validate(length(min = 1, max = 120))]
    pub supplier: String,
    #[validate(length(min = 1, max = 120))]
    pub product_name: String,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[schema(value_type = String, example = "2.50")]
    pub unit_value: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProduct {
    #[validate(length(min = 1, max = 120))]
    pub supplier: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub product_name: Option<String>,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    #[schema(value_type = Option<String>)]
    pub unit_value: Option<Decimal>,
}

fn check_unit_value(unit_value: Decimal) -> Result<(), ServiceError> {
    if unit_value.is_sign_negative() && !unit_value.is_zero() {
        return Err(ServiceError::validation("unit_value must not be negative"));
    }
    if unit_value > MAX_AMOUNT {
        return Err(ServiceError::validation(format!(
            "unit_value must not exceed {MAX_AMOUNT}"
        )));
    }
    if unit_value.scale() > 2 && unit_value != unit_value.round_dp(2) {
        return Err(ServiceError::validation(
            "unit_value must have at most two decimal places",
        ));
    }
    Ok(())
}

/// Stock value for a write, refused when it would not fit the money column.
pub(crate) fn checked_stock_value(
    quantity: i32,
    unit_value: Decimal,
    product_name: &str,
) -> Result<Decimal, ServiceError> {
    product::stock_value(quantity, unit_value).ok_or_else(|| {
        ServiceError::validation(format!(
            "stock value of '{product_name}' exceeds {MAX_AMOUNT}"
        ))
    })
}

fn normalized_product_name(raw: &str) -> Result<String, ServiceError> {
    let name = raw.trim().to_string();
    if name.is_empty() {
        return Err(ServiceError::validation("product_name is required"));
    }
    ensure_key_safe("product_name", &name)?;
    Ok(name)
}

#[derive(Clone)]
pub struct ProductService {
    gateway: Arc<Gateway>,
    cache: DataCache,
}

impl ProductService {
    pub fn new(gateway: Arc<Gateway>, cache: DataCache) -> Self {
        Self { gateway, cache }
    }

    /// Creates a product; `total_value` is derived from quantity and unit value.
    #[instrument(skip(self, input), fields(product_name = %input.product_name))]
    pub async fn create(&self, input: CreateProduct) -> Result<product::Model, ServiceError> {
        input.validate()?;
        check_unit_value(input.unit_value)?;
        let name = normalized_product_name(&input.product_name)?;
        let total_value = checked_stock_value(input.quantity, input.unit_value, &name)?;

        let created = self
            .gateway
            .transaction(move |txn| {
                Box::pin(async move {
                    let model = product::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        supplier: Set(input.supplier.trim().to_string()),
                        product_name: Set(name),
                        quantity: Set(input.quantity),
                        unit_value: Set(input.unit_value),
                        total_value: Set(total_value),
                        creation_date: Set(Utc::now().trunc_subsecs(6)),
                    };
                    Ok(model.insert(txn).await?)
                })
            })
            .await?;

        self.cache.invalidate(&[Dataset::Products]).await;
        info!(product_id = %created.id, total_value = %created.total_value, "Product created");
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateProduct,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        if let Some(unit_value) = input.unit_value {
            check_unit_value(unit_value)?;
        }
        let name = input
            .product_name
            .as_deref()
            .map(normalized_product_name)
            .transpose()?;

        let updated = self
            .gateway
            .transaction(move |txn| {
                Box::pin(async move {
                    let existing = product::Entity::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::not_found(format!("product {id}")))?;
                    checked_stock_value(
                        input.quantity.unwrap_or(existing.quantity),
                        input.unit_value.unwrap_or(existing.unit_value),
                        &existing.product_name,
                    )?;

                    let mut model: product::ActiveModel = existing.into();
                    if let Some(supplier) = input.supplier {
                        model.supplier = Set(supplier.trim().to_string());
                    }
                    if let Some(name) = name {
                        model.product_name = Set(name);
                    }
                    if let Some(quantity) = input.quantity {
                        model.quantity = Set(quantity);
                    }
                    if let Some(unit_value) = input.unit_value {
                        model.unit_value = Set(unit_value);
                    }
                    Ok(model.update(txn).await?)
                })
            })
            .await?;

        self.cache
            .invalidate(&[Dataset::Products, Dataset::Orders, Dataset::StockMovements])
            .await;
        info!(product_id = %id, total_value = %updated.total_value, "Product updated");
        Ok(updated)
    }

    /// Deletes a product nothing refers to.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.gateway
            .transaction(move |txn| {
                Box::pin(async move {
                    let orders = order::Entity::find()
                        .filter(order::Column::ProductId.eq(id))
                        .count(txn)
                        .await?;
                    let movements = stock_movement::Entity::find()
                        .filter(stock_movement::Column::ProductId.eq(id))
                        .count(txn)
                        .await?;
                    if orders > 0 || movements > 0 {
                        warn!(product_id = %id, orders, movements, "Refusing to delete referenced product");
                        return Err(ServiceError::validation(format!(
                            "product is referenced by {orders} order(s) and {movements} stock movement(s)"
                        )));
                    }

                    let deleted = product::Entity::delete_by_id(id).exec(txn).await?;
                    if deleted.rows_affected == 0 {
                        return Err(ServiceError::not_found(format!("product {id}")));
                    }
                    Ok(())
                })
            })
            .await?;

        self.cache.invalidate(&[Dataset::Products]).await;
        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        let conn = self.gateway.connection().await?;
        product::Entity::find_by_id(id)
            .one(&conn)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("product {id}")))
    }

    #[instrument(skip(self))]
    pub async fn find_by_name(
        &self,
        product_name: &str,
    ) -> Result<Vec<product::Model>, ServiceError> {
        let name = product_name.trim().to_string();
        self.gateway
            .read_or_default("products.by_name", move |conn| {
                Box::pin(async move {
                    product::Entity::find()
                        .filter(product::Column::ProductName.eq(name))
                        .order_by_asc(product::Column::CreationDate)
                        .all(&conn)
                        .await
                })
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<product::Model>, ServiceError> {
        let gateway = self.gateway.clone();
        self.cache
            .get_or_load(Dataset::Products, "all", || async move {
                gateway
                    .read_or_default("products.list", |conn| {
                        Box::pin(async move {
                            product::Entity::find()
                                .order_by_asc(product::Column::ProductName)
                                .all(&conn)
                                .await
                        })
                    })
                    .await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[test]
    fn unit_values_must_be_non_negative_cents() {
        assert!(check_unit_value(dec!(2.50)).is_ok());
        assert!(check_unit_value(dec!(0)).is_ok());
        assert!(check_unit_value(dec!(1.2300)).is_ok());
        assert!(check_unit_value(dec!(-0.01)).is_err());
        assert!(check_unit_value(dec!(1.234)).is_err());
    }

    #[test]
    fn unit_values_must_fit_the_money_column() {
        assert!(check_unit_value(dec!(9999999999.99)).is_ok());
        assert_matches!(
            check_unit_value(dec!(10000000000.00)),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            check_unit_value(dec!(79228162514264337593543950.33)),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn stock_value_overflow_is_a_validation_error() {
        assert_eq!(checked_stock_value(4, dec!(2.50), "Water").unwrap(), dec!(10.00));
        assert_matches!(
            checked_stock_value(2000, dec!(9999999999.99), "Water"),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn product_names_are_trimmed_and_checked() {
        assert_eq!(normalized_product_name("  Water ").unwrap(), "Water");
        assert!(normalized_product_name("Water|Big").is_err());
        assert!(normalized_product_name("").is_err());
    }
}
