use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::cache::{DataCache, Dataset};
use crate::db::Gateway;
use crate::entities::product;
use crate::entities::stock_movement::{self, MovementType};
use crate::errors::ServiceError;
use crate::locator::{resolve_unique, Locatable, RecordKey};
use crate::services::products::checked_stock_value;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RecordMovement {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1000000))]
    pub quantity: i32,
    pub movement_type: MovementType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateMovement {
    #[validate(range(min = 1, max = 1000000))]
    pub quantity: Option<i32>,
    pub movement_type: Option<MovementType>,
}

/// A movement together with the name of its product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MovementLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub movement_type: MovementType,
    pub moved_at: DateTime<Utc>,
    pub record_key: RecordKey,
}

impl MovementLine {
    fn from_parts(
        movement: stock_movement::Model,
        product: product::Model,
    ) -> Result<Self, ServiceError> {
        let record_key = RecordKey::for_stock_movement(&product.product_name, &movement.moved_at)?;
        Ok(Self {
            id: movement.id,
            product_id: movement.product_id,
            product_name: product.product_name,
            quantity: movement.quantity,
            movement_type: movement.movement_type,
            moved_at: movement.moved_at,
            record_key,
        })
    }
}

impl Locatable for MovementLine {
    fn record_key(&self) -> Result<RecordKey, ServiceError> {
        Ok(self.record_key.clone())
    }
}

/// On-hand quantity after applying `delta`, refusing to go below zero.
pub fn apply_delta(on_hand: i32, delta: i32, product_name: &str) -> Result<i32, ServiceError> {
    let next = on_hand
        .checked_add(delta)
        .ok_or_else(|| ServiceError::validation("stock quantity out of range"))?;
    if next < 0 {
        return Err(ServiceError::validation(format!(
            "insufficient stock for '{product_name}': {on_hand} on hand, change of {delta}"
        )));
    }
    Ok(next)
}

/// Net stock change of editing `existing` into `quantity` units of `movement_type`.
pub fn edit_delta(
    existing: &stock_movement::Model,
    quantity: i32,
    movement_type: MovementType,
) -> Result<i32, ServiceError> {
    movement_type
        .delta(quantity)
        .checked_sub(existing.delta())
        .ok_or_else(|| ServiceError::validation("stock movement change out of range"))
}

/// Applies `delta` to the product's on-hand stock; `total_value` follows.
async fn adjust_product(
    txn: &DatabaseTransaction,
    product_id: Uuid,
    delta: i32,
) -> Result<product::Model, ServiceError> {
    let product = product::Entity::find_by_id(product_id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("product {product_id}")))?;
    if delta == 0 {
        return Ok(product);
    }

    let quantity = apply_delta(product.quantity, delta, &product.product_name)?;
    checked_stock_value(quantity, product.unit_value, &product.product_name)?;
    let mut model: product::ActiveModel = product.into();
    model.quantity = Set(quantity);
    Ok(model.update(txn).await?)
}

async fn update_movement(
    txn: &DatabaseTransaction,
    id: Uuid,
    input: UpdateMovement,
) -> Result<MovementLine, ServiceError> {
    let existing = stock_movement::Entity::find_by_id(id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("stock movement {id}")))?;

    let quantity = input.quantity.unwrap_or(existing.quantity);
    let movement_type = input.movement_type.unwrap_or(existing.movement_type);
    let delta = edit_delta(&existing, quantity, movement_type)?;
    let product = adjust_product(txn, existing.product_id, delta).await?;

    let mut model: stock_movement::ActiveModel = existing.into();
    model.quantity = Set(quantity);
    model.movement_type = Set(movement_type);
    let movement = model.update(txn).await?;

    MovementLine::from_parts(movement, product)
}

async fn delete_movement(txn: &DatabaseTransaction, id: Uuid) -> Result<(), ServiceError> {
    let existing = stock_movement::Entity::find_by_id(id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("stock movement {id}")))?;

    adjust_product(txn, existing.product_id, -existing.delta()).await?;
    stock_movement::Entity::delete_by_id(id).exec(txn).await?;
    Ok(())
}

/// Product name of a `product|timestamp` key.
fn key_product(key: &RecordKey) -> Result<String, ServiceError> {
    match key.fields().as_slice() {
        [product_name, _] => Ok((*product_name).to_string()),
        _ => Err(ServiceError::validation(format!(
            "stock movement key must be 'product|timestamp', got '{key}'"
        ))),
    }
}

async fn load_lines<C: ConnectionTrait>(
    db: &C,
    product_name: Option<String>,
) -> Result<Vec<MovementLine>, ServiceError> {
    let mut query = stock_movement::Entity::find().find_also_related(product::Entity);
    if let Some(name) = product_name {
        query = query.filter(product::Column::ProductName.eq(name));
    }
    let rows = query
        .order_by_asc(stock_movement::Column::MovedAt)
        .all(db)
        .await?;

    rows.into_iter()
        .filter_map(|(movement, product)| product.map(|p| (movement, p)))
        .map(|(movement, product)| MovementLine::from_parts(movement, product))
        .collect()
}

#[derive(Clone)]
pub struct StockService {
    gateway: Arc<Gateway>,
    cache: DataCache,
}

impl StockService {
    pub fn new(gateway: Arc<Gateway>, cache: DataCache) -> Self {
        Self { gateway, cache }
    }

    async fn invalidate(&self) {
        self.cache
            .invalidate(&[Dataset::StockMovements, Dataset::Products])
            .await;
    }

    /// Records a movement and adjusts the product's stock in the same transaction.
    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn record(&self, input: RecordMovement) -> Result<MovementLine, ServiceError> {
        input.validate()?;

        let line = self
            .gateway
            .transaction(move |txn| {
                Box::pin(async move {
                    let delta = input.movement_type.delta(input.quantity);
                    let product = adjust_product(txn, input.product_id, delta).await?;

                    let movement = stock_movement::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        product_id: Set(input.product_id),
                        quantity: Set(input.quantity),
                        movement_type: Set(input.movement_type),
                        moved_at: Set(Utc::now().trunc_subsecs(6)),
                    }
                    .insert(txn)
                    .await?;

                    MovementLine::from_parts(movement, product)
                })
            })
            .await?;

        self.invalidate().await;
        info!(movement_id = %line.id, movement_type = %line.movement_type, quantity = line.quantity, "Stock movement recorded");
        Ok(line)
    }

    /// Edits a movement, reversing its previous effect on stock first.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: UpdateMovement) -> Result<MovementLine, ServiceError> {
        input.validate()?;

        let line = self
            .gateway
            .transaction(move |txn| Box::pin(async move { update_movement(txn, id, input).await }))
            .await?;

        self.invalidate().await;
        info!(movement_id = %id, "Stock movement updated");
        Ok(line)
    }

    /// Deletes a movement and reverses its effect on stock.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.gateway
            .transaction(move |txn| Box::pin(async move { delete_movement(txn, id).await }))
            .await?;

        self.invalidate().await;
        info!(movement_id = %id, "Stock movement deleted");
        Ok(())
    }

    /// Finds the single movement addressed by `product_name|timestamp`.
    #[instrument(skip(self))]
    pub async fn locate(&self, key: &RecordKey) -> Result<MovementLine, ServiceError> {
        let product_name = key_product(key)?;
        let conn = self.gateway.connection().await?;
        resolve_unique(key, load_lines(&conn, Some(product_name)).await?)
    }

    /// Resolves the key and edits the movement in one transaction.
    #[instrument(skip(self, input))]
    pub async fn update_by_key(
        &self,
        key: &RecordKey,
        input: UpdateMovement,
    ) -> Result<MovementLine, ServiceError> {
        input.validate()?;
        let product_name = key_product(key)?;
        let key = key.clone();

        let line = self
            .gateway
            .transaction(move |txn| {
                Box::pin(async move {
                    let target = resolve_unique(&key, load_lines(txn, Some(product_name)).await?)?;
                    update_movement(txn, target.id, input).await
                })
            })
            .await?;

        self.invalidate().await;
        info!(movement_id = %line.id, "Stock movement updated by key");
        Ok(line)
    }

    /// Resolves the key and deletes the movement in one transaction.
    #[instrument(skip(self))]
    pub async fn delete_by_key(&self, key: &RecordKey) -> Result<(), ServiceError> {
        let product_name = key_product(key)?;
        let key = key.clone();

        let id = self
            .gateway
            .transaction(move |txn| {
                Box::pin(async move {
                    let target = resolve_unique(&key, load_lines(txn, Some(product_name)).await?)?;
                    delete_movement(txn, target.id).await?;
                    Ok(target.id)
                })
            })
            .await?;

        self.invalidate().await;
        info!(movement_id = %id, "Stock movement deleted by key");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<MovementLine>, ServiceError> {
        self.cache
            .get_or_load(Dataset::StockMovements, "all", || async {
                let lines = match self.gateway.connection().await {
                    Ok(conn) => load_lines(&conn, None).await,
                    Err(err) => Err(err),
                };
                match lines {
                    Err(ServiceError::ConnectionUnavailable(reason)) => {
                        tracing::warn!(reason = %reason, "Stock movement list degraded to empty");
                        Ok(Vec::new())
                    }
                    other => other,
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn deltas_follow_movement_direction() {
        assert_eq!(MovementType::Inbound.delta(5), 5);
        assert_eq!(MovementType::Outbound.delta(5), -5);
    }

    #[test]
    fn stock_never_goes_negative() {
        assert_eq!(apply_delta(10, -10, "Water").unwrap(), 0);
        assert_eq!(apply_delta(0, 3, "Water").unwrap(), 3);
        assert_matches!(apply_delta(2, -3, "Water"), Err(ServiceError::ValidationError(_)));
    }

    fn movement(quantity: i32, movement_type: MovementType) -> stock_movement::Model {
        stock_movement::Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity,
            movement_type,
            moved_at: Utc::now(),
        }
    }

    #[test]
    fn editing_reverses_the_previous_effect() {
        let inbound = movement(4, MovementType::Inbound);
        assert_eq!(edit_delta(&inbound, 6, MovementType::Inbound).unwrap(), 2);
        assert_eq!(edit_delta(&inbound, 4, MovementType::Outbound).unwrap(), -8);
    }

    #[test]
    fn flipping_a_huge_movement_does_not_overflow() {
        let outbound = movement(2_000_000_000, MovementType::Outbound);
        assert_matches!(
            edit_delta(&outbound, 2_000_000_000, MovementType::Inbound),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn movement_quantities_are_capped() {
        let input = RecordMovement {
            product_id: Uuid::new_v4(),
            quantity: 2_000_000_000,
            movement_type: MovementType::Inbound,
        };
        assert!(input.validate().is_err());

        let edit = UpdateMovement {
            quantity: Some(1_000_001),
            movement_type: None,
        };
        assert!(edit.validate().is_err());
    }
}
