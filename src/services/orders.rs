use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::cache::{DataCache, Dataset};
use crate::db::Gateway;
use crate::entities::{client, order, order_view, product};
use crate::errors::ServiceError;
use crate::lifecycle::{ensure_mutable, OrderStatus};
use crate::locator::{resolve_unique, RecordKey};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrder {
    pub client_id: Uuid,
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1000000))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrder {
    pub product_id: Option<Uuid>,
    #[validate(range(min = 1, max = 1000000))]
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderFilter {
    pub client_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    fn cache_key(&self) -> String {
        format!(
            "client={};status={}",
            self.client_id.map(|id| id.to_string()).unwrap_or_default(),
            self.status.map(|s| s.to_string()).unwrap_or_default()
        )
    }
}

fn check_order_key(key: &RecordKey) -> Result<(), ServiceError> {
    if key.fields().len() != 3 {
        return Err(ServiceError::validation(format!(
            "order key must be 'client|product|timestamp', got '{key}'"
        )));
    }
    Ok(())
}

async fn find_by_key<C: ConnectionTrait>(
    db: &C,
    key: &RecordKey,
) -> Result<order_view::Model, ServiceError> {
    let fields = key.fields();
    let candidates = order_view::Entity::find()
        .filter(order_view::Column::ClientName.eq(fields[0]))
        .filter(order_view::Column::ProductName.eq(fields[1]))
        .all(db)
        .await?;
    resolve_unique(key, candidates)
}

async fn update_order(
    txn: &DatabaseTransaction,
    id: Uuid,
    input: UpdateOrder,
) -> Result<(), ServiceError> {
    let existing = order::Entity::find_by_id(id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("order {id}")))?;
    ensure_mutable(existing.status)?;

    let mut model: order::ActiveModel = existing.into();
    if let Some(product_id) = input.product_id {
        if product::Entity::find_by_id(product_id).one(txn).await?.is_none() {
            return Err(ServiceError::not_found(format!("product {product_id}")));
        }
        model.product_id = Set(product_id);
    }
    if let Some(quantity) = input.quantity {
        model.quantity = Set(quantity);
    }
    model.update(txn).await?;
    Ok(())
}

async fn delete_order(txn: &DatabaseTransaction, id: Uuid) -> Result<(), ServiceError> {
    let existing = order::Entity::find_by_id(id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("order {id}")))?;
    ensure_mutable(existing.status)?;
    order::Entity::delete_by_id(id).exec(txn).await?;
    Ok(())
}

#[derive(Clone)]
pub struct OrderService {
    gateway: Arc<Gateway>,
    cache: DataCache,
}

impl OrderService {
    pub fn new(gateway: Arc<Gateway>, cache: DataCache) -> Self {
        Self { gateway, cache }
    }

    /// Creates an open order stamped with the server time.
    #[instrument(skip(self, input), fields(client_id = %input.client_id, product_id = %input.product_id))]
    pub async fn create(&self, input: CreateOrder) -> Result<order_view::Model, ServiceError> {
        input.validate()?;

        let order_id = self
            .gateway
            .transaction(move |txn| {
                Box::pin(async move {
                    if client::Entity::find_by_id(input.client_id).one(txn).await?.is_none() {
                        return Err(ServiceError::not_found(format!("client {}", input.client_id)));
                    }
                    if product::Entity::find_by_id(input.product_id).one(txn).await?.is_none() {
                        return Err(ServiceError::not_found(format!("product {}", input.product_id)));
                    }

                    let created = order::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        client_id: Set(input.client_id),
                        product_id: Set(input.product_id),
                        quantity: Set(input.quantity),
                        ordered_at: Set(Utc::now().trunc_subsecs(6)),
                        status: Set(OrderStatus::Open),
                        closed_at: Set(None),
                    }
                    .insert(txn)
                    .await?;
                    Ok(created.id)
                })
            })
            .await?;

        self.cache.invalidate(&[Dataset::Orders]).await;
        info!(order_id = %order_id, "Order created");
        self.get(order_id).await
    }

    /// Changes quantity or product of an order that is still open.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: UpdateOrder) -> Result<order_view::Model, ServiceError> {
        input.validate()?;

        self.gateway
            .transaction(move |txn| Box::pin(async move { update_order(txn, id, input).await }))
            .await?;

        self.cache.invalidate(&[Dataset::Orders]).await;
        info!(order_id = %id, "Order updated");
        self.get(id).await
    }

    /// Deletes an order that is still open.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.gateway
            .transaction(move |txn| Box::pin(async move { delete_order(txn, id).await }))
            .await?;

        self.cache.invalidate(&[Dataset::Orders]).await;
        info!(order_id = %id, "Order deleted");
        Ok(())
    }

    /// Finds the single order addressed by `client|product|timestamp`.
    #[instrument(skip(self))]
    pub async fn locate(&self, key: &RecordKey) -> Result<order_view::Model, ServiceError> {
        check_order_key(key)?;
        let conn = self.gateway.connection().await?;
        find_by_key(&conn, key).await
    }

    /// Resolves the key and edits the order in one transaction.
    #[instrument(skip(self, input))]
    pub async fn update_by_key(
        &self,
        key: &RecordKey,
        input: UpdateOrder,
    ) -> Result<order_view::Model, ServiceError> {
        input.validate()?;
        check_order_key(key)?;
        let key = key.clone();

        let id = self
            .gateway
            .transaction(move |txn| {
                Box::pin(async move {
                    let target = find_by_key(txn, &key).await?;
                    update_order(txn, target.order_id, input).await?;
                    Ok(target.order_id)
                })
            })
            .await?;

        self.cache.invalidate(&[Dataset::Orders]).await;
        info!(order_id = %id, "Order updated by key");
        self.get(id).await
    }

    /// Resolves the key and deletes the order in one transaction.
    #[instrument(skip(self))]
    pub async fn delete_by_key(&self, key: &RecordKey) -> Result<(), ServiceError> {
        check_order_key(key)?;
        let key = key.clone();

        let id = self
            .gateway
            .transaction(move |txn| {
                Box::pin(async move {
                    let target = find_by_key(txn, &key).await?;
                    delete_order(txn, target.order_id).await?;
                    Ok(target.order_id)
                })
            })
            .await?;

        self.cache.invalidate(&[Dataset::Orders]).await;
        info!(order_id = %id, "Order deleted by key");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<order_view::Model, ServiceError> {
        let conn = self.gateway.connection().await?;
        order_view::Entity::find_by_id(id)
            .one(&conn)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("order {id}")))
    }

    /// Lists orders from `order_product_view`, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: OrderFilter) -> Result<Vec<order_view::Model>, ServiceError> {
        let gateway = self.gateway.clone();
        let key = filter.cache_key();
        self.cache
            .get_or_load(Dataset::Orders, &key, || async move {
                gateway
                    .read_or_default("orders.list", move |conn| {
                        Box::pin(async move {
                            let mut query = order_view::Entity::find();
                            if let Some(client_id) = filter.client_id {
                                query = query.filter(order_view::Column::ClientId.eq(client_id));
                            }
                            if let Some(status) = filter.status {
                                query = query.filter(order_view::Column::Status.eq(status));
                            }
                            query
                                .order_by_desc(order_view::Column::OrderedAt)
                                .all(&conn)
                                .await
                        })
                    })
                    .await
            })
            .await
    }
}
