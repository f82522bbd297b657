use std::sync::Arc;

use chrono::{NaiveDate, SubsecRound, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::cache::{DataCache, Dataset};
use crate::db::Gateway;
use crate::entities::{client, order};
use crate::errors::ServiceError;
use crate::locator::ensure_key_safe;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterClient {
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    #[validate(length(max = 32))]
    pub gender: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    /// Generated from the name when absent
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateClient {
    #[validate(length(min = 1, max = 120))]
    pub full_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    #[validate(length(max = 32))]
    pub gender: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
}

/// Lowercase ASCII slug of a name, words joined with dots.
pub fn email_slug(full_name: &str) -> String {
    let words: Vec<String> = full_name
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter_map(fold_char)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect();

    if words.is_empty() {
        "cliente".to_string()
    } else {
        words.join(".")
    }
}

fn fold_char(c: char) -> Option<char> {
    let folded = match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
        'ç' | 'Ç' => 'c',
        'ñ' | 'Ñ' => 'n',
        c if c.is_ascii_alphanumeric() => c.to_ascii_lowercase(),
        _ => return None,
    };
    Some(folded)
}

/// First free address among `slug@domain`, `slug.2@domain`, `slug.3@domain`, ...
pub fn first_free_email(slug: &str, domain: &str, taken: &[String]) -> String {
    let mut candidate = format!("{slug}@{domain}");
    let mut suffix = 2;
    while taken.iter().any(|email| email.eq_ignore_ascii_case(&candidate)) {
        candidate = format!("{slug}.{suffix}@{domain}");
        suffix += 1;
    }
    candidate
}

async fn ensure_email_free<C: ConnectionTrait>(
    conn: &C,
    email: &str,
    except: Option<Uuid>,
) -> Result<(), ServiceError> {
    let mut query = client::Entity::find().filter(client::Column::Email.eq(email));
    if let Some(id) = except {
        query = query.filter(client::Column::Id.ne(id));
    }
    if query.one(conn).await?.is_some() {
        return Err(ServiceError::validation(format!(
            "email '{email}' is already registered"
        )));
    }
    Ok(())
}

fn normalized_name(raw: &str) -> Result<String, ServiceError> {
    let name = raw.trim().to_string();
    if name.is_empty() {
        return Err(ServiceError::validation("full_name is required"));
    }
    ensure_key_safe("full_name", &name)?;
    Ok(name)
}

#[derive(Clone)]
pub struct ClientService {
    gateway: Arc<Gateway>,
    cache: DataCache,
    email_domain: String,
}

impl ClientService {
    pub fn new(gateway: Arc<Gateway>, cache: DataCache, email_domain: impl Into<String>) -> Self {
        Self {
            gateway,
            cache,
            email_domain: email_domain.into(),
        }
    }

    /// Registers a client, generating a unique email when none is given.
    #[instrument(skip(self, input), fields(full_name = %input.full_name))]
    pub async fn register(&self, input: RegisterClient) -> Result<client::Model, ServiceError> {
        input.validate()?;
        let full_name = normalized_name(&input.full_name)?;
        let domain = self.email_domain.clone();

        let created = self
            .gateway
            .transaction(move |txn| {
                Box::pin(async move {
                    let email = match input.email {
                        Some(email) => {
                            let email = email.trim().to_ascii_lowercase();
                            ensure_email_free(txn, &email, None).await?;
                            email
                        }
                        None => {
                            let slug = email_slug(&full_name);
                            let taken: Vec<String> = client::Entity::find()
                                .filter(client::Column::Email.starts_with(slug.as_str()))
                                .all(txn)
                                .await?
                                .into_iter()
                                .map(|c| c.email)
                                .collect();
                            first_free_email(&slug, &domain, &taken)
                        }
                    };

                    let model = client::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        full_name: Set(full_name),
                        birth_date: Set(input.birth_date),
                        gender: Set(input.gender),
                        phone: Set(input.phone),
                        email: Set(email),
                        address: Set(input.address),
                        registration_timestamp: Set(Utc::now().trunc_subsecs(6)),
                    };
                    Ok(model.insert(txn).await?)
                })
            })
            .await?;

        self.cache.invalidate(&[Dataset::Clients]).await;
        info!(client_id = %created.id, email = %created.email, "Client registered");
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: UpdateClient) -> Result<client::Model, ServiceError> {
        input.validate()?;
        let full_name = input.full_name.as_deref().map(normalized_name).transpose()?;

        let updated = self
            .gateway
            .transaction(move |txn| {
                Box::pin(async move {
                    let existing = client::Entity::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::not_found(format!("client {id}")))?;

                    let mut model: client::ActiveModel = existing.into();
                    if let Some(name) = full_name {
                        model.full_name = Set(name);
                    }
                    if let Some(email) = input.email {
                        let email = email.trim().to_ascii_lowercase();
                        ensure_email_free(txn, &email, Some(id)).await?;
                        model.email = Set(email);
                    }
                    if input.birth_date.is_some() {
                        model.birth_date = Set(input.birth_date);
                    }
                    if input.gender.is_some() {
                        model.gender = Set(input.gender);
                    }
                    if input.phone.is_some() {
                        model.phone = Set(input.phone);
                    }
                    if input.address.is_some() {
                        model.address = Set(input.address);
                    }
                    Ok(model.update(txn).await?)
                })
            })
            .await?;

        // renamed clients show up under the new name in order listings
        self.cache
            .invalidate(&[Dataset::Clients, Dataset::Orders])
            .await;
        info!(client_id = %id, "Client updated");
        Ok(updated)
    }

    /// Deletes a client together with all of its orders.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<u64, ServiceError> {
        let orders_removed = self
            .gateway
            .transaction(move |txn| {
                Box::pin(async move {
                    let removed = order::Entity::delete_many()
                        .filter(order::Column::ClientId.eq(id))
                        .exec(txn)
                        .await?
                        .rows_affected;
                    let deleted = client::Entity::delete_by_id(id).exec(txn).await?;
                    if deleted.rows_affected == 0 {
                        return Err(ServiceError::not_found(format!("client {id}")));
                    }
                    Ok(removed)
                })
            })
            .await?;

        self.cache
            .invalidate(&[Dataset::Clients, Dataset::Orders])
            .await;
        info!(client_id = %id, orders_removed, "Client deleted");
        Ok(orders_removed)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<client::Model, ServiceError> {
        let conn = self.gateway.connection().await?;
        client::Entity::find_by_id(id)
            .one(&conn)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("client {id}")))
    }

    /// Natural-key lookup; names are not unique, so every match is returned.
    #[instrument(skip(self))]
    pub async fn find_by_name(&self, full_name: &str) -> Result<Vec<client::Model>, ServiceError> {
        let name = full_name.trim().to_string();
        self.gateway
            .read_or_default("clients.by_name", move |conn| {
                Box::pin(async move {
                    client::Entity::find()
                        .filter(client::Column::FullName.eq(name))
                        .order_by_asc(client::Column::RegistrationTimestamp)
                        .all(&conn)
                        .await
                })
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<client::Model>, ServiceError> {
        let gateway = self.gateway.clone();
        self.cache
            .get_or_load(Dataset::Clients, "all", || async move {
                gateway
                    .read_or_default("clients.list", |conn| {
                        Box::pin(async move {
                            client::Entity::find()
                                .order_by_asc(client::Column::FullName)
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
    use rstest::rstest;

    #[rstest]
    #[case("Ana Souza", "ana.souza")]
    #[case("  João   da Silva ", "joao.da.silva")]
    #[case("Conceição Araújo", "conceicao.araujo")]
    #[case("O'Neil", "oneil")]
    #[case("???", "cliente")]
    fn slugs_are_ascii_and_dotted(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(email_slug(name), expected);
    }

    #[test]
    fn collisions_get_numeric_suffixes() {
        let domain = "clube.test";
        assert_eq!(first_free_email("ana", domain, &[]), "ana@clube.test");

        let taken = vec!["ana@clube.test".to_string(), "ana.2@clube.test".to_string()];
        assert_eq!(first_free_email("ana", domain, &taken), "ana.3@clube.test");
    }

    #[test]
    fn names_with_key_delimiter_are_rejected() {
        assert!(normalized_name("Ana|Bia").is_err());
        assert!(normalized_name("   ").is_err());
        assert_eq!(normalized_name(" Ana ").unwrap(), "Ana");
    }
}
