use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Beach Club API",
        version = "0.1.0",
        description = r#"
# Beach Club back office

Clients, products, stock movements and orders of a beach-sports club, and the
invoices that settle a client's open orders.

## Authentication

Log in at `POST /auth/login` with the operator account and send the token on
every `/api/v1` request:

```
Authorization: Bearer <access_token>
```

## Composite keys

Orders and stock movements can also be addressed by their natural fields
joined with `|`, passed as the `key` query parameter:

- order: `client name|product name|ordered_at`
- stock movement: `product name|moved_at`

Timestamps use RFC 3339 with microseconds, e.g. `2024-06-01T10:00:00.000000Z`.
A key that matches more than one row answers `409` and changes nothing.

## Money

Amounts travel as decimal strings with two places. Receipts format them as
Brazilian reais, e.g. `R$ 1.234,50`.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "auth", description = "Operator login"),
        (name = "clients", description = "Club clients"),
        (name = "products", description = "Products and on-hand stock"),
        (name = "stock", description = "Stock movement ledger"),
        (name = "orders", description = "Client orders"),
        (name = "invoices", description = "Invoice preview and settlement"),
        (name = "cache", description = "Cached list snapshots"),
        (name = "health", description = "Health checks")
    ),
    paths(
        crate::handlers::auth::login,

        crate::handlers::clients::list_clients,
        crate::handlers::clients::register_client,
        crate::handlers::clients::get_client,
        crate::handlers::clients::find_clients_by_name,
        crate::handlers::clients::update_client,
        crate::handlers::clients::delete_client,

        crate::handlers::products::list_products,
        crate::handlers::products::create_product,
        crate::handlers::products::get_product,
        crate::handlers::products::find_products_by_name,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,

        crate::handlers::stock::list_movements,
        crate::handlers::stock::record_movement,
        crate::handlers::stock::update_movement,
        crate::handlers::stock::delete_movement,
        crate::handlers::stock::update_movement_by_key,
        crate::handlers::stock::delete_movement_by_key,

        crate::handlers::orders::list_orders,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::locate_order,
        crate::handlers::orders::update_order_by_key,
        crate::handlers::orders::delete_order_by_key,

        crate::handlers::invoices::preview_invoice,
        crate::handlers::invoices::close_invoice,

        crate::handlers::cache::refresh_cache,

        crate::health::health_check,
        crate::health::readiness_check,
    ),
    components(
        schemas(
            crate::ResponseMeta,
            crate::errors::ErrorResponse,
            crate::handlers::auth::LoginRequest,
            crate::auth::TokenResponse,
            crate::lifecycle::OrderStatus,
            crate::lifecycle::PaymentMethod,
            crate::entities::stock_movement::MovementType,
            crate::locator::RecordKey,
            crate::invoice::Invoice,
            crate::invoice::InvoiceLine,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

/// Registers the operator bearer token scheme referenced by `bearer_auth`.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_the_api() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Beach Club API"));
        assert!(json.contains("/api/v1/clients/{id}/invoice/close"));
        assert!(json.contains("/api/v1/orders/by-key"));
        assert!(json.contains("bearer_auth"));
    }
}
