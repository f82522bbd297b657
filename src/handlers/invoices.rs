use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::common::ok;
use crate::auth::AuthUser;
use crate::services::invoices::{CloseInvoice, CloseOutcome, InvoicePreview};
use crate::{ApiResponse, ApiResult, AppState};

#[utoipa::path(
    get,
    path = "/api/v1/clients/{id}/invoice",
    params(("id" = Uuid, Path, description = "Client id")),
    responses(
        (status = 200, description = "Invoice aggregated from the client's open orders", body = ApiResponse<InvoicePreview>),
        (status = 404, description = "Unknown client", body = crate::errors::ErrorResponse),
        (status = 503, description = "Store unavailable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn preview_invoice(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    _user: AuthUser,
) -> ApiResult<InvoicePreview> {
    Ok(ok(state.services.invoices.preview(client_id).await?))
}

/// Settles every open order of the client with one payment method.
///
/// A client without open orders yields `nothing_to_close`, not an error.
#[utoipa::path(
    post,
    path = "/api/v1/clients/{id}/invoice/close",
    params(("id" = Uuid, Path, description = "Client id")),
    request_body = CloseInvoice,
    responses(
        (status = 200, description = "Outcome of the close: closed or nothing_to_close", body = ApiResponse<CloseOutcome>),
        (status = 404, description = "Unknown client", body = crate::errors::ErrorResponse),
        (status = 500, description = "Write failed and was rolled back", body = crate::errors::ErrorResponse),
        (status = 503, description = "Store unavailable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn close_invoice(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    _user: AuthUser,
    Json(payload): Json<CloseInvoice>,
) -> ApiResult<CloseOutcome> {
    Ok(ok(state
        .services
        .invoices
        .close(client_id, payload.payment_method)
        .await?))
}
