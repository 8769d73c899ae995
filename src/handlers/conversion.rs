use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crate::client::{MesApi, MesCredentials, OnhandQuery};
use crate::models::conversion::{AccountAlias, InventoryRow, PostingRunReport, WarehouseRef};
use crate::models::error::ConvertError;
use crate::models::snapshot::ConversionSnapshot;
use crate::services::PostingService;
use crate::AppState;

type HandlerError = (StatusCode, Json<Value>);

/// Create conversion routes
pub fn create_convert_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/inventory/search", post(search_inventory))
        .route("/reference/warehouses", get(list_warehouses))
        .route("/reference/aliases", get(list_aliases))
        .route("/cart", get(get_cart).post(add_to_cart).delete(clear_cart))
        .route("/cart/{item_code}/{lot_code}", delete(remove_from_cart))
        .route("/preview", post(build_preview))
        .route("/lot-date", post(edit_lot_date))
        .route("/snapshot", get(save_snapshot).post(load_snapshot))
        .route("/post-issue", post(post_issue))
        .route("/post-receipt", post(post_receipt))
        .route("/labels", get(get_labels))
}

/// POST /api/convert/login
async fn login(
    State(state): State<AppState>,
    Json(creds): Json<MesCredentials>,
) -> Result<Json<Value>, HandlerError> {
    match state.mes.login(&creds).await {
        Ok(info) => Ok(Json(json!({
            "success": true,
            "userKey": info.user_key,
            "companyCode": info.company_code,
            "plantCode": info.plant_code,
        }))),
        Err(e) => handle_convert_error(e),
    }
}

/// POST /api/convert/inventory/search
async fn search_inventory(
    State(state): State<AppState>,
    Json(query): Json<OnhandQuery>,
) -> Result<Json<Vec<InventoryRow>>, HandlerError> {
    match state.mes.search_onhand_lots(&query).await {
        Ok(rows) => Ok(Json(rows)),
        Err(e) => handle_convert_error(e),
    }
}

/// GET /api/convert/reference/warehouses
async fn list_warehouses(
    State(state): State<AppState>,
) -> Result<Json<Vec<WarehouseRef>>, HandlerError> {
    match state.mes.list_warehouses().await {
        Ok(rows) => Ok(Json(rows)),
        Err(e) => handle_convert_error(e),
    }
}

/// GET /api/convert/reference/aliases
async fn list_aliases(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountAlias>>, HandlerError> {
    match state.mes.list_account_aliases().await {
        Ok(rows) => Ok(Json(rows)),
        Err(e) => handle_convert_error(e),
    }
}

/// GET /api/convert/cart
async fn get_cart(State(state): State<AppState>) -> Json<Vec<InventoryRow>> {
    Json(state.store.cart().await)
}

/// POST /api/convert/cart
async fn add_to_cart(
    State(state): State<AppState>,
    Json(rows): Json<Vec<InventoryRow>>,
) -> Json<Value> {
    let added = state.store.add_to_cart(rows).await;
    Json(json!({ "success": true, "added": added }))
}

/// DELETE /api/convert/cart/{item_code}/{lot_code}
async fn remove_from_cart(
    State(state): State<AppState>,
    Path((item_code, lot_code)): Path<(String, String)>,
) -> Result<Json<Value>, HandlerError> {
    if state.store.remove_from_cart(&lot_code, &item_code).await {
        Ok(Json(json!({ "success": true })))
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Row not found",
                "message": format!("No cart row for item '{item_code}' lot '{lot_code}'"),
            })),
        ))
    }
}

/// DELETE /api/convert/cart
async fn clear_cart(State(state): State<AppState>) -> Json<Value> {
    state.store.clear().await;
    Json(json!({ "success": true }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreviewRequest {
    #[serde(default)]
    after_warehouse: Option<WarehouseRef>,
    #[serde(default)]
    alias: Option<AccountAlias>,
    #[serde(default)]
    label_copies: Option<u32>,
}

/// POST /api/convert/preview
///
/// Applies the operator's selections, then (re)derives the after-identity
/// for every cart row.
async fn build_preview(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<Value>, HandlerError> {
    if req.after_warehouse.is_some() {
        state.store.set_after_warehouse(req.after_warehouse).await;
    }
    if req.alias.is_some() {
        state.store.set_alias(req.alias).await;
    }
    if let Some(copies) = req.label_copies {
        state.store.set_label_copies(copies).await;
    }
    match state.store.build_preview(state.mes.as_ref()).await {
        Ok(set) => Ok(Json(json!({ "success": true, "pending": set }))),
        Err(e) => handle_convert_error(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LotDateRequest {
    after_item_code: String,
    lot_date: String,
}

/// POST /api/convert/lot-date
async fn edit_lot_date(
    State(state): State<AppState>,
    Json(req): Json<LotDateRequest>,
) -> Result<Json<Value>, HandlerError> {
    match state.store.apply_lot_edit(&req.after_item_code, &req.lot_date).await {
        Ok(edited) => Ok(Json(json!({ "success": true, "edited": edited }))),
        Err(e) => handle_convert_error(e),
    }
}

/// GET /api/convert/snapshot
async fn save_snapshot(
    State(state): State<AppState>,
) -> Result<Json<ConversionSnapshot>, HandlerError> {
    match state.store.save().await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e) => handle_convert_error(e),
    }
}

/// POST /api/convert/snapshot
async fn load_snapshot(
    State(state): State<AppState>,
    Json(snapshot): Json<ConversionSnapshot>,
) -> Result<Json<Value>, HandlerError> {
    match state.store.load(state.mes.as_ref(), snapshot).await {
        Ok(summary) => Ok(Json(json!({ "success": true, "summary": summary }))),
        Err(e) => handle_convert_error(e),
    }
}

/// POST /api/convert/post-issue
async fn post_issue(State(state): State<AppState>) -> Result<Json<Value>, HandlerError> {
    run_posting(&state, true).await
}

/// POST /api/convert/post-receipt
async fn post_receipt(State(state): State<AppState>) -> Result<Json<Value>, HandlerError> {
    run_posting(&state, false).await
}

async fn run_posting(state: &AppState, issue: bool) -> Result<Json<Value>, HandlerError> {
    let session = match state.mes.session().await {
        Ok(s) => s,
        Err(e) => return handle_convert_error(e),
    };
    let set = state.store.pending().await;
    let service = PostingService::new(
        state.mes.as_ref(),
        &state.clock,
        session.company_id,
        session.plant_id,
    );
    let run = if issue {
        service.run_issue(&set).await
    } else {
        service.run_receipt(&set).await
    };
    match run {
        Ok(report) => Ok(report_response(report)),
        Err(e) => handle_convert_error(e),
    }
}

/// A failed run still returns its report; the remote effects of committed
/// batches are real and the operator needs to see them.
fn report_response(report: PostingRunReport) -> Json<Value> {
    Json(json!({ "success": report.ok, "report": report }))
}

/// GET /api/convert/labels
///
/// Barcode payloads for the pending rows, repeated per the configured copy
/// count.
async fn get_labels(State(state): State<AppState>) -> Json<Value> {
    let pending = state.store.pending().await;
    let labels: Vec<Value> = pending
        .rows
        .iter()
        .map(|row| {
            json!({
                "itemCode": row.after.item_code,
                "itemName": row.after.item_name,
                "lotCode": row.after.lot_code,
                "quantity": row.after.quantity,
                "barcode": row.label_barcode_text(),
                "copies": pending.label_copies,
            })
        })
        .collect();
    Json(json!({ "labels": labels }))
}

fn handle_convert_error<T>(error: ConvertError) -> Result<T, HandlerError> {
    let status = match &error {
        ConvertError::Validation(_) => StatusCode::BAD_REQUEST,
        ConvertError::SnapshotIncompatible(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ConvertError::StaleInventory { .. } => StatusCode::CONFLICT,
        ConvertError::NoSession => StatusCode::UNAUTHORIZED,
        ConvertError::RemoteRejected { .. }
        | ConvertError::NumberingExhausted { .. }
        | ConvertError::Remote(_) => StatusCode::BAD_GATEWAY,
    };
    if status == StatusCode::BAD_GATEWAY {
        error!(kind = error.kind(), "Remote MES failure: {error}");
    }
    Err((
        status,
        Json(json!({
            "error": error.kind(),
            "message": error.to_string(),
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (ConvertError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                ConvertError::SnapshotIncompatible("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ConvertError::StaleInventory { reference: "x".into() },
                StatusCode::CONFLICT,
            ),
            (ConvertError::NoSession, StatusCode::UNAUTHORIZED),
            (ConvertError::Remote("x".into()), StatusCode::BAD_GATEWAY),
            (
                ConvertError::NumberingExhausted { base_date: "2024-03-15".into() },
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, expected) in cases {
            let (status, _) = handle_convert_error::<()>(err).unwrap_err();
            assert_eq!(status, expected);
        }
    }
}
