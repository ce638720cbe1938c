use crate::api::dto::{
    ApiJson, ApiPath, ApiQuery, CsvUploadQuery, DecideOfferRequest, QuoteQuery,
    SubmitOfferRequest, SupplierQuery, UploadRequest, UploadResponse, UserQuery,
};
use crate::api::AppState;
use crate::calc::OfferQuote;
use crate::error::{AppError, AppResult};
use crate::ingest;
use crate::models::{
    AutoApprovalSettings, DiscountOffer, Invoice, InvoiceUpdate, KpiSummary,
    NewAutoApprovalSettings, OfferDecision, OfferWithInvoice, Role, SettingsView,
};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use validator::Validate;

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 供应商的发票列表
pub async fn list_invoices(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SupplierQuery>,
) -> AppResult<Json<Vec<Invoice>>> {
    let supplier_id = query.require()?;
    Ok(Json(state.service.list_invoices(&supplier_id).await?))
}

/// JSON 批量上传
pub async fn upload_invoices(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<UploadRequest>,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    req.validate()?;
    let created = state
        .service
        .upload_invoices(req.invoices, &req.supplier_id)
        .await?;
    Ok((StatusCode::CREATED, Json(UploadResponse::uploaded(created.len()))))
}

/// CSV 文件上传, 请求体为原始文件内容
pub async fn upload_csv(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CsvUploadQuery>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let limit = state.upload.max_bytes;
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            let size = headers
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(limit + 1);
            AppError::PayloadTooLarge { size, limit }
        } else {
            AppError::Validation(rejection.body_text())
        }
    })?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    ingest::check_upload(content_type, query.file_name.as_deref(), body.len(), limit)?;

    let supplier_id = SupplierQuery {
        supplier_id: query.supplier_id,
    }
    .require()?;
    let created = state.service.upload_csv(&body, &supplier_id).await?;
    Ok((StatusCode::CREATED, Json(UploadResponse::uploaded(created.len()))))
}

/// 部分更新发票
pub async fn update_invoice(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<InvoiceUpdate>,
) -> AppResult<Json<Invoice>> {
    Ok(Json(state.service.update_invoice(id, update).await?))
}

/// 报价预览
pub async fn quote_invoice(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<QuoteQuery>,
) -> AppResult<Json<OfferQuote>> {
    let rate = query
        .rate
        .ok_or_else(|| AppError::Validation("Discount rate is required".to_string()))?;
    Ok(Json(state.service.quote(id, rate).await?))
}

pub async fn submit_offer(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SubmitOfferRequest>,
) -> AppResult<(StatusCode, Json<DiscountOffer>)> {
    let offer = state.service.submit_offer(req.into_submission()?).await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

pub async fn pending_offers(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<OfferWithInvoice>>> {
    Ok(Json(state.service.pending_offers_with_invoices().await?))
}

pub async fn supplier_offers(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SupplierQuery>,
) -> AppResult<Json<Vec<DiscountOffer>>> {
    let supplier_id = query.require()?;
    Ok(Json(state.service.offers_by_supplier(&supplier_id).await?))
}

/// 买方决定: 只接受 accepted / rejected
pub async fn decide_offer(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<DecideOfferRequest>,
) -> AppResult<Json<DiscountOffer>> {
    let decision: OfferDecision = req
        .status
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(AppError::Validation)?;
    Ok(Json(state.service.decide_offer(id, decision).await?))
}

pub async fn get_settings(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> AppResult<Json<SettingsView>> {
    let user_id = query.require()?;
    Ok(Json(state.service.settings(&user_id).await?))
}

pub async fn save_settings(
    State(state): State<AppState>,
    ApiJson(settings): ApiJson<NewAutoApprovalSettings>,
) -> AppResult<(StatusCode, Json<AutoApprovalSettings>)> {
    let saved = state.service.save_settings(settings).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// 看板 KPI, role 为 supplier 或 buyer
pub async fn kpi(
    State(state): State<AppState>,
    ApiPath(role): ApiPath<String>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> AppResult<Json<KpiSummary>> {
    let user_id = query.require()?;
    let role: Role = role.parse().map_err(AppError::Validation)?;
    Ok(Json(state.service.kpi(role, &user_id).await?))
}

pub async fn buyers(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.service.buyers().await?))
}

pub async fn suppliers(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.service.suppliers().await?))
}
