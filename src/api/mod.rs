pub mod dto;
pub mod handlers;

use crate::config::UploadConfig;
use crate::service::DiscountingService;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// 共享状态
#[derive(Clone)]
pub struct AppState {
    pub service: DiscountingService,
    pub upload: UploadConfig,
}

impl AppState {
    pub fn new(service: DiscountingService, upload: UploadConfig) -> Self {
        Self { service, upload }
    }
}

/// 构建路由: /health 与 /api/*
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/invoices", get(handlers::list_invoices))
        .route("/invoices/upload", post(handlers::upload_invoices))
        .route("/invoices/upload/csv", post(handlers::upload_csv))
        .route("/invoices/:id", patch(handlers::update_invoice))
        .route("/invoices/:id/quote", get(handlers::quote_invoice))
        .route(
            "/discount-offers",
            get(handlers::supplier_offers).post(handlers::submit_offer),
        )
        .route("/discount-offers/pending", get(handlers::pending_offers))
        .route("/discount-offers/:id", patch(handlers::decide_offer))
        .route(
            "/auto-approval-settings",
            get(handlers::get_settings).post(handlers::save_settings),
        )
        .route("/kpi/:role", get(handlers::kpi))
        .route("/buyers", get(handlers::buyers))
        .route("/suppliers", get(handlers::suppliers));

    let body_limit = state.upload.max_bytes;
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}
