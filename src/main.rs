use discount_offer_service::{build_router, connect, AppConfig, AppState, DiscountingService};
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 不存在时忽略
    dotenvy::dotenv().ok();

    // 初始化日志 - 使用本地时间格式 (类似Java格式)
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);

    // 创建存储
    let repo = connect(&config.database).await?;
    let service = DiscountingService::new(repo, config.pricing);
    let app = build_router(AppState::new(service, config.upload.clone()));

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST  /api/invoices/upload        - 批量上传发票 (JSON)");
    info!("  POST  /api/invoices/upload/csv    - 批量上传发票 (CSV)");
    info!("  GET   /api/invoices/:id/quote     - 折扣报价预览");
    info!("  POST  /api/discount-offers        - 提交折扣要约");
    info!("  PATCH /api/discount-offers/:id    - 接受/拒绝要约");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
