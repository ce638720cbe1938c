pub mod api;
pub mod calc;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod service;

pub use api::{build_router, AppState};
pub use config::AppConfig;
pub use db::{connect, create_pool, Repository};
pub use error::{AppError, AppResult};
pub use service::DiscountingService;
