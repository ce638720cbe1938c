pub mod memory;
pub mod pool;
pub mod postgres;
pub mod repository;

pub use memory::MemRepository;
pub use pool::{create_pool, run_migrations};
pub use postgres::PgRepository;
pub use repository::{RepoError, RepoResult, Repository};

use crate::config::{DatabaseConfig, StorageBackend};
use crate::error::AppResult;
use crate::models::{InvoiceStatus, NewDiscountOffer, NewInvoice, OfferDecision};
use chrono::NaiveDate;
use std::sync::Arc;

const SAMPLE_SUPPLIER: &str = "supplier1";

/// 按配置创建存储
pub async fn connect(config: &DatabaseConfig) -> AppResult<Arc<dyn Repository>> {
    let repo: Arc<dyn Repository> = match config.backend {
        StorageBackend::Memory => {
            tracing::info!("使用内存存储");
            Arc::new(MemRepository::new())
        }
        StorageBackend::Postgres => {
            let pool = create_pool(config).await?;
            tracing::info!("Database pool created");
            run_migrations(&pool).await?;
            tracing::info!("Database migrations applied");
            Arc::new(PgRepository::new(pool))
        }
    };

    if config.seed_sample_data {
        seed_sample_data(repo.as_ref()).await?;
    }
    Ok(repo)
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

/// 写入演示数据: 三张发票, 其中一张已通过折扣要约完成付款
///
/// 示例供应商已有发票时跳过。
pub async fn seed_sample_data(repo: &dyn Repository) -> RepoResult<()> {
    if !repo.list_invoices_by_supplier(SAMPLE_SUPPLIER).await?.is_empty() {
        tracing::info!("演示数据已存在, 跳过");
        return Ok(());
    }

    let samples = [
        ("INV-001234", 123456.0, ymd(2023, 6, 15), ymd(2023, 8, 15), "Acme Corp"),
        ("INV-001235", 245670.0, ymd(2023, 6, 20), ymd(2023, 8, 20), "Globex"),
        ("INV-001236", 378900.0, ymd(2023, 6, 5), ymd(2023, 8, 5), "Acme Corp"),
    ];
    let invoices = repo
        .create_invoices(
            samples
                .into_iter()
                .map(|(number, amount, issued, due, buyer)| NewInvoice {
                    invoice_number: number.to_string(),
                    invoice_amount: amount,
                    invoice_date: issued,
                    due_date: due,
                    buyer_name: buyer.to_string(),
                    status: InvoiceStatus::Pending,
                    supplier_id: SAMPLE_SUPPLIER.to_string(),
                })
                .collect(),
        )
        .await?;

    if let Some(paid) = invoices.last() {
        let offer = repo
            .submit_offer(NewDiscountOffer {
                invoice_id: paid.id,
                original_amount: 378900.0,
                discount_rate: 2.5,
                discounted_amount: 369427.5,
                discount_value: 9472.5,
                early_payment_date: ymd(2023, 7, 20),
                dcf_value: 365000.0,
                supplier_id: SAMPLE_SUPPLIER.to_string(),
                supplier_name: "Supplier Company".to_string(),
            })
            .await?;
        repo.decide_offer(offer.id, OfferDecision::Accept).await?;
    }

    tracing::info!("已写入演示数据: {} 张发票", invoices.len());
    Ok(())
}
