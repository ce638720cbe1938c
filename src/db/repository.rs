use crate::models::{
    AutoApprovalSettings, DiscountOffer, Invoice, InvoiceStatus, InvoiceUpdate,
    NewAutoApprovalSettings, NewDiscountOffer, NewInvoice, OfferDecision,
};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{entity} with ID {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// 状态比较交换失败: 实际状态与预期不符
    #[error("{entity} {id} is {actual}, expected {expected}")]
    StatusConflict {
        entity: &'static str,
        id: i64,
        expected: String,
        actual: String,
    },

    #[error("Invoice {0} already has a pending discount offer")]
    DuplicateActiveOffer(i64),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl RepoError {
    pub fn invoice_conflict(id: i64, expected: InvoiceStatus, actual: InvoiceStatus) -> Self {
        RepoError::StatusConflict {
            entity: "Invoice",
            id,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn offer_conflict(id: i64, actual: impl ToString) -> Self {
        RepoError::StatusConflict {
            entity: "Discount offer",
            id,
            expected: "pending".to_string(),
            actual: actual.to_string(),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// 存储接口: 内存实现用于测试/本地, PostgreSQL 实现用于生产
///
/// 涉及状态流转的方法都是原子的, 并带状态前置条件 (compare-and-swap)。
#[async_trait]
pub trait Repository: Send + Sync {
    /// 批量新建发票, 全部成功或全部失败
    async fn create_invoices(&self, invoices: Vec<NewInvoice>) -> RepoResult<Vec<Invoice>>;

    async fn get_invoice(&self, id: i64) -> RepoResult<Option<Invoice>>;

    async fn list_invoices_by_supplier(&self, supplier_id: &str) -> RepoResult<Vec<Invoice>>;

    /// 部分更新, 仅当发票当前状态为 `expected` 时生效
    async fn update_invoice(
        &self,
        id: i64,
        expected: InvoiceStatus,
        update: &InvoiceUpdate,
    ) -> RepoResult<Invoice>;

    async fn get_offer(&self, id: i64) -> RepoResult<Option<DiscountOffer>>;

    async fn list_pending_offers(&self) -> RepoResult<Vec<DiscountOffer>>;

    async fn list_accepted_offers(&self) -> RepoResult<Vec<DiscountOffer>>;

    async fn list_offers_by_supplier(&self, supplier_id: &str) -> RepoResult<Vec<DiscountOffer>>;

    /// 新建要约并把发票 pending → pending_approval, 同一事务内完成
    async fn submit_offer(&self, offer: NewDiscountOffer) -> RepoResult<DiscountOffer>;

    /// 要约 pending → accepted|rejected; 接受时发票 pending_approval → completed
    async fn decide_offer(&self, id: i64, decision: OfferDecision) -> RepoResult<DiscountOffer>;

    async fn get_settings(&self, user_id: &str) -> RepoResult<Option<AutoApprovalSettings>>;

    async fn upsert_settings(
        &self,
        settings: NewAutoApprovalSettings,
    ) -> RepoResult<AutoApprovalSettings>;

    /// 发票中出现过的买方名称 (按首次出现顺序去重)
    async fn unique_buyers(&self) -> RepoResult<Vec<String>>;

    /// 要约中出现过的供应商名称 (按首次出现顺序去重)
    async fn unique_suppliers(&self) -> RepoResult<Vec<String>>;
}
