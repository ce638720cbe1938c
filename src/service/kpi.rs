use crate::db::Repository;
use crate::error::{AppError, AppResult};
use crate::models::{KpiSummary, Role};

/// 按角色汇总看板 KPI
///
/// - 供应商: 发票数为其名下发票, 折扣额与平均折扣率来自其已接受的要约
/// - 买方: 发票数为待处理要约数, 折扣额与平均折扣率来自全部已接受要约
pub async fn summarize(
    repo: &dyn Repository,
    role: Role,
    user_id: &str,
) -> AppResult<KpiSummary> {
    if user_id.trim().is_empty() {
        return Err(AppError::Validation("User ID is required".to_string()));
    }

    match role {
        Role::Supplier => {
            let invoices = repo.list_invoices_by_supplier(user_id).await?;
            let offers = repo.list_offers_by_supplier(user_id).await?;
            Ok(KpiSummary::from_offers(invoices.len(), &offers))
        }
        Role::Buyer => {
            let pending = repo.list_pending_offers().await?;
            let accepted = repo.list_accepted_offers().await?;
            Ok(KpiSummary::from_offers(pending.len(), &accepted))
        }
    }
}
