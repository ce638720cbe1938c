use crate::calc::{quote_offer, OfferQuote, PricingPolicy};
use crate::db::Repository;
use crate::error::{AppError, AppResult};
use crate::ingest::{self, InvoiceRow};
use crate::models::{
    AutoApprovalSettings, DiscountOffer, Invoice, InvoiceStatus, InvoiceUpdate, KpiSummary,
    NewAutoApprovalSettings, NewDiscountOffer, OfferDecision, OfferWithInvoice, Role,
    SettingsView,
};
use crate::service::kpi;
use chrono::{Local, NaiveDate};
use futures::future::try_join_all;
use std::sync::Arc;
use validator::Validate;

/// 客户端提交的金额与服务端重算值的允许误差
pub const QUOTE_TOLERANCE: f64 = 0.01;

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// 客户端预览时算出的数值, 提交时与服务端重算结果比对
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimedFigures {
    pub original_amount: Option<f64>,
    pub discount_value: Option<f64>,
    pub discounted_amount: Option<f64>,
    pub dcf_value: Option<f64>,
    pub early_payment_date: Option<NaiveDate>,
}

impl ClaimedFigures {
    /// 返回第一个与报价不一致的字段名
    fn first_mismatch(&self, quote: &OfferQuote) -> Option<&'static str> {
        let amounts = [
            ("originalAmount", self.original_amount, quote.breakdown.original_amount),
            ("discountValue", self.discount_value, quote.breakdown.discount_value),
            ("discountedAmount", self.discounted_amount, quote.breakdown.discounted_amount),
            ("dcfValue", self.dcf_value, quote.dcf_value),
        ];
        for (field, claimed, actual) in amounts {
            if let Some(claimed) = claimed {
                if !((claimed - actual).abs() <= QUOTE_TOLERANCE) {
                    return Some(field);
                }
            }
        }
        match self.early_payment_date {
            Some(date) if date != quote.early_payment_date => Some("earlyPaymentDate"),
            _ => None,
        }
    }
}

/// 要约提交参数
#[derive(Debug, Clone, PartialEq)]
pub struct OfferSubmission {
    pub invoice_id: i64,
    pub discount_rate: f64,
    pub supplier_id: String,
    pub supplier_name: String,
    pub claimed: ClaimedFigures,
}

/// 提前付款折扣服务
///
/// 持有注入的存储与定价策略, 所有状态流转都委托给存储的原子操作。
#[derive(Clone)]
pub struct DiscountingService {
    repo: Arc<dyn Repository>,
    pricing: PricingPolicy,
    today: fn() -> NaiveDate,
}

impl DiscountingService {
    pub fn new(repo: Arc<dyn Repository>, pricing: PricingPolicy) -> Self {
        Self {
            repo,
            pricing,
            today: local_today,
        }
    }

    /// 替换"今天"的来源, 用于固定日期的测试
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    async fn require_invoice(&self, id: i64) -> AppResult<Invoice> {
        self.repo
            .get_invoice(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Invoice with ID {} not found", id)))
    }

    /// 校验全部行后一次性写入
    pub async fn upload_invoices(
        &self,
        rows: Vec<InvoiceRow>,
        supplier_id: &str,
    ) -> AppResult<Vec<Invoice>> {
        if supplier_id.trim().is_empty() {
            return Err(AppError::Validation("supplierId is required".to_string()));
        }
        if rows.is_empty() {
            return Err(AppError::Validation("No invoices to upload".to_string()));
        }

        let invoices = ingest::rows_into_invoices(rows, supplier_id)?;
        let created = self.repo.create_invoices(invoices).await?;
        tracing::info!("供应商 {} 上传发票 {} 张", supplier_id, created.len());
        Ok(created)
    }

    /// 解析 CSV 文件内容并写入
    pub async fn upload_csv(&self, bytes: &[u8], supplier_id: &str) -> AppResult<Vec<Invoice>> {
        let rows = ingest::parse_csv(bytes)?;
        self.upload_invoices(rows, supplier_id).await
    }

    pub async fn list_invoices(&self, supplier_id: &str) -> AppResult<Vec<Invoice>> {
        Ok(self.repo.list_invoices_by_supplier(supplier_id).await?)
    }

    /// 部分更新发票
    ///
    /// 只允许修改 pending 状态的发票; 状态本身只由要约的提交与决定推进。
    pub async fn update_invoice(&self, id: i64, update: InvoiceUpdate) -> AppResult<Invoice> {
        if update.is_empty() {
            return Err(AppError::Validation("No fields to update".to_string()));
        }
        if let Some(amount) = update.invoice_amount {
            if !amount.is_finite() || amount < 0.0 {
                return Err(AppError::Validation(format!(
                    "Invalid invoice amount: {}",
                    amount
                )));
            }
        }

        let updated = self
            .repo
            .update_invoice(id, InvoiceStatus::Pending, &update)
            .await?;
        tracing::info!("发票 {} 已更新", id);
        Ok(updated)
    }

    /// 报价预览, 不落库
    pub async fn quote(&self, invoice_id: i64, discount_rate: f64) -> AppResult<OfferQuote> {
        let invoice = self.require_invoice(invoice_id).await?;
        Ok(quote_offer(&invoice, discount_rate, (self.today)(), &self.pricing)?)
    }

    /// 服务端重算报价后提交要约, 发票同时进入待审批
    pub async fn submit_offer(&self, submission: OfferSubmission) -> AppResult<DiscountOffer> {
        let invoice = self.require_invoice(submission.invoice_id).await?;
        if invoice.status != InvoiceStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Invoice {} is {}, expected {}",
                invoice.id,
                invoice.status,
                InvoiceStatus::Pending
            )));
        }

        let quote = quote_offer(
            &invoice,
            submission.discount_rate,
            (self.today)(),
            &self.pricing,
        )?;
        if let Some(field) = submission.claimed.first_mismatch(&quote) {
            tracing::warn!(
                "发票 {} 的要约报价已过期: {} 与服务端计算不一致",
                invoice.id,
                field
            );
            return Err(AppError::Validation(format!(
                "Stale quote: {} does not match the current calculation",
                field
            )));
        }

        let offer = self
            .repo
            .submit_offer(NewDiscountOffer::from_quote(
                &quote,
                submission.supplier_id,
                submission.supplier_name,
            ))
            .await?;
        tracing::info!(
            "要约 {} 已提交: 发票 {}, 折扣率 {}%, 折后金额 {}",
            offer.id,
            offer.invoice_id,
            offer.discount_rate,
            offer.discounted_amount
        );
        Ok(offer)
    }

    /// 买方接受或拒绝要约
    pub async fn decide_offer(&self, id: i64, decision: OfferDecision) -> AppResult<DiscountOffer> {
        let offer = self.repo.decide_offer(id, decision).await?;
        tracing::info!("要约 {} 已{}, 发票 {}", id, offer.status, offer.invoice_id);
        Ok(offer)
    }

    /// 待处理要约, 附带对应发票
    pub async fn pending_offers_with_invoices(&self) -> AppResult<Vec<OfferWithInvoice>> {
        let offers = self.repo.list_pending_offers().await?;
        let repo = &self.repo;
        let joined = try_join_all(offers.into_iter().map(|offer| async move {
            let invoice = repo.get_invoice(offer.invoice_id).await?;
            Ok::<_, AppError>(OfferWithInvoice { offer, invoice })
        }))
        .await?;
        Ok(joined)
    }

    pub async fn offers_by_supplier(&self, supplier_id: &str) -> AppResult<Vec<DiscountOffer>> {
        Ok(self.repo.list_offers_by_supplier(supplier_id).await?)
    }

    /// 未保存过设置时返回默认阈值
    pub async fn settings(&self, user_id: &str) -> AppResult<SettingsView> {
        Ok(self.repo.get_settings(user_id).await?.into())
    }

    pub async fn save_settings(
        &self,
        settings: NewAutoApprovalSettings,
    ) -> AppResult<AutoApprovalSettings> {
        settings.validate()?;
        let saved = self.repo.upsert_settings(settings).await?;
        tracing::info!("用户 {} 的自动审批设置已保存", saved.user_id);
        Ok(saved)
    }

    pub async fn kpi(&self, role: Role, user_id: &str) -> AppResult<KpiSummary> {
        kpi::summarize(self.repo.as_ref(), role, user_id).await
    }

    pub async fn buyers(&self) -> AppResult<Vec<String>> {
        Ok(self.repo.unique_buyers().await?)
    }

    pub async fn suppliers(&self) -> AppResult<Vec<String>> {
        Ok(self.repo.unique_suppliers().await?)
    }
}
