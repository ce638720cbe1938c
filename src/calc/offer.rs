use crate::calc::currency::format_indian_currency;
use crate::calc::dates::{add_business_days, days_until, slash_date, DATE_FORMAT};
use crate::calc::dcf::calculate_dcf;
use crate::calc::discount::{format_percentage, DiscountBreakdown};
use crate::models::Invoice;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 定价策略: 折现年化利率、提前付款的结算工作日数、允许的最高折扣率
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub annual_rate: f64,
    pub settlement_business_days: u32,
    pub max_discount_rate: f64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            annual_rate: 0.10,
            settlement_business_days: 1,
            max_discount_rate: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuoteError {
    #[error("Discount rate {rate} is outside the allowed range [0, {max}]")]
    RateOutOfRange { rate: f64, max: f64 },

    #[error("Invoice is overdue: due date {due_date} is before early payment date {early_payment_date}")]
    Overdue {
        due_date: NaiveDate,
        early_payment_date: NaiveDate,
    },

    #[error("Invoice amount {0} is not a valid non-negative amount")]
    InvalidAmount(f64),
}

/// 展示用字符串 (货币/百分比/日期)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteDisplay {
    pub original_amount: String,
    pub discount_value: String,
    pub discounted_amount: String,
    pub dcf_value: String,
    pub discount_rate: String,
    pub early_payment_date: String,
    pub due_date: String,
}

/// 一次报价的完整结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferQuote {
    pub invoice_id: i64,
    #[serde(flatten)]
    pub breakdown: DiscountBreakdown,
    #[serde(with = "slash_date")]
    pub early_payment_date: NaiveDate,
    pub days_remaining: u32,
    pub annual_rate: f64,
    pub dcf_value: f64,
    pub display: QuoteDisplay,
}

/// 为发票生成折扣报价
///
/// 1. 提前付款日 = today 之后 settlement_business_days 个工作日
/// 2. 剩余天数 = 提前付款日到到期日; 到期日已过则拒绝
/// 3. 折扣额/折后金额, 再对折后金额做 DCF
pub fn quote_offer(
    invoice: &Invoice,
    discount_rate: f64,
    today: NaiveDate,
    policy: &PricingPolicy,
) -> Result<OfferQuote, QuoteError> {
    if !(0.0..=policy.max_discount_rate).contains(&discount_rate) {
        return Err(QuoteError::RateOutOfRange {
            rate: discount_rate,
            max: policy.max_discount_rate,
        });
    }
    if !invoice.invoice_amount.is_finite() || invoice.invoice_amount < 0.0 {
        return Err(QuoteError::InvalidAmount(invoice.invoice_amount));
    }

    let early_payment_date = add_business_days(today, policy.settlement_business_days);
    let days = days_until(early_payment_date, invoice.due_date);
    if days < 0 {
        return Err(QuoteError::Overdue {
            due_date: invoice.due_date,
            early_payment_date,
        });
    }
    let days_remaining = u32::try_from(days).unwrap_or(u32::MAX);

    let breakdown = DiscountBreakdown::compute(invoice.invoice_amount, discount_rate);
    let dcf_value = calculate_dcf(breakdown.discounted_amount, policy.annual_rate, days_remaining);

    let display = QuoteDisplay {
        original_amount: format_indian_currency(breakdown.original_amount),
        discount_value: format_indian_currency(breakdown.discount_value),
        discounted_amount: format_indian_currency(breakdown.discounted_amount),
        dcf_value: format_indian_currency(dcf_value),
        discount_rate: format_percentage(discount_rate),
        early_payment_date: early_payment_date.format(DATE_FORMAT).to_string(),
        due_date: invoice.due_date.format(DATE_FORMAT).to_string(),
    };

    Ok(OfferQuote {
        invoice_id: invoice.id,
        breakdown,
        early_payment_date,
        days_remaining,
        annual_rate: policy.annual_rate,
        dcf_value,
        display,
    })
}
