use crate::calc::dates::slash_date;
use crate::calc::OfferQuote;
use crate::models::Invoice;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// 折扣要约状态: pending → accepted | rejected (终态)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OfferStatus::Pending),
            "accepted" => Ok(OfferStatus::Accepted),
            "rejected" => Ok(OfferStatus::Rejected),
            other => Err(format!("unknown offer status '{}'", other)),
        }
    }
}

impl TryFrom<String> for OfferStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 买方的决定, 只允许 accepted / rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferDecision {
    Accept,
    Reject,
}

impl OfferDecision {
    pub fn status(self) -> OfferStatus {
        match self {
            OfferDecision::Accept => OfferStatus::Accepted,
            OfferDecision::Reject => OfferStatus::Rejected,
        }
    }
}

impl FromStr for OfferDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(OfferDecision::Accept),
            "rejected" => Ok(OfferDecision::Reject),
            _ => Err("Invalid status".to_string()),
        }
    }
}

/// 折扣要约表 (discount_offers)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountOffer {
    pub id: i64,
    pub invoice_id: i64,
    pub original_amount: f64,
    pub discount_rate: f64,
    pub discounted_amount: f64,
    pub discount_value: f64,
    #[serde(with = "slash_date")]
    pub early_payment_date: NaiveDate,
    pub dcf_value: f64,
    #[sqlx(try_from = "String")]
    pub status: OfferStatus,
    pub supplier_id: String,
    pub supplier_name: String,
    pub created_at: DateTime<Utc>,
}

/// 待持久化的要约, 金额全部来自服务端报价
#[derive(Debug, Clone, PartialEq)]
pub struct NewDiscountOffer {
    pub invoice_id: i64,
    pub original_amount: f64,
    pub discount_rate: f64,
    pub discounted_amount: f64,
    pub discount_value: f64,
    pub early_payment_date: NaiveDate,
    pub dcf_value: f64,
    pub supplier_id: String,
    pub supplier_name: String,
}

impl NewDiscountOffer {
    pub fn from_quote(quote: &OfferQuote, supplier_id: String, supplier_name: String) -> Self {
        Self {
            invoice_id: quote.invoice_id,
            original_amount: quote.breakdown.original_amount,
            discount_rate: quote.breakdown.discount_rate,
            discounted_amount: quote.breakdown.discounted_amount,
            discount_value: quote.breakdown.discount_value,
            early_payment_date: quote.early_payment_date,
            dcf_value: quote.dcf_value,
            supplier_id,
            supplier_name,
        }
    }

    pub fn into_offer(self, id: i64, created_at: DateTime<Utc>) -> DiscountOffer {
        DiscountOffer {
            id,
            invoice_id: self.invoice_id,
            original_amount: self.original_amount,
            discount_rate: self.discount_rate,
            discounted_amount: self.discounted_amount,
            discount_value: self.discount_value,
            early_payment_date: self.early_payment_date,
            dcf_value: self.dcf_value,
            status: OfferStatus::Pending,
            supplier_id: self.supplier_id,
            supplier_name: self.supplier_name,
            created_at,
        }
    }
}

/// 待审批列表项: 要约 + 关联发票
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferWithInvoice {
    #[serde(flatten)]
    pub offer: DiscountOffer,
    pub invoice: Option<Invoice>,
}
