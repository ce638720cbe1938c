use crate::calc::dates::slash_date;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// 发票状态: pending → pending_approval → completed, 只能前进
///
/// 状态只随要约的提交与接受而变化, 不能直接修改。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    PendingApproval,
    Completed,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::PendingApproval => "pending_approval",
            InvoiceStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvoiceStatus::Pending),
            "pending_approval" => Ok(InvoiceStatus::PendingApproval),
            "completed" => Ok(InvoiceStatus::Completed),
            other => Err(format!("unknown invoice status '{}'", other)),
        }
    }
}

impl TryFrom<String> for InvoiceStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 发票表 (invoices)
///
/// `invoice_number` 是 CSV 中的 InvoiceID, JSON 中沿用 `invoiceId` 字段名。
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: i64,
    #[serde(rename = "invoiceId")]
    pub invoice_number: String,
    pub invoice_amount: f64,
    #[serde(with = "slash_date")]
    pub invoice_date: NaiveDate,
    #[serde(with = "slash_date")]
    pub due_date: NaiveDate,
    pub buyer_name: String,
    #[sqlx(try_from = "String")]
    pub status: InvoiceStatus,
    pub supplier_id: String,
    pub created_at: DateTime<Utc>,
}

/// 新建发票 (CSV 导入)
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub invoice_amount: f64,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub buyer_name: String,
    pub status: InvoiceStatus,
    pub supplier_id: String,
}

impl NewInvoice {
    pub fn into_invoice(self, id: i64, created_at: DateTime<Utc>) -> Invoice {
        Invoice {
            id,
            invoice_number: self.invoice_number,
            invoice_amount: self.invoice_amount,
            invoice_date: self.invoice_date,
            due_date: self.due_date,
            buyer_name: self.buyer_name,
            status: self.status,
            supplier_id: self.supplier_id,
            created_at,
        }
    }
}

/// 发票部分更新, 未出现的字段保持不变; 不含状态字段
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InvoiceUpdate {
    #[serde(default, rename = "invoiceId")]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub invoice_amount: Option<f64>,
    #[serde(default, with = "slash_date::option")]
    pub invoice_date: Option<NaiveDate>,
    #[serde(default, with = "slash_date::option")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub buyer_name: Option<String>,
}

impl InvoiceUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, invoice: &mut Invoice) {
        if let Some(v) = &self.invoice_number {
            invoice.invoice_number = v.clone();
        }
        if let Some(v) = self.invoice_amount {
            invoice.invoice_amount = v;
        }
        if let Some(v) = self.invoice_date {
            invoice.invoice_date = v;
        }
        if let Some(v) = self.due_date {
            invoice.due_date = v;
        }
        if let Some(v) = &self.buyer_name {
            invoice.buyer_name = v.clone();
        }
    }
}
