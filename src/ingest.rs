//! 发票 CSV 导入: 上传检查、表头校验、金额清洗、逐行转换
use crate::calc::dates::parse_date;
use crate::models::{InvoiceStatus, NewInvoice};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const REQUIRED_COLUMNS: [&str; 6] = [
    "InvoiceID",
    "InvoiceAmount",
    "InvoiceDate",
    "DueDate",
    "BuyerName",
    "Status",
];

const CSV_CONTENT_TYPES: [&str; 3] = ["text/csv", "application/csv", "application/vnd.ms-excel"];
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Please upload a CSV file (got {0})")]
    NotCsv(String),

    #[error("File of {size} bytes exceeds the maximum size of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("CSV is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("CSV contains no invoices")]
    Empty,

    #[error("InvoiceAmount is not a valid number for invoice {0}")]
    InvalidAmount(String),

    #[error("Invalid {field} '{value}' for invoice {invoice}, expected dd/mm/yyyy")]
    InvalidDate {
        invoice: String,
        field: &'static str,
        value: String,
    },

    #[error("Invalid Status '{status}' for invoice {invoice}")]
    InvalidStatus { invoice: String, status: String },

    #[error("Missing {field} for invoice {invoice}")]
    MissingField { invoice: String, field: &'static str },

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// 金额原始值: JSON 里可能是数字或字符串, CSV 里总是字符串
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

/// 一行原始发票数据, 字段名与 CSV 表头一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRow {
    #[serde(rename = "InvoiceID")]
    pub invoice_id: String,
    #[serde(rename = "InvoiceAmount")]
    pub invoice_amount: RawAmount,
    #[serde(rename = "InvoiceDate")]
    pub invoice_date: String,
    #[serde(rename = "DueDate")]
    pub due_date: String,
    #[serde(rename = "BuyerName")]
    pub buyer_name: String,
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
}

/// 上传前检查: 必须是 CSV, 且不超过大小上限
pub fn check_upload(
    content_type: Option<&str>,
    file_name: Option<&str>,
    size: usize,
    limit: usize,
) -> Result<(), IngestError> {
    let mime = content_type
        .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase());
    let is_csv_mime = mime
        .as_deref()
        .map(|m| CSV_CONTENT_TYPES.contains(&m))
        .unwrap_or(false);
    let is_csv_name = file_name
        .map(|n| n.to_ascii_lowercase().ends_with(".csv"))
        .unwrap_or(false);

    if !is_csv_mime && !is_csv_name {
        let got = mime.unwrap_or_else(|| "no content type".to_string());
        return Err(IngestError::NotCsv(got));
    }
    if size > limit {
        return Err(IngestError::TooLarge { size, limit });
    }
    Ok(())
}

/// 解析 CSV 文本为原始行, 缺少必需列时整体拒绝
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<InvoiceRow>, IngestError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(IngestError::MissingColumns(missing));
    }

    // 必需列都已存在
    let index_of = |name: &str| headers.iter().position(|h| h == name).unwrap_or(0);
    let [id_idx, amount_idx, invoice_date_idx, due_date_idx, buyer_idx, status_idx] =
        REQUIRED_COLUMNS.map(index_of);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        let field = |idx: usize| record.get(idx).unwrap_or("").to_string();
        let status = field(status_idx);
        rows.push(InvoiceRow {
            invoice_id: field(id_idx),
            invoice_amount: RawAmount::Text(field(amount_idx)),
            invoice_date: field(invoice_date_idx),
            due_date: field(due_date_idx),
            buyer_name: field(buyer_idx),
            status: (!status.is_empty()).then_some(status),
        });
    }

    if rows.is_empty() {
        return Err(IngestError::Empty);
    }
    tracing::debug!("CSV 解析完成, {} 行", rows.len());
    Ok(rows)
}

/// 去掉数字和小数点以外的字符后解析 (如 "₹1,23,456.50")
pub fn clean_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse::<f64>().ok()
}

impl InvoiceRow {
    /// 转换为待入库发票; 状态统一小写, 缺省为 pending
    pub fn into_new_invoice(self, supplier_id: &str) -> Result<NewInvoice, IngestError> {
        let invoice = self.invoice_id.trim().to_string();
        if invoice.is_empty() {
            return Err(IngestError::MissingField {
                invoice: "(blank)".to_string(),
                field: "InvoiceID",
            });
        }

        let invoice_amount = match &self.invoice_amount {
            RawAmount::Number(n) if n.is_finite() && *n >= 0.0 => Some(*n),
            RawAmount::Number(_) => None,
            RawAmount::Text(s) => clean_amount(s),
        }
        .ok_or_else(|| IngestError::InvalidAmount(invoice.clone()))?;

        let invoice_date = parse_date(&self.invoice_date).ok_or_else(|| IngestError::InvalidDate {
            invoice: invoice.clone(),
            field: "InvoiceDate",
            value: self.invoice_date.clone(),
        })?;
        let due_date = parse_date(&self.due_date).ok_or_else(|| IngestError::InvalidDate {
            invoice: invoice.clone(),
            field: "DueDate",
            value: self.due_date.clone(),
        })?;

        let buyer_name = self.buyer_name.trim().to_string();
        if buyer_name.is_empty() {
            return Err(IngestError::MissingField {
                invoice,
                field: "BuyerName",
            });
        }

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => InvoiceStatus::Pending,
            Some(s) => s
                .to_lowercase()
                .parse::<InvoiceStatus>()
                .map_err(|_| IngestError::InvalidStatus {
                    invoice: invoice.clone(),
                    status: s.to_string(),
                })?,
        };

        Ok(NewInvoice {
            invoice_number: invoice,
            invoice_amount,
            invoice_date,
            due_date,
            buyer_name,
            status,
            supplier_id: supplier_id.to_string(),
        })
    }
}

/// 整批转换, 任一行失败则整批失败
pub fn rows_into_invoices(
    rows: Vec<InvoiceRow>,
    supplier_id: &str,
) -> Result<Vec<NewInvoice>, IngestError> {
    rows.into_iter()
        .map(|row| row.into_new_invoice(supplier_id))
        .collect()
}
