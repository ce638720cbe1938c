use crate::calc::dates::slash_date;
use crate::error::{AppError, AppResult};
use crate::ingest::InvoiceRow;
use crate::service::{ClaimedFigures, OfferSubmission};
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use validator::Validate;

/// JSON 请求体提取器, 解析失败时返回 `{"message": ...}` 形式的 400
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// 查询参数提取器, 类型不符时同样返回 `{"message": ...}`
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

/// 路径参数提取器
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(ApiPath(value))
    }
}

fn required(value: Option<String>, message: &str) -> AppResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Validation(message.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierQuery {
    pub supplier_id: Option<String>,
}

impl SupplierQuery {
    pub fn require(self) -> AppResult<String> {
        required(self.supplier_id, "Supplier ID is required")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

impl UserQuery {
    pub fn require(self) -> AppResult<String> {
        required(self.user_id, "User ID is required")
    }
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub rate: Option<f64>,
}

/// CSV 原始上传的查询参数
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvUploadQuery {
    pub supplier_id: Option<String>,
    pub file_name: Option<String>,
}

/// JSON 形式的批量上传, 行字段与 CSV 表头一致
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    #[validate(length(min = 1, message = "At least one invoice is required"))]
    pub invoices: Vec<InvoiceRow>,
    #[validate(length(min = 1, message = "Supplier ID is required"))]
    pub supplier_id: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub count: usize,
}

impl UploadResponse {
    pub fn uploaded(count: usize) -> Self {
        Self {
            message: "Invoices uploaded successfully".to_string(),
            count,
        }
    }
}

/// 提交要约
///
/// 金额字段可选, 若提供则必须与服务端重算值一致。
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOfferRequest {
    #[validate(range(min = 1))]
    pub invoice_id: i64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub discount_rate: f64,
    #[validate(length(min = 1, message = "Supplier ID is required"))]
    pub supplier_id: String,
    #[validate(length(min = 1, message = "Supplier name is required"))]
    pub supplier_name: String,
    #[serde(default)]
    pub original_amount: Option<f64>,
    #[serde(default)]
    pub discount_value: Option<f64>,
    #[serde(default)]
    pub discounted_amount: Option<f64>,
    #[serde(default)]
    pub dcf_value: Option<f64>,
    #[serde(default, with = "slash_date::option")]
    pub early_payment_date: Option<NaiveDate>,
}

impl SubmitOfferRequest {
    pub fn into_submission(self) -> AppResult<OfferSubmission> {
        self.validate()?;
        Ok(OfferSubmission {
            invoice_id: self.invoice_id,
            discount_rate: self.discount_rate,
            supplier_id: self.supplier_id,
            supplier_name: self.supplier_name,
            claimed: ClaimedFigures {
                original_amount: self.original_amount,
                discount_value: self.discount_value,
                discounted_amount: self.discounted_amount,
                dcf_value: self.dcf_value,
                early_payment_date: self.early_payment_date,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DecideOfferRequest {
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::RawAmount;

    #[test]
    fn submit_request_accepts_preview_fields() {
        let req: SubmitOfferRequest = serde_json::from_value(serde_json::json!({
            "invoiceId": 3,
            "discountRate": 2.5,
            "supplierId": "supplier1",
            "supplierName": "Supplier Company",
            "discountValue": 9472.5,
            "earlyPaymentDate": "19/06/2023",
            "status": "pending"
        }))
        .unwrap();

        let submission = req.into_submission().unwrap();
        assert_eq!(submission.claimed.discount_value, Some(9472.5));
        assert_eq!(
            submission.claimed.early_payment_date,
            NaiveDate::from_ymd_opt(2023, 6, 19)
        );
        assert_eq!(submission.claimed.dcf_value, None);
    }

    #[test]
    fn submit_request_is_validated() {
        let req: SubmitOfferRequest = serde_json::from_value(serde_json::json!({
            "invoiceId": 0,
            "discountRate": 2.5,
            "supplierId": "",
            "supplierName": "Supplier Company"
        }))
        .unwrap();
        assert!(matches!(req.into_submission(), Err(AppError::Validation(_))));
    }

    #[test]
    fn upload_request_needs_rows_and_supplier() {
        let empty: UploadRequest = serde_json::from_value(serde_json::json!({
            "invoices": [],
            "supplierId": "supplier1"
        }))
        .unwrap();
        let errors = empty.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("invoices"));

        let req: UploadRequest = serde_json::from_value(serde_json::json!({
            "invoices": [{
                "InvoiceID": "INV-1",
                "InvoiceAmount": "1,000",
                "InvoiceDate": "01/06/2023",
                "DueDate": "05/08/2023",
                "BuyerName": "Acme Ltd"
            }],
            "supplierId": "supplier1"
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(
            req.invoices[0].invoice_amount,
            RawAmount::Text("1,000".to_string())
        );
    }

    #[test]
    fn blank_query_values_count_as_missing() {
        let query = SupplierQuery {
            supplier_id: Some("  ".into()),
        };
        assert!(query.require().is_err());
    }
}
