use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// 买方自动审批设置 (auto_approval_settings), 每个用户一行
///
/// 目前只做存取, 没有任何审批逻辑读取这些阈值。
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoApprovalSettings {
    pub id: i64,
    pub user_id: String,
    pub enabled: bool,
    pub max_discount_rate: f64,
    pub max_amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 新建/覆盖设置的输入
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewAutoApprovalSettings {
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,
    #[serde(default)]
    pub enabled: bool,
    #[validate(range(min = 0.0, max = 100.0))]
    pub max_discount_rate: f64,
    #[validate(range(min = 0.0))]
    pub max_amount: f64,
}

impl NewAutoApprovalSettings {
    pub fn into_settings(self, id: i64, created_at: DateTime<Utc>) -> AutoApprovalSettings {
        AutoApprovalSettings {
            id,
            user_id: self.user_id,
            enabled: self.enabled,
            max_discount_rate: self.max_discount_rate,
            max_amount: self.max_amount,
            created_at,
            updated_at: created_at,
        }
    }
}

/// 未保存过设置时返回的默认阈值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalThresholds {
    pub enabled: bool,
    pub max_discount_rate: f64,
    pub max_amount: f64,
}

impl Default for ApprovalThresholds {
    fn default() -> Self {
        Self {
            enabled: false,
            max_discount_rate: 2.5,
            max_amount: 100_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SettingsView {
    Stored(AutoApprovalSettings),
    Default(ApprovalThresholds),
}

impl From<Option<AutoApprovalSettings>> for SettingsView {
    fn from(value: Option<AutoApprovalSettings>) -> Self {
        match value {
            Some(s) => SettingsView::Stored(s),
            None => SettingsView::Default(ApprovalThresholds::default()),
        }
    }
}
