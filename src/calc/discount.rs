use serde::Serialize;

/// 折扣拆分: 原金额、折扣率(百分比)、折扣额、折后金额
///
/// 内部保留完整浮点精度, 只在展示时保留两位小数。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountBreakdown {
    pub original_amount: f64,
    pub discount_rate: f64,
    pub discount_value: f64,
    pub discounted_amount: f64,
}

impl DiscountBreakdown {
    pub fn compute(original_amount: f64, discount_rate: f64) -> Self {
        let discount_value = original_amount * discount_rate / 100.0;
        Self {
            original_amount,
            discount_rate,
            discount_value,
            discounted_amount: original_amount - discount_value,
        }
    }
}

pub fn format_percentage(value: f64) -> String {
    format!("{:.2}%", value)
}
