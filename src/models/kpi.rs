use crate::models::{DiscountOffer, OfferStatus};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Supplier,
    Buyer,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "supplier" => Ok(Role::Supplier),
            "buyer" => Ok(Role::Buyer),
            _ => Err("Invalid role".to_string()),
        }
    }
}

/// 看板 KPI 汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSummary {
    pub invoice_count: usize,
    pub discount_value: f64,
    pub avg_discount_rate: f64,
}

impl KpiSummary {
    /// 折扣额与平均折扣率只统计已接受的要约; 没有已接受要约时平均值为 0
    pub fn from_offers(invoice_count: usize, offers: &[DiscountOffer]) -> Self {
        let accepted: Vec<&DiscountOffer> = offers
            .iter()
            .filter(|o| o.status == OfferStatus::Accepted)
            .collect();

        let discount_value = accepted.iter().map(|o| o.discount_value).sum();
        let avg_discount_rate = if accepted.is_empty() {
            0.0
        } else {
            accepted.iter().map(|o| o.discount_rate).sum::<f64>() / accepted.len() as f64
        };

        Self {
            invoice_count,
            discount_value,
            avg_discount_rate,
        }
    }
}
