//! 折扣经济计算: 纯函数, 不依赖存储与配置加载
pub mod currency;
pub mod dates;
pub mod dcf;
pub mod discount;
pub mod offer;

pub use currency::format_indian_currency;
pub use dates::{add_business_days, format_date, get_days_between_dates, parse_date};
pub use dcf::calculate_dcf;
pub use discount::{format_percentage, DiscountBreakdown};
pub use offer::{quote_offer, OfferQuote, PricingPolicy, QuoteError};
