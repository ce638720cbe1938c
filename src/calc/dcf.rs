/// 年化利率折算日利率的天数基准
pub const DAYS_PER_YEAR: f64 = 365.0;

/// 现值折现: amount / (1 + annual_rate/365)^days
///
/// 按日单利折现 (非连续复利)。days 为无符号数, 逾期等负天数由上层拦截。
pub fn calculate_dcf(amount: f64, annual_rate: f64, days: u32) -> f64 {
    let daily_rate = annual_rate / DAYS_PER_YEAR;
    amount / (1.0 + daily_rate).powf(f64::from(days))
}
