pub const RUPEE_SIGN: char = '₹';

/// 印度计数法货币格式 (₹12,34,567.89)
///
/// 整数部分末三位一组, 其余每两位一组; 固定两位小数。
/// NaN / 无穷按 ₹0.00 处理。
pub fn format_indian_currency(value: f64) -> String {
    if !value.is_finite() {
        return format!("{}0.00", RUPEE_SIGN);
    }

    let fixed = format!("{:.2}", value.abs());
    let (integer_part, decimal_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };

    format!(
        "{}{}{}.{}",
        RUPEE_SIGN,
        sign,
        group_indian(integer_part),
        decimal_part
    )
}

fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (head, last_three) = digits.split_at(digits.len() - 3);
    let mut out = String::with_capacity(digits.len() + digits.len() / 2);
    for (i, ch) in head.chars().enumerate() {
        if i > 0 && (head.len() - i) % 2 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.push(',');
    out.push_str(last_three);
    out
}
