use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Weekday};

/// 对外统一的日期格式 dd/mm/yyyy
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// 是否工作日 (周一至周五, 不含节假日)
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// 从 date 往后推 n 个工作日, 起始日本身不计入
pub fn add_business_days(date: NaiveDate, n: u32) -> NaiveDate {
    let mut result = date;
    let mut added = 0;
    while added < n {
        let Some(next) = result.succ_opt() else {
            break;
        };
        result = next;
        if is_business_day(result) {
            added += 1;
        }
    }
    result
}

/// 解析 dd/mm/yyyy, 格式不合法时返回 None (由调用方在上游校验)
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let mut parts = s.trim().split('/');
    let day: u32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = parts.next()?.trim().parse().ok()?;
    let year: i32 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// ISO 8601: RFC 3339 时间戳、无时区时间戳或纯日期
fn parse_iso(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// 统一输出 dd/mm/yyyy
///
/// 含 `/` 时按 dd/mm/yyyy 解析, 否则按 ISO 解析; 解析失败原样返回。
pub fn format_date(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    let parsed = if s.contains('/') { parse_date(s) } else { parse_iso(s) };
    match parsed {
        Some(date) => date.format(DATE_FORMAT).to_string(),
        None => {
            tracing::debug!("无法格式化日期 {:?}, 原样返回", s);
            s.to_string()
        }
    }
}

/// 两个日期相差的天数 (绝对值)
pub fn get_days_between_dates(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days().abs()
}

/// from 到 to 的有符号天数, to 早于 from 时为负
pub fn days_until(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// serde 适配: NaiveDate <-> "dd/mm/yyyy"
pub mod slash_date {
    use super::{parse_date, DATE_FORMAT};
    use chrono::NaiveDate;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(DATE_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_date(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid date '{}', expected dd/mm/yyyy", raw)))
    }

    pub mod option {
        use super::super::{parse_date, DATE_FORMAT};
        use chrono::NaiveDate;
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            date: &Option<NaiveDate>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => serializer.collect_str(&d.format(DATE_FORMAT)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDate>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            raw.map(|r| {
                parse_date(&r)
                    .ok_or_else(|| D::Error::custom(format!("invalid date '{}', expected dd/mm/yyyy", r)))
            })
            .transpose()
        }
    }
}
