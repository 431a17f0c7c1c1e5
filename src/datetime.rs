use chrono::{DateTime, Local, NaiveDate, Utc};

#[cfg(not(test))]
/// 現在のUTC時刻を返す。
pub fn now() -> DateTime<Utc> {
    Utc::now()
}


#[cfg(test)]
pub use mock_clock::now;

/// Localタイムゾーンでの今日の日付を返す。
pub fn today() -> NaiveDate {
    now().with_timezone(&Local).date_naive()
}
