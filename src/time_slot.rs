use std::fmt;

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::time_entry::TimeEntry;

/// 1スライスの長さ(分)。
pub const SLOT_MINUTES: u32 = 30;

/// 不正な時刻が渡された時に次のスライスとして返す値。
pub const FALLBACK_TIME: &str = "00:00";

/// 時間範囲の開始と終了の区切り文字。
pub const RANGE_SEPARATOR: &str = " - ";

static TIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}:\d{2}$").expect("time pattern must compile"));

/// `HH:MM`形式の時刻を時と分に分解する。
///
/// 形式が一致しない場合や、時が0-23、分が0-59の範囲外の場合は`None`を返す。
pub fn parse_time_of_day(s: &str) -> Option<(u32, u32)> {
    if !TIME_PATTERN.is_match(s) {
        return None;
    }
    let (hours, minutes) = s.split_once(':')?;
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }

    Some((hours, minutes))
}

/// 指定された時刻の30分後を返す。
///
/// 24時を超えた場合は0時に戻る。日付の繰り上がりは扱わない。
/// 不正な時刻の場合はエラーにせず`"00:00"`を返す。
pub fn next_time_slot(time: &str) -> String {
    let Some((hours, minutes)) = parse_time_of_day(time) else {
        warn!("Invalid time format, falling back to {}: {:?}", FALLBACK_TIME, time);
        return FALLBACK_TIME.to_string();
    };

    let total = minutes + SLOT_MINUTES;
    let carry = total / 60;
    format!("{:02}:{:02}", (hours + carry) % 24, total % 60)
}

/// `"HH:MM - HH:MM"`形式の時間範囲。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

impl TimeRange {
    /// 開始時刻から1スライス分の時間範囲を作成する。
    pub fn slot(start: &str) -> Self {
        Self {
            start: start.to_string(),
            end: next_time_slot(start),
        }
    }

    /// 時間範囲の文字列をパースする。
    ///
    /// 開始と終了のどちらかが空の場合は`None`を返す。時刻の妥当性は確認しない。
    pub fn parse(s: &str) -> Option<Self> {
        let (start, end) = s.split_once(RANGE_SEPARATOR)?;
        let (start, end) = (start.trim(), end.trim());
        if start.is_empty() || end.is_empty() {
            return None;
        }

        Some(Self {
            start: start.to_string(),
            end: end.to_string(),
        })
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.start, RANGE_SEPARATOR, self.end)
    }
}

/// 全てのエントリーの時間範囲を`anchor`から連続するように計算し直す。
///
/// 順序と件数は変わらない。
pub fn recalculate(entries: Vec<TimeEntry>, anchor: &str) -> Vec<TimeEntry> {
    recalculate_from(entries, 0, anchor)
}

/// `index`以降のエントリーの時間範囲を`anchor`から連続するように計算し直す。
///
/// `index`より前のエントリーはそのまま残る。
pub fn recalculate_from(mut entries: Vec<TimeEntry>, index: usize, anchor: &str) -> Vec<TimeEntry> {
    let mut current = anchor.to_string();
    for entry in entries.iter_mut().skip(index) {
        let range = TimeRange::slot(&current);
        current = range.end.clone();
        entry.time = range.to_string();
    }

    entries
}
