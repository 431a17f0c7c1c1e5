use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::field::EntryFields;
use crate::time_slot::TimeRange;

/// 1日分のエントリーの中で一意な識別子。
///
/// 削除された識別子は同じ下書きの中で再利用しない。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 編集中のタイムスライス。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: EntryId,
    /// `"HH:MM - HH:MM"`形式の時間範囲
    pub time: String,
    #[serde(flatten)]
    pub fields: EntryFields,
    /// 画面上の選択状態。サーバーには送らない。
    #[serde(default)]
    pub selected: bool,
    /// 保存時に内容が空だったことを表す。サーバーには送らない。
    #[serde(default)]
    pub has_error: bool,
}

impl TimeEntry {
    /// 記述項目が空で時間範囲も未設定のエントリーを返す。
    pub fn blank(id: EntryId) -> Self {
        Self {
            id,
            time: String::new(),
            fields: EntryFields::default(),
            selected: false,
            has_error: false,
        }
    }

    pub fn range(&self) -> Option<TimeRange> {
        TimeRange::parse(&self.time)
    }

    /// 時間範囲の開始部分を返す。範囲として不正な場合も区切り文字より前を返す。
    pub fn start(&self) -> &str {
        self.time
            .split(crate::time_slot::RANGE_SEPARATOR)
            .next()
            .unwrap_or_default()
            .trim()
    }

    /// サーバーに送る形式に変換する。値の前後の空白は取り除く。
    pub fn to_record(&self) -> EntryRecord {
        EntryRecord {
            id: self.id.0,
            time: self.time.trim().to_string(),
            fields: self.fields.trimmed(),
        }
    }
}

/// APIでやり取りするタイムスライスの形式。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// 読み込み時は識別子を振り直すため、サーバー側の値は参照しない。
    #[serde(default, deserialize_with = "deserialize_opaque_id")]
    pub id: u64,
    #[serde(default)]
    pub time: String,
    #[serde(flatten)]
    pub fields: EntryFields,
}

/// サーバーの識別子は数値とは限らない。非負整数以外は0として読む。
fn deserialize_opaque_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_u64().unwrap_or_default())
}
