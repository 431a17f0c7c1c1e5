use std::{fmt, str::FromStr};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// タイムスライスの記述項目の種類。
///
/// 業務データベースの項目の種類としても利用する。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Content,
    Client,
    Purpose,
    Action,
    With,
    Pccc,
    Remark,
}

impl FieldKind {
    /// 全ての項目を表示順で返す。
    pub const ALL: [FieldKind; 7] = [
        FieldKind::Content,
        FieldKind::Client,
        FieldKind::Purpose,
        FieldKind::Action,
        FieldKind::With,
        FieldKind::Pccc,
        FieldKind::Remark,
    ];

    /// APIで利用するキーを返す。
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Content => "content",
            FieldKind::Client => "client",
            FieldKind::Purpose => "purpose",
            FieldKind::Action => "action",
            FieldKind::With => "with",
            FieldKind::Pccc => "pccc",
            FieldKind::Remark => "remark",
        }
    }

    /// 画面表示用のラベルを返す。
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Content => "内容",
            FieldKind::Client => "クライアント",
            FieldKind::Purpose => "目的",
            FieldKind::Action => "アクション",
            FieldKind::With => "誰と",
            FieldKind::Pccc => "PC/CC",
            FieldKind::Remark => "備考",
        }
    }

    /// 現行のキー、旧形式のキー、スプレッドシートの見出しのいずれかから項目を判定する。
    ///
    /// どれにも一致しない場合は`None`を返す。
    pub fn from_alias(s: &str) -> Option<Self> {
        let kind = match s.trim() {
            "content" | "task" | "内容" => FieldKind::Content,
            "client" | "クライアント" | "クライアント（誰に、誰のために）" => FieldKind::Client,
            "purpose" | "目的" => FieldKind::Purpose,
            "action" | "function" | "アクション" => FieldKind::Action,
            "with" | "mall" | "誰と" => FieldKind::With,
            "pccc" | "costtype" | "cost_type" | "PC/CC" => FieldKind::Pccc,
            "remark" | "備考" => FieldKind::Remark,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        FieldKind::from_alias(s).ok_or_else(|| {
            anyhow!(
                "Unknown field: {} (expected one of content, client, purpose, action, with, pccc, remark)",
                s
            )
        })
    }
}

/// 1つのタイムスライスが持つ記述項目の値。
///
/// 旧形式のキー(`task`, `function`, `mall`, `cost_type`)でもデシリアライズできる。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFields {
    #[serde(default, alias = "task")]
    pub content: String,
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default, alias = "function")]
    pub action: String,
    #[serde(default, alias = "mall")]
    pub with: String,
    #[serde(default, alias = "cost_type")]
    pub pccc: String,
    #[serde(default)]
    pub remark: String,
}

impl EntryFields {
    pub fn get(&self, kind: FieldKind) -> &str {
        match kind {
            FieldKind::Content => &self.content,
            FieldKind::Client => &self.client,
            FieldKind::Purpose => &self.purpose,
            FieldKind::Action => &self.action,
            FieldKind::With => &self.with,
            FieldKind::Pccc => &self.pccc,
            FieldKind::Remark => &self.remark,
        }
    }

    pub fn set(&mut self, kind: FieldKind, value: impl Into<String>) {
        let value = value.into();
        match kind {
            FieldKind::Content => self.content = value,
            FieldKind::Client => self.client = value,
            FieldKind::Purpose => self.purpose = value,
            FieldKind::Action => self.action = value,
            FieldKind::With => self.with = value,
            FieldKind::Pccc => self.pccc = value,
            FieldKind::Remark => self.remark = value,
        }
    }

    /// いずれかの項目に空白以外の値が入っているかを返す。
    pub fn is_filled(&self) -> bool {
        FieldKind::ALL
            .iter()
            .any(|kind| !self.get(*kind).trim().is_empty())
    }

    /// 前後の空白を取り除いた値を返す。
    pub fn trimmed(&self) -> Self {
        let mut fields = Self::default();
        for kind in FieldKind::ALL {
            fields.set(kind, self.get(kind).trim());
        }
        fields
    }
}
