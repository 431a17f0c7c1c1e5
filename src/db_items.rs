use anyhow::{bail, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::field::FieldKind;

/// 業務データベースへの追加の失敗。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DbItemError {
    #[error("Value must not be blank")]
    BlankValue,
}

/// 業務データベースへの追加結果。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// 同じ種類と値の組が既に登録済みで、何も変更していない
    AlreadyExists,
}

/// 入力候補として再利用する値。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DbItem {
    pub kind: FieldKind,
    pub value: String,
}

/// APIでやり取りする業務データベースの項目。
///
/// 種類には現行のキーの他に、旧形式のキーやスプレッドシートの見出しが入ることがある。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DbItemRecord {
    #[serde(rename = "Type", alias = "type")]
    pub kind: String,
    #[serde(rename = "Value", alias = "value")]
    pub value: String,
}

/// 種類ごとにまとめられた業務データベース。
///
/// 旧形式のキー(`task`, `function`, `mall`, `costtype`)も同じ種類として読む。
#[derive(Debug, Default, Deserialize)]
pub struct GroupedDbItems {
    #[serde(default, alias = "task")]
    content: Vec<String>,
    #[serde(default)]
    client: Vec<String>,
    #[serde(default)]
    purpose: Vec<String>,
    #[serde(default, alias = "function")]
    action: Vec<String>,
    #[serde(default, alias = "mall")]
    with: Vec<String>,
    #[serde(default, alias = "costtype")]
    pccc: Vec<String>,
    #[serde(default)]
    remark: Vec<String>,
}

/// `GET /api/db-items`が返しうる全ての形式。
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DbItemsPayload {
    Failure { error: String },
    Flat(Vec<DbItemRecord>),
    Grouped(GroupedDbItems),
}

impl DbItemsPayload {
    /// どの形式でも`DbItems`に正規化する。種類ごとの重複は最初に出現したものだけを残す。
    ///
    /// エラーを表す形式の場合はエラーを返す。
    pub fn normalize(self) -> Result<DbItems> {
        let mut items = DbItems::default();
        let mut push_all = |kind: FieldKind, values: Vec<String>| {
            for value in values {
                if let Err(DbItemError::BlankValue) = items.add(kind, &value) {
                    debug!("Ignoring blank {} item", kind);
                }
            }
        };

        match self {
            DbItemsPayload::Failure { error } => bail!("Server reported an error: {}", error),
            DbItemsPayload::Flat(records) => {
                for record in records {
                    match FieldKind::from_alias(&record.kind) {
                        Some(kind) => push_all(kind, vec![record.value]),
                        None => debug!("Ignoring item of unknown type: {:?}", record.kind),
                    }
                }
            }
            DbItemsPayload::Grouped(grouped) => {
                push_all(FieldKind::Content, grouped.content);
                push_all(FieldKind::Client, grouped.client);
                push_all(FieldKind::Purpose, grouped.purpose);
                push_all(FieldKind::Action, grouped.action);
                push_all(FieldKind::With, grouped.with);
                push_all(FieldKind::Pccc, grouped.pccc);
                push_all(FieldKind::Remark, grouped.remark);
            }
        }

        Ok(items)
    }
}

/// 業務データベース。登録順を保ち、種類と値の組は一意になる。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DbItems {
    items: Vec<DbItem>,
}

impl DbItems {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, kind: FieldKind, value: &str) -> bool {
        self.items
            .iter()
            .any(|item| item.kind == kind && item.value == value)
    }

    /// 値を追加する。
    ///
    /// 前後の空白を取り除いた値が空の場合はエラーを返し、既に登録済みの場合は何もしない。
    pub fn add(&mut self, kind: FieldKind, value: &str) -> Result<AddOutcome, DbItemError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(DbItemError::BlankValue);
        }
        if self.contains(kind, value) {
            return Ok(AddOutcome::AlreadyExists);
        }

        self.items.push(DbItem {
            kind,
            value: value.to_string(),
        });
        Ok(AddOutcome::Added)
    }

    /// 値を削除する。削除した場合は`true`を返す。
    pub fn remove(&mut self, kind: FieldKind, value: &str) -> bool {
        let before = self.items.len();
        self.items
            .retain(|item| !(item.kind == kind && item.value == value));
        before != self.items.len()
    }

    /// 別の業務データベースを取り込む。種類ごとに値が重複するものは取り込まない。
    ///
    /// 追加した件数を返す。
    pub fn merge(&mut self, other: DbItems) -> usize {
        other
            .items
            .into_iter()
            .filter(|item| matches!(self.add(item.kind, &item.value), Ok(AddOutcome::Added)))
            .count()
    }

    /// 指定された種類の値を登録順に返す。
    pub fn values(&self, kind: FieldKind) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter(move |item| item.kind == kind)
            .map(|item| item.value.as_str())
    }

    /// 入力候補を登録順に最大`limit`件返す。`limit`が`None`の場合は全件返す。
    pub fn suggestions(&self, kind: FieldKind, limit: Option<usize>) -> Vec<String> {
        self.values(kind)
            .take(limit.unwrap_or(usize::MAX))
            .map(str::to_string)
            .collect()
    }

    /// 一括保存用の形式に変換する。
    pub fn to_records(&self) -> Vec<DbItemRecord> {
        self.items
            .iter()
            .map(|item| DbItemRecord {
                kind: item.kind.as_str().to_string(),
                value: item.value.clone(),
            })
            .collect()
    }
}
