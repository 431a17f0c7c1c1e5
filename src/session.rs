use anyhow::Result;
use chrono::{Days, NaiveDate};
use log::{debug, info, warn};

use crate::api::{DbSource, TimeSliceRepository};
use crate::db_items::{AddOutcome, DbItemError, DbItems};
use crate::editor::{DayEditor, EditorError};
use crate::field::FieldKind;
use crate::notice::NoticeBoard;
use crate::time_entry::{EntryId, EntryRecord};

/// 指定された日付にデータがなかった時の扱い。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingDayPolicy {
    /// 既定の時間割で空の行を作る
    DefaultSkeleton,
    /// 行を空にして警告を表示する
    EmptyWithWarning,
}

/// 読み込みの順番を表す。最後に発行したものだけが反映される。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    seq: u64,
    target: NaiveDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(usize),
    Skeleton,
    Empty,
    Failed,
    /// より新しい読み込みが発行済みのため、結果を捨てた
    Stale,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { updated_at: String },
    /// 内容が空の行があるため送信していない
    Invalid(Vec<EntryId>),
    /// 他の処理が実行中のため送信していない
    Busy,
    Failed,
}

/// 業務データベースのインポート方法。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportMode {
    /// 取り込んだ結果を表示するだけで、保存先には書き戻さない
    ViewOnly,
    WriteBack,
}

/// 1日分の編集状態と業務データベースをバックエンドと同期させる。
///
/// 通信の失敗は通知として記録し、編集中の状態はそのまま残す。
pub struct DaySession<'a, R: TimeSliceRepository> {
    repository: &'a R,
    editor: DayEditor,
    db_items: DbItems,
    notices: NoticeBoard,
    busy: Option<String>,
    latest_load: u64,
    skeleton: Vec<String>,
}

impl<'a, R: TimeSliceRepository> DaySession<'a, R> {
    /// 新しい`DaySession`を返す。
    ///
    /// # Arguments
    ///
    /// * `repository` - バックエンドと通信するためのリポジトリ
    /// * `editor` - 編集対象の日付の状態
    /// * `skeleton` - データがない日に作る行の開始時刻
    pub fn new(repository: &'a R, editor: DayEditor, skeleton: Vec<String>) -> Self {
        Self {
            repository,
            editor,
            db_items: DbItems::default(),
            notices: NoticeBoard::default(),
            busy: None,
            latest_load: 0,
            skeleton,
        }
    }

    pub fn editor(&self) -> &DayEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut DayEditor {
        &mut self.editor
    }

    pub fn db_items(&self) -> &DbItems {
        &self.db_items
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut NoticeBoard {
        &mut self.notices
    }

    /// 実行中の処理の説明を返す。
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn busy(&self) -> Option<&str> {
        self.busy.as_deref()
    }

    /// 読み込みを開始する。これより前に発行した読み込みの結果は反映されなくなる。
    pub fn begin_load(&mut self, target: NaiveDate) -> LoadTicket {
        self.latest_load += 1;
        self.busy = Some(format!("「{}」のデータを読み込み中...", target));
        LoadTicket {
            seq: self.latest_load,
            target,
        }
    }

    /// 読み込み結果を反映する。
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<EntryRecord>>,
        policy: MissingDayPolicy,
    ) -> LoadOutcome {
        if ticket.seq != self.latest_load {
            debug!(
                "Discarding stale load for {} (ticket {}, latest {})",
                ticket.target, ticket.seq, self.latest_load
            );
            return LoadOutcome::Stale;
        }
        self.busy = None;
        let target = ticket.target;

        let records = match result {
            Ok(records) => records,
            Err(err) => {
                warn!("Failed to load entries for {}: {:#}", target, err);
                self.notices
                    .error(format!("データの読み込みに失敗しました: {:#}", err));
                return LoadOutcome::Failed;
            }
        };

        if !records.is_empty() {
            let loaded = self.editor.replace_with_records(records);
            self.editor
                .set_last_updated(format!("{} のデータを読み込みました", target));
            info!("Loaded {} entries from {}", loaded, target);
            return LoadOutcome::Loaded(loaded);
        }

        match policy {
            MissingDayPolicy::DefaultSkeleton => {
                self.editor.load_skeleton(&self.skeleton);
                self.editor
                    .set_last_updated(format!("{} のデータはありません", target));
                LoadOutcome::Skeleton
            }
            MissingDayPolicy::EmptyWithWarning => {
                self.editor.clear();
                self.editor
                    .set_last_updated(format!("{} のデータなし", target));
                self.notices
                    .warning(format!("「{}」のデータが見つかりませんでした。", target));
                LoadOutcome::Empty
            }
        }
    }

    /// 編集中の日付のデータを読み込む。
    pub async fn load_day(&mut self, policy: MissingDayPolicy) -> LoadOutcome {
        let target = self.editor.date();
        self.load_from(target, policy).await
    }

    /// 前日のデータを編集中の日付に読み込む。
    pub async fn copy_previous_day(&mut self) -> LoadOutcome {
        self.copy_days_before(1).await
    }

    /// 先週の同じ曜日のデータを編集中の日付に読み込む。
    pub async fn copy_same_weekday_last_week(&mut self) -> LoadOutcome {
        self.copy_days_before(7).await
    }

    async fn copy_days_before(&mut self, days: u64) -> LoadOutcome {
        let date = self.editor.date();
        let Some(target) = date.checked_sub_days(Days::new(days)) else {
            self.notices
                .error(format!("{}の{}日前は指定できません", date, days));
            return LoadOutcome::Failed;
        };
        self.load_from(target, MissingDayPolicy::EmptyWithWarning)
            .await
    }

    async fn load_from(&mut self, target: NaiveDate, policy: MissingDayPolicy) -> LoadOutcome {
        let ticket = self.begin_load(target);
        let result = self.repository.read_time_entries(&target).await;
        self.finish_load(ticket, result, policy)
    }

    /// 検証を行い、1日分を全て保存する。
    ///
    /// 内容が空の行がある場合は送信せずに該当する行を返す。
    pub async fn save(&mut self) -> SaveOutcome {
        if let Some(task) = &self.busy {
            self.notices
                .warning(format!("処理中のため保存できません: {}", task));
            return SaveOutcome::Busy;
        }

        let records = match self.editor.validate_for_save() {
            Ok(records) => records,
            Err(EditorError::MissingContent(ids)) => {
                self.notices.error("内容が入力されていません");
                return SaveOutcome::Invalid(ids);
            }
            Err(err) => {
                self.notices.error(err.to_string());
                return SaveOutcome::Failed;
            }
        };

        self.busy = Some("保存中...".to_string());
        let date = self.editor.date();
        let result = self.repository.save_time_entries(&date, &records).await;
        self.busy = None;

        match result {
            Ok(receipt) => {
                self.editor.set_last_updated(receipt.updated_at.clone());
                match receipt.message.as_deref().map(str::trim) {
                    Some(message) if !message.is_empty() => self.notices.success(message),
                    _ => self.notices.success("保存しました"),
                }
                SaveOutcome::Saved {
                    updated_at: receipt.updated_at,
                }
            }
            Err(err) => {
                warn!("Failed to save entries for {}: {:#}", date, err);
                self.notices.error(format!("保存に失敗しました: {:#}", err));
                SaveOutcome::Failed
            }
        }
    }

    /// 業務データベースを読み込む。失敗した場合は空にする。
    pub async fn load_db_items(&mut self) -> bool {
        match self.repository.read_db_items(DbSource::Store).await {
            Ok(items) => {
                self.db_items = items;
                true
            }
            Err(err) => {
                warn!("Failed to load db items: {:#}", err);
                self.notices.error(format!(
                    "業務データベースの読み込みに失敗しました: {:#}",
                    err
                ));
                self.db_items = DbItems::default();
                false
            }
        }
    }

    /// 業務データベースに値を追加し、全体を保存する。
    ///
    /// 空の値は追加せず`None`を返す。
    pub async fn add_db_item(&mut self, kind: FieldKind, value: &str) -> Option<AddOutcome> {
        match self.db_items.add(kind, value) {
            Err(DbItemError::BlankValue) => {
                self.notices.warning("項目名を入力してください。");
                None
            }
            Ok(AddOutcome::AlreadyExists) => {
                self.notices.info(format!(
                    "「{}」に「{}」は既に存在します。",
                    kind.label(),
                    value.trim()
                ));
                Some(AddOutcome::AlreadyExists)
            }
            Ok(AddOutcome::Added) => {
                self.persist_db_items().await;
                Some(AddOutcome::Added)
            }
        }
    }

    /// 業務データベースから値を削除し、全体を保存する。
    pub async fn delete_db_item(&mut self, kind: FieldKind, value: &str) -> bool {
        if !self.db_items.remove(kind, value) {
            self.notices.info(format!(
                "「{}」に「{}」は登録されていません。",
                kind.label(),
                value
            ));
            return false;
        }
        self.persist_db_items().await
    }

    /// スプレッドシートから業務データベースを取り込む。
    ///
    /// 追加した件数を返す。
    pub async fn import_db_items(&mut self, mode: ImportMode) -> Option<usize> {
        self.busy = Some("業務データベースをインポート中...".to_string());
        let result = self.repository.read_db_items(DbSource::Spreadsheet).await;
        self.busy = None;

        let imported = match result {
            Ok(imported) => imported,
            Err(err) => {
                self.notices.error(format!(
                    "業務データベースのインポートに失敗しました: {:#}",
                    err
                ));
                return None;
            }
        };
        let added = self.db_items.merge(imported);
        info!("Imported {} new db items ({:?})", added, mode);

        match mode {
            ImportMode::ViewOnly => self.notices.success(format!(
                "業務データベースをインポートしました({}件追加、保存先には反映されません)",
                added
            )),
            ImportMode::WriteBack => {
                if !self.persist_db_items().await {
                    return None;
                }
                self.notices
                    .success(format!("業務データベースをインポートしました({}件追加)", added));
            }
        }

        Some(added)
    }

    /// 業務データベースを全て保存する。失敗した場合は保存先の状態を読み込み直す。
    async fn persist_db_items(&mut self) -> bool {
        match self.repository.save_db_items(&self.db_items).await {
            Ok(()) => true,
            Err(err) => {
                warn!("Failed to save db items: {:#}", err);
                self.load_db_items().await;
                self.notices
                    .error(format!("データベースの保存に失敗しました: {:#}", err));
                false
            }
        }
    }
}
