use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use log::info;

use crate::api::TimeSliceRepository;
use crate::config::Config;
use crate::console::ConsolePresenter;
use crate::datetime;
use crate::draft::DraftStore;
use crate::editor::DayEditor;
use crate::field::FieldKind;
use crate::notice::NoticeBoard;
use crate::preset::find_preset;
use crate::session::{DaySession, LoadOutcome, MissingDayPolicy, SaveOutcome};
use crate::suggestion::{SuggestionBox, SuggestionTarget};
use crate::time_entry::EntryId;
use crate::time_slot::parse_time_of_day;

/// 1日分のタイムスライスを編集するためのサブコマンド。
#[derive(Debug, clap::Args)]
pub struct DayArgs {
    #[clap(
        short = 'd',
        long = "date",
        help = "Sets a custom date in the format YYYY-MM-DD",
        parse(try_from_str = parse_date),
    )]
    date: Option<NaiveDate>,

    #[clap(subcommand)]
    action: DayAction,
}

/// 下書きに対する操作。
#[derive(Debug, clap::Subcommand)]
pub enum DayAction {
    /// Shows the draft of the day
    Show,
    /// Loads the day from the backend, replacing the draft
    Load {
        #[clap(long, help = "Leaves the day empty when the backend has no data")]
        empty_on_missing: bool,
    },
    /// Copies the previous day's entries into this day
    CopyYesterday,
    /// Copies the same weekday of last week into this day
    CopyLastWeek,
    /// Appends an empty slice
    Add,
    /// Duplicates a slice right after itself
    Duplicate {
        #[clap(parse(try_from_str = parse_entry_id))]
        id: EntryId,
    },
    /// Deletes one or more slices
    Delete {
        #[clap(required = true, parse(try_from_str = parse_entry_id))]
        ids: Vec<EntryId>,
    },
    /// Moves a slice to the position of another slice
    Move {
        #[clap(parse(try_from_str = parse_entry_id))]
        id: EntryId,
        #[clap(parse(try_from_str = parse_entry_id))]
        over: EntryId,
    },
    /// Sets the start time of the first slice
    Start {
        #[clap(parse(try_from_str = parse_time))]
        start: String,
    },
    /// Sets the start time of a slice and the slices after it
    Retime {
        #[clap(parse(try_from_str = parse_entry_id))]
        id: EntryId,
        #[clap(parse(try_from_str = parse_time))]
        start: String,
    },
    /// Sets a field of a slice
    Edit {
        #[clap(parse(try_from_str = parse_entry_id))]
        id: EntryId,
        field: FieldKind,
        value: String,
    },
    /// Appends slices filled from a preset
    Preset { name: String },
    /// Shows suggestions for a field, or fills it with the picked one
    Suggest {
        #[clap(parse(try_from_str = parse_entry_id))]
        id: EntryId,
        field: FieldKind,
        #[clap(long)]
        pick: Option<usize>,
    },
    /// Saves the whole day to the backend
    Save,
    /// Throws the draft away
    Discard,
}

impl DayAction {
    /// 下書きがない時に最初の読み込みを省略する操作か。
    fn replaces_day(&self) -> bool {
        matches!(
            self,
            DayAction::Load { .. } | DayAction::CopyYesterday | DayAction::CopyLastWeek
        )
    }
}

pub struct DayCommand<'a, T: TimeSliceRepository> {
    repository: &'a T,
    drafts: &'a DraftStore,
    config: &'a Config,
}

impl<'a, T: TimeSliceRepository> DayCommand<'a, T> {
    /// 新しい`DayCommand`を返す。
    ///
    /// # Arguments
    /// * `repository` - バックエンドと通信するためのリポジトリ
    /// * `drafts` - 編集中の状態の保存先
    /// * `config` - 設定
    pub fn new(repository: &'a T, drafts: &'a DraftStore, config: &'a Config) -> Self {
        Self {
            repository,
            drafts,
            config,
        }
    }

    /// `day`サブコマンドの処理を行う。
    ///
    /// 日付の下書きを読み込んで操作を適用し、下書きを書き戻してから表示する。
    /// 下書きがない場合は、最初にバックエンドから読み込み、データがなければ既定の時間割を使う。
    /// 日付が指定されていない場合は、Localタイムゾーンで現在の日付を利用する。
    ///
    /// 読み込みと保存に失敗した場合は、通知を表示した後にエラーを返す。
    pub async fn run<P: ConsolePresenter>(&self, day: DayArgs, presenter: &mut P) -> Result<()> {
        let date = day.date.unwrap_or_else(datetime::today);
        info!("Date: {}, action: {:?}", date, day.action);

        if let DayAction::Discard = day.action {
            let mut notices = NoticeBoard::default();
            if self.drafts.discard(date)? {
                notices.success(format!("{} の下書きを破棄しました", date));
            } else {
                notices.info(format!("{} の下書きはありません", date));
            }
            if let Some(notice) = notices.current() {
                presenter.show_notice(notice)?;
            }
            return Ok(());
        }

        let draft = self.drafts.load(date)?;
        let fresh = draft.is_none();
        let editor = match draft {
            Some(draft) => DayEditor::from_draft(draft, &self.config.default_start),
            None => DayEditor::new(date, &self.config.default_start),
        };
        let mut session = DaySession::new(self.repository, editor, self.config.skeleton.clone());

        if fresh && !day.action.replaces_day() {
            let outcome = session.load_day(MissingDayPolicy::DefaultSkeleton).await;
            if outcome == LoadOutcome::Failed {
                Self::present(&session, presenter)?;
                bail!("Failed to load {}", date);
            }
        }

        let failure = self.apply(&mut session, day.action, presenter).await?;

        self.drafts.store(&session.editor().to_draft())?;
        Self::present(&session, presenter)?;
        if let Some(failure) = failure {
            bail!(failure);
        }

        Ok(())
    }

    /// 操作を適用する。通知として扱う失敗は説明を返す。
    async fn apply<P: ConsolePresenter>(
        &self,
        session: &mut DaySession<'_, T>,
        action: DayAction,
        presenter: &mut P,
    ) -> Result<Option<String>> {
        match action {
            DayAction::Show | DayAction::Discard => {}
            DayAction::Load { empty_on_missing } => {
                let policy = if empty_on_missing {
                    MissingDayPolicy::EmptyWithWarning
                } else {
                    MissingDayPolicy::DefaultSkeleton
                };
                return Ok(load_failure(session.load_day(policy).await));
            }
            DayAction::CopyYesterday => {
                return Ok(load_failure(session.copy_previous_day().await));
            }
            DayAction::CopyLastWeek => {
                return Ok(load_failure(session.copy_same_weekday_last_week().await));
            }
            DayAction::Add => {
                session.editor_mut().add_empty_row();
            }
            DayAction::Duplicate { id } => {
                session.editor_mut().duplicate_row(id)?;
            }
            DayAction::Delete { ids } => {
                let editor = session.editor_mut();
                if let [id] = ids.as_slice() {
                    editor.delete_row(*id)?;
                } else {
                    for id in &ids {
                        editor.select(*id, true)?;
                    }
                    let deleted = editor.delete_selected();
                    info!("Deleted {} entries", deleted);
                }
            }
            DayAction::Move { id, over } => {
                session.editor_mut().reorder(id, over)?;
            }
            DayAction::Start { start } => {
                session.editor_mut().set_start_time(&start);
            }
            DayAction::Retime { id, start } => {
                session.editor_mut().retime(id, &start)?;
            }
            DayAction::Edit { id, field, value } => {
                session.editor_mut().edit_field(id, field, &value)?;
            }
            DayAction::Preset { name } => {
                let preset = find_preset(&self.config.presets, &name)
                    .with_context(|| format!("Unknown preset: {}", name))?;
                let added = session.editor_mut().apply_preset(preset);
                session.notices_mut().success(format!(
                    "プリセット「{}」を適用しました({}行)",
                    preset.name,
                    added.len()
                ));
            }
            DayAction::Suggest { id, field, pick } => {
                self.suggest(session, SuggestionTarget { entry: id, field }, pick, presenter)
                    .await?;
            }
            DayAction::Save => {
                let outcome = session.save().await;
                return Ok(match outcome {
                    SaveOutcome::Saved { .. } => None,
                    SaveOutcome::Invalid(ids) => Some(format!(
                        "Content is empty for entries: {}",
                        ids.iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(", ")
                    )),
                    SaveOutcome::Busy => Some("Another request is in progress".to_string()),
                    SaveOutcome::Failed => {
                        Some(format!("Failed to save {}", session.editor().date()))
                    }
                });
            }
        }

        Ok(None)
    }

    /// 業務データベースから入力候補を表示する。`pick`が指定された場合はその候補で入力欄を埋める。
    async fn suggest<P: ConsolePresenter>(
        &self,
        session: &mut DaySession<'_, T>,
        target: SuggestionTarget,
        pick: Option<usize>,
        presenter: &mut P,
    ) -> Result<()> {
        if session.editor().entry(target.entry).is_none() {
            bail!("No entry with id {}", target.entry);
        }
        session.load_db_items().await;

        let mut suggestions = SuggestionBox::new(self.config.suggestion_limit);
        suggestions.show(target, session.db_items());
        if !suggestions.is_open() {
            session
                .notices_mut()
                .info(format!("「{}」の候補はありません", target.field.label()));
            return Ok(());
        }

        match pick {
            Some(index) => {
                let Some(value) = suggestions.select(index, session.editor_mut())? else {
                    bail!("No suggestion at index {}", index);
                };
                info!("Picked suggestion {:?} for entry {}", value, target.entry);
            }
            None => presenter.show_suggestions(target, suggestions.candidates())?,
        }

        Ok(())
    }

    fn present<P: ConsolePresenter>(session: &DaySession<'_, T>, presenter: &mut P) -> Result<()> {
        presenter.show_day(session.editor())?;
        if let Some(notice) = session.notices().current() {
            presenter.show_notice(notice)?;
        }

        Ok(())
    }
}

fn load_failure(outcome: LoadOutcome) -> Option<String> {
    (outcome == LoadOutcome::Failed).then(|| "Failed to load entries".to_string())
}

/// 日付をパースする。
fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Failed to parse date: {}", s))
}

/// `HH:MM`形式の時刻を検証する。
fn parse_time(s: &str) -> Result<String> {
    if parse_time_of_day(s).is_none() {
        bail!("Time must be in the format HH:MM: {}", s);
    }
    Ok(s.to_string())
}

fn parse_entry_id(s: &str) -> Result<EntryId> {
    let id = s
        .trim_start_matches('#')
        .parse()
        .with_context(|| format!("Failed to parse entry id: {}", s))?;
    Ok(EntryId(id))
}
