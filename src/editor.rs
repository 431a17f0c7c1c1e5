use chrono::NaiveDate;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::field::FieldKind;
use crate::preset::Preset;
use crate::time_entry::{EntryId, EntryRecord, TimeEntry};
use crate::time_slot::{self, parse_time_of_day, recalculate, recalculate_from, TimeRange};

/// 編集操作の失敗。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditorError {
    #[error("No entry with id {0}")]
    UnknownEntry(EntryId),

    #[error("Entry {0} has no valid time range")]
    MissingTimeRange(EntryId),

    #[error("Content is empty for entries: {0:?}")]
    MissingContent(Vec<EntryId>),
}

/// 1日分の集計値。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DayStats {
    /// いずれかの記述項目が入力済みのスライス数
    pub filled_slices: usize,
    pub total_hours: f64,
}

/// 編集中の1日分の状態を保存するための形式。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub date: NaiveDate,
    pub next_id: u64,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub entries: Vec<TimeEntry>,
}

/// 選択中の日付のタイムスライスを順序付きで保持し、全ての変更を受け付ける。
///
/// 行の挿入、削除、並べ替え、開始時刻の変更の後は必ず`time_slot::recalculate_from`で
/// 後続の時間範囲を計算し直す。
#[derive(Clone, Debug)]
pub struct DayEditor {
    date: NaiveDate,
    entries: Vec<TimeEntry>,
    next_id: u64,
    default_start: String,
    last_updated: Option<String>,
}

impl DayEditor {
    /// 空の`DayEditor`を返す。
    ///
    /// # Arguments
    ///
    /// * `date` - 編集する日付
    /// * `default_start` - 行が1つもない時に使う開始時刻
    pub fn new(date: NaiveDate, default_start: &str) -> Self {
        Self {
            date,
            entries: Vec::new(),
            next_id: 1,
            default_start: default_start.to_string(),
            last_updated: None,
        }
    }

    /// 保存された下書きから復元する。
    pub fn from_draft(draft: Draft, default_start: &str) -> Self {
        let max_id = draft.entries.iter().map(|e| e.id.0).max().unwrap_or(0);
        Self {
            date: draft.date,
            entries: draft.entries,
            next_id: draft.next_id.max(max_id + 1),
            default_start: default_start.to_string(),
            last_updated: draft.last_updated,
        }
    }

    pub fn to_draft(&self) -> Draft {
        Draft {
            date: self.date,
            next_id: self.next_id,
            last_updated: self.last_updated.clone(),
            entries: self.entries.clone(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn entries(&self) -> &[TimeEntry] {
        &self.entries
    }

    pub fn entry(&self, id: EntryId) -> Option<&TimeEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }

    pub fn set_last_updated(&mut self, status: impl Into<String>) {
        self.last_updated = Some(status.into());
    }

    /// 先頭の行の開始時刻を返す。行がない場合は既定の開始時刻を返す。
    pub fn anchor(&self) -> String {
        self.entries
            .first()
            .map(|e| e.start().to_string())
            .filter(|start| !start.is_empty())
            .unwrap_or_else(|| self.default_start.clone())
    }

    /// 空の行を末尾に追加する。
    ///
    /// 開始時刻は直前の行の終了時刻で、行がない場合は既定の開始時刻になる。
    pub fn add_empty_row(&mut self) -> EntryId {
        let anchor = self
            .entries
            .last()
            .and_then(|e| e.range())
            .map(|range| range.end)
            .unwrap_or_else(|| self.default_start.clone());

        let id = self.allocate_id();
        self.append_with_anchor(TimeEntry::blank(id), &anchor);
        id
    }

    /// 指定された行の直後に、同じ記述項目を持つ行を挿入する。
    ///
    /// 挿入した行以降は全て1スライス分後ろにずれる。
    pub fn duplicate_row(&mut self, id: EntryId) -> Result<EntryId, EditorError> {
        let index = self.index_of(id)?;
        let source = &self.entries[index];
        let range = source.range().ok_or(EditorError::MissingTimeRange(id))?;

        let new_id = self.allocate_id();
        let clone = TimeEntry {
            fields: self.entries[index].fields.clone(),
            ..TimeEntry::blank(new_id)
        };
        self.entries.insert(index + 1, clone);
        self.retime_from(index + 1, &range.end);
        debug!("Duplicated entry {} as {}", id, new_id);

        Ok(new_id)
    }

    /// 指定された行を削除し、後続の行を削除した行の開始時刻から詰め直す。
    pub fn delete_row(&mut self, id: EntryId) -> Result<TimeEntry, EditorError> {
        let index = self.index_of(id)?;
        let removed = self.entries.remove(index);
        let anchor = removed.start().to_string();
        self.retime_from(index, &anchor);

        Ok(removed)
    }

    /// 選択状態を変更する。
    pub fn select(&mut self, id: EntryId, selected: bool) -> Result<(), EditorError> {
        let index = self.index_of(id)?;
        self.entries[index].selected = selected;
        Ok(())
    }

    /// 選択中の行を全て削除し、最初に削除した行の開始時刻から詰め直す。
    ///
    /// 削除した行数を返す。
    pub fn delete_selected(&mut self) -> usize {
        let Some(first) = self.entries.iter().position(|e| e.selected) else {
            return 0;
        };
        let anchor = self.entries[first].start().to_string();
        let before = self.entries.len();
        self.entries.retain(|e| !e.selected);
        self.retime_from(first, &anchor);

        before - self.entries.len()
    }

    /// `active`の行を`over`の行の位置に移動し、全体を先頭の開始時刻から計算し直す。
    pub fn reorder(&mut self, active: EntryId, over: EntryId) -> Result<(), EditorError> {
        let from = self.index_of(active)?;
        let to = self.index_of(over)?;
        if from == to {
            return Ok(());
        }

        let anchor = self.anchor();
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        self.retime_from(0, &anchor);

        Ok(())
    }

    /// 1日の開始時刻を変更し、全体を計算し直す。
    pub fn set_start_time(&mut self, start: &str) {
        self.default_start = start.to_string();
        self.retime_from(0, start);
    }

    /// 指定された行の開始時刻を変更し、その行以降を計算し直す。
    pub fn retime(&mut self, id: EntryId, start: &str) -> Result<(), EditorError> {
        let index = self.index_of(id)?;
        self.retime_from(index, start);
        Ok(())
    }

    /// 1つの記述項目を更新する。時間範囲は変わらない。
    ///
    /// 内容が入力されたらエラー表示を解除する。
    pub fn edit_field(
        &mut self,
        id: EntryId,
        kind: FieldKind,
        value: &str,
    ) -> Result<(), EditorError> {
        let index = self.index_of(id)?;
        let entry = &mut self.entries[index];
        entry.fields.set(kind, value);
        if kind == FieldKind::Content && !value.trim().is_empty() {
            entry.has_error = false;
        }

        Ok(())
    }

    /// プリセットの内容で行を末尾に追加する。
    pub fn apply_preset(&mut self, preset: &Preset) -> Vec<EntryId> {
        (0..preset.slices())
            .map(|_| {
                let id = self.add_empty_row();
                if let Ok(index) = self.index_of(id) {
                    self.entries[index].fields = preset.fields.clone();
                }
                id
            })
            .collect()
    }

    /// 保存前の検証を行い、サーバーに送る形式を返す。
    ///
    /// 内容が空の行には`has_error`を立て、`EditorError::MissingContent`を返す。
    pub fn validate_for_save(&mut self) -> Result<Vec<EntryRecord>, EditorError> {
        let mut missing = Vec::new();
        for entry in self.entries.iter_mut() {
            entry.has_error = entry.fields.content.trim().is_empty();
            if entry.has_error {
                missing.push(entry.id);
            }
        }
        if !missing.is_empty() {
            return Err(EditorError::MissingContent(missing));
        }

        Ok(self.entries.iter().map(TimeEntry::to_record).collect())
    }

    /// サーバーから取得したエントリーで全体を置き換える。
    ///
    /// 時間範囲として分解できない行は読み飛ばし、残りを先頭の開始時刻から連続するように
    /// 計算し直す。先頭の開始時刻が不正な場合は既定の開始時刻を使う。
    pub fn replace_with_records(&mut self, records: Vec<EntryRecord>) -> usize {
        let mut entries = Vec::with_capacity(records.len());
        let mut anchor = None;
        for record in records {
            let Some(range) = TimeRange::parse(&record.time) else {
                warn!("Skipping entry with invalid time range: {:?}", record.time);
                continue;
            };
            if anchor.is_none() {
                anchor = Some(range.start.clone());
            }
            let id = self.allocate_id();
            entries.push(TimeEntry {
                time: range.to_string(),
                fields: record.fields,
                ..TimeEntry::blank(id)
            });
        }

        let anchor = anchor
            .filter(|start| parse_time_of_day(start).is_some())
            .unwrap_or_else(|| self.default_start.clone());
        self.entries = recalculate(entries, &anchor);
        self.entries.len()
    }

    /// 既定の時間割で空の行を作成する。
    pub fn load_skeleton(&mut self, start_times: &[String]) {
        let entries: Vec<TimeEntry> = start_times
            .iter()
            .map(|start| TimeEntry {
                time: TimeRange::slot(start).to_string(),
                ..TimeEntry::blank(self.allocate_id())
            })
            .collect();
        let anchor = start_times
            .first()
            .filter(|start| parse_time_of_day(start).is_some())
            .cloned()
            .unwrap_or_else(|| self.default_start.clone());
        self.entries = recalculate(entries, &anchor);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> DayStats {
        let filled_slices = self.entries.iter().filter(|e| e.fields.is_filled()).count();
        DayStats {
            filled_slices,
            total_hours: filled_slices as f64 * f64::from(time_slot::SLOT_MINUTES) / 60.0,
        }
    }

    fn allocate_id(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        id
    }

    fn index_of(&self, id: EntryId) -> Result<usize, EditorError> {
        self.entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(EditorError::UnknownEntry(id))
    }

    fn append_with_anchor(&mut self, entry: TimeEntry, anchor: &str) {
        self.entries.push(entry);
        let index = self.entries.len() - 1;
        self.retime_from(index, anchor);
    }

    fn retime_from(&mut self, index: usize, anchor: &str) {
        let entries = std::mem::take(&mut self.entries);
        self.entries = recalculate_from(entries, index, anchor);
    }
}

/// テストでのみ利用する、記述項目を指定して行を作るための補助。
#[cfg(test)]
pub(crate) fn fields_with_content(content: &str) -> crate::field::EntryFields {
    crate::field::EntryFields {
        content: content.to_string(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rstest::rstest;

    use super::{fields_with_content, DayEditor, EditorError};
    use crate::field::FieldKind;
    use crate::preset::Preset;
    use crate::time_entry::{EntryId, EntryRecord};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 7).unwrap()
    }

    /// 09:00から始まる`count`件の連続した行を持つ`DayEditor`。
    fn editor_with_rows(count: usize) -> DayEditor {
        let mut editor = DayEditor::new(date(), "09:00");
        for i in 0..count {
            let id = editor.add_empty_row();
            editor
                .edit_field(id, FieldKind::Content, &format!("task{}", i + 1))
                .unwrap();
        }
        editor
    }

    fn times(editor: &DayEditor) -> Vec<&str> {
        editor.entries().iter().map(|e| e.time.as_str()).collect()
    }

    fn contents(editor: &DayEditor) -> Vec<&str> {
        editor
            .entries()
            .iter()
            .map(|e| e.fields.content.as_str())
            .collect()
    }

    fn assert_contiguous(editor: &DayEditor, anchor: &str) {
        let entries = editor.entries();
        assert_eq!(entries[0].start(), anchor);
        for pair in entries.windows(2) {
            assert_eq!(pair[1].range().unwrap().start, pair[0].range().unwrap().end);
        }
    }

    #[test]
    fn test_add_empty_row_uses_default_start() {
        let mut editor = DayEditor::new(date(), "09:00");

        let first = editor.add_empty_row();
        let second = editor.add_empty_row();

        assert_eq!(times(&editor), vec!["09:00 - 09:30", "09:30 - 10:00"]);
        assert_eq!((first, second), (EntryId(1), EntryId(2)));
    }

    /// 削除した行の識別子は再利用しない。
    #[test]
    fn test_ids_not_reused_after_delete() {
        let mut editor = editor_with_rows(2);
        editor.delete_row(EntryId(2)).unwrap();

        let id = editor.add_empty_row();

        assert_eq!(id, EntryId(3));
    }

    #[test]
    fn test_delete_middle_row_keeps_list_contiguous() {
        let mut editor = editor_with_rows(5);

        let removed = editor.delete_row(EntryId(3)).unwrap();

        assert_eq!(removed.fields.content, "task3");
        assert_eq!(
            times(&editor),
            vec!["09:00 - 09:30", "09:30 - 10:00", "10:00 - 10:30", "10:30 - 11:00"]
        );
        assert_eq!(contents(&editor), vec!["task1", "task2", "task4", "task5"]);
    }

    #[test]
    fn test_delete_last_row() {
        let mut editor = editor_with_rows(3);

        editor.delete_row(EntryId(3)).unwrap();

        assert_eq!(times(&editor), vec!["09:00 - 09:30", "09:30 - 10:00"]);
    }

    #[test]
    fn test_delete_unknown_row() {
        let mut editor = editor_with_rows(1);

        assert_eq!(
            editor.delete_row(EntryId(9)).unwrap_err(),
            EditorError::UnknownEntry(EntryId(9))
        );
        assert_eq!(editor.entries().len(), 1);
    }

    #[rstest]
    #[case::first(0)]
    #[case::middle(2)]
    #[case::last(4)]
    fn test_duplicate_row(#[case] index: usize) {
        let mut editor = editor_with_rows(5);
        let source_id = editor.entries()[index].id;
        editor
            .edit_field(source_id, FieldKind::Client, "A社")
            .unwrap();

        let clone_id = editor.duplicate_row(source_id).unwrap();

        let entries = editor.entries();
        assert_eq!(entries.len(), 6);
        assert_eq!(entries[index + 1].id, clone_id);
        assert_eq!(entries[index + 1].fields, entries[index].fields);
        assert_eq!(
            entries[index + 1].range().unwrap().start,
            entries[index].range().unwrap().end
        );
        assert_contiguous(&editor, "09:00");
        assert_eq!(entries[5].time, "11:30 - 12:00");
    }

    #[test]
    fn test_duplicate_row_without_time_range() {
        let mut editor = DayEditor::from_draft(
            serde_json::from_value(serde_json::json!({
                "date": "2025-04-07",
                "next_id": 2,
                "entries": [{"id": 1, "time": "", "content": "x"}],
            }))
            .unwrap(),
            "09:00",
        );

        assert_eq!(
            editor.duplicate_row(EntryId(1)).unwrap_err(),
            EditorError::MissingTimeRange(EntryId(1))
        );
    }

    /// 並べ替えても開始時刻は変わらず、順序だけが入れ替わる。
    #[test]
    fn test_reorder_recomputes_from_anchor() {
        let mut editor = editor_with_rows(4);

        editor.reorder(EntryId(4), EntryId(1)).unwrap();

        assert_eq!(contents(&editor), vec!["task4", "task1", "task2", "task3"]);
        assert_eq!(
            times(&editor),
            vec!["09:00 - 09:30", "09:30 - 10:00", "10:00 - 10:30", "10:30 - 11:00"]
        );
    }

    #[test]
    fn test_reorder_forward() {
        let mut editor = editor_with_rows(4);

        editor.reorder(EntryId(1), EntryId(3)).unwrap();

        assert_eq!(contents(&editor), vec!["task2", "task3", "task1", "task4"]);
        assert_contiguous(&editor, "09:00");
    }

    #[test]
    fn test_set_start_time() {
        let mut editor = editor_with_rows(3);

        editor.set_start_time("13:30");

        assert_eq!(
            times(&editor),
            vec!["13:30 - 14:00", "14:00 - 14:30", "14:30 - 15:00"]
        );
    }

    #[test]
    fn test_retime_shifts_following_rows_only() {
        let mut editor = editor_with_rows(4);

        editor.retime(EntryId(3), "13:00").unwrap();

        assert_eq!(
            times(&editor),
            vec!["09:00 - 09:30", "09:30 - 10:00", "13:00 - 13:30", "13:30 - 14:00"]
        );
    }

    #[test]
    fn test_delete_selected() {
        let mut editor = editor_with_rows(5);
        editor.select(EntryId(2), true).unwrap();
        editor.select(EntryId(4), true).unwrap();

        let removed = editor.delete_selected();

        assert_eq!(removed, 2);
        assert_eq!(contents(&editor), vec!["task1", "task3", "task5"]);
        assert_contiguous(&editor, "09:00");
    }

    #[test]
    fn test_delete_selected_without_selection() {
        let mut editor = editor_with_rows(2);

        assert_eq!(editor.delete_selected(), 0);
        assert_eq!(editor.entries().len(), 2);
    }

    #[test]
    fn test_validate_flags_exactly_empty_rows() {
        let mut editor = editor_with_rows(3);
        editor.edit_field(EntryId(2), FieldKind::Content, "  ").unwrap();
        editor.add_empty_row();

        let err = editor.validate_for_save().unwrap_err();

        assert_eq!(err, EditorError::MissingContent(vec![EntryId(2), EntryId(4)]));
        let flagged: Vec<bool> = editor.entries().iter().map(|e| e.has_error).collect();
        assert_eq!(flagged, vec![false, true, false, true]);
    }

    #[test]
    fn test_edit_content_clears_error() {
        let mut editor = editor_with_rows(1);
        editor.edit_field(EntryId(1), FieldKind::Content, "").unwrap();
        assert!(editor.validate_for_save().is_err());

        editor.edit_field(EntryId(1), FieldKind::Remark, "memo").unwrap();
        assert!(editor.entry(EntryId(1)).unwrap().has_error);

        editor.edit_field(EntryId(1), FieldKind::Content, "資料作成").unwrap();
        assert!(!editor.entry(EntryId(1)).unwrap().has_error);
    }

    #[test]
    fn test_validate_returns_trimmed_records() {
        let mut editor = editor_with_rows(1);
        editor
            .edit_field(EntryId(1), FieldKind::Content, " 資料作成 ")
            .unwrap();

        let records = editor.validate_for_save().unwrap();

        assert_eq!(
            records,
            vec![EntryRecord {
                id: 1,
                time: "09:00 - 09:30".to_string(),
                fields: fields_with_content("資料作成"),
            }]
        );
    }

    #[test]
    fn test_apply_preset_appends_slices() {
        let mut editor = editor_with_rows(1);
        let preset = Preset {
            id: "mtg".to_string(),
            name: "会議".to_string(),
            duration_minutes: 60,
            fields: fields_with_content("定例会議"),
        };

        let ids = editor.apply_preset(&preset);

        assert_eq!(ids, vec![EntryId(2), EntryId(3)]);
        assert_eq!(contents(&editor), vec!["task1", "定例会議", "定例会議"]);
        assert_eq!(editor.entries()[2].time, "10:00 - 10:30");
    }

    #[test]
    fn test_replace_with_records_normalizes() {
        let mut editor = editor_with_rows(2);
        let records = vec![
            EntryRecord {
                id: 10,
                time: "10:00 - 10:30".to_string(),
                fields: fields_with_content("a"),
            },
            EntryRecord {
                id: 11,
                time: "broken".to_string(),
                fields: fields_with_content("b"),
            },
            EntryRecord {
                id: 12,
                time: "14:00 - 14:30".to_string(),
                fields: fields_with_content("c"),
            },
        ];

        let loaded = editor.replace_with_records(records);

        assert_eq!(loaded, 2);
        assert_eq!(contents(&editor), vec!["a", "c"]);
        assert_eq!(times(&editor), vec!["10:00 - 10:30", "10:30 - 11:00"]);
        assert_eq!(editor.entries()[0].id, EntryId(3));
    }

    #[test]
    fn test_replace_with_records_malformed_first_start() {
        let mut editor = DayEditor::new(date(), "09:00");
        let records = vec![EntryRecord {
            time: "9:00 - 9:30".to_string(),
            ..EntryRecord::default()
        }];

        editor.replace_with_records(records);

        assert_eq!(times(&editor), vec!["09:00 - 09:30"]);
    }

    #[test]
    fn test_load_skeleton() {
        let mut editor = DayEditor::new(date(), "09:00");
        let skeleton: Vec<String> = ["08:30", "09:00", "09:30"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        editor.load_skeleton(&skeleton);

        assert_eq!(
            times(&editor),
            vec!["08:30 - 09:00", "09:00 - 09:30", "09:30 - 10:00"]
        );
        assert!(editor.entries().iter().all(|e| !e.fields.is_filled()));
    }

    #[test]
    fn test_stats() {
        let mut editor = editor_with_rows(3);
        editor.add_empty_row();
        let id = editor.add_empty_row();
        editor.edit_field(id, FieldKind::Remark, "移動").unwrap();

        let stats = editor.stats();

        assert_eq!(stats.filled_slices, 4);
        assert_eq!(stats.total_hours, 2.0);
    }

    #[test]
    fn test_draft_round_trip_keeps_id_sequence() {
        let mut editor = editor_with_rows(3);
        editor.delete_row(EntryId(3)).unwrap();
        editor.set_last_updated("2025/04/07 18:00:00");

        let mut restored = DayEditor::from_draft(editor.to_draft(), "09:00");

        assert_eq!(restored.entries(), editor.entries());
        assert_eq!(restored.last_updated(), Some("2025/04/07 18:00:00"));
        assert_eq!(restored.add_empty_row(), EntryId(4));
    }
}
