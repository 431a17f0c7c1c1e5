use chrono::{DateTime, Duration, Utc};

use crate::datetime;
use crate::db_items::DbItems;
use crate::editor::{DayEditor, EditorError};
use crate::field::FieldKind;
use crate::time_entry::EntryId;

/// フォーカスが外れてから候補を閉じるまでの猶予(ミリ秒)。
///
/// この間に行われた候補の選択は受け付ける。
pub const BLUR_GRACE_MS: i64 = 200;

/// 候補を表示している入力欄。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SuggestionTarget {
    pub entry: EntryId,
    pub field: FieldKind,
}

/// 入力欄に対する業務データベースからの入力候補。
///
/// 同時に開いている候補は1つだけで、別の入力欄で開くと前の候補は閉じる。
#[derive(Debug)]
pub struct SuggestionBox {
    limit: Option<usize>,
    target: Option<SuggestionTarget>,
    candidates: Vec<String>,
    blurred_at: Option<DateTime<Utc>>,
}

impl SuggestionBox {
    /// # Arguments
    ///
    /// * `limit` - 表示する候補の最大数。`None`の場合は全件表示する。
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            target: None,
            candidates: Vec::new(),
            blurred_at: None,
        }
    }

    /// 入力欄へのフォーカス時と入力のたびに呼び出す。
    ///
    /// 種類が一致する候補がない場合は何も表示しない。
    pub fn show(&mut self, target: SuggestionTarget, db_items: &DbItems) {
        self.dismiss();
        let candidates = db_items.suggestions(target.field, self.limit);
        if candidates.is_empty() {
            return;
        }
        self.target = Some(target);
        self.candidates = candidates;
    }

    /// フォーカスが外れたことを記録する。候補は猶予の経過後に閉じる。
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn blur(&mut self) {
        if self.target.is_some() {
            self.blurred_at = Some(datetime::now());
        }
    }

    /// 候補を閉じる。
    pub fn dismiss(&mut self) {
        self.target = None;
        self.candidates.clear();
        self.blurred_at = None;
    }

    pub fn is_open(&self) -> bool {
        let within_grace = self.blurred_at.map_or(true, |blurred_at| {
            datetime::now() - blurred_at < Duration::milliseconds(BLUR_GRACE_MS)
        });
        self.target.is_some() && within_grace
    }

    pub fn target(&self) -> Option<SuggestionTarget> {
        self.target.filter(|_| self.is_open())
    }

    pub fn candidates(&self) -> &[String] {
        if self.is_open() {
            &self.candidates
        } else {
            &[]
        }
    }

    /// `index`番目の候補で入力欄の値を上書きし、候補を閉じる。
    ///
    /// 候補が閉じている場合や`index`が範囲外の場合は何もせず`None`を返す。
    pub fn select(
        &mut self,
        index: usize,
        editor: &mut DayEditor,
    ) -> Result<Option<String>, EditorError> {
        let Some(target) = self.target() else {
            return Ok(None);
        };
        let Some(value) = self.candidates.get(index).cloned() else {
            return Ok(None);
        };

        editor.edit_field(target.entry, target.field, &value)?;
        self.dismiss();
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::{SuggestionBox, SuggestionTarget};
    use crate::datetime::mock_clock;
    use crate::db_items::DbItems;
    use crate::editor::DayEditor;
    use crate::field::FieldKind;
    use crate::time_entry::EntryId;

    fn db_items() -> DbItems {
        let mut db = DbItems::default();
        for value in ["A社", "B社", "C社"] {
            db.add(FieldKind::Client, value).unwrap();
        }
        db.add(FieldKind::Purpose, "採用").unwrap();
        db
    }

    fn editor() -> DayEditor {
        let mut editor = DayEditor::new(NaiveDate::from_ymd_opt(2025, 4, 7).unwrap(), "09:00");
        editor.add_empty_row();
        editor
    }

    fn target(field: FieldKind) -> SuggestionTarget {
        SuggestionTarget {
            entry: EntryId(1),
            field,
        }
    }

    #[test]
    fn test_show_filters_by_kind_and_limit() {
        let mut suggestions = SuggestionBox::new(Some(2));

        suggestions.show(target(FieldKind::Client), &db_items());

        assert_eq!(suggestions.candidates(), ["A社", "B社"]);
    }

    #[test]
    fn test_show_without_candidates_stays_closed() {
        let mut suggestions = SuggestionBox::new(None);

        suggestions.show(target(FieldKind::Remark), &db_items());

        assert!(!suggestions.is_open());
    }

    #[test]
    fn test_select_fills_field_and_dismisses() {
        let mut editor = editor();
        let mut suggestions = SuggestionBox::new(None);
        suggestions.show(target(FieldKind::Client), &db_items());

        let picked = suggestions.select(2, &mut editor).unwrap();

        assert_eq!(picked.as_deref(), Some("C社"));
        assert_eq!(editor.entry(EntryId(1)).unwrap().fields.client, "C社");
        assert!(!suggestions.is_open());
    }

    #[test]
    fn test_select_out_of_range() {
        let mut editor = editor();
        let mut suggestions = SuggestionBox::new(None);
        suggestions.show(target(FieldKind::Purpose), &db_items());

        assert_eq!(suggestions.select(5, &mut editor).unwrap(), None);
        assert!(suggestions.is_open());
    }

    /// フォーカスが外れても猶予の間は選択を受け付ける。
    #[test]
    fn test_select_within_blur_grace() {
        mock_clock::set(Utc.with_ymd_and_hms(2025, 4, 7, 9, 0, 0).unwrap());
        let mut editor = editor();
        let mut suggestions = SuggestionBox::new(None);
        suggestions.show(target(FieldKind::Client), &db_items());

        suggestions.blur();
        mock_clock::advance(Duration::milliseconds(150));

        assert_eq!(
            suggestions.select(0, &mut editor).unwrap().as_deref(),
            Some("A社")
        );
        mock_clock::clear();
    }

    #[test]
    fn test_closes_after_blur_grace() {
        mock_clock::set(Utc.with_ymd_and_hms(2025, 4, 7, 9, 0, 0).unwrap());
        let mut editor = editor();
        let mut suggestions = SuggestionBox::new(None);
        suggestions.show(target(FieldKind::Client), &db_items());

        suggestions.blur();
        mock_clock::advance(Duration::milliseconds(200));

        assert!(suggestions.candidates().is_empty());
        assert_eq!(suggestions.select(0, &mut editor).unwrap(), None);
        assert_eq!(editor.entry(EntryId(1)).unwrap().fields.client, "");
        mock_clock::clear();
    }

    /// 入力のたびに開き直すと、フォーカスが外れた記録は消える。
    #[test]
    fn test_show_again_resets_blur() {
        mock_clock::set(Utc.with_ymd_and_hms(2025, 4, 7, 9, 0, 0).unwrap());
        let mut suggestions = SuggestionBox::new(None);
        suggestions.show(target(FieldKind::Client), &db_items());
        suggestions.blur();

        suggestions.show(target(FieldKind::Purpose), &db_items());
        mock_clock::advance(Duration::seconds(1));

        assert_eq!(suggestions.target(), Some(target(FieldKind::Purpose)));
        assert_eq!(suggestions.candidates(), ["採用"]);
        mock_clock::clear();
    }
}
