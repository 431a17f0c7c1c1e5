use std::io::Write;

use anyhow::{Context, Result};

use crate::db_items::DbItems;
use crate::editor::DayEditor;
use crate::field::FieldKind;
use crate::notice::Notice;
use crate::suggestion::SuggestionTarget;
use crate::time_entry::TimeEntry;

/// Consoleに編集状態を表示するためのtrait。
pub trait ConsolePresenter {
    /// 1日分のタイムスライスと集計値を表示する。
    ///
    /// # Arguments
    ///
    /// * `editor` - 表示する日付の編集状態
    fn show_day(&mut self, editor: &DayEditor) -> Result<()>;

    /// 業務データベースを種類ごとに表示する。
    fn show_db_items(&mut self, db_items: &DbItems) -> Result<()>;

    /// 入力欄に対する候補を番号付きで表示する。
    fn show_suggestions(&mut self, target: SuggestionTarget, candidates: &[String])
        -> Result<()>;

    fn show_notice(&mut self, notice: &Notice) -> Result<()>;
}

/// 編集状態をMarkdownのlist形式で表示する。
pub struct ConsoleMarkdownList<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleMarkdownList<'a, W> {
    /// 新しい`ConsoleMarkdownList`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

/// 1行分の表示を作る。内容以外の項目は入力されているものだけを括弧内に並べる。
fn format_entry(entry: &TimeEntry) -> String {
    let content = if entry.fields.content.trim().is_empty() {
        "(未入力)"
    } else {
        entry.fields.content.as_str()
    };
    let details: Vec<String> = FieldKind::ALL[1..]
        .iter()
        .filter_map(|kind| {
            let value = entry.fields.get(*kind).trim();
            (!value.is_empty()).then(|| format!("{}: {}", kind.label(), value))
        })
        .collect();

    let mut line = format!("- [{}] {}: {}", entry.id, entry.time, content);
    if !details.is_empty() {
        line.push_str(&format!(" ({})", details.join(", ")));
    }
    if entry.selected {
        line.push_str(" *");
    }
    if entry.has_error {
        line.push_str(" !");
    }
    line
}

impl<'a, W: Write> ConsolePresenter for ConsoleMarkdownList<'a, W> {
    fn show_day(&mut self, editor: &DayEditor) -> Result<()> {
        writeln!(self.writer, "# {}", editor.date().format("%Y-%m-%d"))
            .context("Failed to write date")?;
        for entry in editor.entries() {
            writeln!(self.writer, "{}", format_entry(entry))
                .with_context(|| format!("Failed to write time entry: {:?}", entry))?;
        }

        let stats = editor.stats();
        writeln!(
            self.writer,
            "合計時間 {:.1} 時間 / スライス数 {}",
            stats.total_hours, stats.filled_slices
        )
        .context("Failed to write stats")?;
        if let Some(last_updated) = editor.last_updated() {
            writeln!(self.writer, "最終更新: {}", last_updated)
                .context("Failed to write last updated")?;
        }

        Ok(())
    }

    fn show_db_items(&mut self, db_items: &DbItems) -> Result<()> {
        for kind in FieldKind::ALL {
            let values: Vec<&str> = db_items.values(kind).collect();
            if values.is_empty() {
                continue;
            }
            writeln!(self.writer, "## {} ({})", kind.label(), kind)
                .context("Failed to write db item kind")?;
            for value in values {
                writeln!(self.writer, "- {}", value)
                    .with_context(|| format!("Failed to write db item: {}", value))?;
            }
        }

        Ok(())
    }

    fn show_suggestions(
        &mut self,
        target: SuggestionTarget,
        candidates: &[String],
    ) -> Result<()> {
        writeln!(
            self.writer,
            "[{}] {} の候補:",
            target.entry,
            target.field.label()
        )
        .context("Failed to write suggestion header")?;
        for (index, candidate) in candidates.iter().enumerate() {
            writeln!(self.writer, "{}. {}", index, candidate)
                .with_context(|| format!("Failed to write suggestion: {}", candidate))?;
        }

        Ok(())
    }

    fn show_notice(&mut self, notice: &Notice) -> Result<()> {
        writeln!(self.writer, "[{}] {}", notice.level, notice.message)
            .with_context(|| format!("Failed to write notice: {:?}", notice))?;

        Ok(())
    }
}
