use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::debug;

use crate::editor::Draft;

/// 編集中の1日分の状態を日付ごとのファイルに保存する。
///
/// サーバーに保存するまでの作業状態で、コマンドの実行をまたいで引き継ぐ。
pub struct DraftStore {
    dir: PathBuf,
}

impl DraftStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 既定の保存先を返す。
    pub fn default_dir() -> Result<PathBuf> {
        let dir = dirs::data_dir().context("Failed to locate the data directory")?;
        Ok(dir.join("timeslice").join("drafts"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    /// 指定された日付の下書きを読み込む。なければ`None`を返す。
    pub fn load(&self, date: NaiveDate) -> Result<Option<Draft>> {
        let path = self.path(date);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read draft: {}", path.display()))?;
        let draft = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse draft: {}", path.display()))?;

        Ok(Some(draft))
    }

    pub fn store(&self, draft: &Draft) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create directory: {}", self.dir.display()))?;
        let path = self.path(draft.date);
        let content = serde_json::to_string_pretty(draft).context("Failed to serialize draft")?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write draft: {}", path.display()))?;
        debug!("Stored draft for {} at {}", draft.date, path.display());

        Ok(())
    }

    /// 下書きを破棄する。存在しない場合は何もしない。
    pub fn discard(&self, date: NaiveDate) -> Result<bool> {
        let path = self.path(date);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .with_context(|| format!("Failed to remove draft: {}", path.display()))?;

        Ok(true)
    }
}
