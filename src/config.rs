use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::preset::Preset;
use crate::time_slot::parse_time_of_day;

/// バックエンドのURLを上書きする環境変数。
pub const API_URL_ENV: &str = "TIMESLICE_API_URL";

fn default_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_start() -> String {
    "09:00".to_string()
}

fn default_skeleton() -> Vec<String> {
    [
        "08:30", "09:00", "09:30", "10:00", "10:30", "11:00", "11:30", "12:00", "12:30", "13:00",
        "13:30", "14:00", "14:30", "15:00", "15:30", "16:00", "16:30", "17:00", "17:30", "18:00",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_suggestion_limit() -> Option<usize> {
    Some(5)
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// 設定ファイルの内容。全ての項目は省略できる。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// 行が1つもない時の開始時刻
    #[serde(default = "default_start")]
    pub default_start: String,
    /// データがない日に作る行の開始時刻
    #[serde(default = "default_skeleton")]
    pub skeleton: Vec<String>,
    /// 入力候補の最大数。`null`の場合は全件表示する。
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: Option<usize>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub presets: Vec<Preset>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            default_start: default_start(),
            skeleton: default_skeleton(),
            suggestion_limit: default_suggestion_limit(),
            request_timeout_secs: default_request_timeout_secs(),
            presets: Vec::new(),
        }
    }
}

impl Config {
    /// 既定の設定ファイルのパスを返す。
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Failed to locate the config directory")?;
        Ok(dir.join("timeslice").join("config.json"))
    }

    /// 設定を読み込む。
    ///
    /// `path`が指定されていない場合は既定のパスを使い、ファイルがなければ既定値を使う。
    /// 指定されたファイルが存在しない場合はエラーを返す。
    /// 最後に環境変数`TIMESLICE_API_URL`で`api_url`を上書きする。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::read_file(&path)?
                } else {
                    debug!("No config file at {}, using defaults", path.display());
                    Self::default()
                }
            }
        };

        if let Ok(api_url) = env::var(API_URL_ENV) {
            config.api_url = api_url;
        }
        config.validate()?;

        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if parse_time_of_day(&self.default_start).is_none() {
            bail!(
                "default_start must be in the format HH:MM: {:?}",
                self.default_start
            );
        }
        if let Some(start) = self
            .skeleton
            .iter()
            .find(|start| parse_time_of_day(start).is_none())
        {
            bail!("skeleton times must be in the format HH:MM: {:?}", start);
        }

        Ok(())
    }
}
