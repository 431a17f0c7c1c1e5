use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::datetime;

/// 通知を表示しておく時間(ミリ秒)。
pub const NOTICE_LIFETIME_MS: i64 = 3000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
    Warning,
    Info,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NoticeLevel::Success => "success",
            NoticeLevel::Error => "error",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Info => "info",
        };
        f.write_str(label)
    }
}

/// 一定時間だけ表示する利用者向けの通知。
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

/// 最新の通知を1件だけ保持する。新しい通知は古い通知を置き換える。
#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: Option<Notice>,
}

impl NoticeBoard {
    pub fn post(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.current = Some(Notice {
            level,
            message: message.into(),
            expires_at: datetime::now() + Duration::milliseconds(NOTICE_LIFETIME_MS),
        });
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.post(NoticeLevel::Success, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.post(NoticeLevel::Error, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.post(NoticeLevel::Warning, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.post(NoticeLevel::Info, message);
    }

    /// 表示期限内の通知を返す。
    pub fn current(&self) -> Option<&Notice> {
        self.current
            .as_ref()
            .filter(|notice| datetime::now() < notice.expires_at)
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn dismiss(&mut self) {
        self.current = None;
    }
}
