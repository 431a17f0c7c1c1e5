use anyhow::{bail, Result};
use log::info;

use crate::api::TimeSliceRepository;
use crate::config::Config;
use crate::console::ConsolePresenter;
use crate::datetime;
use crate::editor::DayEditor;
use crate::field::FieldKind;
use crate::session::{DaySession, ImportMode};

/// 業務データベースを管理するためのサブコマンド。
#[derive(Debug, clap::Args)]
pub struct DbArgs {
    #[clap(subcommand)]
    action: DbAction,
}

#[derive(Debug, clap::Subcommand)]
pub enum DbAction {
    /// Lists the items grouped by kind
    List,
    /// Adds an item and saves the whole database
    Add { kind: FieldKind, value: String },
    /// Deletes an item and saves the whole database
    Delete { kind: FieldKind, value: String },
    /// Imports items from the spreadsheet
    Import {
        #[clap(long, help = "Saves the imported items back to the database")]
        write_back: bool,
    },
}

pub struct DbCommand<'a, T: TimeSliceRepository> {
    repository: &'a T,
    config: &'a Config,
}

impl<'a, T: TimeSliceRepository> DbCommand<'a, T> {
    /// 新しい`DbCommand`を返す。
    ///
    /// # Arguments
    /// * `repository` - バックエンドと通信するためのリポジトリ
    /// * `config` - 設定
    pub fn new(repository: &'a T, config: &'a Config) -> Self {
        Self { repository, config }
    }

    /// `db`サブコマンドの処理を行う。
    ///
    /// 業務データベースを読み込んでから操作を適用し、結果と通知を表示する。
    pub async fn run<P: ConsolePresenter>(&self, db: DbArgs, presenter: &mut P) -> Result<()> {
        let editor = DayEditor::new(datetime::today(), &self.config.default_start);
        let mut session = DaySession::new(self.repository, editor, Vec::new());

        if !session.load_db_items().await {
            if let Some(notice) = session.notices().current() {
                presenter.show_notice(notice)?;
            }
            bail!("Failed to load db items");
        }
        info!("Loaded {} db items", session.db_items().len());

        let succeeded = match db.action {
            DbAction::List => {
                if session.db_items().is_empty() {
                    session.notices_mut().info("業務データベースは空です");
                }
                true
            }
            DbAction::Add { kind, value } => session.add_db_item(kind, &value).await.is_some(),
            DbAction::Delete { kind, value } => session.delete_db_item(kind, &value).await,
            DbAction::Import { write_back } => {
                let mode = if write_back {
                    ImportMode::WriteBack
                } else {
                    ImportMode::ViewOnly
                };
                session.import_db_items(mode).await.is_some()
            }
        };

        presenter.show_db_items(session.db_items())?;
        if let Some(notice) = session.notices().current() {
            presenter.show_notice(notice)?;
        }
        if !succeeded {
            bail!("Failed to update db items");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use mockall::predicate::eq;

    use super::{DbAction, DbArgs, DbCommand};
    use crate::api::{DbSource, MockTimeSliceRepository};
    use crate::config::Config;
    use crate::console::ConsoleMarkdownList;
    use crate::db_items::DbItems;
    use crate::field::FieldKind;

    fn stored_items() -> DbItems {
        let mut items = DbItems::default();
        items.add(FieldKind::Client, "A社").unwrap();
        items
    }

    async fn run(
        repository: &MockTimeSliceRepository,
        action: DbAction,
    ) -> (anyhow::Result<()>, String) {
        let config = Config::default();
        let command = DbCommand::new(repository, &config);
        let mut writer = Vec::new();
        let mut presenter = ConsoleMarkdownList::new(&mut writer);
        let result = command.run(DbArgs { action }, &mut presenter).await;
        (result, String::from_utf8(writer).unwrap())
    }

    #[tokio::test]
    async fn test_list() {
        let mut repository = MockTimeSliceRepository::new();
        repository
            .expect_read_db_items()
            .with(eq(DbSource::Store))
            .times(1)
            .returning(|_| Ok(stored_items()));

        let (result, output) = run(&repository, DbAction::List).await;

        assert!(result.is_ok());
        assert_eq!(output, "## クライアント (client)\n- A社\n");
    }

    #[tokio::test]
    async fn test_list_failure() {
        let mut repository = MockTimeSliceRepository::new();
        repository
            .expect_read_db_items()
            .returning(|_| Err(anyhow!("connection refused")));

        let (result, output) = run(&repository, DbAction::List).await;

        assert!(result.is_err());
        assert!(output.starts_with("[error]"));
    }

    #[tokio::test]
    async fn test_add() {
        let mut repository = MockTimeSliceRepository::new();
        repository
            .expect_read_db_items()
            .returning(|_| Ok(stored_items()));
        repository
            .expect_save_db_items()
            .withf(|items| items.len() == 2 && items.contains(FieldKind::Client, "B社"))
            .times(1)
            .returning(|_| Ok(()));

        let (result, output) = run(
            &repository,
            DbAction::Add {
                kind: FieldKind::Client,
                value: "B社".to_string(),
            },
        )
        .await;

        assert!(result.is_ok());
        assert!(output.contains("- B社\n"));
    }

    #[tokio::test]
    async fn test_add_blank_fails() {
        let mut repository = MockTimeSliceRepository::new();
        repository
            .expect_read_db_items()
            .returning(|_| Ok(stored_items()));
        repository.expect_save_db_items().times(0);

        let (result, output) = run(
            &repository,
            DbAction::Add {
                kind: FieldKind::Client,
                value: "  ".to_string(),
            },
        )
        .await;

        assert!(result.is_err());
        assert!(output.contains("[warning]"));
    }

    #[tokio::test]
    async fn test_delete_missing_item_fails() {
        let mut repository = MockTimeSliceRepository::new();
        repository
            .expect_read_db_items()
            .returning(|_| Ok(stored_items()));
        repository.expect_save_db_items().times(0);

        let (result, output) = run(
            &repository,
            DbAction::Delete {
                kind: FieldKind::Client,
                value: "Z社".to_string(),
            },
        )
        .await;

        assert!(result.is_err());
        assert!(output.contains("[info]"));
    }

    #[tokio::test]
    async fn test_import_write_back() {
        let mut repository = MockTimeSliceRepository::new();
        repository
            .expect_read_db_items()
            .with(eq(DbSource::Store))
            .returning(|_| Ok(stored_items()));
        repository
            .expect_read_db_items()
            .with(eq(DbSource::Spreadsheet))
            .times(1)
            .returning(|_| {
                let mut items = DbItems::default();
                items.add(FieldKind::Purpose, "採用").unwrap();
                Ok(items)
            });
        repository
            .expect_save_db_items()
            .times(1)
            .returning(|_| Ok(()));

        let (result, output) = run(&repository, DbAction::Import { write_back: true }).await;

        assert!(result.is_ok());
        assert!(output.contains("## 目的 (purpose)\n- 採用\n"));
        assert!(output.contains("[success]"));
    }
}
