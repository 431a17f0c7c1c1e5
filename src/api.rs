use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info};
#[cfg(test)]
use mockall::automock;
use reqwest::{header::CONTENT_TYPE, Client, Response};
use serde::Deserialize;

use crate::db_items::{DbItems, DbItemsPayload};
use crate::time_entry::EntryRecord;

/// 業務データベースの取得元。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbSource {
    /// 通常の保存先
    Store,
    /// インポート用のスプレッドシート
    Spreadsheet,
}

/// 1日分の保存に成功した時のサーバーからの応答。
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SaveReceipt {
    pub updated_at: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// エラー時のレスポンスをデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// タイムスライスのバックエンドと通信するためのtrait。
///
/// 保存は常に集合全体の置き換えで、部分更新は行わない。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TimeSliceRepository: Send + Sync {
    /// 指定された日付のタイムスライスを取得する。データがない場合は空を返す。
    async fn read_time_entries(&self, date: &NaiveDate) -> Result<Vec<EntryRecord>>;

    /// 指定された日付のタイムスライスを全て置き換える。
    async fn save_time_entries(
        &self,
        date: &NaiveDate,
        entries: &[EntryRecord],
    ) -> Result<SaveReceipt>;

    /// 業務データベースを取得する。
    async fn read_db_items(&self, source: DbSource) -> Result<DbItems>;

    /// 業務データベースを全て置き換える。
    async fn save_db_items(&self, items: &DbItems) -> Result<()>;
}

/// HTTPでバックエンドと通信するクライアント。
///
/// # Examples
///
/// ```
/// let repository = HttpRepository::new("http://localhost:8080", 30).unwrap();
/// let entries = repository.read_time_entries(&date).await.unwrap();
/// ```
pub struct HttpRepository {
    client: Client,
    api_url: String,
}

impl HttpRepository {
    /// 新しい`HttpRepository`を返す。
    ///
    /// # Arguments
    ///
    /// * `api_url` - バックエンドのベースURL
    /// * `timeout_secs` - 1リクエストあたりのタイムアウト(秒)
    pub fn new(api_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn time_entries_url(&self, date: &NaiveDate) -> String {
        format!("{}/api/time-entries/{}", self.api_url, date.format("%Y-%m-%d"))
    }

    fn db_items_url(&self) -> String {
        format!("{}/api/db-items", self.api_url)
    }
}

/// ステータスが成功でない場合に、サーバーのエラーメッセージを含むエラーを返す。
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|body| body.error)
        .unwrap_or(body);
    bail!("Request returned an error status {}: {}", status, message)
}

#[async_trait]
impl TimeSliceRepository for HttpRepository {
    async fn read_time_entries(&self, date: &NaiveDate) -> Result<Vec<EntryRecord>> {
        let url = self.time_entries_url(date);
        let response = self
            .client
            .get(&url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        let entries = ensure_success(response)
            .await?
            .json::<Option<Vec<EntryRecord>>>()
            .await
            .context("Failed to deserialize time entries")?
            .unwrap_or_default();
        info!("Read {} time entries for {}", entries.len(), date);

        Ok(entries)
    }

    async fn save_time_entries(
        &self,
        date: &NaiveDate,
        entries: &[EntryRecord],
    ) -> Result<SaveReceipt> {
        let url = self.time_entries_url(date);
        let response = self
            .client
            .post(&url)
            .json(entries)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        let receipt = ensure_success(response)
            .await?
            .json::<SaveReceipt>()
            .await
            .context("Failed to deserialize save response")?;
        info!("Saved {} time entries for {}", entries.len(), date);

        Ok(receipt)
    }

    async fn read_db_items(&self, source: DbSource) -> Result<DbItems> {
        let url = self.db_items_url();
        let mut request = self.client.get(&url).header(CONTENT_TYPE, "application/json");
        if source == DbSource::Spreadsheet {
            request = request.query(&[("source", "spreadsheet")]);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        let items = ensure_success(response)
            .await?
            .json::<DbItemsPayload>()
            .await
            .context("Failed to deserialize db items")?
            .normalize()?;
        debug!("Read {} db items from {:?}", items.len(), source);

        Ok(items)
    }

    async fn save_db_items(&self, items: &DbItems) -> Result<()> {
        let url = self.db_items_url();
        let response = self
            .client
            .post(&url)
            .json(&items.to_records())
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        let body = ensure_success(response)
            .await?
            .text()
            .await
            .context("Failed to read db items response")?;
        // 成功ステータスでもエラーを返すことがある
        if let Ok(ErrorBody { error }) = serde_json::from_str::<ErrorBody>(&body) {
            bail!("Server reported an error: {}", error);
        }
        info!("Saved {} db items", items.len());

        Ok(())
    }
}
