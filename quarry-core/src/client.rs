use crate::prelude::*;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{error, info};
use url::Url;

use crate::calls::build_call_detail_path;
use crate::types::{
    value_text, DatasetList, GraphPayload, OptionsPayload, RowPage, SampleCall, SampleCallPage,
};

/// The explorer HTTP API. Queries are the canonical strings produced by
/// [`crate::query`] and [`crate::calls`], without the leading `?`.
#[async_trait]
pub trait ExplorerApi: Send + Sync {
    async fn list_datasets(&self) -> Result<DatasetList>;
    async fn fetch_options(&self, query: &str) -> Result<OptionsPayload>;
    async fn fetch_rows(&self, query: &str) -> Result<RowPage>;
    async fn fetch_graph(&self, query: &str) -> Result<GraphPayload>;
    async fn fetch_sample_calls(&self, query: &str) -> Result<SampleCallPage>;
    async fn fetch_call_detail(&self, id: &str) -> Result<SampleCall>;
}

pub struct HttpExplorerClient {
    http: reqwest::Client,
    base: Url,
}

impl HttpExplorerClient {
    pub fn try_new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim();
        if base_url.is_empty() {
            return Err(QuarryError::missing("api_url"));
        }
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str, query: Option<&str>) -> Result<Url> {
        let mut url = self.base.join(path.trim_start_matches('/'))?;
        url.set_query(query.filter(|query| !query.is_empty()));
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, action: &'static str, url: Url) -> Result<T> {
        info!("{action}: GET {url}");
        let response = self.http.get(url).send().await.map_err(|err| {
            error!("{action} failed: {err}");
            err
        })?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = error_message(action, status.as_u16(), &body);
            error!("{action} failed with {status}: {message}");
            return Err(ErrorKind::Http {
                action,
                status: status.as_u16(),
                message,
            }
            .into());
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ExplorerApi for HttpExplorerClient {
    async fn list_datasets(&self) -> Result<DatasetList> {
        let url = self.endpoint("api/datasets", None)?;
        self.get_json("Load datasets", url).await
    }

    async fn fetch_options(&self, query: &str) -> Result<OptionsPayload> {
        let url = self.endpoint("api/options", Some(query))?;
        self.get_json("Load options", url).await
    }

    async fn fetch_rows(&self, query: &str) -> Result<RowPage> {
        let url = self.endpoint("api/rows", Some(query))?;
        self.get_json("Load rows", url).await
    }

    async fn fetch_graph(&self, query: &str) -> Result<GraphPayload> {
        let url = self.endpoint("api/graph", Some(query))?;
        self.get_json("Load graph", url).await
    }

    async fn fetch_sample_calls(&self, query: &str) -> Result<SampleCallPage> {
        let url = self.endpoint("api/sample-calls", Some(query))?;
        self.get_json("Load sample calls", url).await
    }

    async fn fetch_call_detail(&self, id: &str) -> Result<SampleCall> {
        let path = build_call_detail_path(id)?;
        let url = self.endpoint(&path, None)?;
        self.get_json("Load call detail", url).await
    }
}

/// User-facing text for a non-2xx response: a JSON `detail` field, else the
/// trimmed body, else `"<action> failed: <status>"`.
pub fn error_message(action: &str, status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!("{action} failed: {status}");
    }
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(body) {
        if let Some(detail) = object
            .get("detail")
            .map(value_text)
            .filter(|detail| !detail.trim().is_empty())
        {
            return detail;
        }
    }
    body.to_string()
}
