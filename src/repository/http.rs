use super::{Candidate, RemoteRepository, RepositoryConfig, RepositoryError, RepositoryResult};
use crate::core::Record;
use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::debug;

/// JSON-over-HTTP repository.
///
/// `fetch` is a GET returning an array of objects; `update` and
/// `bulk_update` POST the candidate (or an array of candidates). Any
/// non-2xx status is an error carrying the response body, or the status
/// text when the body is empty.
#[derive(Clone)]
pub struct HttpRepository {
    client: Client,
    config: RepositoryConfig,
}

impl HttpRepository {
    pub fn new(config: RepositoryConfig) -> RepositoryResult<Self> {
        config
            .validate()
            .map_err(|e| RepositoryError::Transport(e.to_string()))?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RepositoryError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    async fn check_status(response: Response) -> RepositoryResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let reason = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("unknown status").to_string()
        } else {
            body.trim().to_string()
        };
        Err(RepositoryError::Status {
            code: status.as_u16(),
            reason,
        })
    }

    async fn post<T: serde::Serialize + Sync + ?Sized>(&self, url: &str, body: &T) -> RepositoryResult<()> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        Self::check_status(response).await?;
        Ok(())
    }
}

fn transport(err: reqwest::Error) -> RepositoryError {
    RepositoryError::Transport(err.to_string())
}

#[async_trait]
impl RemoteRepository for HttpRepository {
    async fn fetch(&self) -> RepositoryResult<Vec<Record>> {
        debug!(url = %self.config.fetch_url, "fetching rows");
        let response = self
            .client
            .get(&self.config.fetch_url)
            .send()
            .await
            .map_err(transport)?;
        let response = Self::check_status(response).await?;

        response.json::<Vec<Record>>().await.map_err(|e| {
            if e.is_decode() {
                RepositoryError::Decode(e.to_string())
            } else {
                transport(e)
            }
        })
    }

    async fn update(&self, candidate: &Candidate) -> RepositoryResult<()> {
        debug!(url = %self.config.update_url, row = %candidate.row, "posting update");
        self.post(&self.config.update_url, candidate).await
    }

    async fn bulk_update(&self, candidates: &[Candidate]) -> RepositoryResult<()> {
        debug!(
            url = %self.config.bulk_update_url,
            rows = candidates.len(),
            "posting bulk update"
        );
        self.post(&self.config.bulk_update_url, candidates).await
    }
}
