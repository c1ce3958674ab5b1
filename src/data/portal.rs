use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Source of decoded portal pages.
#[allow(async_fn_in_trait)]
pub trait Portal {
    async fn fetch_html(&self, url: &str, timeout: Duration) -> Result<String>;
}

pub struct HttpPortal {
    client: Client,
}

impl HttpPortal {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| PipelineError::fetch("<client>", e))?;

        Ok(Self { client })
    }
}

impl Portal for HttpPortal {
    /// GET `url`; transport errors, timeouts and non-2xx statuses are `Fetch` errors.
    async fn fetch_html(&self, url: &str, timeout: Duration) -> Result<String> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::fetch(url, e))?;

        response.text().await.map_err(|e| PipelineError::fetch(url, e))
    }
}
