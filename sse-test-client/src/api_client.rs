use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub fn stream_url(&self, thread_id: &str) -> String {
        format!("{}/threads/{}/stream", self.base_url, thread_id)
    }

    pub async fn post_event(&self, thread_id: &str, payload: &str) -> Result<()> {
        let url = format!("{}/threads/{}/events", self.base_url, thread_id);

        let response = self
            .client
            .post(&url)
            .body(payload.to_string())
            .send()
            .await
            .context("Failed to post event")?;

        if response.status() != StatusCode::ACCEPTED {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            anyhow::bail!("Failed to post event: {} - Response: {}", status, body);
        }

        Ok(())
    }

    pub async fn close_thread(&self, thread_id: &str) -> Result<()> {
        let url = format!("{}/threads/{}", self.base_url, thread_id);

        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .context("Failed to close thread")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to close thread: {}", response.status());
        }

        Ok(())
    }
}
