use super::{Announcement, Announcer};
use crate::error::PublishError;
use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::json;
use std::time::Duration;

const WEBHOOK_TIMEOUT_SECONDS: u64 = 30;

/// IFTTT Maker webhook: `value1` carries the text, `value2` the image URL.
pub struct IftttAnnouncer {
    client: reqwest::Client,
    endpoint: String,
}

impl IftttAnnouncer {
    pub fn new(event: &str, key: &str) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| PublishError::Webhook(e.to_string()))?;
        Ok(Self::with_client(
            client,
            format!("https://maker.ifttt.com/trigger/{}/with/key/{}", event, key),
        ))
    }

    fn with_client(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

pub fn payload(announcement: &Announcement) -> serde_json::Value {
    json!({
        "value1": announcement.body,
        "value2": announcement.image_url,
    })
}

#[async_trait]
impl Announcer for IftttAnnouncer {
    async fn announce(&self, announcement: &Announcement) -> Result<(), PublishError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload(announcement))
            .send()
            .await
            // Never echo the endpoint: the key is part of the URL
            .map_err(|e| PublishError::Webhook(e.without_url().to_string()))?;

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                debug!("Could not read IFTTT response body: {}", e.without_url());
                String::new()
            }
        };
        let excerpt: String = text.chars().take(200).collect();
        info!("IFTTT status: {} {}", status.as_u16(), excerpt);

        if !status.is_success() {
            return Err(PublishError::Webhook(format!("status {}", status.as_u16())));
        }
        Ok(())
    }
}

// Used when IFTTT_KEY / IFTTT_EVENT are not configured
pub struct SkippedAnnouncer;

#[async_trait]
impl Announcer for SkippedAnnouncer {
    async fn announce(&self, _announcement: &Announcement) -> Result<(), PublishError> {
        warn!("IFTTT_KEY/IFTTT_EVENT not set; skipping webhook");
        Ok(())
    }
}
