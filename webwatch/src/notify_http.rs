//! HTTP notifier: posts rendered reports to the mail function endpoint or
//! to the pooled holding sink.

use async_trait::async_trait;

use webwatch_core::error::NotifyError;
use webwatch_core::notify::{Notifier, Report};

use crate::load_config::NotifySection;

pub struct HttpNotifier {
    http: reqwest::Client,
    deliver_url: String,
    pool_url: String,
}

impl HttpNotifier {
    pub fn new(notify: &NotifySection) -> Self {
        HttpNotifier {
            http: reqwest::Client::new(),
            deliver_url: notify.deliver_url.clone(),
            pool_url: notify.pool_url.clone(),
        }
    }

    async fn post_report(&self, url: &str, report: &Report) -> Result<(), NotifyError> {
        tracing::info!(url, to = %report.to, subject = %report.subject, "Posting report");
        let response = self
            .http
            .post(url)
            .json(report)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, url, "Report request failed");
                NotifyError::new(format!("report request failed: {e}"))
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, url, body = %body, "Report endpoint returned error");
            return Err(NotifyError::with_status(
                format!("report endpoint rejected the request: {body}"),
                status.as_u16(),
            ));
        }
        tracing::info!(url, "Report accepted");
        Ok(())
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn deliver(&self, report: &Report) -> Result<(), NotifyError> {
        self.post_report(&self.deliver_url, report).await
    }

    async fn pool(&self, report: &Report) -> Result<(), NotifyError> {
        self.post_report(&self.pool_url, report).await
    }
}
