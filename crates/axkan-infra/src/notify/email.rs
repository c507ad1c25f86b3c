//! Email notifier over an HTTP email API (Resend-compatible JSON body).
//!
//! Without an admin address the alert is logged and skipped.

use std::time::Duration;

use axkan_core::channel::health::{CredentialAlert, Notifier};
use axkan_types::config::NotifyConfig;
use axkan_types::error::ProviderError;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::error;

use crate::http::{build_client, check_status, transport_error};

pub struct EmailNotifier {
    client: reqwest::Client,
    endpoint: String,
    from: String,
    admin_email: Option<String>,
    api_key: Option<SecretString>,
}

impl EmailNotifier {
    pub fn new(config: &NotifyConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout).map_err(transport_error)?,
            endpoint: config.endpoint.clone(),
            from: config.from.clone(),
            admin_email: config.admin_email.clone().filter(|e| !e.trim().is_empty()),
            api_key: config.api_key.clone(),
        })
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// HTML body: a status table followed by the remediation steps.
pub fn render_html(alert: &CredentialAlert) -> String {
    let cell = "padding:8px;border:1px solid #ddd";
    let detail = if alert.detail.is_empty() { "N/A" } else { alert.detail.as_str() };
    let steps: String = alert
        .remediation()
        .iter()
        .map(|s| format!("<li>{}</li>", escape_html(s)))
        .collect();

    format!(
        r##"<div style="font-family:sans-serif;max-width:600px;margin:0 auto;padding:20px">
  <h2 style="color:#e52421">{title}</h2>
  <p>The Axkan WhatsApp assistant <strong>stopped responding</strong> because the {credential} credential was rejected.</p>
  <table style="border-collapse:collapse;width:100%;margin:16px 0">
    <tr><td style="{cell};font-weight:bold">HTTP Status</td><td style="{cell}">{status}</td></tr>
    <tr><td style="{cell};font-weight:bold">Error</td><td style="{cell};font-size:13px;word-break:break-all">{detail}</td></tr>
    <tr><td style="{cell};font-weight:bold">Time (UTC)</td><td style="{cell}">{time}</td></tr>
  </table>
  <h3>How to fix:</h3>
  <ol>{steps}</ol>
  <p style="color:#888;font-size:12px">This alert is sent at most once per cooldown window.</p>
</div>"##,
        title = escape_html(&alert.subject()),
        credential = escape_html(&alert.credential),
        status = alert.status,
        detail = escape_html(detail),
        time = alert.at.to_rfc3339(),
    )
}

impl Notifier for EmailNotifier {
    async fn notify(&self, alert: &CredentialAlert) -> Result<(), ProviderError> {
        let Some(to) = &self.admin_email else {
            error!(credential = %alert.credential, "no ADMIN_EMAIL configured, cannot send credential alert");
            return Ok(());
        };
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(ProviderError::NotConfigured("EMAIL_API_KEY"))?;

        let body = json!({
            "from": self.from,
            "to": [to],
            "subject": alert.subject(),
            "html": render_html(alert),
            "text": alert.body_text(),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;
        Ok(())
    }
}
