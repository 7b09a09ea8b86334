use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::AUTOMATION_BASE;
use crate::config::NotifyConfig;
use crate::types::{AutomationTrigger, ChatMessage, Notification};

/// Delivers notifications. Delivery is best-effort: implementations log
/// failures and never report them to the caller.
#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn notify(&self, notification: &Notification);
}

/// Posts to the chat webhook and the automation trigger.
pub struct WebhookNotifier {
    client: reqwest::Client,
    chat: ChatSink,
    automation: AutomationSink,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, config: &NotifyConfig) -> Self {
        Self::with_automation_base(client, config, AUTOMATION_BASE)
    }

    /// Like [`WebhookNotifier::new`], with triggers posted under `base_url`.
    pub fn with_automation_base(
        client: reqwest::Client,
        config: &NotifyConfig,
        base_url: &str,
    ) -> Self {
        let chat = ChatSink {
            webhook_url: config.chat_webhook_url().map(str::to_string),
        };
        let automation = AutomationSink {
            base_url: base_url.to_string(),
            key: config.automation_key().map(str::to_string),
        };
        if chat.webhook_url.is_none() {
            info!("Chat webhook not configured; chat notifications disabled");
        }
        if automation.key.is_none() {
            info!("Automation key not configured; automation triggers disabled");
        }
        Self {
            client,
            chat,
            automation,
        }
    }
}

impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) {
        self.chat.send(&self.client, &notification.chat).await;
        self.automation.send(&self.client, &notification.trigger).await;
    }
}

/// Chat incoming webhook.
pub struct ChatSink {
    webhook_url: Option<String>,
}

impl ChatSink {
    pub async fn send(&self, client: &reqwest::Client, message: &ChatMessage) {
        let Some(url) = &self.webhook_url else {
            debug!("Chat webhook not configured, dropping {:?}", message.pretext);
            return;
        };
        if let Err(e) = post_json(client, url, message).await {
            info!("Failed to write to chat: {e:#}");
        }
    }
}

/// Automation trigger endpoint, one URL per event name.
pub struct AutomationSink {
    base_url: String,
    key: Option<String>,
}

impl AutomationSink {
    pub async fn send(&self, client: &reqwest::Client, trigger: &AutomationTrigger) {
        let Some(key) = &self.key else {
            debug!("Automation not configured, dropping {}", trigger.event);
            return;
        };
        let url = match trigger_url(&self.base_url, trigger.event, key) {
            Ok(url) => url,
            Err(e) => {
                info!("Failed to notify automation ({}): {e:#}", trigger.event);
                return;
            }
        };
        if let Err(e) = post_json(client, url.as_str(), &trigger.payload()).await {
            info!("Failed to notify automation ({}): {e:#}", trigger.event);
        }
    }
}

/// `<base>/trigger/<event>/with/key/<key>`
pub fn trigger_url(base_url: &str, event: &str, key: &str) -> Result<Url> {
    let mut url = Url::parse(base_url).with_context(|| format!("invalid base URL {base_url}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("base URL {base_url} cannot carry a path"))?
        .pop_if_empty()
        .extend(["trigger", event, "with", "key", key]);
    Ok(url)
}

async fn post_json<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    body: &T,
) -> Result<()> {
    let resp = client
        .post(url)
        .header(reqwest::header::ACCEPT, "text/plain")
        .json(body)
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        bail!("webhook returned {status}");
    }
    Ok(())
}
