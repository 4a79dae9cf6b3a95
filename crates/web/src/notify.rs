use engine::{EngineEvent, Notifier};

/// Posts every engine event as JSON to a webhook.
///
/// Delivery runs on its own task so the request that produced the event never
/// waits on it; failures are logged and dropped.
#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, event: EngineEvent) {
        let client = self.client.clone();
        let url = self.url.clone();

        tokio::spawn(async move {
            match client.post(&url).json(&event).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(?event, "notification delivered");
                }
                Ok(response) => {
                    tracing::warn!(
                        status = %response.status(),
                        ?event,
                        "webhook rejected notification"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, ?event, "webhook delivery failed");
                }
            }
        });
    }
}
