use super::event::NotificationEvent;
use super::sinks::{ClipboardSink, ConsoleSink, NotificationSink, SoundSink, WebhookSink};
use crate::core::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    Delivered,
    Skipped,
    Failed(String),
}

/// Per-sink outcome of one dispatch, in sink order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchResult {
    pub outcomes: Vec<(&'static str, SinkOutcome)>,
}

impl DispatchResult {
    pub fn outcome(&self, sink: &str) -> Option<&SinkOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| *name == sink)
            .map(|(_, outcome)| outcome)
    }

    pub fn delivered_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == SinkOutcome::Delivered)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.outcomes.iter().filter_map(|(name, outcome)| match outcome {
            SinkOutcome::Failed(reason) => Some((*name, reason.as_str())),
            _ => None,
        })
    }

    pub fn all_delivered(&self) -> bool {
        !self
            .outcomes
            .iter()
            .any(|(_, outcome)| matches!(outcome, SinkOutcome::Failed(_)))
    }
}

/// Fans an event out to every sink. A failing sink never stops the others.
pub struct NotificationDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl NotificationDispatcher {
    pub fn new(sinks: Vec<Box<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    /// Webhook, clipboard, console, then sound.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let webhook = WebhookSink::new(config.webhook_url())?;
        if config.webhook_url().is_none() {
            tracing::warn!("⚠️  No webhook_url configured, webhook notifications disabled");
        }

        Ok(Self::new(vec![
            Box::new(webhook),
            Box::new(ClipboardSink::new(config.notifications.clipboard_enabled)),
            Box::new(ConsoleSink::stdout()),
            Box::new(SoundSink::new(config.notifications.sound_command.as_deref())),
        ]))
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|sink| sink.name()).collect()
    }

    pub async fn dispatch(&self, event: &NotificationEvent) -> DispatchResult {
        let mut result = DispatchResult::default();

        for sink in &self.sinks {
            let name = sink.name();

            if !sink.enabled() {
                result.outcomes.push((name, SinkOutcome::Skipped));
                continue;
            }

            let outcome = match sink.deliver(event).await {
                Ok(()) => SinkOutcome::Delivered,
                Err(e) => {
                    tracing::warn!(
                        "⚠️  {} notification failed for {} ({}): {}",
                        name,
                        event.item_slug,
                        event.listing_id,
                        e
                    );
                    SinkOutcome::Failed(e.to_string())
                }
            };
            result.outcomes.push((name, outcome));
        }

        result
    }
}
