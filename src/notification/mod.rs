pub mod dispatcher;
pub mod event;
pub mod sinks;

pub use dispatcher::{DispatchResult, NotificationDispatcher, SinkOutcome};
pub use event::NotificationEvent;
pub use sinks::{ClipboardSink, ConsoleSink, NotificationSink, SoundSink, WebhookSink};
