pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::{Clock, TokioClock};
pub use config::{Config, MarketConfig, MonitoringConfig, NotificationConfig};
pub use error::{ConfigError, FetchError, SinkError};
