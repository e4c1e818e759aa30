pub mod archive;
pub mod catalog;
pub mod config;
pub mod crawler;
pub mod dependency_graph;
pub mod events;
pub mod listing;
pub mod mirror;
pub mod search;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use crawler::{CrawlContext, CrawlError, CrawlRunner, RunReport};
pub use events::{
    ChannelSubscriber, CrawlEvent, EventEnvelope, EventHub, EventSubscriber, LogSubscriber,
    SweepMode,
};
