//! SimpleFX brokerage integration: REST client, token lifecycle and quote stream

pub mod auth;
pub mod client;
pub mod feed;
pub mod messages;

pub use auth::{AuthConfig, TokenManager};
pub use client::SimpleFxClient;
pub use feed::{FeedConfig, FeedState, FnObserver, QuoteFeed, QuoteObserver};
