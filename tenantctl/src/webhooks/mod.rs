//! Webhook notification system for account events.
//!
//! - [`signing`]: HMAC-SHA256 signature generation per Standard Webhooks spec
//! - [`events`]: Event types and the payload envelope
//! - [`publisher`]: Writes delivery rows in the caller's transaction
//! - [`dispatcher`]: Claim/sign/send/result loop driven by the background worker

pub mod dispatcher;
pub mod events;
pub mod publisher;
pub mod signing;

pub use dispatcher::WebhookDispatcher;
pub use events::{WebhookEvent, WebhookEventType};
pub use publisher::publish_event;
pub use signing::{generate_secret, sign_payload};
