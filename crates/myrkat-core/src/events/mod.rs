//! Event transport
//!
//! - [`EventBus`]: publish/subscribe and single-handler request/reply
//! - [`topics`]: well-known topic names and typed notification payloads

pub mod bus;
pub mod topics;

pub use bus::{
    handler_fn, subscriber_fn, BusError, EventBus, PublishReport, RequestHandler, Subscriber,
    SubscriptionId,
};
pub use topics::{
    Notification, SearchEntry, SearchOptions, SearchSnapshot, SelectAction, NOTE_EXPORT_PDF,
    NOTE_SELECTED, SEARCH, STORAGE_REQUEST,
};
