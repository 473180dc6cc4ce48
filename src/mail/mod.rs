//! Mail event source: the boundary between the mail provider and the relay.

pub mod imap;
pub mod listener;

pub use imap::ImapSource;
pub use listener::InboxListener;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MailError;

/// One extracted mail item, in the shape the automation worker consumes.
///
/// `received_utc` is ISO-8601 with a `Z` suffix. `entry_id` is the source
/// system's identifier for the message (the Message-ID header when present)
/// and is treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailEvent {
    pub subject: String,
    pub sender_address: String,
    pub received_utc: String,
    pub body: String,
    pub entry_id: String,
}

/// A source of newly arrived mail items.
///
/// Implementations own the provider protocol; the listener only sees batches
/// of already-extracted events.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Source name for logging.
    fn name(&self) -> &str;

    /// Fetch items that arrived since the previous call.
    ///
    /// Items returned once must not be returned again (the IMAP source marks
    /// them `\Seen`). Extraction failures for individual items are logged by
    /// the source and skipped, never surfaced as an error for the batch.
    async fn fetch_new(&self) -> Result<Vec<MailEvent>, MailError>;
}

/// Subscriber notified of each matching inbox item.
///
/// Invoked by the listener loop; implementations must not assume a
/// particular task identity and should tolerate concurrent entry.
#[async_trait]
pub trait InboxObserver: Send + Sync {
    async fn on_item_added(&self, event: MailEvent);
}
