//! Calendar Port: the operations the reconciler needs from a remote calendar.

use std::future::Future;

use crate::error::PortError;
use crate::event::Event;

/// An event as it currently exists on the remote.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    pub uid: String,
    /// Location of the resource on the server
    pub href: String,
    pub etag: Option<String>,
    pub event: Event,
}

/// Remote calendar keyed by event uid.
///
/// Futures are `Send` so calendars can be synced on separate tasks.
pub trait CalendarPort: Send + Sync {
    fn find(&self, uid: &str)
    -> impl Future<Output = Result<Option<RemoteRecord>, PortError>> + Send;

    fn create(&self, uid: &str, event: &Event) -> impl Future<Output = Result<(), PortError>> + Send;

    /// Replace `record` with the complete desired `event`.
    fn update(
        &self,
        record: &RemoteRecord,
        event: &Event,
    ) -> impl Future<Output = Result<(), PortError>> + Send;

    fn delete(&self, record: &RemoteRecord) -> impl Future<Output = Result<(), PortError>> + Send;
}
