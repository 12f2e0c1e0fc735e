//! Outbound notifications: approval prompts and usage metrics.

use crate::types::{Origin, PermissionsRequest};
use auto_impl::auto_impl;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The user-facing side of the approval flow.
///
/// Called once per new pending request, after the request is registered. Implementations must not
/// block; the decision is delivered later through the controller's approve/reject operations.
#[auto_impl(&, Box, Arc)]
pub trait ApprovalUi: Send + Sync {
    fn on_permissions_request(&self, request: &PermissionsRequest);
}

/// An [`ApprovalUi`] that fans new requests out to channel subscribers.
#[derive(Clone, Debug, Default)]
pub struct ApprovalNotifications {
    listeners: Arc<Mutex<Vec<UnboundedSender<PermissionsRequest>>>>,
}

impl ApprovalNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a stream of every request created from now on.
    pub fn subscribe(&self) -> UnboundedReceiver<PermissionsRequest> {
        let (tx, rx) = unbounded();
        self.listeners.lock().push(tx);
        rx
    }

    /// Number of live subscribers.
    pub fn listeners(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl ApprovalUi for ApprovalNotifications {
    fn on_permissions_request(&self, request: &PermissionsRequest) {
        let mut listeners = self.listeners.lock();
        // drop listeners whose receiver is gone
        listeners.retain(|listener| listener.unbounded_send(request.clone()).is_ok());
        trace!(target: "permissions::events", id = %request.id, listeners = listeners.len(), "notified approval listeners");
    }
}

/// Usage of an injected provider property, as reported by the page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Web3UsageEvent {
    pub action: String,
    pub name: String,
}

#[auto_impl(&, Box, Arc)]
pub trait MetricsHook: Send + Sync {
    fn track(&self, origin: &Origin, event: &Web3UsageEvent);
}

/// Discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl MetricsHook for NoopMetrics {
    fn track(&self, _origin: &Origin, _event: &Web3UsageEvent) {}
}
