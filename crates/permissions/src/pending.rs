//! Registry of permissions requests awaiting a user decision.
//!
//! Every entry owns the sending half of a oneshot channel; the requesting caller awaits the
//! receiving half. Removing an entry from the registry is the only way to get hold of its sender,
//! so each request is resolved at most once.

use crate::{
    error::{PermissionsError, Result},
    events::ApprovalUi,
    types::{DomainMetadata, Origin, Permission, PermissionsRequest, RequestId, RequestedPermissions},
};
use futures::channel::oneshot;
use parking_lot::Mutex;
use std::{collections::HashMap, fmt, sync::Arc};

/// Outcome delivered to the caller waiting on a request.
pub type ApprovalResult = Result<Vec<Permission>>;

/// The caller's half of a pending request.
pub type ApprovalReceiver = oneshot::Receiver<ApprovalResult>;

struct Entry {
    request: PermissionsRequest,
    sender: oneshot::Sender<ApprovalResult>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<RequestId, Entry>,
    /// At most one request per origin.
    by_origin: HashMap<Origin, RequestId>,
}

impl Inner {
    fn remove(&mut self, id: &RequestId) -> Option<Entry> {
        let entry = self.entries.remove(id)?;
        self.by_origin.remove(&entry.request.origin);
        Some(entry)
    }
}

/// A request removed from the registry, not yet answered.
///
/// Dropping it without resolving closes the caller's channel.
pub struct PendingApproval {
    request: PermissionsRequest,
    sender: oneshot::Sender<ApprovalResult>,
}

impl PendingApproval {
    pub fn request(&self) -> &PermissionsRequest {
        &self.request
    }

    pub fn id(&self) -> RequestId {
        self.request.id
    }

    pub fn origin(&self) -> &Origin {
        &self.request.origin
    }

    /// Delivers `result` to the waiting caller.
    ///
    /// Returns `false` if the caller stopped waiting.
    pub fn resolve(self, result: ApprovalResult) -> bool {
        let id = self.request.id;
        let delivered = self.sender.send(result).is_ok();
        if !delivered {
            debug!(target: "permissions::pending", %id, "caller stopped waiting for approval");
        }
        delivered
    }

    pub fn approve(self, permissions: Vec<Permission>) -> bool {
        self.resolve(Ok(permissions))
    }

    pub fn reject(self, reason: PermissionsError) -> bool {
        self.resolve(Err(reason))
    }
}

impl fmt::Debug for PendingApproval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingApproval").field("request", &self.request).finish_non_exhaustive()
    }
}

/// In-flight permissions requests, keyed by request id.
#[derive(Clone)]
pub struct PendingApprovals {
    inner: Arc<Mutex<Inner>>,
    ui: Arc<dyn ApprovalUi>,
}

impl fmt::Debug for PendingApprovals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingApprovals").field("len", &self.len()).finish_non_exhaustive()
    }
}

impl PendingApprovals {
    pub fn new(ui: Arc<dyn ApprovalUi>) -> Self {
        Self { inner: Default::default(), ui }
    }

    /// Registers a new request for `origin` and notifies the approval UI.
    ///
    /// Fails with [`PermissionsError::RequestAlreadyPending`] if the origin already has a request
    /// in flight, leaving that request untouched.
    pub fn create(
        &self,
        origin: Origin,
        permissions: RequestedPermissions,
        metadata: Option<DomainMetadata>,
    ) -> Result<(RequestId, ApprovalReceiver)> {
        let (sender, receiver) = oneshot::channel();
        let request = {
            let mut inner = self.inner.lock();
            if let Some(existing) = inner.by_origin.get(&origin) {
                debug!(target: "permissions::pending", %origin, %existing, "request already pending");
                return Err(PermissionsError::RequestAlreadyPending(origin));
            }
            let id = RequestId::random();
            let request = PermissionsRequest { id, origin: origin.clone(), permissions, metadata };
            inner.by_origin.insert(origin, id);
            inner.entries.insert(id, Entry { request: request.clone(), sender });
            request
        };
        debug!(target: "permissions::pending", id = %request.id, origin = %request.origin, "created permissions request");

        self.ui.on_permissions_request(&request);
        Ok((request.id, receiver))
    }

    /// Removes the request so the caller can resolve it.
    pub fn take(&self, id: RequestId) -> Result<PendingApproval> {
        let entry = self.inner.lock().remove(&id).ok_or(PermissionsError::NoSuchPendingApproval(id))?;
        Ok(PendingApproval { request: entry.request, sender: entry.sender })
    }

    /// Removes the request and resolves its caller with `permissions`.
    pub fn approve(&self, id: RequestId, permissions: Vec<Permission>) -> Result<()> {
        let pending = self.take(id)?;
        debug!(target: "permissions::pending", %id, origin = %pending.origin(), "approved permissions request");
        pending.approve(permissions);
        Ok(())
    }

    /// Removes the request and fails its caller with `reason`, a user rejection by default.
    pub fn reject(&self, id: RequestId, reason: Option<PermissionsError>) -> Result<()> {
        let pending = self.take(id)?;
        debug!(target: "permissions::pending", %id, origin = %pending.origin(), "rejected permissions request");
        pending.reject(reason.unwrap_or_else(PermissionsError::user_rejected));
        Ok(())
    }

    /// Rejects the origin's pending request, if any, and returns its id.
    pub fn reject_origin(&self, origin: &Origin, reason: Option<PermissionsError>) -> Option<RequestId> {
        let id = self.id_for_origin(origin)?;
        self.reject(id, reason).ok().map(|_| id)
    }

    pub fn keys(&self) -> Vec<RequestId> {
        self.inner.lock().entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &RequestId) -> Option<PermissionsRequest> {
        self.inner.lock().entries.get(id).map(|entry| entry.request.clone())
    }

    /// All pending requests.
    pub fn requests(&self) -> Vec<PermissionsRequest> {
        self.inner.lock().entries.values().map(|entry| entry.request.clone()).collect()
    }

    pub fn id_for_origin(&self, origin: &Origin) -> Option<RequestId> {
        self.inner.lock().by_origin.get(origin).copied()
    }
}
