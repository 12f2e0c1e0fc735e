//! Shared domain types: origins, permissions, requests and domain metadata.

use crate::caveat::{Caveat, CaveatType};
use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, collections::BTreeMap, fmt};
use uuid::Uuid;

/// Identifier of the web context (site or connected application) issuing requests.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    pub fn new(origin: impl Into<String>) -> Self {
        Self(origin.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Origin {
    fn from(origin: &str) -> Self {
        Self::new(origin)
    }
}

impl From<String> for Origin {
    fn from(origin: String) -> Self {
        Self(origin)
    }
}

impl AsRef<str> for Origin {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Origin {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identifier of a pending permissions request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a new random id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for RequestId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// A capability granted to an origin.
///
/// Permissions are never mutated in place; a re-grant replaces the previous permission for the
/// same `parent_capability`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: Uuid,
    /// Name of the restricted method this permission unlocks.
    pub parent_capability: String,
    /// The origin holding the permission.
    pub invoker: Origin,
    /// Restrictions applied, in order, whenever the method is invoked.
    #[serde(default)]
    pub caveats: Vec<Caveat>,
    /// Grant time, in milliseconds since the unix epoch.
    pub date: i64,
}

impl Permission {
    /// Creates a fresh permission granted now.
    pub fn new(invoker: Origin, parent_capability: impl Into<String>, caveats: Vec<Caveat>) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_capability: parent_capability.into(),
            invoker,
            caveats,
            date: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Returns the first caveat of the given type.
    pub fn caveat(&self, kind: CaveatType) -> Option<&Caveat> {
        self.caveats.iter().find(|caveat| caveat.kind() == kind)
    }
}

/// The caveats an origin asks for (or the user approves) for a single method.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedPermission {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caveats: Vec<Caveat>,
}

/// Method name to requested caveats, e.g. `{ "eth_accounts": {} }`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestedPermissions(BTreeMap<String, RequestedPermission>);

impl RequestedPermissions {
    /// Requests a single method without caveats.
    pub fn single(method: impl Into<String>) -> Self {
        Self::default().with(method, RequestedPermission::default())
    }

    #[must_use]
    pub fn with(mut self, method: impl Into<String>, permission: RequestedPermission) -> Self {
        self.0.insert(method.into(), permission);
        self
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn contains(&self, method: &str) -> bool {
        self.0.contains_key(method)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl IntoIterator for RequestedPermissions {
    type Item = (String, RequestedPermission);
    type IntoIter = std::collections::btree_map::IntoIter<String, RequestedPermission>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, RequestedPermission)> for RequestedPermissions {
    fn from_iter<T: IntoIterator<Item = (String, RequestedPermission)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// An unresolved permissions request awaiting a user decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsRequest {
    pub id: RequestId,
    pub origin: Origin,
    pub permissions: RequestedPermissions,
    /// Metadata recorded for the origin at the time of the request, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DomainMetadata>,
}

/// The user's answer to a [`PermissionsRequest`].
///
/// The approved set does not have to match what was requested.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovedRequest {
    pub id: RequestId,
    pub permissions: RequestedPermissions,
}

impl ApprovedRequest {
    pub fn new(id: RequestId, permissions: RequestedPermissions) -> Self {
        Self { id, permissions }
    }
}

/// Descriptive information about an origin. Never implies a grant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_id: Option<String>,
}

/// Payload of `wallet_sendDomainMetadata` as sent by the page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainMetadataParams {
    #[serde(default)]
    pub name: Option<String>,
}
