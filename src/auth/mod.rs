//! Workspace access checks: the authorizer port, its default implementation,
//! and the Rocket request guard that consults it.
//!
//! Identity is established upstream; the guard only forwards the principal
//! header and the workspace slug to the managed [`WorkspaceAuthorizer`].

use std::sync::Arc;

use async_trait::async_trait;

pub mod error;
pub mod guards;

pub use error::{AuthorizationError, AuthorizationResult};
pub use guards::WorkspaceViewer;

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Denied(String),
}

/// Port deciding whether a principal may view a workspace.
#[async_trait]
pub trait WorkspaceAuthorizer: Send + Sync {
    async fn can_view_workspace(
        &self,
        principal: Option<&str>,
        workspace_slug: &str,
    ) -> AuthorizationResult<AccessDecision>;
}

/// Authorizer handle managed as Rocket state.
pub type SharedWorkspaceAuthorizer = Arc<dyn WorkspaceAuthorizer>;

/// Trusts every request; used when an upstream gateway already enforced access.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllAuthorizer;

#[async_trait]
impl WorkspaceAuthorizer for AllowAllAuthorizer {
    async fn can_view_workspace(
        &self,
        _principal: Option<&str>,
        _workspace_slug: &str,
    ) -> AuthorizationResult<AccessDecision> {
        Ok(AccessDecision::Allowed)
    }
}

/// Settings the guard needs at request time.
#[derive(Debug, Clone)]
pub struct AuthState {
    pub principal_header: String,
}
