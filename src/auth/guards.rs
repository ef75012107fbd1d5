use rocket::Request;
use rocket::State;
use rocket::request::{FromRequest, Outcome};
use rocket_okapi::request::OpenApiFromRequest;

use crate::auth::{
    AccessDecision, AuthState, AuthorizationError, AuthorizationResult, SharedWorkspaceAuthorizer,
};
use crate::config::DEFAULT_PRINCIPAL_HEADER;

/// Caller allowed to read the workspace named by the `workspaces/<slug>` path segment.
#[derive(Debug, Clone, OpenApiFromRequest)]
pub struct WorkspaceViewer {
    pub principal: Option<String>,
    pub workspace_slug: String,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for WorkspaceViewer {
    type Error = AuthorizationError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match authorize(request).await {
            Ok(viewer) => Outcome::Success(viewer),
            Err(err) => {
                log::debug!("workspace access rejected for {}: {}", request.uri(), err);
                Outcome::Error((err.status(), err))
            }
        }
    }
}

async fn authorize(request: &Request<'_>) -> AuthorizationResult<WorkspaceViewer> {
    let workspace_slug =
        workspace_slug_from_path(request).ok_or(AuthorizationError::MissingWorkspace)?;

    let authorizer = request
        .guard::<&State<SharedWorkspaceAuthorizer>>()
        .await
        .succeeded()
        .ok_or_else(|| AuthorizationError::Config("workspace authorizer missing from state".into()))?;

    let principal = principal_from_request(request);

    match authorizer
        .can_view_workspace(principal.as_deref(), &workspace_slug)
        .await?
    {
        AccessDecision::Allowed => Ok(WorkspaceViewer {
            principal,
            workspace_slug,
        }),
        AccessDecision::Denied(reason) => Err(AuthorizationError::Forbidden(reason)),
    }
}

fn workspace_slug_from_path(request: &Request<'_>) -> Option<String> {
    let mut segments = request.uri().path().segments();
    segments.find(|segment| *segment == "workspaces")?;
    segments
        .next()
        .filter(|slug| !slug.is_empty())
        .map(str::to_string)
}

fn principal_from_request(request: &Request<'_>) -> Option<String> {
    let header_name = request
        .rocket()
        .state::<AuthState>()
        .map(|state| state.principal_header.as_str())
        .unwrap_or(DEFAULT_PRINCIPAL_HEADER);

    request
        .headers()
        .get_one(header_name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
