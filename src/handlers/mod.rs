pub mod auth;
pub mod directory;
pub mod resource;

pub use auth::*;
pub use directory::*;
pub use resource::*;

use axum::Extension;
use serde::Deserialize;

use crate::models::AuthenticatedUser;

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

/// Missing endpoints resolve to the user root, which the engine rejects.
#[derive(Debug, Deserialize)]
pub struct MoveQuery {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

/// Identity placed on the request by [`identity_middleware`], if any.
pub type Identity = Option<Extension<AuthenticatedUser>>;

pub(crate) fn user(identity: &Identity) -> Option<&AuthenticatedUser> {
    identity.as_ref().map(|Extension(user)| user)
}
