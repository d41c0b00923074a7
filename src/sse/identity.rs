//! Extraction of the identity asserted by the upstream auth layer.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::domain::Identity;
use crate::error::GatewayError;

/// Identity carried in the configured identity header, if any.
///
/// The gateway performs no authentication; it trusts the header set by
/// the auth layer in front of it. A missing or blank header yields `None`
/// and the session refuses to open.
#[derive(Debug, Clone)]
pub struct AssertedIdentity(pub Option<Identity>);

impl FromRequestParts<AppState> for AssertedIdentity {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(state.identity_header.as_str()) else {
            return Ok(Self(None));
        };
        let raw = value.to_str().map_err(|_| {
            GatewayError::InvalidRequest(format!(
                "{} header is not valid UTF-8",
                state.identity_header
            ))
        })?;
        Ok(Self(Identity::new(raw).ok()))
    }
}
