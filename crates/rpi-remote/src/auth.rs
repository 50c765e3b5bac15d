//! Request authorization hook.
//!
//! The agent ships open by default. Set `RPI_REMOTE_TOKEN` to require a
//! bearer token on every POST.

use crate::error::{AgentError, Result};
use crate::protocol::RequestEnvelope;
use axum::http::header::AUTHORIZATION;

/// Decides whether a request may reach an operation.
pub trait Authorizer: Send + Sync {
    /// Return [`AgentError::Unauthorized`] to reject.
    fn authorize(&self, req: &RequestEnvelope) -> Result<()>;
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _req: &RequestEnvelope) -> Result<()> {
        Ok(())
    }
}

/// Requires `Authorization: Bearer <token>`.
#[derive(Clone)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    /// Accept requests presenting `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken").finish_non_exhaustive()
    }
}

impl Authorizer for BearerToken {
    fn authorize(&self, req: &RequestEnvelope) -> Result<()> {
        let presented = req
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AgentError::Unauthorized)?;

        if constant_time_eq(presented.as_bytes(), self.token.as_bytes()) {
            Ok(())
        } else {
            Err(AgentError::Unauthorized)
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
