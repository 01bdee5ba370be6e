//! Per-connection authentication state.
//!
//! One instance per websocket, set once by `authenticate`, and re-checked
//! by every authenticated method call and every feed tick.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::error::rpc::JsonRpcError;

#[derive(Debug, Clone, Default)]
struct SessionState {
    account_id: Option<i64>,
    exp: i64,
}

/// Shared, mutable per-connection session. Cheap to clone; all instances
/// backed by one connection share the same underlying state, so
/// `authenticate` run from one worker is visible to the others immediately.
#[derive(Clone, Default)]
pub struct Session {
    state: Arc<RwLock<SessionState>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_authenticated(&self, account_id: i64, exp: i64) {
        let mut state = self.state.write();
        state.account_id = Some(account_id);
        state.exp = exp;
    }

    pub fn account_id(&self) -> Option<i64> {
        self.state.read().account_id
    }

    /// `Err` when there is no logged-in account, or the token's `exp` has
    /// passed. Every authenticated RPC method and every feed batching tick
    /// calls this before doing any work.
    pub fn check_auth(&self) -> Result<i64, JsonRpcError> {
        let state = self.state.read();
        let now = chrono::Utc::now().timestamp();
        match state.account_id {
            Some(account_id) if state.exp >= now => Ok(account_id),
            _ => Err(JsonRpcError::unauthenticated()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_session_fails_check() {
        let session = Session::new();
        assert!(session.check_auth().is_err());
    }

    #[test]
    fn authenticated_session_with_future_exp_passes() {
        let session = Session::new();
        let future = chrono::Utc::now().timestamp() + 3600;
        session.set_authenticated(7, future);
        assert_eq!(session.check_auth().unwrap(), 7);
    }

    #[test]
    fn expired_session_fails_check() {
        let session = Session::new();
        let past = chrono::Utc::now().timestamp() - 10;
        session.set_authenticated(7, past);
        assert!(session.check_auth().is_err());
    }
}
