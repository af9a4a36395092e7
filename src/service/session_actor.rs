use crate::error::DriveError;
use crate::google_oauth::{DriveToken, GoogleOauthEndpoints};

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Public messages handled by the session actor.
#[derive(Debug)]
pub enum SessionMessage {
    /// Replace the current token (OAuth callback completed).
    Install(DriveToken),
    /// Current access token, refreshed first when stale. `None` without a session.
    AccessToken(RpcReplyPort<Result<Option<String>, DriveError>>),
    /// Forget the session.
    Clear,
}

/// Handle for interacting with the session actor.
#[derive(Clone)]
pub struct SessionHandle {
    actor: ActorRef<SessionMessage>,
}

impl SessionHandle {
    pub async fn install(&self, token: DriveToken) {
        let _ = ractor::cast!(self.actor, SessionMessage::Install(token));
    }

    pub async fn access_token(&self) -> Result<Option<String>, DriveError> {
        ractor::call!(self.actor, SessionMessage::AccessToken)
            .map_err(|e| DriveError::RactorError(format!("AccessToken RPC failed: {e}")))?
    }

    pub async fn clear(&self) {
        let _ = ractor::cast!(self.actor, SessionMessage::Clear);
    }
}

/// Internal state held by the session actor
struct SessionState {
    oauth: Arc<GoogleOauthEndpoints>,
    token: Option<DriveToken>,
}

/// Sole owner of the operator's Drive token.
struct SessionActor;

#[ractor::async_trait]
impl Actor for SessionActor {
    type Msg = SessionMessage;
    type State = SessionState;
    type Arguments = Arc<GoogleOauthEndpoints>;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        oauth: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!("SessionActor started; waiting for OAuth callback");
        Ok(SessionState { oauth, token: None })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SessionMessage::Install(token) => {
                info!(email = ?token.email, "drive session installed");
                state.token = Some(token);
            }
            SessionMessage::AccessToken(rp) => {
                let result = self.current_access_token(state).await;
                let _ = rp.send(result);
            }
            SessionMessage::Clear => {
                if state.token.take().is_some() {
                    info!("drive session cleared");
                }
            }
        }
        Ok(())
    }
}

impl SessionActor {
    /// Messages are handled one at a time, so concurrent callers hitting an
    /// expired token share a single refresh.
    async fn current_access_token(
        &self,
        state: &mut SessionState,
    ) -> Result<Option<String>, DriveError> {
        let Some(token) = state.token.as_ref() else {
            return Ok(None);
        };
        if !token.is_expired() {
            return Ok(Some(token.access_token.clone()));
        }
        if !token.can_refresh() {
            warn!("access token expired and no refresh token; session dropped");
            state.token = None;
            return Ok(None);
        }

        debug!("access token stale; refreshing");
        match state.oauth.refresh_access_token(token).await {
            Ok(refreshed) => {
                let access = refreshed.access_token.clone();
                state.token = Some(refreshed);
                Ok(Some(access))
            }
            Err(e @ DriveError::Oauth2Server { .. }) => {
                warn!(error = %e, "refresh rejected by Google; session dropped");
                state.token = None;
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "refresh failed (transient); keeping session");
                Err(e)
            }
        }
    }
}

/// Spawn the session actor and return a handle.
pub async fn spawn(oauth: Arc<GoogleOauthEndpoints>) -> Result<SessionHandle, DriveError> {
    let (actor, _jh) = Actor::spawn(None, SessionActor, oauth)
        .await
        .map_err(|e| DriveError::RactorError(format!("failed to spawn SessionActor: {e}")))?;
    Ok(SessionHandle { actor })
}
