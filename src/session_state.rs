use actix_session::{Session as ActixSession, SessionExt, SessionGetError, SessionInsertError};
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::future::{ready, Ready};
use std::marker::PhantomData;
use uuid::Uuid;

/// How long the password step stays valid while waiting for the OTP.
pub const PENDING_LOGIN_TTL: TimeDelta = TimeDelta::minutes(5);
/// How long an admin has to finish the Google consent screen.
pub const PENDING_LINK_TTL: TimeDelta = TimeDelta::minutes(10);

pub struct SessionStateKey<'a, T> {
    value_type: PhantomData<T>,
    session: &'a ActixSession,
    key: &'static str,
}

impl<T> SessionStateKey<'_, T>
where
    T: Serialize + DeserializeOwned,
{
    fn new<'b>(state: &'b Session, key: &'static str) -> SessionStateKey<'b, T> {
        SessionStateKey::<'b, T> {
            value_type: PhantomData,
            session: &state.0,
            key,
        }
    }

    pub fn get(&self) -> Result<Option<T>, SessionGetError> {
        self.session.get(self.key)
    }

    pub fn insert(&self, value: T) -> Result<(), SessionInsertError> {
        self.session.insert(self.key, value)
    }

    pub fn remove(&self) {
        self.session.remove(self.key);
    }
}

/// Password verified, waiting for the emailed code.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PendingLogin {
    pub user_id: Uuid,
    pub email: String,
    pub started_at: DateTime<Utc>,
}

impl PendingLogin {
    pub fn new(user_id: Uuid, email: String) -> Self {
        Self {
            user_id,
            email,
            started_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.started_at > PENDING_LOGIN_TTL
    }
}

/// Admin started linking a Google Workspace mailbox.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PendingWorkspaceLink {
    pub state: String,
    pub email: String,
    pub display_name: String,
    pub user_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl PendingWorkspaceLink {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.started_at > PENDING_LINK_TTL
    }
}

pub struct Session(ActixSession);

impl Session {
    pub fn renew(&self) {
        self.0.renew();
    }

    pub fn logout(&self) {
        self.0.purge();
    }

    /// Only set once both the password and the OTP were verified.
    pub fn user_id(&self) -> SessionStateKey<'_, Uuid> {
        SessionStateKey::new(self, "user_id")
    }

    pub fn pending_login(&self) -> SessionStateKey<'_, PendingLogin> {
        SessionStateKey::new(self, "pending_login")
    }

    pub fn pending_workspace_link(&self) -> SessionStateKey<'_, PendingWorkspaceLink> {
        SessionStateKey::new(self, "workspace_oauth_state")
    }
}

impl FromRequest for Session {
    type Error = <ActixSession as FromRequest>::Error;

    type Future = Ready<Result<Session, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(Session(req.get_session())))
    }
}
