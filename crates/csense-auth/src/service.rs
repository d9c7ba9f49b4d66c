//! Session state and account workflows for doctors and patients.

use std::sync::Arc;

use tokio::sync::{broadcast, watch, RwLock};
use tracing::{info, warn};

use csense_firestore::UserRepository;
use csense_models::AppUser;

use crate::error::{AuthError, AuthResult};
use crate::identity::{IdentityClient, Session};

const EVENT_CAPACITY: usize = 16;

/// Identity change notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    /// A user signed in or registered and their profile is known.
    SignedIn(AppUser),
    /// The profile of the current session was (re)loaded. `None` if the
    /// account has no stored profile.
    ProfileLoaded(Option<AppUser>),
    SignedOut,
}

/// Registration form for a doctor account.
#[derive(Debug, Clone)]
pub struct DoctorRegistration {
    pub name: String,
    pub license_number: String,
    pub specialization: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

/// Registration form for a patient account.
#[derive(Debug, Clone)]
pub struct PatientRegistration {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub blood_group: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

struct Inner {
    identity: IdentityClient,
    users: UserRepository,
    session: watch::Sender<Option<Session>>,
    user: RwLock<Option<AppUser>>,
    events: broadcast::Sender<AuthEvent>,
}

/// Signs users in and out and keeps the current profile.
#[derive(Clone)]
pub struct AuthService {
    inner: Arc<Inner>,
}

impl AuthService {
    pub fn new(identity: IdentityClient, users: UserRepository) -> Self {
        let (session, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                identity,
                users,
                session,
                user: RwLock::new(None),
                events,
            }),
        }
    }

    /// Sign in and load the stored profile.
    ///
    /// Returns `Ok(None)` when the account exists but has no profile.
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Option<AppUser>> {
        let session = self.inner.identity.sign_in(email, password).await?;
        let user = self.inner.users.get(&session.uid).await?;

        info!(uid = %session.uid, has_profile = user.is_some(), "Signed in");
        self.set_state(session, user.clone()).await;

        match &user {
            Some(u) => self.publish(AuthEvent::SignedIn(u.clone())),
            None => {
                warn!("Signed-in account has no stored profile");
                self.publish(AuthEvent::ProfileLoaded(None));
            }
        }
        Ok(user)
    }

    /// Create a doctor account and its profile.
    pub async fn register_doctor(&self, form: DoctorRegistration) -> AuthResult<AppUser> {
        let session = self.create_account(&form.email, &form.password, &form.name).await?;
        let user = AppUser::doctor(
            session.uid.clone(),
            form.name,
            form.email.trim(),
            form.phone,
            form.license_number,
            form.specialization,
        );
        self.finish_registration(session, user).await
    }

    /// Create a patient account and its profile.
    pub async fn register_patient(&self, form: PatientRegistration) -> AuthResult<AppUser> {
        let session = self.create_account(&form.email, &form.password, &form.name).await?;
        let user = AppUser::patient(
            session.uid.clone(),
            form.name,
            form.email.trim(),
            form.phone,
            form.age,
            form.gender,
            form.blood_group,
        );
        self.finish_registration(session, user).await
    }

    pub async fn send_password_reset(&self, email: &str) -> AuthResult<()> {
        self.inner.identity.send_password_reset(email).await
    }

    /// Clear the session and profile.
    pub async fn sign_out(&self) {
        self.inner.session.send_replace(None);
        *self.inner.user.write().await = None;
        info!("Signed out");
        self.publish(AuthEvent::SignedOut);
    }

    /// Adopt an existing session and load its profile.
    pub async fn restore(&self, session: Session) -> AuthResult<Option<AppUser>> {
        let user = self.inner.users.get(&session.uid).await?;
        self.set_state(session, user.clone()).await;
        self.publish(AuthEvent::ProfileLoaded(user.clone()));
        Ok(user)
    }

    /// Profile of the signed-in user, if loaded.
    pub async fn current_user(&self) -> Option<AppUser> {
        self.inner.user.read().await.clone()
    }

    /// Current session, if any.
    pub fn session(&self) -> Option<Session> {
        self.inner.session.borrow().clone()
    }

    /// Current session, or `NotSignedIn`.
    pub fn require_session(&self) -> AuthResult<Session> {
        self.session().ok_or(AuthError::NotSignedIn)
    }

    pub fn is_signed_in(&self) -> bool {
        self.inner.session.borrow().is_some()
    }

    /// Receive identity change events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    /// Follow the current session.
    pub fn watch_session(&self) -> watch::Receiver<Option<Session>> {
        self.inner.session.subscribe()
    }

    async fn create_account(&self, email: &str, password: &str, name: &str) -> AuthResult<Session> {
        let session = self.inner.identity.sign_up(email, password).await?;
        self.inner
            .identity
            .update_display_name(&session.id_token, name)
            .await?;
        Ok(session)
    }

    async fn finish_registration(&self, session: Session, user: AppUser) -> AuthResult<AppUser> {
        self.inner.users.save(&user).await?;
        info!(uid = %user.uid, role = %user.role, "Registered account");

        self.set_state(session, Some(user.clone())).await;
        self.publish(AuthEvent::SignedIn(user.clone()));
        Ok(user)
    }

    async fn set_state(&self, session: Session, user: Option<AppUser>) {
        *self.inner.user.write().await = user;
        self.inner.session.send_replace(Some(session));
    }

    fn publish(&self, event: AuthEvent) {
        // No receivers is fine
        let _ = self.inner.events.send(event);
    }
}
