//! Email/password identity for ChestSense users.
//!
//! This crate provides:
//! - A Firebase Auth REST client (sign-in, sign-up, password reset)
//! - Provider error codes mapped to user-facing messages
//! - `AuthService`, which ties accounts to stored profiles and publishes
//!   identity changes

pub mod error;
pub mod identity;
pub mod service;

pub use error::{user_message, AuthError, AuthResult, GENERIC_AUTH_MESSAGE};
pub use identity::{IdentityClient, IdentityConfig, Session};
pub use service::{AuthEvent, AuthService, DoctorRegistration, PatientRegistration};
