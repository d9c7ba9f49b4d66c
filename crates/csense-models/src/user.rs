//! User profile models.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of an application user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Doctor,
    #[default]
    Patient,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Doctor => "doctor",
            UserRole::Patient => "patient",
        }
    }

    /// Parse a stored role. Unknown values fall back to `Patient`.
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "doctor" => UserRole::Doctor,
            _ => UserRole::Patient,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User profile stored in the `users` collection, keyed by `uid`.
///
/// Doctor-only and patient-only fields are empty strings for the other role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUser {
    /// Identity provider user ID
    pub uid: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub role: UserRole,

    // Doctor-specific
    #[serde(default)]
    pub license_number: String,
    #[serde(default)]
    pub specialization: String,

    // Patient-specific
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub blood_group: String,

    /// Profile photo URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl AppUser {
    /// Create a doctor profile.
    pub fn doctor(
        uid: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        license_number: impl Into<String>,
        specialization: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            role: UserRole::Doctor,
            license_number: license_number.into(),
            specialization: specialization.into(),
            age: String::new(),
            gender: String::new(),
            blood_group: String::new(),
            photo_url: None,
        }
    }

    /// Create a patient profile.
    pub fn patient(
        uid: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        age: impl Into<String>,
        gender: impl Into<String>,
        blood_group: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            role: UserRole::Patient,
            license_number: String::new(),
            specialization: String::new(),
            age: age.into(),
            gender: gender.into(),
            blood_group: blood_group.into(),
            photo_url: None,
        }
    }

    pub fn is_doctor(&self) -> bool {
        self.role == UserRole::Doctor
    }

    /// Return a copy with the given fields replaced. `uid` and `role` never change.
    pub fn with_update(&self, update: AppUserUpdate) -> Self {
        Self {
            uid: self.uid.clone(),
            name: update.name.unwrap_or_else(|| self.name.clone()),
            email: update.email.unwrap_or_else(|| self.email.clone()),
            phone: update.phone.unwrap_or_else(|| self.phone.clone()),
            role: self.role,
            license_number: update
                .license_number
                .unwrap_or_else(|| self.license_number.clone()),
            specialization: update
                .specialization
                .unwrap_or_else(|| self.specialization.clone()),
            age: update.age.unwrap_or_else(|| self.age.clone()),
            gender: update.gender.unwrap_or_else(|| self.gender.clone()),
            blood_group: update.blood_group.unwrap_or_else(|| self.blood_group.clone()),
            photo_url: update.photo_url.or_else(|| self.photo_url.clone()),
        }
    }
}

/// Partial profile update. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub blood_group: Option<String>,
    pub license_number: Option<String>,
    pub specialization: Option<String>,
    pub photo_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_lenient() {
        assert_eq!(UserRole::parse_lenient("doctor"), UserRole::Doctor);
        assert_eq!(UserRole::parse_lenient("patient"), UserRole::Patient);
        assert_eq!(UserRole::parse_lenient(""), UserRole::Patient);
        assert_eq!(UserRole::parse_lenient("admin"), UserRole::Patient);
    }

    #[test]
    fn test_with_update_keeps_uid_and_role() {
        let user = AppUser::doctor("u1", "Dr. A", "a@x.io", "123", "LIC-9", "Radiology");
        let updated = user.with_update(AppUserUpdate {
            name: Some("Dr. B".to_string()),
            photo_url: Some("https://cdn/p.jpg".to_string()),
            ..Default::default()
        });

        assert_eq!(updated.uid, "u1");
        assert_eq!(updated.role, UserRole::Doctor);
        assert_eq!(updated.name, "Dr. B");
        assert_eq!(updated.email, "a@x.io");
        assert_eq!(updated.license_number, "LIC-9");
        assert_eq!(updated.photo_url.as_deref(), Some("https://cdn/p.jpg"));
    }

    #[test]
    fn test_with_update_keeps_existing_photo() {
        let mut user = AppUser::patient("u2", "P", "p@x.io", "1", "40", "F", "O+");
        user.photo_url = Some("old".to_string());
        let updated = user.with_update(AppUserUpdate::default());
        assert_eq!(updated, user);
    }

    #[test]
    fn test_serde_camel_case() {
        let user = AppUser::patient("u3", "P", "p@x.io", "1", "40", "F", "O+");
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["bloodGroup"], "O+");
        assert_eq!(json["role"], "patient");
        assert!(json.get("photoUrl").is_none());
    }
}
