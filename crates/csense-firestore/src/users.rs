//! Repository for user profiles.

use std::collections::HashMap;

use tracing::info;

use csense_models::{AppUser, UserRole};

use crate::client::FirestoreClient;
use crate::error::FirestoreResult;
use crate::types::{Document, ToFirestoreValue, Value};

const USERS_COLLECTION: &str = "users";

/// Profile fields written on save and update.
const PROFILE_FIELDS: [&str; 10] = [
    "name",
    "email",
    "phone",
    "role",
    "licenseNumber",
    "specialization",
    "age",
    "gender",
    "bloodGroup",
    "photoUrl",
];

/// Repository for `users/{uid}` documents.
#[derive(Clone)]
pub struct UserRepository {
    client: FirestoreClient,
}

impl UserRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Write the full profile, replacing any existing document.
    pub async fn save(&self, user: &AppUser) -> FirestoreResult<()> {
        self.client
            .set_document(USERS_COLLECTION, &user.uid, user_to_fields(user))
            .await?;
        info!(uid = %user.uid, role = %user.role, "Saved user profile");
        Ok(())
    }

    /// Load a profile. Missing users are `Ok(None)`.
    pub async fn get(&self, uid: &str) -> FirestoreResult<Option<AppUser>> {
        let doc = self.client.get_document(USERS_COLLECTION, uid).await?;
        Ok(doc.map(|d| document_to_user(uid, &d)))
    }

    /// Merge the profile fields into an existing document.
    pub async fn update(&self, user: &AppUser) -> FirestoreResult<()> {
        self.client
            .update_document(
                USERS_COLLECTION,
                &user.uid,
                user_to_fields(user),
                PROFILE_FIELDS.iter().map(|f| f.to_string()).collect(),
            )
            .await?;
        Ok(())
    }
}

pub(crate) fn user_to_fields(user: &AppUser) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("name".to_string(), user.name.to_firestore_value());
    fields.insert("email".to_string(), user.email.to_firestore_value());
    fields.insert("phone".to_string(), user.phone.to_firestore_value());
    fields.insert("role".to_string(), user.role.as_str().to_firestore_value());
    fields.insert(
        "licenseNumber".to_string(),
        user.license_number.to_firestore_value(),
    );
    fields.insert(
        "specialization".to_string(),
        user.specialization.to_firestore_value(),
    );
    fields.insert("age".to_string(), user.age.to_firestore_value());
    fields.insert("gender".to_string(), user.gender.to_firestore_value());
    fields.insert("bloodGroup".to_string(), user.blood_group.to_firestore_value());
    fields.insert("photoUrl".to_string(), user.photo_url.to_firestore_value());
    fields
}

/// Missing string fields become empty, a missing role becomes `patient`.
pub(crate) fn document_to_user(uid: &str, doc: &Document) -> AppUser {
    AppUser {
        uid: uid.to_string(),
        name: doc.get_string_or_default("name"),
        email: doc.get_string_or_default("email"),
        phone: doc.get_string_or_default("phone"),
        role: doc
            .get::<String>("role")
            .map(|r| UserRole::parse_lenient(&r))
            .unwrap_or_default(),
        license_number: doc.get_string_or_default("licenseNumber"),
        specialization: doc.get_string_or_default("specialization"),
        age: doc.get_string_or_default("age"),
        gender: doc.get_string_or_default("gender"),
        blood_group: doc.get_string_or_default("bloodGroup"),
        photo_url: doc.get("photoUrl"),
    }
}
