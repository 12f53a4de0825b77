use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{Role, User};

use super::not_blank;

/// A registered account. The role is fixed at registration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What callers get back; never carries the password hash.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct NewMember {
    #[validate(email(message = "email is malformed"))]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    #[validate(custom(function = "not_blank"))]
    pub first_name: String,
    #[validate(custom(function = "not_blank"))]
    pub last_name: String,
    pub role: Role,
}

impl NewMember {
    /// Emails are compared and stored trimmed and lowercased; validation must
    /// see the same value that gets stored.
    pub fn normalized(mut self) -> Self {
        self.email = self.email.trim().to_lowercase();
        self
    }
}

impl Member {
    pub fn new(input: NewMember, password_hash: String) -> Self {
        let input = input.normalized();
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            email: input.email,
            password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            role: input.role,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn principal(&self) -> User {
        User::new(self.id, self.role)
    }

    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

#[test]
fn profile_omits_password_hash() {
    let member = Member::new(
        NewMember {
            email: " Ada@Example.com".into(),
            password: "correct horse".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            role: Role::Client,
        },
        "$2b$04$hash".into(),
    );

    assert_eq!(member.email, "ada@example.com");

    let value = serde_json::to_value(member.profile()).unwrap();
    assert!(value.get("password_hash").is_none());
    assert_eq!(value["role"], "client");
}

#[test]
fn new_member_validation() {
    let mut input = NewMember {
        email: "not-an-email".into(),
        password: "short".into(),
        first_name: " ".into(),
        last_name: "Hopper".into(),
        role: Role::Driver,
    };

    let errors = input.validate().unwrap_err();
    let fields = errors.field_errors();
    let failed = |name: &str| fields.keys().any(|key| key.to_string() == name);
    assert!(failed("email"));
    assert!(failed("password"));
    assert!(failed("first_name"));
    assert!(!failed("last_name"));

    input.email = "grace@example.com".into();
    input.password = "long enough".into();
    input.first_name = "Grace".into();
    assert!(input.validate().is_ok());
}

#[test]
fn padded_mixed_case_email_validates_after_normalizing() {
    let input = NewMember {
        email: " Dispatch@Example.com ".into(),
        password: "correct horse".into(),
        first_name: "Ada".into(),
        last_name: "Vance".into(),
        role: Role::Client,
    };

    let input = input.normalized();

    assert_eq!(input.email, "dispatch@example.com");
    assert!(input.validate().is_ok());
}
