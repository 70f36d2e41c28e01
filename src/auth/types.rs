//! # Auth Forms
//!
//! Bodies of the signup, login and password-change forms
//! (`application/x-www-form-urlencoded`). Missing fields deserialize as empty
//! strings so they surface as field errors rather than extractor rejections.
//! Extra fields such as `csrf_token` are ignored.
//!
//! Password fields are never serialized back into a page, and their `Debug`
//! output is redacted so a stray `?form` in a log line stays harmless.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Default, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SignupForm {
    #[validate(length(min = 1, message = "This field cannot be blank"))]
    pub name: String,

    #[validate(
        length(min = 1, message = "This field cannot be blank"),
        email(message = "This field must be a valid email address")
    )]
    pub email: String,

    #[serde(skip_serializing)]
    #[validate(length(min = 8, message = "This field must be at least 8 characters long"))]
    pub password: String,

    #[serde(skip_serializing)]
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password_confirmation: String,
}

const REDACTED: &str = "[redacted]";

impl fmt::Debug for SignupForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupForm")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &REDACTED)
            .field("password_confirmation", &REDACTED)
            .finish()
    }
}

impl SignupForm {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_string();
        self
    }
}

#[derive(Default, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoginForm {
    #[validate(
        length(min = 1, message = "This field cannot be blank"),
        email(message = "This field must be a valid email address")
    )]
    pub email: String,

    #[serde(skip_serializing)]
    #[validate(length(min = 1, message = "This field cannot be blank"))]
    pub password: String,
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &REDACTED)
            .finish()
    }
}

impl LoginForm {
    pub fn normalized(mut self) -> Self {
        self.email = self.email.trim().to_string();
        self
    }
}

#[derive(Default, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PasswordUpdateForm {
    #[serde(skip_serializing)]
    #[validate(length(min = 1, message = "This field cannot be blank"))]
    pub current_password: String,

    #[serde(skip_serializing)]
    #[validate(length(min = 8, message = "This field must be at least 8 characters long"))]
    pub new_password: String,

    #[serde(skip_serializing)]
    #[validate(must_match(other = "new_password", message = "Passwords do not match"))]
    pub new_password_confirmation: String,
}

impl fmt::Debug for PasswordUpdateForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordUpdateForm")
            .field("current_password", &REDACTED)
            .field("new_password", &REDACTED)
            .field("new_password_confirmation", &REDACTED)
            .finish()
    }
}
