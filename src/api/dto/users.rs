/*
 * Responsibility
 * - Users の request/response DTO
 * - validate(): field ごとの rule table を上から評価し、最初に失敗した rule の message を採用
 * - JSON は camelCase (fullName, createdAt, lastLogin)
 */
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FieldErrors;
use crate::repos::UserRow;

const USERNAME_PATTERN: &str = r"^[a-zA-Z0-9_-]+$";
const EMAIL_PATTERN: &str = r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$";

fn username_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(USERNAME_PATTERN).expect("static username pattern"))
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("static email pattern"))
}

// Absent values only fail the "required" rules; every other rule treats them as valid.
struct Rule {
    holds: fn(Option<&str>) -> bool,
    message: &'static str,
}

fn not_blank(v: Option<&str>) -> bool {
    v.is_some_and(|s| !s.trim().is_empty())
}

fn username_length(v: Option<&str>) -> bool {
    v.is_none_or(|s| (3..=50).contains(&s.chars().count()))
}

fn username_charset(v: Option<&str>) -> bool {
    v.is_none_or(|s| username_re().is_match(s))
}

fn email_format(v: Option<&str>) -> bool {
    v.is_none_or(|s| s.is_empty() || email_re().is_match(s))
}

fn at_most_100(v: Option<&str>) -> bool {
    v.is_none_or(|s| s.chars().count() <= 100)
}

const USERNAME_RULES: &[Rule] = &[
    Rule {
        holds: not_blank,
        message: "Username is required",
    },
    Rule {
        holds: username_length,
        message: "Username must be between 3 and 50 characters",
    },
    Rule {
        holds: username_charset,
        message: "Username can only contain alphanumeric characters, hyphens, and underscores",
    },
];

const EMAIL_RULES: &[Rule] = &[
    Rule {
        holds: not_blank,
        message: "Email is required",
    },
    Rule {
        holds: email_format,
        message: "Email must be valid",
    },
    Rule {
        holds: at_most_100,
        message: "Email must not exceed 100 characters",
    },
];

const FULL_NAME_RULES: &[Rule] = &[Rule {
    holds: at_most_100,
    message: "Full name must not exceed 100 characters",
}];

fn check(errors: &mut FieldErrors, field: &str, value: Option<&str>, rules: &[Rule]) {
    if let Some(rule) = rules.iter().find(|r| !(r.holds)(value)) {
        errors.insert(field.to_string(), rule.message.to_string());
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

/// Borrowed view of a request that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: Option<&'a str>,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<ValidUser<'_>, FieldErrors> {
        let mut errors = FieldErrors::new();
        check(&mut errors, "username", self.username.as_deref(), USERNAME_RULES);
        check(&mut errors, "email", self.email.as_deref(), EMAIL_RULES);
        check(&mut errors, "fullName", self.full_name.as_deref(), FULL_NAME_RULES);

        match (self.username.as_deref(), self.email.as_deref()) {
            (Some(username), Some(email)) if errors.is_empty() => Ok(ValidUser {
                username,
                email,
                full_name: self.full_name.as_deref(),
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<UserRow> for UserResponse {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            created_at: row.created_at,
            last_login: row.last_login,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: Some(username.into()),
            email: Some(email.into()),
            full_name: None,
        }
    }

    #[test]
    fn valid_request_passes() {
        let req = request("valid_user-1", "valid@example.com");
        let valid = req.validate().unwrap();
        assert_eq!(valid.username, "valid_user-1");
        assert_eq!(valid.full_name, None);
    }

    #[test]
    fn short_username_fails_on_length() {
        let errors = request("ab", "valid@example.com").validate().unwrap_err();
        assert_eq!(
            errors.get("username").map(String::as_str),
            Some("Username must be between 3 and 50 characters")
        );
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn username_charset_is_restricted() {
        let errors = request("john doe", "valid@example.com").validate().unwrap_err();
        assert!(errors["username"].starts_with("Username can only contain"));
    }

    #[test]
    fn missing_fields_are_required() {
        let errors = CreateUserRequest::default().validate().unwrap_err();
        assert_eq!(errors["username"], "Username is required");
        assert_eq!(errors["email"], "Email is required");
        assert!(!errors.contains_key("fullName"));
    }

    #[test]
    fn blank_username_reports_required_first() {
        let errors = request("   ", "valid@example.com").validate().unwrap_err();
        assert_eq!(errors["username"], "Username is required");
    }

    #[test]
    fn email_must_be_well_formed_and_bounded() {
        let errors = request("john_doe", "not-an-email").validate().unwrap_err();
        assert_eq!(errors["email"], "Email must be valid");

        let long = format!("{}@example.com", "a".repeat(95));
        let errors = request("john_doe", &long).validate().unwrap_err();
        assert_eq!(errors["email"], "Email must not exceed 100 characters");
    }

    #[test]
    fn full_name_is_bounded() {
        let mut req = request("john_doe", "john@example.com");
        req.full_name = Some("x".repeat(101));
        let errors = req.validate().unwrap_err();
        assert_eq!(errors["fullName"], "Full name must not exceed 100 characters");
    }

    #[test]
    fn deserializes_camel_case() {
        let req: CreateUserRequest = serde_json::from_str(
            r#"{"username":"john_doe","email":"john@example.com","fullName":"John Doe"}"#,
        )
        .unwrap();
        assert_eq!(req.full_name.as_deref(), Some("John Doe"));
    }

    #[test]
    fn response_uses_camel_case_keys() {
        let row = UserRow {
            id: 1,
            username: "john_doe".into(),
            email: "john@example.com".into(),
            full_name: None,
            created_at: Utc::now(),
            last_login: None,
        };
        let json = serde_json::to_value(UserResponse::from(row)).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json["lastLogin"].is_null());
        assert!(json["fullName"].is_null());
    }
}
