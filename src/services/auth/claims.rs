//! Identity token claim bag.
//!
//! The upstream verifier hands us an arbitrary JSON object. We keep only the shapes
//! the application reasons about (`Text` / `List`) and park everything else in `Other`,
//! so consumers pattern-match instead of probing runtime types.

use std::collections::HashMap;

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimValue {
    Text(String),
    List(Vec<String>),
    Other(Value),
}

impl ClaimValue {
    /// `null` is treated as an absent claim.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self::Text(s)),
            Value::Bool(_) | Value::Number(_) => Some(Self::Text(value.to_string())),
            Value::Array(items) => Some(Self::List(items.into_iter().map(render).collect())),
            other => Some(Self::Other(other)),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

fn render(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// A pre-verified identity token. Lifetime is a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityToken {
    subject: String,
    claims: HashMap<String, ClaimValue>,
}

impl IdentityToken {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            claims: HashMap::new(),
        }
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: ClaimValue) -> Self {
        self.claims.insert(name.into(), value);
        self
    }

    /// Builds a token from decoded JWT claims. Returns `None` without a usable `sub`.
    pub fn from_json_claims(claims: Map<String, Value>) -> Option<Self> {
        let subject = match claims.get("sub") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            _ => return None,
        };

        let claims = claims
            .into_iter()
            .filter_map(|(k, v)| ClaimValue::from_json(v).map(|v| (k, v)))
            .collect();

        Some(Self { subject, claims })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn claim(&self, name: &str) -> Option<&ClaimValue> {
        self.claims.get(name)
    }

    pub fn claim_as_text(&self, name: &str) -> Option<&str> {
        self.claim(name).and_then(ClaimValue::as_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn arrays_become_lists_of_strings() {
        let token = IdentityToken::from_json_claims(claims(json!({
            "sub": "abc",
            "roles": ["admin", 7, true],
        })))
        .unwrap();

        assert_eq!(
            token.claim("roles"),
            Some(&ClaimValue::List(vec![
                "admin".into(),
                "7".into(),
                "true".into()
            ]))
        );
    }

    #[test]
    fn null_claims_are_absent() {
        let token =
            IdentityToken::from_json_claims(claims(json!({"sub": "abc", "name": null}))).unwrap();
        assert!(token.claim("name").is_none());
    }

    #[test]
    fn objects_are_kept_as_other() {
        let token = IdentityToken::from_json_claims(claims(json!({
            "sub": "abc",
            "roles": {"admin": true},
        })))
        .unwrap();

        assert!(matches!(token.claim("roles"), Some(ClaimValue::Other(_))));
        assert_eq!(token.claim_as_text("roles"), None);
    }

    #[test]
    fn subject_is_required() {
        assert!(IdentityToken::from_json_claims(claims(json!({"name": "x"}))).is_none());
        assert!(IdentityToken::from_json_claims(claims(json!({"sub": " "}))).is_none());
    }
}
