use std::collections::BTreeSet;

use super::claims::{ClaimValue, IdentityToken};

pub const ROLES_CLAIM: &str = "roles";
pub const ROLE_PREFIX: &str = "ROLE_";

/// Maps the `roles` claim to `ROLE_<role>` authorities.
///
/// A missing claim, or one that is not a sequence, grants nothing.
pub fn extract_authorities(token: &IdentityToken) -> BTreeSet<String> {
    match token.claim(ROLES_CLAIM) {
        Some(ClaimValue::List(roles)) => roles
            .iter()
            .map(|role| format!("{ROLE_PREFIX}{role}"))
            .collect(),
        _ => BTreeSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with_roles(roles: &[&str]) -> IdentityToken {
        IdentityToken::new("sub-1").with_claim(
            ROLES_CLAIM,
            ClaimValue::List(roles.iter().map(|r| r.to_string()).collect()),
        )
    }

    #[test]
    fn roles_are_prefixed() {
        let authorities = extract_authorities(&token_with_roles(&["Admin", "Reader"]));
        let expected: BTreeSet<String> = ["ROLE_Admin", "ROLE_Reader"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(authorities, expected);
    }

    #[test]
    fn duplicates_collapse() {
        let authorities = extract_authorities(&token_with_roles(&["admin", "admin", "user"]));
        assert_eq!(authorities.len(), 2);
    }

    #[test]
    fn missing_roles_grant_nothing() {
        assert!(extract_authorities(&IdentityToken::new("sub-1")).is_empty());
    }

    #[test]
    fn scalar_roles_grant_nothing() {
        let token = IdentityToken::new("sub-1")
            .with_claim(ROLES_CLAIM, ClaimValue::Text("admin".into()));
        assert!(extract_authorities(&token).is_empty());
    }

    #[test]
    fn same_token_same_authorities() {
        let token = token_with_roles(&["b", "a", "c"]);
        assert_eq!(extract_authorities(&token), extract_authorities(&token));
    }
}
