/*
 * Responsibility
 * - リクエストごとの認証主体 (Principal) を token から導出する
 * - token なし (local/dev) は "local-user" 固定
 * - 表示名の優先順位: preferred_username → name → sub
 */
use std::collections::BTreeSet;

use super::authorities::{ROLE_PREFIX, extract_authorities};
use super::claims::IdentityToken;

pub const LOCAL_USER: &str = "local-user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub display_name: String,
    pub authorities: BTreeSet<String>,
}

impl Principal {
    pub fn local() -> Self {
        Self {
            display_name: LOCAL_USER.to_string(),
            authorities: BTreeSet::new(),
        }
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.has_authority(&format!("{ROLE_PREFIX}{role}"))
    }
}

pub fn resolve_principal(token: Option<&IdentityToken>) -> Principal {
    let Some(token) = token else {
        return Principal::local();
    };

    let display_name = token
        .claim_as_text("preferred_username")
        .or_else(|| token.claim_as_text("name"))
        .unwrap_or_else(|| token.subject());

    Principal {
        display_name: display_name.to_string(),
        authorities: extract_authorities(token),
    }
}
