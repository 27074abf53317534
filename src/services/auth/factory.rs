/// Factory: build the bearer `TokenVerifier` from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::services::auth::{JwtVerifier, TokenVerifier, VerifyError};

pub fn build_token_verifier(config: &Config) -> Result<Option<Arc<dyn TokenVerifier>>, VerifyError> {
    let verifier = JwtVerifier::from_config(&config.auth)?;

    Ok(verifier.map(|v| Arc::new(v) as Arc<dyn TokenVerifier>))
}
