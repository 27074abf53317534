pub mod authorities;
pub mod claims;
pub mod factory;
pub mod principal;
pub mod verifier;

pub use authorities::extract_authorities;
pub use claims::{ClaimValue, IdentityToken};
pub use factory::build_token_verifier;
pub use principal::{LOCAL_USER, Principal, resolve_principal};
pub use verifier::{JwtVerifier, TokenVerifier, VerifyError};
