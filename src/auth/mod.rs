//! Authentication and authorization for caselog
//!
//! Provides:
//! - JWT token verification and actor resolution
//! - Role hierarchy used for visibility scoping and delete gating

mod actor;
mod jwt;
mod roles;

pub use actor::Actor;
pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenInput, TokenValidationResult};
pub use roles::Role;
