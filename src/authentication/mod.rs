//! Verification of the bearer tokens identifying the requesting user.
//!
//! Tokens are issued elsewhere. This service only checks them.

mod jwt;

pub use jwt::{JwtError, JwtKeys, TokenClaims};
