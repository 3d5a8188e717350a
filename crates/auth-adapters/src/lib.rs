//! # auth-adapters
//!
//! Argon2 password hashing plus, behind `auth-jwt`, the HS256 token
//! provider implementing [`domains::AuthService`].

pub mod password;

#[cfg(feature = "auth-jwt")]
pub mod jwt;
#[cfg(feature = "auth-jwt")]
pub mod provider;

#[cfg(feature = "auth-jwt")]
pub use jwt::{Claims, JwtKeys};
pub use password::{hash_password, verify_password};
#[cfg(feature = "auth-jwt")]
pub use provider::PasswordAuth;
