//! `orgdir-auth` — credential handling.
//!
//! One-way password hashing for user creation. Hashing happens exactly once,
//! at insert; updates never rehash.

pub mod password;

pub use password::{hash_password, verify_password, AuthError};
