//! Request extractors.
//!
//! - [`auth::AuthUser`] -- requires a valid JWT Bearer token.
//! - [`auth::MaybeAuthUser`] -- optional caller identity.

pub mod auth;
