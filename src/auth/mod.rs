// ABOUTME: Authentication & authorization layer: sessions, API keys, principal resolution.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

pub mod api_key_store;
pub mod manager;
pub mod principal;
pub mod session;

pub use api_key_store::{ApiKey, ApiKeyStore};
pub use manager::{build_principal, AuthManager, BasicCredentials};
pub use principal::{Principal, PrincipalKind, RateLimit, ToolAccessMode};
pub use session::{Session, SessionStore};
