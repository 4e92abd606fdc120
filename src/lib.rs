//! # petshop-guard (client session guards)
//!
//! `petshop-guard` holds the client-side guard layer of the pet shop & salon
//! platform: the settings unlock gate and its route guard, the login rate
//! limiter, the remember-me preference, the admin realtime alert subscriber and
//! the retrying lazy loader for code-split components.
//!
//! ## Storage
//!
//! All persisted state goes through [`store::SettingsStore`], which exposes two
//! scopes: `Session` (per tab, gone when the session ends) and `Persistent`
//! (kept until explicitly cleared). Consumers subscribe to store events instead
//! of polling. Key names are stable across releases, see [`store::keys`].
//!
//! ## Security Boundary
//!
//! Nothing here is a security boundary. The settings gate is advisory: a user
//! with access to the storage medium can flip it. The login rate limiter is
//! defense in depth; the backend enforces its own limits. Authorization lives
//! on the server.

pub mod alerts;
pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod lazy;
pub mod notify;
pub mod rate_limit;
pub mod remember;
pub mod session;
pub mod store;

pub use error::{Error, Result};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
