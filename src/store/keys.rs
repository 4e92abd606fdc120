//! Storage key names. These are persisted in users' browsers and on disk, so
//! renaming any of them orphans existing preferences.

/// Session scope. Present and equal to [`TRUE_SENTINEL`] while settings are unlocked.
pub const SETTINGS_UNLOCKED: &str = "settings_unlocked";

/// Persistent scope. Remember-me flag.
pub const REMEMBER_ME: &str = "rememberMe";

/// Persistent scope. E-mail saved by remember-me.
pub const SAVED_EMAIL: &str = "savedEmail";

pub const TRUE_SENTINEL: &str = "true";
