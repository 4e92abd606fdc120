use crate::config::BackendConfig;
use crate::GIT_COMMIT_HASH;
use anyhow::Result;
use tracing::warn;

/// Prints the backend configuration status, or the inline notice shown to users.
///
/// # Errors
/// Never fails today; kept fallible like the other actions.
pub fn execute() -> Result<()> {
    let config = BackendConfig::load();

    println!(
        "{} {} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        GIT_COMMIT_HASH
    );

    match config.notice() {
        Some(notice) => {
            warn!("backend configuration incomplete");
            println!("{notice}");
        }
        None => {
            let url = config.url.as_ref().map_or("", |url| url.as_str());
            println!("backend: {url} (configured)");
        }
    }

    Ok(())
}
