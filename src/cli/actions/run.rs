use crate::cli::actions::{alerts, config, remember, Action};
use anyhow::Result;

/// Execute the provided action.
// This is the single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Remember(args) => remember::execute(&args),
        Action::Alerts(args) => alerts::execute(args).await,
        Action::Config => config::execute(),
    }
}
