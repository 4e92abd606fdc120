use crate::remember::{RememberMePreference, RememberMeStore};
use crate::store::SettingsStore;
use anyhow::{Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Show,
    Save { email: String },
    Clear,
}

#[derive(Debug, Clone)]
pub struct Args {
    pub store_path: PathBuf,
    pub operation: Operation,
}

/// Applies the operation and returns the resulting preference.
///
/// # Errors
/// Returns an error if the store file cannot be read or written.
pub fn apply(args: &Args) -> Result<RememberMePreference> {
    let remember = RememberMeStore::new(SettingsStore::with_file(&args.store_path));
    let context = || format!("store {}", args.store_path.display());

    match &args.operation {
        Operation::Show => remember.load().with_context(context),
        Operation::Save { email } => remember.save(true, Some(email)).with_context(context),
        Operation::Clear => {
            remember.clear().with_context(context)?;
            Ok(RememberMePreference::default())
        }
    }
}

/// # Errors
/// Returns an error if the store cannot be used or the output cannot be encoded.
pub fn execute(args: &Args) -> Result<()> {
    let preference = apply(args)?;
    println!("{}", serde_json::to_string_pretty(&preference)?);
    Ok(())
}
