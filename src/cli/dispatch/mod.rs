//! Maps validated CLI matches to an [`Action`].

use crate::cli::actions::{alerts, remember, Action};
use crate::cli::commands::ARG_STORE;
use crate::cli::globals::GlobalArgs;
use crate::session::Role;
use anyhow::{bail, Context, Result};

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or the subcommand is unknown.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let globals = GlobalArgs::new(
        matches
            .get_one::<String>(ARG_STORE)
            .context("missing required argument: --store")?,
    );

    match matches.subcommand() {
        Some(("remember", sub_m)) => {
            let operation = match sub_m.subcommand() {
                Some(("show", _)) => remember::Operation::Show,
                Some(("save", save_m)) => remember::Operation::Save {
                    email: save_m
                        .get_one::<String>("email")
                        .cloned()
                        .context("missing required argument: <email>")?,
                },
                Some(("clear", _)) => remember::Operation::Clear,
                _ => bail!("unknown remember subcommand"),
            };
            Ok(Action::Remember(remember::Args {
                store_path: globals.store_path,
                operation,
            }))
        }
        Some(("alerts", sub_m)) => {
            let role = sub_m
                .get_one::<String>("role")
                .map(|role| Role::from(role.clone()))
                .context("missing required argument: --role")?;
            Ok(Action::Alerts(alerts::Args {
                role,
                bell: sub_m.get_flag("bell"),
            }))
        }
        Some(("config", _)) => Ok(Action::Config),
        _ => bail!("unknown subcommand"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn remember_save_maps_to_action() -> Result<()> {
        temp_env::with_vars([("PETSHOP_STORE_PATH", None::<&str>)], || {
            let matches = commands::new().get_matches_from([
                "petshop-guard",
                "remember",
                "save",
                " owner@petshop.dev ",
            ]);
            match handler(&matches)? {
                Action::Remember(args) => {
                    assert_eq!(
                        args.store_path,
                        std::path::PathBuf::from(commands::DEFAULT_STORE_PATH)
                    );
                    assert_eq!(
                        args.operation,
                        remember::Operation::Save {
                            email: "owner@petshop.dev".to_string()
                        }
                    );
                }
                other => bail!("unexpected action {other:?}"),
            }
            Ok(())
        })
    }

    #[test]
    fn alerts_role_defaults_to_admin() -> Result<()> {
        temp_env::with_vars([("PETSHOP_ROLE", None::<&str>)], || {
            let matches =
                commands::new().get_matches_from(["petshop-guard", "alerts", "--bell"]);
            match handler(&matches)? {
                Action::Alerts(args) => {
                    assert_eq!(args.role, Role::Admin);
                    assert!(args.bell);
                }
                other => bail!("unexpected action {other:?}"),
            }
            Ok(())
        })
    }

    #[test]
    fn alerts_role_from_env() -> Result<()> {
        temp_env::with_vars([("PETSHOP_ROLE", Some("professional"))], || {
            let matches = commands::new().get_matches_from(["petshop-guard", "alerts"]);
            match handler(&matches)? {
                Action::Alerts(args) => assert_eq!(args.role, Role::Professional),
                other => bail!("unexpected action {other:?}"),
            }
            Ok(())
        })
    }
}
