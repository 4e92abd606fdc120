use crate::alerts::{
    pump_json_lines, AlertSubscriber, AudioCue, BroadcastAlertFeed, SilentAudio, TerminalBell,
};
use crate::notify::{Notifier, Toast, ToastVariant};
use crate::session::{Role, SessionRoles};
use anyhow::{bail, Context, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::time::{sleep, timeout};
use tracing::info;

/// How long to wait for the subscriber to come up or to drain the feed.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Args {
    pub role: Role,
    pub bell: bool,
}

#[must_use]
pub fn format_toast(toast: &Toast) -> String {
    let label = match toast.variant {
        ToastVariant::Destructive => "ALERT",
        ToastVariant::Default => "info",
    };
    format!("[{label}] {}: {}", toast.title, toast.description)
}

/// Runs the admin alert subscriber over stdin until EOF.
///
/// # Errors
/// Returns an error if stdin cannot be read or the subscriber does not start in time.
pub async fn execute(args: Args) -> Result<()> {
    let roles = SessionRoles::new();
    roles.set_role(args.role.clone());

    let feed = BroadcastAlertFeed::new();
    let shown = Arc::new(AtomicUsize::new(0));
    let notifier: Arc<dyn Notifier> = {
        let shown = Arc::clone(&shown);
        Arc::new(move |toast: Toast| {
            println!("{}", format_toast(&toast));
            shown.fetch_add(1, Ordering::AcqRel);
        })
    };
    let audio: Arc<dyn AudioCue> = if args.bell {
        Arc::new(TerminalBell)
    } else {
        Arc::new(SilentAudio)
    };

    let subscriber =
        AlertSubscriber::spawn(roles.subscribe(), Arc::new(feed.clone()), notifier, audio);

    let is_admin = args.role.is_admin();
    if is_admin {
        timeout(SETTLE_TIMEOUT, async {
            while feed.live_subscriptions() == 0 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .context("admin alert subscription did not start")?;
    } else {
        info!(role = %args.role, "role is not admin, alerts will be ignored");
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let published = pump_json_lines(&feed, stdin)
        .await
        .context("failed to read alerts from stdin")?;

    if is_admin {
        let drained = timeout(SETTLE_TIMEOUT, async {
            while shown.load(Ordering::Acquire) < published {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        if drained.is_err() {
            subscriber.shutdown().await;
            bail!(
                "only {} of {published} alerts were shown",
                shown.load(Ordering::Acquire)
            );
        }
    }

    subscriber.shutdown().await;
    info!(published, "alert feed finished");
    Ok(())
}
