//! Realtime admin alert subscriber.
//!
//! Flow Overview:
//! 1) A task watches the session role. While it is `admin` the task holds
//!    exactly one [`AlertSubscription`]; any other role (or sign-out) drops it.
//! 2) Each received alert becomes a toast: `critical` is destructive, anything
//!    else default, always shown for [`ALERT_TOAST_DURATION`].
//! 3) `critical` and `high` alerts also play an audio cue on a detached
//!    blocking task. Playback failures (autoplay policy, no device) are logged,
//!    never propagated.
//!
//! Subscribe failures are logged and the task waits for the next role change.

pub mod feed;

pub use self::feed::{
    parse_alert_line, pump_json_lines, AlertFeed, AlertSubscription, BroadcastAlertFeed,
    SUBSCRIPTION_BUFFER,
};

use crate::notify::{Notifier, Toast};
use crate::session::Role;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const ALERT_TOAST_DURATION: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Critical,
    High,
    /// Any other level, kept verbatim.
    Other(String),
}

impl Severity {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Other(value) => value,
        }
    }

    #[must_use]
    pub fn plays_sound(&self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            _ => Severity::Other(value),
        }
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        severity.as_str().to_string()
    }
}

/// Newly inserted admin alert row. Consumed transiently, never stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAlertEvent {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl AdminAlertEvent {
    #[must_use]
    pub fn toast(&self) -> Toast {
        let toast = Toast::new(&self.title, &self.message).with_duration(ALERT_TOAST_DURATION);
        match self.severity {
            Severity::Critical => toast.destructive(),
            _ => toast,
        }
    }
}

/// Short audible cue for urgent alerts.
pub trait AudioCue: Send + Sync {
    /// Plays the cue. May block briefly; callers run it off the event path.
    ///
    /// # Errors
    /// Returns an error if the cue cannot be played.
    fn play(&self) -> Result<()>;
}

/// Does nothing. For sessions without audio output.
#[derive(Clone, Debug, Default)]
pub struct SilentAudio;

impl AudioCue for SilentAudio {
    fn play(&self) -> Result<()> {
        Ok(())
    }
}

/// Rings the terminal bell on stderr.
#[derive(Clone, Debug, Default)]
pub struct TerminalBell;

impl AudioCue for TerminalBell {
    fn play(&self) -> Result<()> {
        let mut stderr = std::io::stderr().lock();
        stderr
            .write_all(b"\x07")
            .and_then(|()| stderr.flush())
            .map_err(|err| Error::Audio(err.to_string()))
    }
}

/// Handle to the subscriber task. Dropping it stops the task and closes any
/// live subscription.
#[derive(Debug)]
pub struct AlertSubscriber {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl AlertSubscriber {
    /// Spawns the subscriber task on the current tokio runtime.
    pub fn spawn(
        roles: watch::Receiver<Option<Role>>,
        feed: Arc<dyn AlertFeed>,
        notifier: Arc<dyn Notifier>,
        audio: Arc<dyn AudioCue>,
    ) -> Self {
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(roles, feed, notifier, audio, shutdown_rx));
        Self {
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }

    /// Stops the task and waits until its subscription is closed.
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("alert subscriber task failed: {err}");
            }
        }
    }
}

impl Drop for AlertSubscriber {
    fn drop(&mut self) {
        // Dropping the sender wakes the task, which drops its subscription.
        self.shutdown.take();
    }
}

enum Wake {
    Shutdown,
    RoleChanged,
    Alert(Option<AdminAlertEvent>),
}

async fn next_alert(subscription: Option<&mut AlertSubscription>) -> Option<AdminAlertEvent> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

async fn run(
    mut roles: watch::Receiver<Option<Role>>,
    feed: Arc<dyn AlertFeed>,
    notifier: Arc<dyn Notifier>,
    audio: Arc<dyn AudioCue>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut subscription: Option<AlertSubscription> = None;
    let mut want_subscription = true;

    loop {
        if want_subscription {
            let is_admin = roles.borrow_and_update().as_ref().is_some_and(Role::is_admin);
            match (is_admin, subscription.is_some()) {
                (true, false) => match feed.subscribe() {
                    Ok(opened) => {
                        info!(subscription = %opened.id(), "subscribed to admin alerts");
                        subscription = Some(opened);
                    }
                    Err(err) => warn!("admin alert subscription failed: {err}"),
                },
                (false, true) => {
                    // Synchronous teardown before anything else can run.
                    subscription = None;
                    info!("unsubscribed from admin alerts");
                }
                _ => {}
            }
        }

        let wake = tokio::select! {
            _ = &mut shutdown => Wake::Shutdown,
            changed = roles.changed() => match changed {
                Ok(()) => Wake::RoleChanged,
                // Session provider gone.
                Err(_) => Wake::Shutdown,
            },
            alert = next_alert(subscription.as_mut()) => Wake::Alert(alert),
        };

        match wake {
            Wake::Shutdown => break,
            Wake::RoleChanged => want_subscription = true,
            Wake::Alert(Some(alert)) => {
                want_subscription = false;
                dispatch(&alert, notifier.as_ref(), &audio);
            }
            Wake::Alert(None) => {
                warn!("admin alert feed closed the subscription");
                subscription = None;
                // Resubscribe only on the next role change.
                want_subscription = false;
            }
        }
    }

    if subscription.take().is_some() {
        info!("unsubscribed from admin alerts");
    }
    debug!("alert subscriber stopped");
}

/// Shows the toast and, for urgent alerts, fires the audio cue without waiting on it.
fn dispatch(alert: &AdminAlertEvent, notifier: &dyn Notifier, audio: &Arc<dyn AudioCue>) {
    debug!(title = %alert.title, severity = %alert.severity.as_str(), "admin alert received");
    notifier.notify(alert.toast());

    if alert.severity.plays_sound() {
        let audio = Arc::clone(audio);
        tokio::task::spawn_blocking(move || {
            if let Err(err) = audio.play() {
                warn!("could not play alert sound: {err}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ToastVariant;
    use crate::session::SessionRoles;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::{sleep, Instant};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Toast>>);

    impl Notifier for Recorder {
        fn notify(&self, toast: Toast) {
            self.0.lock().unwrap().push(toast);
        }
    }

    impl Recorder {
        fn len(&self) -> usize {
            self.0.lock().unwrap().len()
        }
    }

    #[derive(Default)]
    struct CountingAudio {
        plays: AtomicUsize,
        fail: bool,
    }

    impl AudioCue for CountingAudio {
        fn play(&self) -> Result<()> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Audio("autoplay blocked".to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RefusingFeed {
        attempts: AtomicUsize,
    }

    impl AlertFeed for RefusingFeed {
        fn subscribe(&self) -> Result<AlertSubscription> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::Subscribe("channel timed out".to_string()))
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            sleep(Duration::from_millis(5)).await;
        }
    }

    fn alert(severity: &str) -> AdminAlertEvent {
        AdminAlertEvent {
            id: None,
            title: format!("{severity} alert"),
            message: "Unit 7 reported a failure".to_string(),
            severity: Severity::from(severity.to_string()),
            created_at: None,
        }
    }

    #[test]
    fn toast_styling_follows_severity() {
        let critical = alert("critical").toast();
        assert_eq!(critical.variant, ToastVariant::Destructive);
        assert_eq!(critical.duration, Some(ALERT_TOAST_DURATION));

        assert_eq!(alert("high").toast().variant, ToastVariant::Default);
        assert_eq!(alert("medium").toast().variant, ToastVariant::Default);
    }

    #[test]
    fn only_critical_and_high_play_sound() {
        assert!(Severity::Critical.plays_sound());
        assert!(Severity::from("HIGH".to_string()).plays_sound());
        assert!(!Severity::Other("low".to_string()).plays_sound());
    }

    #[tokio::test]
    async fn inactive_until_admin() {
        let roles = SessionRoles::new();
        let feed = BroadcastAlertFeed::new();
        let subscriber = AlertSubscriber::spawn(
            roles.subscribe(),
            Arc::new(feed.clone()),
            Arc::new(Recorder::default()),
            Arc::new(SilentAudio),
        );

        roles.set_role(Role::Owner);
        sleep(Duration::from_millis(20)).await;
        assert_eq!(feed.opened(), 0);

        roles.set_role(Role::Admin);
        wait_until(|| feed.live_subscriptions() == 1).await;

        subscriber.shutdown().await;
        assert_eq!(feed.live_subscriptions(), 0);
        assert_eq!((feed.opened(), feed.closed()), (1, 1));
    }

    #[tokio::test]
    async fn role_toggles_never_leak_subscriptions() {
        let roles = SessionRoles::new();
        let feed = BroadcastAlertFeed::new();
        let _subscriber = AlertSubscriber::spawn(
            roles.subscribe(),
            Arc::new(feed.clone()),
            Arc::new(Recorder::default()),
            Arc::new(SilentAudio),
        );

        for round in 1..=5 {
            roles.set_role(Role::Admin);
            wait_until(|| feed.opened() == round).await;
            assert_eq!(feed.live_subscriptions(), 1);

            roles.set_role(Role::Client);
            wait_until(|| feed.closed() == round).await;
            assert_eq!(feed.live_subscriptions(), 0);
        }
        assert_eq!((feed.opened(), feed.closed()), (5, 5));
    }

    #[tokio::test]
    async fn alerts_become_toasts_and_sounds() {
        let roles = SessionRoles::new();
        roles.set_role(Role::Admin);
        let feed = BroadcastAlertFeed::new();
        let recorder = Arc::new(Recorder::default());
        let audio = Arc::new(CountingAudio {
            fail: true,
            ..CountingAudio::default()
        });
        let subscriber = AlertSubscriber::spawn(
            roles.subscribe(),
            Arc::new(feed.clone()),
            recorder.clone(),
            audio.clone(),
        );
        wait_until(|| feed.live_subscriptions() == 1).await;

        feed.publish(&alert("critical")).await;
        feed.publish(&alert("high")).await;
        feed.publish(&alert("low")).await;
        // Duplicates are not deduplicated.
        feed.publish(&alert("low")).await;

        wait_until(|| recorder.len() == 4).await;
        wait_until(|| audio.plays.load(Ordering::SeqCst) == 2).await;

        let toasts = recorder.0.lock().unwrap().clone();
        assert_eq!(toasts[0].variant, ToastVariant::Destructive);
        assert_eq!(toasts[1].variant, ToastVariant::Default);
        assert_eq!(toasts[2], toasts[3]);

        // A failing cue did not stop the subscriber.
        feed.publish(&alert("critical")).await;
        wait_until(|| recorder.len() == 5).await;
        subscriber.shutdown().await;
    }

    #[tokio::test]
    async fn subscribe_failure_is_not_fatal() {
        let roles = SessionRoles::new();
        roles.set_role(Role::Admin);
        let feed = Arc::new(RefusingFeed::default());
        let subscriber = AlertSubscriber::spawn(
            roles.subscribe(),
            feed.clone(),
            Arc::new(Recorder::default()),
            Arc::new(SilentAudio),
        );
        wait_until(|| feed.attempts.load(Ordering::SeqCst) == 1).await;

        // No retry loop while the role is unchanged.
        sleep(Duration::from_millis(20)).await;
        assert_eq!(feed.attempts.load(Ordering::SeqCst), 1);

        roles.set_role(Role::Client);
        sleep(Duration::from_millis(20)).await;
        assert_eq!(feed.attempts.load(Ordering::SeqCst), 1);

        roles.set_role(Role::Admin);
        wait_until(|| feed.attempts.load(Ordering::SeqCst) == 2).await;

        let stopped = tokio::time::timeout(Duration::from_secs(1), subscriber.shutdown()).await;
        assert!(stopped.is_ok(), "subscriber did not stop after a failed subscribe");
    }

    #[tokio::test]
    async fn dropping_the_handle_closes_the_subscription() {
        let roles = SessionRoles::new();
        roles.set_role(Role::Admin);
        let feed = BroadcastAlertFeed::new();
        let subscriber = AlertSubscriber::spawn(
            roles.subscribe(),
            Arc::new(feed.clone()),
            Arc::new(Recorder::default()),
            Arc::new(SilentAudio),
        );
        wait_until(|| feed.live_subscriptions() == 1).await;

        drop(subscriber);
        wait_until(|| feed.closed() == 1).await;
        assert_eq!(feed.live_subscriptions(), 0);
    }
}
