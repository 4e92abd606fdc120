//! Toast sink abstraction. Delivery is fire-and-forget: callers never wait for
//! acknowledgement and a sink must not block.

use std::time::Duration;
use tracing::{info, warn};

/// Visual styling of a toast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastVariant {
    Default,
    Destructive,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub variant: ToastVariant,
    /// `None` leaves the duration to the sink's default.
    pub duration: Option<Duration>,
}

impl Toast {
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: ToastVariant::Default,
            duration: None,
        }
    }

    #[must_use]
    pub fn destructive(mut self) -> Self {
        self.variant = ToastVariant::Destructive;
        self
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Toast delivery abstraction.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

impl<F> Notifier for F
where
    F: Fn(Toast) + Send + Sync,
{
    fn notify(&self, toast: Toast) {
        self(toast);
    }
}

/// Sink that only logs. Used when no UI is attached.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, toast: Toast) {
        match toast.variant {
            ToastVariant::Destructive => warn!(
                title = %toast.title,
                description = %toast.description,
                "toast"
            ),
            ToastVariant::Default => info!(
                title = %toast.title,
                description = %toast.description,
                "toast"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn builder_sets_variant_and_duration() {
        let toast = Toast::new("Alert", "Something happened")
            .destructive()
            .with_duration(Duration::from_secs(10));

        assert_eq!(toast.variant, ToastVariant::Destructive);
        assert_eq!(toast.duration, Some(Duration::from_secs(10)));
    }

    #[test]
    fn closures_are_notifiers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |toast: Toast| seen.lock().unwrap().push(toast.title)
        };

        sink.notify(Toast::new("one", ""));
        LogNotifier.notify(Toast::new("logged", ""));

        assert_eq!(*seen.lock().unwrap(), vec!["one".to_string()]);
    }
}
