//! Network quiescence tracking for a browser page.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{Instant, error::Elapsed};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// In-flight requests of one page, keyed by CDP request id.
#[derive(Debug)]
pub struct Activity {
    in_flight: HashSet<String>,
    last_change: Instant,
}

impl Activity {
    pub fn new(now: Instant) -> Self {
        Self {
            in_flight: HashSet::new(),
            last_change: now,
        }
    }

    pub fn started(&mut self, request_id: &str, now: Instant) {
        self.in_flight.insert(request_id.to_string());
        self.last_change = now;
    }

    pub fn finished(&mut self, request_id: &str, now: Instant) {
        if self.in_flight.remove(request_id) {
            self.last_change = now;
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_change = now;
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Idle once nothing is in flight and nothing has changed for `window`.
    pub fn is_idle(&self, window: Duration, now: Instant) -> bool {
        self.in_flight.is_empty() && now.saturating_duration_since(self.last_change) >= window
    }
}

/// Follows request start/finish events on a page. The listener tasks stop
/// when the monitor is dropped.
pub struct NetworkMonitor {
    activity: Arc<Mutex<Activity>>,
    listeners: Vec<JoinHandle<()>>,
}

impl NetworkMonitor {
    pub async fn attach(page: &Page) -> Result<Self, CdpError> {
        let activity = Arc::new(Mutex::new(Activity::new(Instant::now())));

        let mut sent = page.event_listener::<EventRequestWillBeSent>().await?;
        let mut finished = page.event_listener::<EventLoadingFinished>().await?;
        let mut failed = page.event_listener::<EventLoadingFailed>().await?;

        let started_activity = Arc::clone(&activity);
        let finished_activity = Arc::clone(&activity);
        let failed_activity = Arc::clone(&activity);

        let listeners = vec![
            tokio::spawn(async move {
                while let Some(event) = sent.next().await {
                    lock(&started_activity).started(event.request_id.inner(), Instant::now());
                }
            }),
            tokio::spawn(async move {
                while let Some(event) = finished.next().await {
                    lock(&finished_activity).finished(event.request_id.inner(), Instant::now());
                }
            }),
            tokio::spawn(async move {
                while let Some(event) = failed.next().await {
                    lock(&failed_activity).finished(event.request_id.inner(), Instant::now());
                }
            }),
        ];

        Ok(Self {
            activity,
            listeners,
        })
    }

    /// Waits until the page has had no network activity for `window`, giving
    /// up after `timeout`. The clock restarts on entry so that a request about
    /// to be issued (a form submit, a redirect) is not mistaken for silence.
    pub async fn wait_for_idle(&self, window: Duration, timeout: Duration) -> Result<(), Elapsed> {
        wait_until_idle(&self.activity, window, timeout).await
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.activity).in_flight()
    }

    /// A monitor fed by hand instead of by page events.
    #[cfg(test)]
    pub(crate) fn detached(activity: Activity) -> Self {
        Self {
            activity: Arc::new(Mutex::new(activity)),
            listeners: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn record_started(&self, request_id: &str) {
        lock(&self.activity).started(request_id, Instant::now());
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        for listener in &self.listeners {
            listener.abort();
        }
    }
}

async fn wait_until_idle(
    activity: &Mutex<Activity>,
    window: Duration,
    timeout: Duration,
) -> Result<(), Elapsed> {
    lock(activity).touch(Instant::now());
    tokio::time::timeout(timeout, async {
        loop {
            let (idle, in_flight) = {
                let guard = lock(activity);
                (guard.is_idle(window, Instant::now()), guard.in_flight())
            };
            if idle {
                return;
            }
            log::trace!("Waiting for network idle, {} request(s) in flight", in_flight);
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await
}

fn lock(activity: &Mutex<Activity>) -> MutexGuard<'_, Activity> {
    activity.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(500);

    #[test]
    fn test_activity_idle_after_window() {
        let start = Instant::now();
        let activity = Activity::new(start);

        assert!(!activity.is_idle(WINDOW, start));
        assert!(activity.is_idle(WINDOW, start + WINDOW));
    }

    #[test]
    fn test_activity_busy_while_in_flight() {
        let start = Instant::now();
        let mut activity = Activity::new(start);

        activity.started("1", start);
        activity.started("2", start);
        assert_eq!(activity.in_flight(), 2);
        assert!(!activity.is_idle(WINDOW, start + WINDOW * 10));

        activity.finished("1", start + WINDOW);
        assert!(!activity.is_idle(WINDOW, start + WINDOW * 10));

        activity.finished("2", start + WINDOW * 2);
        assert!(!activity.is_idle(WINDOW, start + WINDOW * 2));
        assert!(activity.is_idle(WINDOW, start + WINDOW * 3));
    }

    #[test]
    fn test_activity_redirect_reuses_request_id() {
        let start = Instant::now();
        let mut activity = Activity::new(start);

        activity.started("7", start);
        activity.started("7", start);
        activity.finished("7", start);
        assert_eq!(activity.in_flight(), 0);

        activity.finished("unknown", start + WINDOW * 4);
        assert!(activity.is_idle(WINDOW, start + WINDOW));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_idle_returns_after_window() {
        let activity = Mutex::new(Activity::new(Instant::now()));
        let started = Instant::now();

        wait_until_idle(&activity, WINDOW, Duration::from_secs(5))
            .await
            .expect("Quiet network should settle");

        assert!(started.elapsed() >= WINDOW);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_idle_times_out_with_request_in_flight() {
        let activity = Mutex::new(Activity::new(Instant::now()));
        lock(&activity).started("hanging", Instant::now());

        let result = wait_until_idle(&activity, WINDOW, Duration::from_secs(5)).await;
        assert!(result.is_err(), "Hanging request must not count as idle");
    }
}
