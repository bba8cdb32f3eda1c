use crate::activity_api::ActivityTracker;
use crate::clock::Clock;
use crate::error::AppError;
use crate::notify::Notifier;
use crate::storage::ActivityStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub type SharedNotifier = Arc<dyn Notifier + Send + Sync>;

/// What one monitor tick observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub transitioned: Vec<String>,
    pub escalated: Vec<String>,
    pub alerted: bool,
}

/// Periodic overdue check owned by the host. The first tick runs immediately.
pub struct OverdueMonitor;

pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    reports: watch::Receiver<TickReport>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Report of the most recent tick.
    pub fn latest(&self) -> TickReport {
        self.reports.borrow().clone()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "overdue monitor task ended abnormally");
        }
    }
}

impl OverdueMonitor {
    /// `alert_restriction` is true only when a supervisor owns the watch;
    /// employees still get per-activity overdue notifications.
    pub fn spawn<S, C>(
        tracker: Arc<ActivityTracker<S, C>>,
        notifier: SharedNotifier,
        period: Duration,
        alert_restriction: bool,
    ) -> MonitorHandle
    where
        S: ActivityStore + Send + Sync + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let (report_tx, reports) = watch::channel(TickReport::default());

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_escalated: Vec<String> = Vec::new();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let tracker = Arc::clone(&tracker);
                        let notifier = Arc::clone(&notifier);
                        let previous = last_escalated.clone();
                        let outcome = tokio::task::spawn_blocking(move || {
                            run_tick(&*tracker, notifier.as_ref(), &previous, alert_restriction)
                        })
                        .await;

                        match outcome {
                            Ok(Ok(report)) => {
                                last_escalated = report.escalated.clone();
                                let _ = report_tx.send(report);
                            }
                            Ok(Err(err)) => {
                                tracing::warn!(error = %err, "overdue check failed");
                            }
                            Err(err) => {
                                tracing::warn!(error = %err, "overdue check panicked");
                            }
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("overdue monitor stopped");
        });

        MonitorHandle {
            shutdown,
            reports,
            task,
        }
    }
}

/// One check: transition due activities, notify each, and alert supervisors
/// when the escalated set is non-empty and differs from the previous tick.
pub fn run_tick<S: ActivityStore, C: Clock>(
    tracker: &ActivityTracker<S, C>,
    notifier: &(dyn Notifier + Send + Sync),
    previous_escalated: &[String],
    alert_restriction: bool,
) -> Result<TickReport, AppError> {
    let transitioned = tracker.check_overdue()?;
    for activity in &transitioned {
        if let Err(err) = notifier.notify(activity) {
            tracing::warn!(activity_id = %activity.id, error = %err, "overdue notification failed");
        }
    }

    let restriction = tracker.restriction()?;
    let escalated: Vec<String> = restriction
        .escalated
        .iter()
        .map(|activity| activity.id.clone())
        .collect();

    let alerted = alert_restriction && restriction.blocked && escalated != previous_escalated;
    if alerted {
        tracing::warn!(
            escalated = escalated.len(),
            "supervisors are blocked from adding activities"
        );
        if let Err(err) = notifier.notify_restriction(&restriction.escalated) {
            tracing::warn!(error = %err, "restriction alert failed");
        }
    }

    Ok(TickReport {
        transitioned: transitioned
            .into_iter()
            .map(|activity| activity.id)
            .collect(),
        escalated,
        alerted,
    })
}

#[cfg(test)]
mod tests {
    use super::{OverdueMonitor, SharedNotifier, run_tick};
    use crate::activity_api::ActivityTracker;
    use crate::clock::FixedClock;
    use crate::error::AppError;
    use crate::model::{Activity, ActivityStatus, Importance};
    use crate::notify::Notifier;
    use crate::policy::AccessPolicy;
    use crate::storage::{ActivityStore, MemoryStore};
    use crate::suspension::SuspensionEngine;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use time::macros::datetime;

    #[derive(Default)]
    struct RecordingNotifier {
        overdue: Mutex<Vec<String>>,
        restrictions: Mutex<Vec<usize>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, activity: &Activity) -> Result<(), AppError> {
            self.overdue.lock().unwrap().push(activity.id.clone());
            Ok(())
        }

        fn notify_restriction(&self, escalated: &[Activity]) -> Result<(), AppError> {
            self.restrictions.lock().unwrap().push(escalated.len());
            Ok(())
        }
    }

    fn activity(id: &str, date: &str) -> Activity {
        Activity {
            id: id.to_string(),
            title: id.to_string(),
            notes: None,
            assigned_unit: "finance".to_string(),
            assigned_user: "user1".to_string(),
            scheduled_date: Some(date.to_string()),
            scheduled_time: None,
            importance: Importance::Normal,
            status: ActivityStatus::InProgress,
            pending_since: None,
            resolved_at: None,
            created_by: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn tracker(
        activities: Vec<Activity>,
    ) -> (
        Arc<ActivityTracker<MemoryStore, Arc<FixedClock>>>,
        Arc<FixedClock>,
    ) {
        let clock = Arc::new(FixedClock::new(datetime!(2025-03-10 08:00 UTC)));
        let tracker = ActivityTracker::new(
            MemoryStore::new(activities),
            Arc::clone(&clock),
            AccessPolicy::default(),
            SuspensionEngine::default(),
        );
        (Arc::new(tracker), clock)
    }

    #[test]
    fn run_tick_alerts_only_when_escalated_set_changes() {
        let (tracker, clock) = tracker(vec![activity("a", "2025-03-09")]);
        let notifier = RecordingNotifier::default();

        let first = run_tick(tracker.as_ref(), &notifier, &[], true).unwrap();
        assert_eq!(first.transitioned, vec!["a"]);
        assert!(first.escalated.is_empty());
        assert!(!first.alerted);

        clock.advance(time::Duration::days(3));
        let second = run_tick(tracker.as_ref(), &notifier, &first.escalated, true).unwrap();
        assert!(second.transitioned.is_empty());
        assert_eq!(second.escalated, vec!["a"]);
        assert!(second.alerted);

        let third = run_tick(tracker.as_ref(), &notifier, &second.escalated, true).unwrap();
        assert!(!third.alerted);

        assert_eq!(*notifier.overdue.lock().unwrap(), vec!["a"]);
        assert_eq!(*notifier.restrictions.lock().unwrap(), vec![1]);
    }

    #[test]
    fn run_tick_skips_restriction_alert_for_employees() {
        let (tracker, clock) = tracker(vec![activity("a", "2025-03-09")]);
        let notifier = RecordingNotifier::default();

        run_tick(tracker.as_ref(), &notifier, &[], false).unwrap();
        clock.advance(time::Duration::days(3));
        let report = run_tick(tracker.as_ref(), &notifier, &[], false).unwrap();

        assert_eq!(report.escalated, vec!["a"]);
        assert!(!report.alerted);
        assert_eq!(*notifier.overdue.lock().unwrap(), vec!["a"]);
        assert!(notifier.restrictions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn monitor_checks_immediately_and_stops_on_shutdown() {
        let (tracker, _clock) = tracker(vec![
            activity("a", "2025-03-09"),
            activity("b", "2025-03-11"),
        ]);
        let recorder = Arc::new(RecordingNotifier::default());
        let notifier: SharedNotifier = recorder.clone();

        let handle = OverdueMonitor::spawn(
            Arc::clone(&tracker),
            notifier,
            Duration::from_millis(10),
            true,
        );
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.shutdown().await;

        let stored = tracker.store().load().unwrap();
        assert_eq!(stored[0].status, ActivityStatus::Overdue);
        assert_eq!(stored[1].status, ActivityStatus::InProgress);
        assert_eq!(*recorder.overdue.lock().unwrap(), vec!["a"]);
        assert!(recorder.restrictions.lock().unwrap().is_empty());
    }
}
