//! The polling loop: fetch, evaluate, notify, sleep.

use super::alert::{AlertState, AlertZone, ZoneTransition};
use super::clock::{Clock, SystemClock};
use super::reminder::ReminderTimer;
use crate::config::MonitorConfig;
use crate::exchange::{total_unrealized_pnl, FetchError, Position, PositionSource};
use crate::notify::Notifier;
use crate::utils::decimal::format_signed;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// What a single cycle observed and did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    /// `None` when positions could not be fetched
    pub total_pnl: Option<Decimal>,
    pub open_positions: usize,
    pub transition: Option<ZoneTransition>,
    /// A reminder send was attempted this cycle
    pub reminder_sent: bool,
}

/// Owns the alert state machine and reminder timer for the process lifetime.
///
/// One cycle runs to completion before the next starts; nothing else
/// touches the state, so no locking is involved.
pub struct MonitorLoop<S, N, C = SystemClock> {
    config: MonitorConfig,
    source: S,
    notifier: N,
    clock: C,
    alert_state: AlertState,
    reminder: ReminderTimer,
    cycle_count: u64,
}

impl<S, N> MonitorLoop<S, N, SystemClock>
where
    S: PositionSource,
    N: Notifier,
{
    pub fn new(config: MonitorConfig, source: S, notifier: N) -> Self {
        Self::with_clock(config, source, notifier, SystemClock)
    }
}

impl<S, N, C> MonitorLoop<S, N, C>
where
    S: PositionSource,
    N: Notifier,
    C: Clock,
{
    pub fn with_clock(config: MonitorConfig, source: S, notifier: N, clock: C) -> Self {
        let reminder = ReminderTimer::new(config.reminder_interval(), clock.now());

        Self {
            config,
            source,
            notifier,
            clock,
            alert_state: AlertState::new(),
            reminder,
            cycle_count: 0,
        }
    }

    pub fn zone(&self) -> AlertZone {
        self.alert_state.zone()
    }

    pub fn next_reminder_at(&self) -> Option<DateTime<Utc>> {
        self.reminder.next_at()
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Run one cycle: reminder check, fetch, threshold evaluation.
    ///
    /// Unavailable positions skip evaluation and still return `Ok`. An
    /// undecodable exchange response is returned as an error for the loop
    /// boundary to handle.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let started_at = self.clock.now();
        self.cycle_count += 1;

        let mut report = CycleReport {
            started_at,
            total_pnl: None,
            open_positions: 0,
            transition: None,
            reminder_sent: false,
        };

        if self.reminder.is_due(started_at) {
            if let Err(e) = self.notifier.send_reminder().await {
                debug!(error = %e, "Trade reminder not delivered");
            }
            report.reminder_sent = true;
            self.reminder.reschedule(self.clock.now());
            debug!(next_at = ?self.reminder.next_at(), "Next trade reminder scheduled");
        }

        let positions = match self.source.fetch_positions().await {
            Ok(positions) => positions,
            Err(FetchError::Unavailable {
                attempts,
                last_error,
            }) => {
                warn!(
                    attempts,
                    error = %last_error,
                    "⚠️  [FETCH] Positions unavailable, skipping evaluation this cycle"
                );
                return Ok(report);
            }
            Err(e) => return Err(e).context("Failed to read positions"),
        };

        let total_pnl = total_unrealized_pnl(&positions)
            .context("Total unrealized P&L does not fit in a decimal")?;
        info!(
            "📊 [PNL] Current Total Unrealized P&L: {} USDC (Markets: {})",
            format_signed(total_pnl, 2),
            positions.len()
        );
        report.total_pnl = Some(total_pnl);
        report.open_positions = positions.len();

        if let Some(transition) = self.alert_state.transition(
            total_pnl,
            self.config.upper_threshold,
            self.config.lower_threshold,
        ) {
            self.handle_transition(&transition, &positions).await;
            report.transition = Some(transition);
        }

        Ok(report)
    }

    async fn handle_transition(&mut self, transition: &ZoneTransition, positions: &[Position]) {
        let Some(threshold) = transition.threshold else {
            info!(
                from = %transition.previous,
                pnl = %transition.pnl,
                "✅ [ALERT] P&L back within thresholds"
            );
            return;
        };

        warn!(
            from = %transition.previous,
            to = %transition.current,
            pnl = %transition.pnl,
            threshold = %threshold,
            "🚨 [ALERT] P&L threshold crossed"
        );

        if let Err(e) = self
            .notifier
            .send_alert(transition.pnl, threshold, positions)
            .await
        {
            debug!(error = %e, "P&L alert not delivered");
        }

        if self.reminder.is_enabled() {
            self.reminder.reschedule(self.clock.now());
            info!(
                next_at = ?self.reminder.next_at(),
                "Trade reminder reset after alert"
            );
        }
    }

    /// Drive cycles until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// Each cycle is followed by a sleep that keeps the configured cadence;
    /// a failed cycle is followed by the error cooldown instead. Shutdown
    /// interrupts both the cycle and the sleep.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.poll_interval_secs,
            upper = %self.config.upper_threshold,
            lower = %self.config.lower_threshold,
            "🚀 Starting P&L monitor loop"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                outcome = self.run_cycle() => outcome,
            };

            let pause = match outcome {
                Ok(report) => {
                    let elapsed = (self.clock.now() - report.started_at)
                        .to_std()
                        .unwrap_or_default();
                    let pause = self.config.poll_interval().saturating_sub(elapsed);
                    debug!("Sleeping for {:.2}s", pause.as_secs_f64());
                    pause
                }
                Err(e) => {
                    error!(error = ?e, "❌ Error in monitor loop");
                    self.config.error_cooldown()
                }
            };

            if sleep_or_shutdown(pause, &mut shutdown).await {
                break;
            }
        }

        info!(cycles = self.cycle_count, "🛑 Monitor loop stopped");
    }
}

/// Sleep for `duration` unless shutdown arrives first. Returns true on shutdown.
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if duration.is_zero() {
        return *shutdown.borrow();
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.changed() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::mock::mock_position;
    use crate::exchange::{MockFetch, MockPositionSource};
    use crate::notify::{MockNotifier, NotifyError};
    use async_trait::async_trait;
    use chrono::{TimeDelta, TimeZone};
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

    impl ManualClock {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            )))
        }

        fn advance(&self, secs: i64) {
            *self.0.lock().unwrap() += TimeDelta::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Alert { total_pnl: Decimal, threshold: Decimal, markets: usize },
        Reminder,
    }

    /// Records sends; optionally advances the clock to simulate slow delivery.
    #[derive(Clone, Default)]
    struct RecordingNotifier {
        sent: Arc<Mutex<Vec<Sent>>>,
        slow: Option<(ManualClock, i64)>,
    }

    impl RecordingNotifier {
        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn alerts(&self) -> Vec<Sent> {
            self.sent()
                .into_iter()
                .filter(|s| matches!(s, Sent::Alert { .. }))
                .collect()
        }

        fn reminders(&self) -> usize {
            self.sent().iter().filter(|s| **s == Sent::Reminder).count()
        }

        fn record(&self, sent: Sent) {
            self.sent.lock().unwrap().push(sent);
            if let Some((clock, secs)) = &self.slow {
                clock.advance(*secs);
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_alert(
            &self,
            total_pnl: Decimal,
            threshold: Decimal,
            positions: &[Position],
        ) -> Result<(), NotifyError> {
            self.record(Sent::Alert {
                total_pnl,
                threshold,
                markets: positions.len(),
            });
            Ok(())
        }

        async fn send_reminder(&self) -> Result<(), NotifyError> {
            self.record(Sent::Reminder);
            Ok(())
        }
    }

    fn monitor_config(reminder_interval_secs: u64) -> MonitorConfig {
        MonitorConfig {
            poll_interval_secs: 60,
            upper_threshold: dec!(20),
            lower_threshold: dec!(-20),
            reminder_interval_secs,
            error_cooldown_secs: 5,
        }
    }

    fn monitor(
        pnls: &[Decimal],
        reminder_secs: u64,
    ) -> (
        MonitorLoop<MockPositionSource, RecordingNotifier, ManualClock>,
        RecordingNotifier,
        ManualClock,
    ) {
        let clock = ManualClock::new();
        let notifier = RecordingNotifier::default();
        let monitor = MonitorLoop::with_clock(
            monitor_config(reminder_secs),
            MockPositionSource::from_pnls(pnls),
            notifier.clone(),
            clock.clone(),
        );
        (monitor, notifier, clock)
    }

    #[tokio::test]
    async fn test_scenario_alerts_once_per_zone_entry() {
        let (mut monitor, notifier, clock) =
            monitor(&[dec!(5), dec!(25), dec!(22), dec!(-25), dec!(0)], 3600);

        let mut reports = Vec::new();
        for _ in 0..5 {
            reports.push(monitor.run_cycle().await.unwrap());
            clock.advance(60);
        }

        assert!(reports[0].transition.is_none());
        assert_eq!(
            reports[1].transition.as_ref().map(|t| t.current),
            Some(AlertZone::Above)
        );
        assert!(reports[2].transition.is_none());
        assert_eq!(
            reports[3].transition.as_ref().map(|t| (t.previous, t.current)),
            Some((AlertZone::Above, AlertZone::Below))
        );
        assert!(reports[4].transition.as_ref().unwrap().is_recovery());

        assert_eq!(
            notifier.alerts(),
            vec![
                Sent::Alert { total_pnl: dec!(25), threshold: dec!(20), markets: 1 },
                Sent::Alert { total_pnl: dec!(-25), threshold: dec!(-20), markets: 1 },
            ]
        );
        assert_eq!(monitor.zone(), AlertZone::Normal);
    }

    #[tokio::test]
    async fn test_recovery_does_not_touch_reminder() {
        let (mut monitor, _notifier, clock) = monitor(&[dec!(25), dec!(0)], 3600);

        monitor.run_cycle().await.unwrap();
        let after_alert = monitor.next_reminder_at();

        clock.advance(60);
        let report = monitor.run_cycle().await.unwrap();
        assert!(report.transition.unwrap().is_recovery());
        assert_eq!(monitor.next_reminder_at(), after_alert);
    }

    #[tokio::test]
    async fn test_steady_state_never_alerts() {
        let (mut monitor, notifier, clock) = monitor(&[dec!(5); 20], 0);

        for _ in 0..20 {
            let report = monitor.run_cycle().await.unwrap();
            assert_eq!(report.total_pnl, Some(dec!(5)));
            clock.advance(60);
        }

        assert!(notifier.sent().is_empty());
        assert_eq!(monitor.cycle_count(), 20);
    }

    #[tokio::test]
    async fn test_sustained_breach_alerts_once() {
        let (mut monitor, notifier, clock) = monitor(&[dec!(30); 8], 0);

        for _ in 0..8 {
            monitor.run_cycle().await.unwrap();
            clock.advance(60);
        }

        assert_eq!(notifier.alerts().len(), 1);
        assert_eq!(monitor.zone(), AlertZone::Above);
    }

    #[tokio::test]
    async fn test_recrossing_alerts_again() {
        let (mut monitor, notifier, clock) =
            monitor(&[dec!(0), dec!(21), dec!(3), dec!(21)], 0);

        for _ in 0..4 {
            monitor.run_cycle().await.unwrap();
            clock.advance(60);
        }

        assert_eq!(notifier.alerts().len(), 2);
    }

    #[tokio::test]
    async fn test_alert_resets_reminder_clock() {
        let (mut monitor, notifier, clock) = monitor(&[dec!(25), dec!(25), dec!(25)], 3600);
        let start = clock.now();
        assert_eq!(monitor.next_reminder_at(), Some(start + TimeDelta::seconds(3600)));

        // Alert at T, 100s before the reminder was due
        clock.advance(3500);
        let alert_at = clock.now();
        monitor.run_cycle().await.unwrap();
        assert_eq!(
            monitor.next_reminder_at(),
            Some(alert_at + TimeDelta::seconds(3600))
        );

        // The previously scheduled due time passes without a reminder
        clock.advance(100);
        assert!(!monitor.run_cycle().await.unwrap().reminder_sent);

        clock.advance(3500);
        assert!(monitor.run_cycle().await.unwrap().reminder_sent);
        assert_eq!(notifier.reminders(), 1);
        assert_eq!(notifier.alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_reminder_reschedules_from_fire_time() {
        let clock = ManualClock::new();
        let notifier = RecordingNotifier {
            slow: Some((clock.clone(), 8)),
            ..Default::default()
        };
        let mut monitor = MonitorLoop::with_clock(
            monitor_config(600),
            MockPositionSource::from_pnls(&[dec!(1), dec!(1)]),
            notifier.clone(),
            clock.clone(),
        );

        clock.advance(630);
        let report = monitor.run_cycle().await.unwrap();
        assert!(report.reminder_sent);
        // 630s start + 8s slow send, then +600
        assert_eq!(
            monitor.next_reminder_at(),
            Some(report.started_at + TimeDelta::seconds(608))
        );
        assert_eq!(notifier.reminders(), 1);
    }

    #[tokio::test]
    async fn test_disabled_reminder_never_fires() {
        let (mut monitor, notifier, clock) = monitor(&[dec!(1); 3], 0);
        assert_eq!(monitor.next_reminder_at(), None);

        for _ in 0..3 {
            clock.advance(86_400);
            assert!(!monitor.run_cycle().await.unwrap().reminder_sent);
        }
        assert_eq!(notifier.reminders(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_evaluation() {
        let source = MockPositionSource::from_pnls(&[dec!(25)]);
        source.push(MockFetch::Unavailable);
        source.push(MockFetch::Positions(Vec::new()));

        let clock = ManualClock::new();
        let notifier = RecordingNotifier::default();
        let mut monitor =
            MonitorLoop::with_clock(monitor_config(0), source, notifier.clone(), clock.clone());

        monitor.run_cycle().await.unwrap();
        assert_eq!(monitor.zone(), AlertZone::Above);

        let skipped = monitor.run_cycle().await.unwrap();
        assert_eq!(skipped.total_pnl, None);
        assert!(skipped.transition.is_none());
        assert_eq!(monitor.zone(), AlertZone::Above);

        // An empty position set is data: total 0 => recovery
        let flat = monitor.run_cycle().await.unwrap();
        assert_eq!(flat.total_pnl, Some(Decimal::ZERO));
        assert_eq!(flat.open_positions, 0);
        assert!(flat.transition.unwrap().is_recovery());
        assert_eq!(notifier.alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_reminder_fires_even_when_fetch_fails() {
        let source = MockPositionSource::new();
        source.push(MockFetch::Unavailable);

        let clock = ManualClock::new();
        let notifier = RecordingNotifier::default();
        let mut monitor =
            MonitorLoop::with_clock(monitor_config(60), source, notifier.clone(), clock.clone());

        clock.advance(60);
        let report = monitor.run_cycle().await.unwrap();
        assert!(report.reminder_sent);
        assert_eq!(report.total_pnl, None);
        assert_eq!(notifier.reminders(), 1);
    }

    #[tokio::test]
    async fn test_malformed_response_is_cycle_error() {
        let source = MockPositionSource::new();
        source.push(MockFetch::Malformed);

        let (clock, notifier) = (ManualClock::new(), RecordingNotifier::default());
        let mut monitor =
            MonitorLoop::with_clock(monitor_config(0), source, notifier.clone(), clock);

        assert!(monitor.run_cycle().await.is_err());
        assert_eq!(monitor.zone(), AlertZone::Normal);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_overflowing_total_is_cycle_error() {
        let source = MockPositionSource::new();
        source.push(MockFetch::Positions(vec![
            mock_position("BTC-USD-PERP", Decimal::MAX),
            mock_position("ETH-USD-PERP", Decimal::MAX),
        ]));
        source.push(MockFetch::Positions(vec![mock_position("BTC-USD-PERP", dec!(25))]));

        let (clock, notifier) = (ManualClock::new(), RecordingNotifier::default());
        let mut monitor =
            MonitorLoop::with_clock(monitor_config(0), source, notifier.clone(), clock);

        assert!(monitor.run_cycle().await.is_err());
        assert_eq!(monitor.zone(), AlertZone::Normal);
        assert!(notifier.sent().is_empty());

        // The next cycle evaluates normally
        let report = monitor.run_cycle().await.unwrap();
        assert_eq!(report.total_pnl, Some(dec!(25)));
        assert_eq!(notifier.alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_notification_failures_are_swallowed() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send_reminder()
            .times(1)
            .returning(|| Err(NotifyError::Rejected { status: 502, body: "bad gateway".into() }));
        notifier
            .expect_send_alert()
            .withf(|pnl, threshold, positions| {
                *pnl == dec!(-30) && *threshold == dec!(-20) && positions.len() == 1
            })
            .times(1)
            .returning(|_, _, _| Err(NotifyError::Rejected { status: 429, body: "slow down".into() }));

        let clock = ManualClock::new();
        let mut monitor = MonitorLoop::with_clock(
            monitor_config(60),
            MockPositionSource::from_pnls(&[dec!(-30)]),
            notifier,
            clock.clone(),
        );

        clock.advance(60);
        let report = monitor.run_cycle().await.unwrap();

        assert!(report.reminder_sent);
        assert_eq!(monitor.zone(), AlertZone::Below);
        // Timer was reset by the alert even though delivery failed
        assert_eq!(
            monitor.next_reminder_at(),
            Some(clock.now() + TimeDelta::seconds(60))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keeps_cadence_and_cools_down_after_errors() {
        let source = MockPositionSource::new();
        source.push(MockFetch::Malformed);
        source.push(MockFetch::Positions(Vec::new()));
        source.push(MockFetch::Positions(Vec::new()));
        let fetches = source.clone();

        let monitor = MonitorLoop::with_clock(
            monitor_config(0),
            source,
            RecordingNotifier::default(),
            ManualClock::new(),
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(monitor.run(rx));

        // t=0 malformed, t=5 after cooldown, t=65 after a full interval
        tokio::time::sleep(Duration::from_secs(70)).await;
        assert_eq!(fetches.calls(), 3);

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(fetches.calls(), 3);
    }

    /// Wall clock that follows tokio's (pausable) time.
    #[derive(Clone)]
    struct TokioClock {
        origin: DateTime<Utc>,
        started: tokio::time::Instant,
    }

    impl TokioClock {
        fn new() -> Self {
            Self {
                origin: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                started: tokio::time::Instant::now(),
            }
        }
    }

    impl Clock for TokioClock {
        fn now(&self) -> DateTime<Utc> {
            self.origin + TimeDelta::from_std(self.started.elapsed()).unwrap()
        }
    }

    /// Takes `delay` per fetch and records when each fetch started.
    #[derive(Clone)]
    struct SlowSource {
        inner: MockPositionSource,
        delay: Duration,
        started: tokio::time::Instant,
        starts: Arc<Mutex<Vec<u64>>>,
    }

    impl SlowSource {
        fn new(delay_secs: u64) -> Self {
            Self {
                inner: MockPositionSource::from_pnls(&[dec!(1); 10]),
                delay: Duration::from_secs(delay_secs),
                started: tokio::time::Instant::now(),
                starts: Arc::default(),
            }
        }

        fn starts(&self) -> Vec<u64> {
            self.starts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PositionSource for SlowSource {
        async fn fetch_positions(&self) -> Result<Vec<Position>, FetchError> {
            self.starts
                .lock()
                .unwrap()
                .push(self.started.elapsed().as_secs());
            tokio::time::sleep(self.delay).await;
            self.inner.fetch_positions().await
        }
    }

    async fn run_slow_source(fetch_secs: u64, observe_secs: u64) -> Vec<u64> {
        let source = SlowSource::new(fetch_secs);
        let starts = source.clone();
        let monitor = MonitorLoop::with_clock(
            monitor_config(0),
            source,
            RecordingNotifier::default(),
            TokioClock::new(),
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(monitor.run(rx));

        tokio::time::sleep(Duration::from_secs(observe_secs)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
        starts.starts()
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_subtracts_cycle_time_from_interval() {
        // 40s fetch + 20s sleep keeps a 60s cadence
        assert_eq!(run_slow_source(40, 125).await, vec![0, 60, 120]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_cycle_starts_next_immediately() {
        // 70s fetch exceeds the 60s interval, so there is no sleep
        assert_eq!(run_slow_source(70, 145).await, vec![0, 70, 140]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_sleep() {
        let mut config = monitor_config(0);
        config.poll_interval_secs = 3600;
        let monitor = MonitorLoop::with_clock(
            config,
            MockPositionSource::from_pnls(&[dec!(1)]),
            RecordingNotifier::default(),
            ManualClock::new(),
        );
        let (tx, rx) = watch::channel(false);
        let started = tokio::time::Instant::now();
        let handle = tokio::spawn(monitor.run(rx));

        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_dropped_shutdown_sender_stops_loop() {
        let monitor = MonitorLoop::with_clock(
            monitor_config(0),
            MockPositionSource::new(),
            RecordingNotifier::default(),
            ManualClock::new(),
        );
        let (tx, rx) = watch::channel(false);
        drop(tx);

        tokio::time::timeout(Duration::from_secs(5), monitor.run(rx))
            .await
            .expect("loop should stop when the shutdown sender is gone");
    }
}
