//! Long sleeps that give up early when a shutdown is requested.
//!
//! Both variants sleep in steps of `shutdown_check` (never longer than the
//! whole sleep) and ask the probe after every step. They return `true` when
//! the full duration elapsed and `false` as soon as the probe reports a
//! shutdown.

use std::time::Duration;

use crate::registry::ShutdownProbe;

pub const DEFAULT_SHUTDOWN_CHECK: Duration = Duration::from_secs(10);

pub async fn long_sleep_async<P>(probe: &P, sleep: Duration, shutdown_check: Duration) -> bool
where
    P: ShutdownProbe + ?Sized,
{
    let shutdown_check = shutdown_check.min(sleep);
    let sleep_until = tokio::time::Instant::now() + sleep;

    while tokio::time::Instant::now() < sleep_until {
        tokio::time::sleep(shutdown_check).await;
        if probe.shutdown_requested().await {
            log::info!("Shutdown requested, interrupting sleep");
            return false;
        }
    }
    true
}

/// Blocking variant of [`long_sleep_async`]. Parks the calling thread
/// between checks.
pub fn long_sleep<P>(probe: &P, sleep: Duration, shutdown_check: Duration) -> bool
where
    P: ShutdownProbe + ?Sized,
{
    let shutdown_check = shutdown_check.min(sleep);
    let sleep_until = std::time::Instant::now() + sleep;

    while std::time::Instant::now() < sleep_until {
        std::thread::sleep(shutdown_check);
        if probe.shutdown_requested_blocking() {
            log::info!("Shutdown requested, interrupting sleep");
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use crate::registry::Registry;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports a shutdown from the `trip_on`-th poll onwards.
    struct ScriptedProbe {
        polls: AtomicUsize,
        trip_on: Option<usize>,
    }

    impl ScriptedProbe {
        fn never() -> Self {
            Self {
                polls: AtomicUsize::new(0),
                trip_on: None,
            }
        }

        fn trips_on(poll: usize) -> Self {
            Self {
                polls: AtomicUsize::new(0),
                trip_on: Some(poll),
            }
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }

        fn poll(&self) -> bool {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            self.trip_on.is_some_and(|trip| poll >= trip)
        }
    }

    #[async_trait]
    impl ShutdownProbe for ScriptedProbe {
        async fn shutdown_requested(&self) -> bool {
            self.poll()
        }

        fn shutdown_requested_blocking(&self) -> bool {
            self.poll()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completes_after_full_duration() {
        let probe = ScriptedProbe::never();
        let start = tokio::time::Instant::now();

        let completed =
            long_sleep_async(&probe, Duration::from_secs(30), Duration::from_secs(10)).await;

        assert!(completed);
        assert_eq!(probe.polls(), 3);
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_by_shutdown_flag() {
        let probe = ScriptedProbe::trips_on(3);
        let start = tokio::time::Instant::now();

        let completed =
            long_sleep_async(&probe, Duration::from_secs(30), Duration::from_secs(10)).await;

        assert!(!completed);
        assert_eq!(probe.polls(), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(20) && elapsed <= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_early_stops_polling() {
        let probe = ScriptedProbe::trips_on(1);
        let start = tokio::time::Instant::now();

        let completed =
            long_sleep_async(&probe, Duration::from_secs(60), Duration::from_secs(10)).await;

        assert!(!completed);
        assert_eq!(probe.polls(), 1);
        assert!(start.elapsed() < Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn check_interval_is_clamped_to_sleep() {
        let probe = ScriptedProbe::never();
        let start = tokio::time::Instant::now();

        let completed =
            long_sleep_async(&probe, Duration::from_secs(5), Duration::from_secs(10)).await;

        assert!(completed);
        assert_eq!(probe.polls(), 1);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_sleep_returns_immediately() {
        let probe = ScriptedProbe::never();

        assert!(long_sleep_async(&probe, Duration::ZERO, DEFAULT_SHUTDOWN_CHECK).await);
        assert_eq!(probe.polls(), 0);
    }

    #[test]
    fn blocking_sleep_polls_at_the_same_cadence() {
        let probe = ScriptedProbe::never();
        let start = std::time::Instant::now();

        let completed = long_sleep(&probe, Duration::from_millis(30), Duration::from_millis(10));

        assert!(completed);
        assert_eq!(probe.polls(), 3);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn blocking_sleep_is_interrupted() {
        let probe = ScriptedProbe::trips_on(2);

        let completed = long_sleep(&probe, Duration::from_millis(500), Duration::from_millis(10));

        assert!(!completed);
        assert_eq!(probe.polls(), 2);
    }

    #[test]
    fn blocking_sleep_clamps_interval() {
        let probe = ScriptedProbe::never();

        let completed = long_sleep(&probe, Duration::from_millis(5), Duration::from_millis(50));

        assert!(completed);
        assert_eq!(probe.polls(), 1);
    }

    fn unreachable_registry(home: &tempfile::TempDir) -> Registry {
        Registry::new(Environment::from_home(home.path()))
    }

    #[test]
    fn blocking_sleep_against_unreachable_store_stops() {
        let home = tempfile::TempDir::new().unwrap();
        let registry = unreachable_registry(&home);

        let completed = long_sleep(&registry, Duration::from_millis(50), Duration::from_millis(10));
        assert!(!completed);
    }

    #[tokio::test]
    async fn blocking_sleep_runs_inside_async_context() {
        let home = tempfile::TempDir::new().unwrap();
        let registry = unreachable_registry(&home);

        let completed = long_sleep(&registry, Duration::from_millis(20), Duration::from_millis(10));
        assert!(!completed);
    }
}
