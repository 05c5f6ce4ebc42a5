//! Playback controller.
//!
//! Owns the current [`Route`] and its play-state, drives the fixed-cadence
//! emission loop and fans every sample out to the subscriber table. Route
//! replacement preempts the loop at the next tick via a watch-channel
//! generation counter; pausing repeats the last emitted position with zero
//! speed without losing the playback index.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::log::Logger;
use crate::{log_debug, log_info};

use super::elevation::ElevationClient;
use super::model::{LatLon, PlayState, Point, Route};
use super::prepare::RoutePreparer;
use super::subscription::{SubscriberTable, SubscriptionHandle};

/// Playback controller: current route, play-state and emission loop.
///
/// All operations are safe under concurrent callers. The controller is
/// created with a parent cancellation scope; cancelling it (or calling
/// [`Controller::shutdown`]) stops the emission loop at the next tick.
pub struct Controller {
    state: Arc<Mutex<Route>>,
    subscribers: Arc<SubscriberTable>,
    interrupt_tx: watch::Sender<u64>,
    cancel: CancellationToken,
    step_delay: Duration,
    preparer: RoutePreparer,
    logger: Arc<dyn Logger>,
}

impl Controller {
    /// Create a controller with the production elevation endpoint.
    pub fn new(parent: CancellationToken, step_delay: Duration, logger: Arc<dyn Logger>) -> Self {
        Self::with_elevation(parent, step_delay, ElevationClient::default(), logger)
    }

    /// Create a controller with a specific elevation client (tests point
    /// this at a stub or an unreachable address).
    pub fn with_elevation(
        parent: CancellationToken,
        step_delay: Duration,
        elevation: ElevationClient,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let (interrupt_tx, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(Route::default())),
            subscribers: Arc::new(SubscriberTable::default()),
            interrupt_tx,
            cancel: parent.child_token(),
            step_delay,
            preparer: RoutePreparer::new(step_delay, elevation, logger.clone()),
            logger,
        }
    }

    /// Spawn the emission loop.
    pub fn startup(&self) {
        let loop_task = EmissionLoop {
            state: Arc::clone(&self.state),
            subscribers: Arc::clone(&self.subscribers),
            interrupt: self.interrupt_tx.subscribe(),
            cancel: self.cancel.clone(),
            step_delay: self.step_delay,
            logger: self.logger.clone(),
        };
        tokio::spawn(loop_task.run());
    }

    /// Open a subscription: a channel of emitted points plus its cancel
    /// handle. Subscribing mid-route joins at the next tick.
    pub async fn subscribe(&self) -> (tokio::sync::mpsc::Receiver<Point>, SubscriptionHandle) {
        self.subscribers.add().await
    }

    /// Prepare a route from a raw polyline and install it.
    pub async fn update_route(&self, name: &str, max_speed_kmh: u32, polyline: &[LatLon]) {
        let route = self.preparer.prepare(name, max_speed_kmh, polyline).await;
        self.install(route, "updated");
    }

    /// Install a pre-prepared route (e.g. loaded from a persisted file).
    pub fn set_route(&self, route: Route) {
        self.install(route, "loaded");
    }

    /// Interrupt-then-swap-then-state: the generation counter is bumped
    /// under the state mutex so the loop can never emit from a swapped
    /// route without observing the interrupt first.
    fn install(&self, mut route: Route, verb: &str) {
        let count = route.points.len();
        route.state = if route.points.is_empty() {
            PlayState::Paused
        } else {
            PlayState::Running
        };

        {
            let mut current = self.state.lock().unwrap();
            self.interrupt_tx.send_modify(|generation| *generation += 1);
            *current = route;
        }

        log_info!(self.logger, "route: {} route with {} points", verb, count);
    }

    /// Flip `Running` and `Paused`. Takes effect at the next tick; the
    /// playback position is preserved.
    pub fn toggle_state(&self) {
        let mut route = self.state.lock().unwrap();
        route.state = match route.state {
            PlayState::Running => {
                log_info!(self.logger, "route: paused");
                PlayState::Paused
            }
            PlayState::Paused => {
                log_info!(self.logger, "route: running");
                PlayState::Running
            }
        };
    }

    /// Deep copy of the current route.
    pub fn get_route(&self) -> Route {
        self.state.lock().unwrap().clone()
    }

    pub fn get_route_size(&self) -> usize {
        self.state.lock().unwrap().points.len()
    }

    pub fn get_state(&self) -> PlayState {
        self.state.lock().unwrap().state
    }

    /// Number of live subscriptions.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.len().await
    }

    /// Cancel the controller scope; the loop exits at the next tick or
    /// immediately if idle.
    pub fn shutdown(&self) {
        log_info!(self.logger, "route: shutting down the controller");
        self.cancel.cancel();
    }
}

/// What the loop decided to do with one tick.
enum Tick {
    Emit { point: Point, advance: bool },
    Restart,
}

struct EmissionLoop {
    state: Arc<Mutex<Route>>,
    subscribers: Arc<SubscriberTable>,
    interrupt: watch::Receiver<u64>,
    cancel: CancellationToken,
    step_delay: Duration,
    logger: Arc<dyn Logger>,
}

impl EmissionLoop {
    async fn run(mut self) {
        let start = tokio::time::Instant::now() + self.step_delay;
        let mut timer = tokio::time::interval_at(start, self.step_delay);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        'outer: loop {
            let points_len = self.state.lock().unwrap().points.len();
            // Drain any interrupt that arrived while restarting.
            self.interrupt.borrow_and_update();

            if points_len == 0 {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    _ = timer.tick() => continue 'outer,
                }
            }

            log_debug!(self.logger, "route: starting the loop for {} points", points_len);

            let mut i = 0;
            while i < points_len {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break 'outer,
                    changed = self.interrupt.changed() => {
                        if changed.is_err() {
                            break 'outer;
                        }
                        log_info!(self.logger, "route: route needs to be updated - restarting the loop");
                        continue 'outer;
                    }
                    _ = timer.tick() => {}
                }

                match self.observe(i) {
                    Tick::Restart => continue 'outer,
                    Tick::Emit { point, advance } => {
                        if advance {
                            i += 1;
                        }
                        self.subscribers.broadcast(point).await;
                    }
                }
            }
        }

        log_info!(self.logger, "route: the controller loop stopped");
    }

    /// Pick the point for this tick under the state mutex.
    ///
    /// A pending interrupt (or an index past the end after a swap) means
    /// the route changed under us: restart instead of emitting.
    fn observe(&self, i: usize) -> Tick {
        let route = self.state.lock().unwrap();

        if self.interrupt.has_changed().unwrap_or(true) || i >= route.points.len() {
            return Tick::Restart;
        }

        match route.state {
            PlayState::Running => Tick::Emit {
                point: route.points[i],
                advance: true,
            },
            PlayState::Paused => {
                let mut point = route.points[i.saturating_sub(1)];
                point.speed = 0.0;
                Tick::Emit {
                    point,
                    advance: false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::NoOpLogger;
    use tokio::time::timeout;

    const STEP: Duration = Duration::from_millis(50);

    fn controller() -> Controller {
        Controller::with_elevation(
            CancellationToken::new(),
            STEP,
            ElevationClient::new("http://127.0.0.1:1/unreachable".into()),
            Arc::new(NoOpLogger),
        )
    }

    /// A route of `n` points where point `k` has `lat == base + k`.
    fn numbered_route(n: usize, base: f64) -> Route {
        Route {
            name: "numbered".into(),
            points: (0..n)
                .map(|k| Point {
                    lat: base + k as f64,
                    lon: 8.0,
                    speed: 10.0,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_route_emits_nothing_and_stays_paused() {
        let ctrl = controller();
        let (mut rx, _handle) = ctrl.subscribe().await;
        ctrl.startup();

        let result = timeout(STEP * 5, rx.recv()).await;
        assert!(result.is_err(), "no points expected from an empty route");
        assert_eq!(ctrl.get_state(), PlayState::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn test_installing_nonempty_route_starts_playback() {
        let ctrl = controller();
        ctrl.set_route(numbered_route(3, 0.0));
        assert_eq!(ctrl.get_state(), PlayState::Running);

        let (mut rx, _handle) = ctrl.subscribe().await;
        ctrl.startup();

        for expected in [0.0, 1.0, 2.0] {
            let point = rx.recv().await.unwrap();
            assert_eq!(point.lat, expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_loops_forever() {
        let ctrl = controller();
        ctrl.set_route(numbered_route(2, 0.0));
        let (mut rx, _handle) = ctrl.subscribe().await;
        ctrl.startup();

        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(rx.recv().await.unwrap().lat);
        }
        assert_eq!(seen, vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_repeats_previous_point_with_zero_speed() {
        let ctrl = controller();
        ctrl.set_route(numbered_route(10, 0.0));
        let (mut rx, _handle) = ctrl.subscribe().await;
        ctrl.startup();

        for expected in [0.0, 1.0, 2.0] {
            assert_eq!(rx.recv().await.unwrap().lat, expected);
        }

        ctrl.toggle_state();
        assert_eq!(ctrl.get_state(), PlayState::Paused);
        for _ in 0..3 {
            let point = rx.recv().await.unwrap();
            assert_eq!(point.lat, 2.0, "paused playback repeats the last point");
            assert_eq!(point.speed, 0.0);
        }

        ctrl.toggle_state();
        let point = rx.recv().await.unwrap();
        assert_eq!(point.lat, 3.0, "resume continues where playback stopped");
        assert_eq!(point.speed, 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_at_first_point_repeats_it() {
        let ctrl = controller();
        ctrl.set_route(numbered_route(3, 0.0));
        ctrl.toggle_state(); // pause before the first tick
        let (mut rx, _handle) = ctrl.subscribe().await;
        ctrl.startup();

        let point = rx.recv().await.unwrap();
        assert_eq!(point.lat, 0.0);
        assert_eq!(point.speed, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_replacement_restarts_within_one_tick() {
        let ctrl = controller();
        ctrl.set_route(numbered_route(1000, 0.0));
        let (mut rx, _handle) = ctrl.subscribe().await;
        ctrl.startup();

        let mut last_old = 0.0;
        for _ in 0..3 {
            last_old = rx.recv().await.unwrap().lat;
        }

        ctrl.set_route(numbered_route(3, 5000.0));

        // At most one stale in-flight point may still be delivered; after
        // that, emissions restart from the new route's first point.
        let mut stale = 0;
        loop {
            let point = rx.recv().await.unwrap();
            if point.lat >= 5000.0 {
                assert_eq!(point.lat, 5000.0, "new route starts at index 0");
                break;
            }
            assert!(
                point.lat <= last_old + 1.0,
                "unexpected late point {} from the old route",
                point.lat
            );
            stale += 1;
            assert!(stale <= 1, "more than one stale point after replacement");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_route_prepares_and_runs() {
        let ctrl = controller();
        let polyline = [
            LatLon::new(47.0, 8.0),
            LatLon::new(47.01, 8.0),
            LatLon::new(47.02, 8.0),
        ];
        ctrl.update_route("prepared", 0, &polyline).await;

        assert_eq!(ctrl.get_route_size(), 3);
        assert_eq!(ctrl.get_state(), PlayState::Running);
        let route = ctrl.get_route();
        assert_eq!(route.name, "prepared");
        assert!((route.distance - 2.0 * 1111.95).abs() < 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_route_with_empty_polyline_pauses() {
        let ctrl = controller();
        ctrl.set_route(numbered_route(5, 0.0));
        ctrl.update_route("cleared", 0, &[]).await;

        assert_eq!(ctrl.get_route_size(), 0);
        assert_eq!(ctrl.get_state(), PlayState::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_subscribers_see_identical_sequences() {
        let ctrl = controller();
        ctrl.set_route(numbered_route(3, 0.0));
        let (mut rx_a, _ha) = ctrl.subscribe().await;
        let (mut rx_b, _hb) = ctrl.subscribe().await;
        ctrl.startup();

        let mut seen_a = Vec::new();
        let mut seen_b = Vec::new();
        for _ in 0..3 {
            seen_a.push(rx_a.recv().await.unwrap().lat);
            seen_b.push(rx_b.recv().await.unwrap().lat);
        }
        assert_eq!(seen_a, vec![0.0, 1.0, 2.0]);
        assert_eq!(seen_b, seen_a);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_subscription_is_removed_and_closed() {
        let ctrl = controller();
        ctrl.set_route(numbered_route(3, 0.0));
        let (mut rx, handle) = ctrl.subscribe().await;
        ctrl.startup();

        let _ = rx.recv().await.unwrap();
        handle.cancel().await;
        assert_eq!(ctrl.subscriber_count().await, 0);

        // Channel closes once the buffered in-flight point (if any) drains.
        while rx.recv().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_the_loop() {
        let ctrl = controller();
        ctrl.set_route(numbered_route(10, 0.0));
        let (mut rx, _handle) = ctrl.subscribe().await;
        ctrl.startup();

        let _ = rx.recv().await.unwrap();
        ctrl.shutdown();

        // At most the in-flight points drain; then the loop is gone.
        let mut extra = 0;
        while let Ok(Some(_)) = timeout(STEP * 5, rx.recv()).await {
            extra += 1;
            assert!(extra <= 2, "loop kept emitting after shutdown");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_token_tears_down_the_loop() {
        let parent = CancellationToken::new();
        let ctrl = Controller::with_elevation(
            parent.clone(),
            STEP,
            ElevationClient::new("http://127.0.0.1:1/unreachable".into()),
            Arc::new(NoOpLogger),
        );
        ctrl.set_route(numbered_route(10, 0.0));
        let (mut rx, _handle) = ctrl.subscribe().await;
        ctrl.startup();

        let _ = rx.recv().await.unwrap();
        parent.cancel();

        let mut extra = 0;
        while let Ok(Some(_)) = timeout(STEP * 5, rx.recv()).await {
            extra += 1;
            assert!(extra <= 2, "loop kept emitting after parent cancellation");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_route_returns_deep_copy() {
        let ctrl = controller();
        ctrl.set_route(numbered_route(3, 0.0));

        let mut copy = ctrl.get_route();
        copy.points.clear();
        copy.name = "mutated".into();

        assert_eq!(ctrl.get_route_size(), 3);
        assert_eq!(ctrl.get_route().name, "numbered");
    }
}
