use tracing::{debug, info};

use crate::{
    core::Field,
    project::{HostSurface, Projector},
    types::Mode,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickHandle(pub u64);

/// Display-refresh driven scheduler. A requested tick fires at most once; the
/// owner must request again for the next frame.
pub trait FrameClock {
    fn request_tick(&mut self) -> TickHandle;
    fn cancel_tick(&mut self, handle: TickHandle);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Next tick requested.
    Continue,
    /// Scatter finished with nothing left on screen; loop stopped.
    Idle,
    /// The tick was stale or motion is reduced; nothing ran.
    Stopped,
}

/// Turns mode and reduced-motion signals into engine events and owns the tick
/// loop's lifecycle.
#[derive(Debug)]
pub struct ModeController {
    mode: Mode,
    reduced_motion: bool,
    pending: Option<TickHandle>,
    last_timestamp: Option<f64>,
}

impl ModeController {
    pub fn new(reduced_motion: bool) -> Self {
        Self {
            mode: Mode::Cluster,
            reduced_motion,
            pending: None,
            last_timestamp: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn reduced_motion(&self) -> bool {
        self.reduced_motion
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    /// Starts the loop unless it is already running or motion is reduced.
    pub fn ensure_running<C: FrameClock>(&mut self, clock: &mut C) {
        if self.pending.is_some() || self.reduced_motion {
            return;
        }
        self.last_timestamp = None;
        self.pending = Some(clock.request_tick());
        debug!(mode = self.mode.label(), "tick loop started");
    }

    pub fn on_mode_change<S: HostSurface, C: FrameClock>(
        &mut self,
        new_mode: Mode,
        field: &mut Field,
        projector: &mut Projector,
        surface: &mut S,
        clock: &mut C,
    ) {
        if new_mode == self.mode {
            return;
        }
        self.mode = new_mode;
        info!(mode = new_mode.label(), "mode changed");

        match new_mode {
            Mode::Scatter => {
                let (width, height) = surface.dimensions();
                field.kick_to_scatter(width, height);
            }
            Mode::Cluster => field.respawn_all(),
        }

        if self.reduced_motion {
            projector.project(field.bodies(), self.mode, surface);
        } else {
            self.ensure_running(clock);
        }
    }

    pub fn on_reduced_motion_change<C: FrameClock>(&mut self, reduced: bool, clock: &mut C) {
        if self.reduced_motion == reduced {
            return;
        }
        self.reduced_motion = reduced;
        info!(reduced, "reduced motion changed");
        if reduced {
            if let Some(handle) = self.pending.take() {
                clock.cancel_tick(handle);
            }
            self.last_timestamp = None;
        }
    }

    /// One frame of the loop: step the engine, project the result, then decide
    /// whether another frame is wanted.
    pub fn on_tick<S: HostSurface, C: FrameClock>(
        &mut self,
        handle: TickHandle,
        timestamp_ms: f64,
        field: &mut Field,
        projector: &mut Projector,
        surface: &mut S,
        clock: &mut C,
    ) -> TickOutcome {
        if self.pending != Some(handle) {
            return TickOutcome::Stopped;
        }
        self.pending = None;
        if self.reduced_motion {
            self.last_timestamp = None;
            return TickOutcome::Stopped;
        }

        let dt_raw_ms = match self.last_timestamp {
            Some(last) => (timestamp_ms - last) as f32,
            None => field.config().frame_ms,
        };
        self.last_timestamp = Some(timestamp_ms);

        let (width, height) = surface.dimensions();
        let report = field.step(dt_raw_ms, self.mode, width, height);
        if !report.skipped {
            projector.project(field.bodies(), self.mode, surface);
        }

        if report.is_idle(self.mode) {
            info!("every body left the surface; tick loop stopped");
            self.last_timestamp = None;
            return TickOutcome::Idle;
        }
        self.pending = Some(clock.request_tick());
        TickOutcome::Continue
    }
}

/// Derives the mode from a scroll offset: scatter once the page is scrolled
/// past the threshold. Reports only changes.
#[derive(Debug)]
pub struct ScrollThreshold {
    threshold: f32,
    current: Mode,
}

impl ScrollThreshold {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            current: Mode::Cluster,
        }
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    pub fn update(&mut self, offset: f32) -> Option<Mode> {
        let mode = Mode::from_scatter(offset > self.threshold);
        if mode == self.current {
            return None;
        }
        self.current = mode;
        Some(mode)
    }
}


#[cfg(test)]
mod tests {
    use super::{testing::ManualClock, *};
    use crate::{config::FieldConfig, project::testing::RecordingSurface};

    struct Rig {
        controller: ModeController,
        field: Field,
        projector: Projector,
        surface: RecordingSurface,
        clock: ManualClock,
        now: f64,
    }

    impl Rig {
        fn new(count: usize, reduced_motion: bool) -> Self {
            let config = FieldConfig {
                count,
                seed: Some(21),
                ..FieldConfig::default()
            };
            let projector = Projector::new(&config);
            Self {
                controller: ModeController::new(reduced_motion),
                field: Field::new(config).expect("valid config"),
                projector,
                surface: RecordingSurface::new(800.0, 600.0),
                clock: ManualClock::default(),
                now: 0.0,
            }
        }

        fn set_mode(&mut self, mode: Mode) {
            self.controller.on_mode_change(
                mode,
                &mut self.field,
                &mut self.projector,
                &mut self.surface,
                &mut self.clock,
            );
        }

        fn fire(&mut self) -> Option<TickOutcome> {
            let handle = self.clock.take()?;
            self.now += 33.4;
            Some(self.controller.on_tick(
                handle,
                self.now,
                &mut self.field,
                &mut self.projector,
                &mut self.surface,
                &mut self.clock,
            ))
        }
    }

    mod loop_lifecycle {
        use super::*;

        #[test]
        fn ensure_running_requests_one_tick() {
            let mut rig = Rig::new(4, false);
            rig.controller.ensure_running(&mut rig.clock);
            rig.controller.ensure_running(&mut rig.clock);
            assert!(rig.controller.is_running());
            assert_eq!(rig.clock.requested, 1);
        }

        #[test]
        fn cluster_ticks_keep_the_loop_alive() {
            let mut rig = Rig::new(4, false);
            rig.controller.ensure_running(&mut rig.clock);
            for _ in 0..10 {
                assert_eq!(rig.fire(), Some(TickOutcome::Continue));
            }
            assert!(rig.controller.is_running());
            assert_eq!(rig.surface.element(0).visible, Some(true));
        }

        #[test]
        fn scatter_stops_once_every_body_is_gone() {
            let mut rig = Rig::new(10, false);
            rig.controller.ensure_running(&mut rig.clock);
            rig.set_mode(Mode::Scatter);

            let mut last = None;
            for _ in 0..5_000 {
                match rig.fire() {
                    Some(outcome) => last = Some(outcome),
                    None => break,
                }
            }
            assert_eq!(last, Some(TickOutcome::Idle));
            assert!(!rig.controller.is_running());
            assert!(rig.clock.pending.is_none());
            assert_eq!(rig.field.active_count(), 0);
            for id in 0..10 {
                assert_eq!(rig.surface.element(id).visible, Some(false));
            }
        }

        #[test]
        fn stale_handle_is_ignored() {
            let mut rig = Rig::new(2, false);
            rig.controller.ensure_running(&mut rig.clock);
            let outcome = rig.controller.on_tick(
                TickHandle(999),
                10.0,
                &mut rig.field,
                &mut rig.projector,
                &mut rig.surface,
                &mut rig.clock,
            );
            assert_eq!(outcome, TickOutcome::Stopped);
            assert!(rig.controller.is_running());
        }

        #[test]
        fn first_tick_after_start_uses_a_nominal_frame() {
            let mut rig = Rig::new(1, false);
            rig.controller.ensure_running(&mut rig.clock);
            let before = rig.field.bodies()[0].clone();
            let mut expected = Field::new(FieldConfig {
                count: 1,
                seed: Some(21),
                ..FieldConfig::default()
            })
            .expect("valid config");
            expected.step(16.67, Mode::Cluster, 800.0, 600.0);

            let handle = rig.clock.take().expect("tick requested");
            rig.controller.on_tick(
                handle,
                123_456.0,
                &mut rig.field,
                &mut rig.projector,
                &mut rig.surface,
                &mut rig.clock,
            );
            assert_ne!(rig.field.bodies()[0].pos, before.pos);
            assert_eq!(rig.field.bodies()[0].pos, expected.bodies()[0].pos);
        }
    }

    mod reduced_motion {
        use super::*;

        #[test]
        fn turning_it_on_cancels_the_pending_tick() {
            let mut rig = Rig::new(3, false);
            rig.controller.ensure_running(&mut rig.clock);
            rig.controller.on_reduced_motion_change(true, &mut rig.clock);
            assert!(!rig.controller.is_running());
            assert_eq!(rig.clock.cancelled, 1);
            assert!(rig.fire().is_none());
        }

        #[test]
        fn turning_it_off_does_not_restart_by_itself() {
            let mut rig = Rig::new(3, true);
            rig.controller.on_reduced_motion_change(false, &mut rig.clock);
            assert!(!rig.controller.is_running());
            assert_eq!(rig.clock.requested, 0);

            rig.set_mode(Mode::Scatter);
            assert!(rig.controller.is_running());
        }

        #[test]
        fn mode_change_never_starts_the_loop() {
            let mut rig = Rig::new(3, true);
            rig.controller.ensure_running(&mut rig.clock);
            rig.set_mode(Mode::Scatter);
            rig.set_mode(Mode::Cluster);
            assert_eq!(rig.clock.requested, 0);
            assert_eq!(rig.surface.element(0).visible, Some(true));
        }
    }

    mod mode_change {
        use super::*;

        #[test]
        fn scatter_then_cluster_respawns_every_body_in_the_disk() {
            let mut rig = Rig::new(40, false);
            let center = rig.field.config().center();
            let disk = rig.field.config().spawn_disk_radius();

            rig.set_mode(Mode::Scatter);
            assert_eq!(rig.controller.mode(), Mode::Scatter);
            let pixel_center = center.scale_by(800.0, 600.0);
            for body in rig.field.bodies() {
                let outward = body.pos.scale_by(800.0, 600.0) - pixel_center;
                assert!(body.vel.dot(outward) > 0.0);
            }

            rig.set_mode(Mode::Cluster);
            assert_eq!(rig.controller.mode(), Mode::Cluster);
            for body in rig.field.bodies() {
                assert!(body.active);
                assert!((body.pos - center).length() <= disk + 1e-5);
            }
            assert_eq!(rig.clock.requested, 1);
        }

        #[test]
        fn repeated_mode_is_a_no_op() {
            let mut rig = Rig::new(5, false);
            let before: Vec<_> = rig.field.bodies().iter().map(|b| b.pos).collect();
            rig.set_mode(Mode::Cluster);
            let after: Vec<_> = rig.field.bodies().iter().map(|b| b.pos).collect();
            assert_eq!(before, after);
            assert!(!rig.controller.is_running());
        }

        #[test]
        fn returning_to_cluster_restarts_an_idle_loop() {
            let mut rig = Rig::new(5, false);
            rig.set_mode(Mode::Scatter);
            while rig.fire().is_some() {}
            assert!(!rig.controller.is_running());

            rig.set_mode(Mode::Cluster);
            assert!(rig.controller.is_running());
            assert_eq!(rig.field.active_count(), 5);
            assert_eq!(rig.fire(), Some(TickOutcome::Continue));
        }
    }

    mod scroll_threshold {
        use super::*;

        #[test]
        fn reports_only_threshold_crossings() {
            let mut signal = ScrollThreshold::new(10.0);
            assert_eq!(signal.update(0.0), None);
            assert_eq!(signal.update(10.0), None);
            assert_eq!(signal.update(10.5), Some(Mode::Scatter));
            assert_eq!(signal.update(40.0), None);
            assert_eq!(signal.update(3.0), Some(Mode::Cluster));
            assert_eq!(signal.update(0.0), None);
        }

        #[test]
        fn threshold_can_follow_the_viewport() {
            let mut signal = ScrollThreshold::new(10.0);
            assert_eq!(signal.update(15.0), Some(Mode::Scatter));
            signal.set_threshold(20.0);
            assert_eq!(signal.update(15.0), Some(Mode::Cluster));
        }
    }
}
