//! Refresh-paced frame scheduler
//!
//! An explicit two-state machine (`Stopped`, `Running`) that turns display
//! refresh callbacks into simulation ticks. Every callback while running adds
//! `speed` to an accumulator; once it reaches 1 the caller performs one tick and
//! one redraw and the accumulator drops back to exactly 0. The accumulator never
//! goes below 0, so a non-positive speed stalls without building up a debt.
//!
//! Missed ticks are never caught up: a `speed` above 1 still yields at most one
//! tick per callback, which bounds the work done in a single frame.

/// Slack on the tick threshold for rounding error in summed fractional speeds
const TICK_EPSILON: f64 = 1e-9;

/// Identifies one outstanding refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// The platform primitive that delivers one callback per display refresh
pub trait FrameSource {
    /// Asks for a single callback at the next refresh
    fn request_frame(&mut self) -> FrameHandle;

    /// Withdraws a request so its callback never fires
    ///
    /// Only ever called with the handle of the one request still pending.
    fn cancel_frame(&mut self, handle: FrameHandle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Stopped,
    Running,
}

/// Everything the scheduler mutates, kept in one place
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerState {
    pub running: bool,
    pub accumulator: f64,
    pub speed: f64,
    pub pending: Option<FrameHandle>,
}

impl SchedulerState {
    fn new(speed: f64) -> Self {
        Self {
            running: false,
            accumulator: 0.0,
            speed,
            pending: None,
        }
    }
}

/// What the caller must do in response to a refresh callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecision {
    /// Stale or withdrawn callback; nothing to do
    Ignored,
    /// Still accumulating toward the next tick
    Idle,
    /// Tick the simulation once, then redraw
    Advance,
}

/// Drives a [`FrameSource`] according to the running state and speed
#[derive(Debug)]
pub struct FrameScheduler<F: FrameSource> {
    state: SchedulerState,
    frames: F,
}

impl<F: FrameSource> FrameScheduler<F> {
    /// Creates a stopped scheduler
    ///
    /// # Arguments
    /// * `frames` - Source of refresh callbacks
    /// * `speed` - Ticks per refresh, normally in `(0, 1]`
    pub fn new(frames: F, speed: f64) -> Self {
        Self {
            state: SchedulerState::new(speed),
            frames,
        }
    }

    /// `Stopped -> Running`; a no-op when already running
    pub fn start(&mut self) {
        if self.state.running {
            return;
        }
        self.state.running = true;
        self.state.accumulator = 0.0;
        self.state.pending = Some(self.frames.request_frame());
        log::debug!("scheduler running at speed {}", self.state.speed);
    }

    /// `Running -> Stopped`; a no-op when already stopped
    ///
    /// The pending request is withdrawn before returning and partial progress
    /// toward the next tick is discarded.
    pub fn pause(&mut self) {
        if let Some(handle) = self.state.pending.take() {
            self.frames.cancel_frame(handle);
        }
        self.state.accumulator = 0.0;
        if self.state.running {
            self.state.running = false;
            log::debug!("scheduler stopped");
        }
    }

    /// Handles one refresh callback
    ///
    /// Callbacks whose handle is not the pending one are ignored, so nothing that
    /// fires after `pause` can tick. A running scheduler re-arms before returning.
    pub fn on_frame(&mut self, handle: FrameHandle) -> FrameDecision {
        if !self.state.running || self.state.pending != Some(handle) {
            log::trace!("ignoring stale frame {}", handle.id());
            return FrameDecision::Ignored;
        }

        self.state.accumulator = (self.state.accumulator + self.state.speed).max(0.0);
        let decision = if self.state.accumulator >= 1.0 - TICK_EPSILON {
            self.state.accumulator = 0.0;
            FrameDecision::Advance
        } else {
            FrameDecision::Idle
        };

        self.state.pending = Some(self.frames.request_frame());
        decision
    }

    /// Takes effect on the next accumulation step; never validated
    pub fn set_speed(&mut self, speed: f64) {
        self.state.speed = speed;
    }

    pub fn speed(&self) -> f64 {
        self.state.speed
    }

    pub fn phase(&self) -> SchedulerPhase {
        if self.state.running {
            SchedulerPhase::Running
        } else {
            SchedulerPhase::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn frames(&self) -> &F {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut F {
        &mut self.frames
    }
}

/// Frame source driven by hand from tests
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ManualFrames {
    next_id: u64,
    pub pending: Vec<FrameHandle>,
    pub requested: usize,
    pub cancelled: Vec<FrameHandle>,
}

#[cfg(test)]
impl ManualFrames {
    /// Delivers the oldest outstanding request, as the display would
    pub fn fire(&mut self) -> Option<FrameHandle> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }
}

#[cfg(test)]
impl FrameSource for ManualFrames {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_id += 1;
        self.requested += 1;
        let handle = FrameHandle::new(self.next_id);
        self.pending.push(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let before = self.pending.len();
        self.pending.retain(|h| *h != handle);
        assert_ne!(before, self.pending.len(), "double cancel of {handle:?}");
        self.cancelled.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(speed: f64) -> FrameScheduler<ManualFrames> {
        FrameScheduler::new(ManualFrames::default(), speed)
    }

    /// Fires the pending callback and returns the decision
    fn refresh(scheduler: &mut FrameScheduler<ManualFrames>) -> FrameDecision {
        let handle = scheduler.frames_mut().fire().expect("no pending frame");
        scheduler.on_frame(handle)
    }

    #[test]
    fn test_starts_stopped_without_requesting_frames() {
        let scheduler = scheduler(1.0);
        assert_eq!(scheduler.phase(), SchedulerPhase::Stopped);
        assert_eq!(scheduler.frames().requested, 0);
        assert_eq!(scheduler.state().accumulator, 0.0);
    }

    #[test]
    fn test_speed_one_advances_every_callback() {
        let mut scheduler = scheduler(1.0);
        scheduler.start();

        assert_eq!(refresh(&mut scheduler), FrameDecision::Advance);
        assert_eq!(scheduler.state().accumulator, 0.0);
        assert_eq!(refresh(&mut scheduler), FrameDecision::Advance);
        assert_eq!(scheduler.frames().pending.len(), 1);
    }

    #[test]
    fn test_half_speed_advances_every_second_callback() {
        let mut scheduler = scheduler(1.0);
        scheduler.set_speed(0.5);
        scheduler.start();

        assert_eq!(refresh(&mut scheduler), FrameDecision::Idle);
        assert_eq!(scheduler.state().accumulator, 0.5);
        assert_eq!(refresh(&mut scheduler), FrameDecision::Advance);
        assert_eq!(scheduler.state().accumulator, 0.0);
    }

    #[test]
    fn test_high_speed_is_capped_at_one_tick_per_callback() {
        let mut scheduler = scheduler(7.5);
        scheduler.start();

        let advances = (0..10)
            .filter(|_| refresh(&mut scheduler) == FrameDecision::Advance)
            .count();
        assert_eq!(advances, 10);
        // No carry-over from the surplus 6.5 per callback
        assert_eq!(scheduler.state().accumulator, 0.0);
    }

    #[test]
    fn test_fractional_speed_matches_floor_without_carryover() {
        let mut scheduler = scheduler(0.25);
        scheduler.start();

        let advances = (0..12)
            .filter(|_| refresh(&mut scheduler) == FrameDecision::Advance)
            .count();
        assert_eq!(advances, 3);
    }

    /// Index (1-based) of the first callback that advances
    fn first_advance(
        scheduler: &mut FrameScheduler<ManualFrames>,
        limit: usize,
    ) -> Option<usize> {
        (1..=limit).find(|_| refresh(scheduler) == FrameDecision::Advance)
    }

    #[test]
    fn test_tenth_speed_ticks_on_tenth_callback() {
        let mut scheduler = scheduler(0.1);
        scheduler.start();

        assert_eq!(first_advance(&mut scheduler, 20), Some(10));
        assert_eq!(scheduler.state().accumulator, 0.0);
        assert_eq!(first_advance(&mut scheduler, 20), Some(10));
    }

    #[test]
    fn test_default_speed_ticks_on_fifteenth_callback() {
        let mut scheduler = scheduler(1.0 / 15.0);
        scheduler.start();

        assert_eq!(first_advance(&mut scheduler, 30), Some(15));
        assert_eq!(scheduler.state().accumulator, 0.0);

        let advances = (0..150)
            .filter(|_| refresh(&mut scheduler) == FrameDecision::Advance)
            .count();
        assert_eq!(advances, 10);
    }

    #[test]
    fn test_pause_withdraws_pending_and_discards_progress() {
        let mut scheduler = scheduler(0.5);
        scheduler.start();
        assert_eq!(refresh(&mut scheduler), FrameDecision::Idle);

        let pending = scheduler.state().pending.unwrap();
        scheduler.pause();

        assert_eq!(scheduler.phase(), SchedulerPhase::Stopped);
        assert_eq!(scheduler.state().accumulator, 0.0);
        assert_eq!(scheduler.state().pending, None);
        assert_eq!(scheduler.frames().cancelled, vec![pending]);
        assert!(scheduler.frames().pending.is_empty());
    }

    #[test]
    fn test_callbacks_after_pause_are_ignored() {
        let mut scheduler = scheduler(1.0);
        scheduler.start();
        let stale = scheduler.state().pending.unwrap();
        scheduler.pause();

        for _ in 0..5 {
            assert_eq!(scheduler.on_frame(stale), FrameDecision::Ignored);
        }
        assert_eq!(scheduler.frames().requested, 1);
    }

    #[test]
    fn test_redundant_pause_and_start_do_not_double_cancel() {
        let mut scheduler = scheduler(1.0);
        scheduler.pause();
        scheduler.pause();
        assert!(scheduler.frames().cancelled.is_empty());

        scheduler.start();
        scheduler.start();
        assert_eq!(scheduler.frames().requested, 1);

        scheduler.pause();
        scheduler.pause();
        assert_eq!(scheduler.frames().cancelled.len(), 1);
    }

    #[test]
    fn test_set_speed_applies_from_next_step() {
        let mut scheduler = scheduler(0.5);
        scheduler.start();
        assert_eq!(refresh(&mut scheduler), FrameDecision::Idle);

        scheduler.set_speed(0.25);
        assert_eq!(scheduler.state().accumulator, 0.5);
        assert!(scheduler.is_running());

        assert_eq!(refresh(&mut scheduler), FrameDecision::Idle);
        assert_eq!(scheduler.state().accumulator, 0.75);
        assert_eq!(refresh(&mut scheduler), FrameDecision::Advance);
    }

    #[test]
    fn test_non_positive_speed_stalls_without_error() {
        let mut scheduler = scheduler(0.0);
        scheduler.start();
        for _ in 0..20 {
            assert_eq!(refresh(&mut scheduler), FrameDecision::Idle);
        }

        scheduler.set_speed(-1.0);
        for _ in 0..20 {
            assert_eq!(refresh(&mut scheduler), FrameDecision::Idle);
            assert!(scheduler.state().accumulator >= 0.0);
        }
        assert!(scheduler.is_running());
        assert_eq!(scheduler.state().accumulator, 0.0);

        // No debt carried back into a positive speed
        scheduler.set_speed(1.0);
        assert_eq!(refresh(&mut scheduler), FrameDecision::Advance);
    }

    #[test]
    fn test_negative_speed_drains_partial_progress_to_zero() {
        let mut scheduler = scheduler(0.5);
        scheduler.start();
        assert_eq!(refresh(&mut scheduler), FrameDecision::Idle);

        scheduler.set_speed(-0.25);
        assert_eq!(refresh(&mut scheduler), FrameDecision::Idle);
        assert_eq!(scheduler.state().accumulator, 0.25);
        assert_eq!(refresh(&mut scheduler), FrameDecision::Idle);
        assert_eq!(refresh(&mut scheduler), FrameDecision::Idle);
        assert_eq!(scheduler.state().accumulator, 0.0);

        scheduler.set_speed(0.5);
        assert_eq!(refresh(&mut scheduler), FrameDecision::Idle);
        assert_eq!(refresh(&mut scheduler), FrameDecision::Advance);
    }

    #[test]
    fn test_restart_begins_from_zero() {
        let mut scheduler = scheduler(0.5);
        scheduler.start();
        refresh(&mut scheduler);
        scheduler.pause();
        scheduler.start();

        assert_eq!(scheduler.state().accumulator, 0.0);
        assert_eq!(refresh(&mut scheduler), FrameDecision::Idle);
    }
}
