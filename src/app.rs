use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::{
    config::LifeConfig,
    gfx::{
        backend::WgpuBackend,
        rendering::{DrawPass, RenderEngine},
    },
    performance::PacingMonitor,
    simulation::{
        FrameDecision, FrameHandle, FrameScheduler, FrameSource, SimulationManager, Universe,
    },
};

const WINDOW_TITLE: &str = "lifeview";
const FALLBACK_REFRESH_MILLIHERTZ: u32 = 60_000;
const TITLE_UPDATE_INTERVAL: Duration = Duration::from_millis(500);

type LifeManager = SimulationManager<WgpuBackend, Universe, DisplayFrames>;

/// Refresh callbacks paced by the monitor's refresh interval
///
/// A request arms a deadline one refresh after the previous callback; the event
/// loop wakes at that deadline and asks the window for a redraw, and the
/// resulting `RedrawRequested` delivers the armed handle.
#[derive(Debug)]
pub struct DisplayFrames {
    interval: Duration,
    next_id: u64,
    armed: Option<(FrameHandle, Instant)>,
    last_fired: Option<Instant>,
}

impl DisplayFrames {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_id: 0,
            armed: None,
            last_fired: None,
        }
    }

    /// Interval for a refresh rate in millihertz, as reported by winit monitors
    pub fn from_refresh_millihertz(millihertz: u32) -> Self {
        let millihertz = if millihertz == 0 {
            FALLBACK_REFRESH_MILLIHERTZ
        } else {
            millihertz
        };
        Self::new(Duration::from_nanos(1_000_000_000_000 / millihertz as u64))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the armed request becomes due, if one is armed
    pub fn next_deadline(&self) -> Option<Instant> {
        self.armed.map(|(_, deadline)| deadline)
    }

    /// Hands out the armed request once its deadline has passed
    pub fn take_due(&mut self, now: Instant) -> Option<FrameHandle> {
        match self.armed {
            Some((handle, deadline)) if deadline <= now => {
                self.armed = None;
                self.last_fired = Some(now);
                Some(handle)
            }
            _ => None,
        }
    }
}

impl FrameSource for DisplayFrames {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle::new(self.next_id);
        let now = Instant::now();
        let deadline = self
            .last_fired
            .map(|fired| (fired + self.interval).max(now))
            .unwrap_or(now);
        self.armed = Some((handle, deadline));
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if matches!(self.armed, Some((armed, _)) if armed == handle) {
            self.armed = None;
        }
    }
}

/// Windowed Game of Life viewer
pub struct LifeApp {
    event_loop: Option<EventLoop<()>>,
    app_state: AppState,
}

struct AppState {
    config: LifeConfig,
    window: Option<Arc<Window>>,
    manager: Option<LifeManager>,
    monitor: PacingMonitor,
    last_title_update: Instant,
    fatal: Option<anyhow::Error>,
}

impl LifeApp {
    pub fn new(config: LifeConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid configuration")?;
        let event_loop = EventLoop::new().context("failed to create event loop")?;

        Ok(Self {
            event_loop: Some(event_loop),
            app_state: AppState {
                config,
                window: None,
                manager: None,
                monitor: PacingMonitor::new(),
                last_title_update: Instant::now(),
                fatal: None,
            },
        })
    }

    /// Runs until the window closes; returns the first fatal error, if any
    pub fn run(mut self) -> anyhow::Result<()> {
        let event_loop = self
            .event_loop
            .take()
            .context("event loop already consumed")?;
        event_loop.set_control_flow(ControlFlow::Wait);

        event_loop
            .run_app(&mut self.app_state)
            .context("event loop failed")?;

        match self.app_state.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl AppState {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let (width, height) = self.config.surface_size();
        let window = event_loop
            .create_window(
                WindowAttributes::default()
                    .with_title(WINDOW_TITLE)
                    .with_inner_size(PhysicalSize::new(width, height)),
            )
            .context("failed to create window")?;
        let window = Arc::new(window);
        self.window = Some(window.clone());

        let (width, height) = window.inner_size().into();
        let backend = pollster::block_on(WgpuBackend::new(window.clone(), width, height))?;

        let universe = Universe::new_random(self.config.width, self.config.height)?;
        let engine = RenderEngine::new(
            backend,
            &universe,
            DrawPass::new(self.config.cell_size, self.config.grid_lines),
        )?;

        let refresh = window
            .current_monitor()
            .and_then(|monitor| monitor.refresh_rate_millihertz())
            .unwrap_or(FALLBACK_REFRESH_MILLIHERTZ);
        let frames = DisplayFrames::from_refresh_millihertz(refresh);
        log::info!(
            "{}x{} cells at {}px, speed {:.3}, refresh every {:?}",
            self.config.width,
            self.config.height,
            self.config.cell_size,
            self.config.speed,
            frames.interval()
        );

        let mut manager =
            SimulationManager::new(universe, engine, FrameScheduler::new(frames, self.config.speed));
        manager.redraw()?;
        self.monitor.record_redraw(Instant::now());
        self.manager = Some(manager);
        self.update_title(true);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
        event_loop.exit();
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, key: KeyCode) -> anyhow::Result<()> {
        let Some(manager) = self.manager.as_mut() else {
            return Ok(());
        };

        match key {
            KeyCode::Escape => event_loop.exit(),
            KeyCode::Space => {
                if manager.is_running() {
                    manager.pause();
                    self.monitor.reset();
                } else {
                    manager.start();
                }
            }
            KeyCode::KeyR => {
                manager.reset()?;
                self.monitor.reset();
                self.monitor.record_redraw(Instant::now());
            }
            KeyCode::Equal | KeyCode::NumpadAdd => {
                manager.set_speed(manager.speed() * 2.0);
                log::info!("speed {:.4}", manager.speed());
            }
            KeyCode::Minus | KeyCode::NumpadSubtract => {
                manager.set_speed(manager.speed() / 2.0);
                log::info!("speed {:.4}", manager.speed());
            }
            _ => return Ok(()),
        }

        self.update_title(true);
        Ok(())
    }

    fn on_redraw(&mut self) -> anyhow::Result<()> {
        let Some(manager) = self.manager.as_mut() else {
            return Ok(());
        };

        let now = Instant::now();
        // Redraws the platform asks for on its own carry no handle
        let Some(handle) = manager.frames_mut().take_due(now) else {
            return Ok(());
        };

        let decision = manager.on_refresh(handle)?;
        self.monitor
            .record_refresh(now, decision == FrameDecision::Advance);
        self.update_title(false);
        Ok(())
    }

    fn on_resize(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        let Some(manager) = self.manager.as_mut() else {
            return Ok(());
        };
        if width == 0 || height == 0 {
            return Ok(());
        }

        manager.engine_mut().backend_mut().resize(width, height);
        // Surface contents are gone after a reconfigure
        manager.redraw()?;
        self.monitor.record_redraw(Instant::now());
        Ok(())
    }

    fn update_title(&mut self, force: bool) {
        let (Some(window), Some(manager)) = (self.window.as_ref(), self.manager.as_ref()) else {
            return;
        };
        if !force && self.last_title_update.elapsed() < TITLE_UPDATE_INTERVAL {
            return;
        }
        self.last_title_update = Instant::now();

        let stats = manager.stats();
        let status = if manager.is_running() {
            self.monitor.summary()
        } else {
            "paused".to_owned()
        };
        window.set_title(&format!(
            "{WINDOW_TITLE} - gen {} - {} cells - speed {:.3} - {status}",
            stats.ticks,
            manager.last_frame().cell_points,
            manager.speed()
        ));
        log::debug!("pacing {:?}", self.monitor.metrics());
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(err) = self.init(event_loop) {
            self.fail(event_loop, err.context("startup failed"));
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let result = match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
                Ok(())
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key_code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => self.handle_key(event_loop, key_code),
            WindowEvent::Resized(PhysicalSize { width, height }) => self.on_resize(width, height),
            WindowEvent::RedrawRequested => self.on_redraw(),
            _ => Ok(()),
        };

        if let Err(err) = result {
            self.fail(event_loop, err);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(manager)) = (self.window.as_ref(), self.manager.as_ref()) else {
            return;
        };

        match manager.scheduler().frames().next_deadline() {
            Some(deadline) if deadline <= Instant::now() => {
                window.request_redraw();
                event_loop.set_control_flow(ControlFlow::Wait);
            }
            Some(deadline) => event_loop.set_control_flow(ControlFlow::WaitUntil(deadline)),
            // Paused: sleep until input arrives
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(manager) = self.manager.take() {
            let (_backend, universe) = manager.destroy();
            log::info!("exiting with {} live cells", universe.live_count());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_is_due_immediately() {
        let mut frames = DisplayFrames::new(Duration::from_millis(16));
        let handle = frames.request_frame();
        assert_eq!(frames.take_due(Instant::now()), Some(handle));
        assert_eq!(frames.next_deadline(), None);
    }

    #[test]
    fn test_next_request_waits_one_interval() {
        let mut frames = DisplayFrames::new(Duration::from_millis(16));
        frames.request_frame();
        let fired = Instant::now();
        frames.take_due(fired).unwrap();

        let handle = frames.request_frame();
        let deadline = frames.next_deadline().unwrap();
        assert!(deadline >= fired + Duration::from_millis(16));
        assert_eq!(frames.take_due(fired), None);
        assert_eq!(frames.take_due(deadline), Some(handle));
    }

    #[test]
    fn test_cancel_disarms_only_matching_handle() {
        let mut frames = DisplayFrames::new(Duration::from_millis(16));
        let first = frames.request_frame();
        frames.cancel_frame(FrameHandle::new(first.id() + 100));
        assert!(frames.next_deadline().is_some());

        frames.cancel_frame(first);
        assert!(frames.next_deadline().is_none());
        assert_eq!(frames.take_due(Instant::now() + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_refresh_rate_conversion() {
        let frames = DisplayFrames::from_refresh_millihertz(50_000);
        assert_eq!(frames.interval(), Duration::from_millis(20));

        let fallback = DisplayFrames::from_refresh_millihertz(0);
        assert!(fallback.interval() > Duration::from_millis(16));
        assert!(fallback.interval() < Duration::from_millis(17));
    }

    #[test]
    fn test_scheduler_over_display_frames_ignores_stale_handle() {
        let mut scheduler = FrameScheduler::new(DisplayFrames::new(Duration::ZERO), 1.0);
        scheduler.start();
        let handle = scheduler.frames_mut().take_due(Instant::now()).unwrap();
        scheduler.pause();

        assert_eq!(scheduler.on_frame(handle), FrameDecision::Ignored);
        assert!(scheduler.frames().next_deadline().is_none());
    }
}
