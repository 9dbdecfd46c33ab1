//! Frame scheduler.
//!
//! All per-frame work is split into ordered phases:
//!
//! `read → resolve_keyframes → update → pre_render → render → post_render`
//!
//! Every phase drains completely before the next one starts, so reads from
//! many elements are batched ahead of any writes. The host drives the loop by
//! calling [`Scheduler::process_frame`] from its frame callback whenever
//! [`Scheduler::needs_frame`] is true.
//!
//! # Usage
//!
//! ```ignore
//! use glide_motion::frameloop::{ManualClock, Phase, Scheduler};
//!
//! let clock = ManualClock::new();
//! let scheduler = Scheduler::new(clock.clone());
//! scheduler.update(|frame| println!("delta {}", frame.delta));
//! clock.advance(16.0);
//! scheduler.process_frame();
//! ```

mod clock;
mod render_step;

pub use clock::{Clock, ManualClock, SystemClock};

use glide_config::FrameConfig;
use render_step::RenderStep;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::trace;

/// Phases of a frame, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Read,
    ResolveKeyframes,
    Update,
    PreRender,
    Render,
    PostRender,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Read,
        Phase::ResolveKeyframes,
        Phase::Update,
        Phase::PreRender,
        Phase::Render,
        Phase::PostRender,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Timing data handed to every job.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameState {
    /// Milliseconds since the previous frame, clamped to the configured range.
    pub delta: f64,
    /// Timestamp of this frame in milliseconds.
    pub timestamp: f64,
    /// True while phases are being processed.
    pub is_processing: bool,
}

/// A job run by the scheduler. Identity is the allocation, so the same
/// `Process` can be cancelled or deduplicated.
pub type Process = Rc<dyn Fn(&FrameState)>;

/// Wrap a closure as a [`Process`].
pub fn process<F: Fn(&FrameState) + 'static>(f: F) -> Process {
    Rc::new(f)
}

struct SchedulerInner {
    steps: [RefCell<RenderStep>; 6],
    state: Cell<FrameState>,
    run_next_frame: Cell<bool>,
    use_default_elapsed: Cell<bool>,
    clock: Box<dyn Clock>,
    config: FrameConfig,
}

/// Cooperative single-threaded frame scheduler.
///
/// Cloning gives another handle to the same scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

/// Non-owning scheduler handle for jobs that must not keep it alive.
#[derive(Clone)]
pub struct WeakScheduler {
    inner: Weak<SchedulerInner>,
}

impl WeakScheduler {
    pub fn upgrade(&self) -> Option<Scheduler> {
        self.inner.upgrade().map(|inner| Scheduler { inner })
    }
}

impl Scheduler {
    /// Create a scheduler with default frame timing.
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self::with_config(clock, FrameConfig::default())
    }

    /// Create a scheduler with explicit frame timing.
    pub fn with_config(clock: impl Clock + 'static, config: FrameConfig) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                steps: Default::default(),
                state: Cell::new(FrameState::default()),
                run_next_frame: Cell::new(false),
                use_default_elapsed: Cell::new(true),
                clock: Box::new(clock),
                config,
            }),
        }
    }

    pub fn downgrade(&self) -> WeakScheduler {
        WeakScheduler {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Frame timing configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.inner.config
    }

    /// Queue `process` on `phase`.
    ///
    /// # Arguments
    /// * `keep_alive` - re-queue the job every frame until cancelled
    /// * `immediate` - if the phase is already running, run the job in this pass
    ///
    /// # Returns
    /// The same process, for later cancellation.
    pub fn schedule(&self, phase: Phase, process: Process, keep_alive: bool, immediate: bool) -> Process {
        if !self.inner.run_next_frame.get() {
            self.wake();
        }
        self.inner.steps[phase.index()]
            .borrow_mut()
            .schedule(process.clone(), keep_alive, immediate);
        process
    }

    pub fn read<F: Fn(&FrameState) + 'static>(&self, f: F) -> Process {
        self.schedule(Phase::Read, process(f), false, false)
    }

    pub fn resolve_keyframes<F: Fn(&FrameState) + 'static>(&self, f: F) -> Process {
        self.schedule(Phase::ResolveKeyframes, process(f), false, false)
    }

    pub fn update<F: Fn(&FrameState) + 'static>(&self, f: F) -> Process {
        self.schedule(Phase::Update, process(f), false, false)
    }

    pub fn pre_render<F: Fn(&FrameState) + 'static>(&self, f: F) -> Process {
        self.schedule(Phase::PreRender, process(f), false, false)
    }

    pub fn render<F: Fn(&FrameState) + 'static>(&self, f: F) -> Process {
        self.schedule(Phase::Render, process(f), false, false)
    }

    pub fn post_render<F: Fn(&FrameState) + 'static>(&self, f: F) -> Process {
        self.schedule(Phase::PostRender, process(f), false, false)
    }

    /// Remove `process` from every phase. A no-op if it already ran.
    pub fn cancel(&self, process: &Process) {
        for step in &self.inner.steps {
            step.borrow_mut().cancel(process);
        }
    }

    /// Whether `process` is queued on any phase.
    pub fn is_scheduled(&self, process: &Process) -> bool {
        self.inner.steps.iter().any(|s| s.borrow().is_scheduled(process))
    }

    /// Whether the host should request another frame callback.
    pub fn needs_frame(&self) -> bool {
        self.inner.run_next_frame.get() || self.inner.steps.iter().any(|s| s.borrow().has_pending())
    }

    /// Timing data of the current (or last) frame.
    pub fn frame_state(&self) -> FrameState {
        self.inner.state.get()
    }

    /// The frame timestamp while processing, otherwise the clock's time.
    ///
    /// Everything that starts during a frame agrees on the same "now".
    pub fn now(&self) -> f64 {
        let state = self.inner.state.get();
        if state.is_processing {
            state.timestamp
        } else {
            self.inner.clock.now()
        }
    }

    /// Process one frame at the clock's current time.
    pub fn process_frame(&self) {
        self.process_frame_at(self.inner.clock.now());
    }

    /// Process one frame at `timestamp`.
    pub fn process_frame_at(&self, timestamp: f64) {
        let inner = &self.inner;
        let config = &inner.config;
        let mut state = inner.state.get();

        inner.run_next_frame.set(false);
        state.delta = if inner.use_default_elapsed.get() {
            config.default_delta_ms
        } else {
            (timestamp - state.timestamp).clamp(config.min_delta_ms, config.max_delta_ms)
        };
        state.timestamp = timestamp;
        state.is_processing = true;
        inner.state.set(state);
        trace!(timestamp, delta = state.delta, "processing frame");

        for phase in Phase::ALL {
            self.process_step(phase);
        }

        let mut state = inner.state.get();
        state.is_processing = false;
        inner.state.set(state);

        if inner.run_next_frame.get() {
            inner.use_default_elapsed.set(false);
        }
    }

    /// Synchronously run a subset of phases outside the normal frame.
    ///
    /// Used after a layout commit so projection updates land before the
    /// host paints.
    pub fn flush_steps(&self, phases: &[Phase]) {
        let inner = &self.inner;
        let now = inner.clock.now();
        let mut state = inner.state.get();
        state.delta = (now - state.timestamp).clamp(0.0, inner.config.default_delta_ms);
        state.timestamp = now;
        state.is_processing = true;
        inner.state.set(state);

        for phase in phases {
            self.process_step(*phase);
        }

        let mut state = inner.state.get();
        state.is_processing = false;
        inner.state.set(state);
    }

    fn wake(&self) {
        self.inner.run_next_frame.set(true);
        self.inner.use_default_elapsed.set(true);
    }

    fn process_step(&self, phase: Phase) {
        let step = &self.inner.steps[phase.index()];
        loop {
            if !step.borrow_mut().begin() {
                return;
            }
            let state = self.inner.state.get();
            let mut index = 0;
            loop {
                let next = step.borrow().job(index);
                let Some((job, keep_alive)) = next else {
                    break;
                };
                if keep_alive {
                    self.schedule(phase, job.clone(), false, false);
                    self.inner.run_next_frame.set(true);
                }
                job(&state);
                index += 1;
            }
            if !step.borrow_mut().end() {
                return;
            }
        }
    }
}
