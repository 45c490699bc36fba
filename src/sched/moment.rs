//! Moments: the scheduler's dispatchable units.
//!
//! A moment's semantics are entirely in its tag, so dispatch is one match
//! and the compiler checks exhaustiveness. All user hooks are boxed
//! closures over the experiment core; `S` is whatever state the
//! experiment threads through its trials.

use std::collections::VecDeque;

use crate::record::Recorder;
use crate::sched::event::Event;

pub type MomentFn<S> = Box<dyn FnMut(f64, &mut ExpCore<S>) -> anyhow::Result<()>>;
pub type PredFn<S> = Box<dyn FnMut(&Event, &mut ExpCore<S>) -> bool>;
pub type CondFn<S> = Box<dyn FnMut(&ExpCore<S>) -> bool>;
pub type BodyFn<S> = Box<dyn FnMut(&mut ExpCore<S>) -> Vec<Moment<S>>>;
pub type WatcherFn<S> = Box<dyn FnMut(&Event, &mut ExpCore<S>) -> anyhow::Result<()>>;

/// What an [`Moment::OffsetStart`] marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boundary {
    /// Increments the trial counter (and the offset counter with it).
    Trial,
    /// Increments only the offset counter, for practice blocks.
    Practice,
}

pub struct ResponseSpec<S> {
    /// Accepts or rejects an event. May mutate experiment state.
    pub accepts: PredFn<S>,
    /// Seconds after the moment's start at which the wait gives up.
    pub timeout: Option<f64>,
    pub on_timeout: Option<MomentFn<S>>,
    /// Minimum seconds the moment occupies even when answered early.
    pub atleast: f64,
}

pub enum Moment<S> {
    /// Run `run` once `delta_t` seconds have passed since the previous
    /// moment on the same queue started.
    Timed { delta_t: f64, run: MomentFn<S> },
    /// Trial or practice boundary; counts, records, then acts as
    /// `Timed { delta_t: 0 }`.
    OffsetStart {
        kind: Boundary,
        run: Option<MomentFn<S>>,
    },
    /// Wait for an accepted input event, with optional timeout and floor.
    Response(ResponseSpec<S>),
    /// Children run as a parallel queue starting at this moment's start.
    Compound(Vec<Moment<S>>),
    /// Evaluated at dispatch time: while `cond` holds, `body` is emitted
    /// in front of the queue (repeatedly when `looping`).
    Expanding {
        cond: CondFn<S>,
        body: BodyFn<S>,
        looping: bool,
    },
    /// Deferred until every queue is out of other work; runs exactly once.
    Final { run: MomentFn<S> },
}

impl<S> Moment<S> {
    pub fn is_final(&self) -> bool {
        matches!(self, Moment::Final { .. })
    }
}

/// An ordered run of moments plus the start time of the most recently
/// dispatched one (the reference point for `delta_t` and timeouts).
pub struct MomentQueue<S> {
    pub items: VecDeque<Moment<S>>,
    pub last: f64,
}

impl<S> MomentQueue<S> {
    pub fn new(items: Vec<Moment<S>>, last: f64) -> Self {
        MomentQueue {
            items: items.into(),
            last,
        }
    }

    pub fn has_non_final_work(&self) -> bool {
        self.items.iter().any(|m| !m.is_final())
    }
}

/// The part of an experiment that moment closures see: user state, the
/// counters, the clock, and the recorder.
pub struct ExpCore<S> {
    pub state: S,
    pub trial: usize,
    pub offset: usize,
    /// Scheduler clock at the current dispatch step.
    pub now: f64,
    /// Time of the most recent input event.
    pub last_event_time: f64,
    pub(crate) recorder: Option<Recorder>,
    pub(crate) watcher: Option<WatcherFn<S>>,
}

impl<S> ExpCore<S> {
    pub(crate) fn new(state: S) -> Self {
        ExpCore {
            state,
            trial: 0,
            offset: 0,
            now: 0.0,
            last_event_time: 0.0,
            recorder: None,
            watcher: None,
        }
    }

    /// Append a row to the experiment record with no extra columns.
    pub fn record(&mut self, code: &str) -> anyhow::Result<()> {
        self.record_with(code, &[])
    }

    /// Append a row with user-column values.
    pub fn record_with(&mut self, code: &str, values: &[(&str, &str)]) -> anyhow::Result<()> {
        if let Some(recorder) = self.recorder.as_ref() {
            recorder.record(code, self.offset, self.trial, self.now, values)?;
        }
        Ok(())
    }

    /// Replace the experiment's event watcher from inside a moment.
    pub fn set_watcher(
        &mut self,
        watcher: impl FnMut(&Event, &mut ExpCore<S>) -> anyhow::Result<()> + 'static,
    ) {
        self.watcher = Some(Box::new(watcher));
    }
}
