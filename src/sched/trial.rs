//! Builders for trial blocks.
//!
//! Conditions built with [`when`], [`when_else`] and [`while_loop`] are
//! re-evaluated when the scheduler reaches them, so branches see state
//! mutated by earlier moments. Branching with ordinary Rust control flow
//! instead would freeze every decision at build time, before the first
//! trial has run.

use crate::sched::event::Event;
use crate::sched::moment::{ExpCore, Moment, ResponseSpec};
use crate::units::IntoTime;

/// A function to run `delta_t` after the preceding moment's start.
pub fn moment<S>(
    delta_t: impl IntoTime,
    run: impl FnMut(f64, &mut ExpCore<S>) -> anyhow::Result<()> + 'static,
) -> Moment<S> {
    Moment::Timed {
        delta_t: delta_t.into_time().as_secs(),
        run: Box::new(run),
    }
}

/// A function to run immediately when its turn comes.
pub fn instant<S>(
    run: impl FnMut(f64, &mut ExpCore<S>) -> anyhow::Result<()> + 'static,
) -> Moment<S> {
    Moment::Timed {
        delta_t: 0.0,
        run: Box::new(run),
    }
}

/// Children presented as a parallel sub-queue.
pub fn compound<S>(children: Vec<Moment<S>>) -> Moment<S> {
    Moment::Compound(children)
}

/// Runs only after every queue has drained its other work.
pub fn final_moment<S>(
    run: impl FnMut(f64, &mut ExpCore<S>) -> anyhow::Result<()> + 'static,
) -> Moment<S> {
    Moment::Final { run: Box::new(run) }
}

/// Builder for a response wait.
pub struct ResponseBuilder<S> {
    spec: ResponseSpec<S>,
}

/// Wait for an event `accepts` approves of.
pub fn response<S>(
    accepts: impl FnMut(&Event, &mut ExpCore<S>) -> bool + 'static,
) -> ResponseBuilder<S> {
    ResponseBuilder {
        spec: ResponseSpec {
            accepts: Box::new(accepts),
            timeout: None,
            on_timeout: None,
            atleast: 0.0,
        },
    }
}

impl<S> ResponseBuilder<S> {
    /// Give up after `timeout`, running `on_timeout`.
    pub fn timeout(
        mut self,
        timeout: impl IntoTime,
        on_timeout: impl FnMut(f64, &mut ExpCore<S>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.spec.timeout = Some(timeout.into_time().as_secs());
        self.spec.on_timeout = Some(Box::new(on_timeout));
        self
    }

    /// Occupy at least `atleast` even when answered sooner.
    pub fn atleast(mut self, atleast: impl IntoTime) -> Self {
        self.spec.atleast = atleast.into_time().as_secs();
        self
    }

    pub fn build(self) -> Moment<S> {
        Moment::Response(self.spec)
    }
}

/// Unconditional block, expanded when dispatched.
pub fn block<S>(body: impl FnMut(&mut ExpCore<S>) -> Vec<Moment<S>> + 'static) -> Moment<S> {
    Moment::Expanding {
        cond: Box::new(|_| true),
        body: Box::new(body),
        looping: false,
    }
}

/// `body` runs only if `cond` holds when the scheduler reaches this point.
pub fn when<S>(
    cond: impl FnMut(&ExpCore<S>) -> bool + 'static,
    body: impl FnMut(&mut ExpCore<S>) -> Vec<Moment<S>> + 'static,
) -> Moment<S> {
    Moment::Expanding {
        cond: Box::new(cond),
        body: Box::new(body),
        looping: false,
    }
}

/// Dispatch-time if/else: exactly one branch is emitted.
pub fn when_else<S>(
    mut cond: impl FnMut(&ExpCore<S>) -> bool + 'static,
    mut then_body: impl FnMut(&mut ExpCore<S>) -> Vec<Moment<S>> + 'static,
    mut else_body: impl FnMut(&mut ExpCore<S>) -> Vec<Moment<S>> + 'static,
) -> Moment<S> {
    Moment::Expanding {
        cond: Box::new(|_| true),
        body: Box::new(move |core| {
            if cond(core) {
                then_body(core)
            } else {
                else_body(core)
            }
        }),
        looping: false,
    }
}

/// Dispatch-time while loop: `body` is re-emitted for as long as `cond`
/// holds at each pass.
pub fn while_loop<S>(
    cond: impl FnMut(&ExpCore<S>) -> bool + 'static,
    body: impl FnMut(&mut ExpCore<S>) -> Vec<Moment<S>> + 'static,
) -> Moment<S> {
    Moment::Expanding {
        cond: Box::new(cond),
        body: Box::new(body),
        looping: true,
    }
}
