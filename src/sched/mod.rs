//! The trial scheduler: a cooperative loop that advances moment queues
//! against an input source's clock.
//!
//! Each pass drains pending events (watcher first, then the single armed
//! response moment), then gives every non-empty queue at most one handle
//! step. Moments run on the control thread; the audio engine keeps its own
//! realtime schedule and only receives `play` calls from in here.

pub mod event;
pub mod moment;
pub mod trial;

pub use event::{Event, EventKind, EventSource, Key, MouseButton};
pub use moment::{Boundary, ExpCore, Moment, MomentQueue, ResponseSpec};

use tracing::debug;

use crate::record::Recorder;

pub struct Experiment<S> {
    core: ExpCore<S>,
    queues: Vec<MomentQueue<S>>,
}

impl<S> Experiment<S> {
    pub fn new(state: S) -> Self {
        Experiment {
            core: ExpCore::new(state),
            queues: Vec::new(),
        }
    }

    pub fn with_recorder(mut self, recorder: Recorder) -> Self {
        self.core.recorder = Some(recorder);
        self
    }

    /// Install the user event watcher, invoked on every input event before
    /// moment dispatch. Moment functions may replace it mid-run.
    pub fn set_watcher(
        &mut self,
        watcher: impl FnMut(&Event, &mut ExpCore<S>) -> anyhow::Result<()> + 'static,
    ) {
        self.core.watcher = Some(Box::new(watcher));
    }

    pub fn state(&self) -> &S {
        &self.core.state
    }

    pub fn into_state(self) -> S {
        self.core.state
    }

    fn main_queue(&mut self) -> &mut MomentQueue<S> {
        if self.queues.is_empty() {
            self.queues.push(MomentQueue::new(Vec::new(), 0.0));
        }
        &mut self.queues[0]
    }

    /// Append moments to the primary queue.
    pub fn add_moments(&mut self, moments: Vec<Moment<S>>) {
        self.main_queue().items.extend(moments);
    }

    pub fn add_moment(&mut self, moment: Moment<S>) {
        self.main_queue().items.push_back(moment);
    }

    /// Append a trial: a boundary marker followed by its moments.
    pub fn add_trial(&mut self, moments: Vec<Moment<S>>) {
        self.add_moment(Moment::OffsetStart {
            kind: Boundary::Trial,
            run: None,
        });
        self.add_moments(moments);
    }

    /// Append a practice block: bumps only the offset counter.
    pub fn add_practice(&mut self, moments: Vec<Moment<S>>) {
        self.add_moment(Moment::OffsetStart {
            kind: Boundary::Practice,
            run: None,
        });
        self.add_moments(moments);
    }

    /// Drive the experiment to completion. Returns early on a `Quit`
    /// event; errors from moment functions terminate the run.
    pub fn run(&mut self, source: &mut impl EventSource) -> anyhow::Result<()> {
        loop {
            self.core.now = source.now();

            while let Some(ev) = source.poll() {
                if ev.kind == EventKind::Quit {
                    debug!("quit event: abandoning {} queue(s)", self.queues.len());
                    self.queues.clear();
                    return Ok(());
                }
                self.core.last_event_time = ev.time;
                self.dispatch_watcher(&ev)?;
                self.deliver_response(&ev)?;
            }

            let mut progressed = false;
            for i in 0..self.queues.len() {
                progressed |= self.handle_one(i)?;
            }
            self.queues.retain(|q| !q.items.is_empty());
            if self.queues.is_empty() {
                return Ok(());
            }
            if !progressed {
                source.idle();
            }
        }
    }

    fn dispatch_watcher(&mut self, ev: &Event) -> anyhow::Result<()> {
        if let Some(mut watcher) = self.core.watcher.take() {
            let result = watcher(ev, &mut self.core);
            // keep the old watcher unless the handler installed a new one
            if self.core.watcher.is_none() {
                self.core.watcher = Some(watcher);
            }
            result?;
        }
        Ok(())
    }

    /// Hand `ev` to the armed response moment, if any. Only the first
    /// response head across the queues owns the event-dispatch slot.
    fn deliver_response(&mut self, ev: &Event) -> anyhow::Result<()> {
        for i in 0..self.queues.len() {
            let is_response = matches!(self.queues[i].items.front(), Some(Moment::Response(_)));
            if !is_response {
                continue;
            }
            let Some(Moment::Response(mut spec)) = self.queues[i].items.pop_front() else {
                unreachable!("head checked above");
            };
            if (spec.accepts)(ev, &mut self.core) {
                let elapsed = ev.time - self.queues[i].last;
                self.queues[i].last = ev.time;
                if spec.atleast > 0.0 && elapsed < spec.atleast {
                    // answered early: hold the floor with a do-nothing
                    // timed moment for the remainder
                    self.queues[i].items.push_front(Moment::Timed {
                        delta_t: spec.atleast - elapsed,
                        run: Box::new(|_, _| Ok(())),
                    });
                }
            } else {
                self.queues[i].items.push_front(Moment::Response(spec));
            }
            return Ok(());
        }
        Ok(())
    }

    /// One handle step for queue `i`. Returns whether anything ran.
    fn handle_one(&mut self, i: usize) -> anyhow::Result<bool> {
        let now = self.core.now;
        let Some(head) = self.queues[i].items.pop_front() else {
            return Ok(false);
        };
        match head {
            Moment::Timed { delta_t, mut run } => {
                if now >= self.queues[i].last + delta_t {
                    self.queues[i].last = now;
                    run(now, &mut self.core)?;
                    Ok(true)
                } else {
                    self.queues[i]
                        .items
                        .push_front(Moment::Timed { delta_t, run });
                    Ok(false)
                }
            }
            Moment::OffsetStart { kind, run } => {
                self.core.offset += 1;
                let code = match kind {
                    Boundary::Trial => {
                        self.core.trial += 1;
                        "trial_start"
                    }
                    Boundary::Practice => "practice_start",
                };
                self.core.record(code)?;
                self.queues[i].last = now;
                if let Some(mut run) = run {
                    run(now, &mut self.core)?;
                }
                Ok(true)
            }
            Moment::Response(mut spec) => {
                let timed_out = spec
                    .timeout
                    .is_some_and(|t| now >= self.queues[i].last + t);
                if timed_out {
                    self.queues[i].last = now;
                    if let Some(mut on_timeout) = spec.on_timeout.take() {
                        on_timeout(now, &mut self.core)?;
                    }
                    Ok(true)
                } else {
                    self.queues[i].items.push_front(Moment::Response(spec));
                    Ok(false)
                }
            }
            Moment::Compound(children) => {
                // children run in parallel with the rest of this queue,
                // measured from the enclosing moment's start
                let last = self.queues[i].last;
                self.queues.push(MomentQueue::new(children, last));
                Ok(true)
            }
            Moment::Expanding {
                mut cond,
                mut body,
                looping,
            } => {
                if cond(&self.core) {
                    let moments = body(&mut self.core);
                    if looping {
                        self.queues[i].items.push_front(Moment::Expanding {
                            cond,
                            body,
                            looping,
                        });
                    }
                    for m in moments.into_iter().rev() {
                        self.queues[i].items.push_front(m);
                    }
                    Ok(true)
                } else {
                    Ok(true)
                }
            }
            Moment::Final { mut run } => {
                let work_pending = self.queues.iter().any(|q| q.has_non_final_work());
                if work_pending {
                    // park it behind a queue that still has real work
                    let target = self
                        .queues
                        .iter()
                        .position(|q| q.has_non_final_work())
                        .expect("checked above");
                    self.queues[target].items.push_back(Moment::Final { run });
                    Ok(false)
                } else {
                    self.queues[i].last = now;
                    run(now, &mut self.core)?;
                    Ok(true)
                }
            }
        }
    }
}
