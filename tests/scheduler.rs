//! Run-loop semantics: timing, response waits, parallel queues, finals.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use psych::sched::trial::{compound, final_moment, instant, moment, response};
use psych::sched::{Event, EventKind, EventSource, Experiment, Key};
use psych::units::UnitExt;

/// Deterministic source: a fixed event script and a clock that advances
/// only when the scheduler reports no progress.
struct ScriptedSource {
    now: f64,
    step: f64,
    events: VecDeque<Event>,
}

impl ScriptedSource {
    fn new(events: Vec<Event>) -> Self {
        ScriptedSource {
            now: 0.0,
            step: 0.01,
            events: events.into(),
        }
    }

    fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl EventSource for ScriptedSource {
    fn now(&self) -> f64 {
        self.now
    }

    fn poll(&mut self) -> Option<Event> {
        if self.events.front().is_some_and(|ev| ev.time <= self.now) {
            self.events.pop_front()
        } else {
            None
        }
    }

    fn idle(&mut self) {
        self.now += self.step;
        assert!(self.now < 60.0, "scheduler failed to drain its queues");
    }
}

type Log = Rc<RefCell<Vec<(String, f64)>>>;

fn logger(log: &Log, tag: &str) -> impl FnMut(f64, &mut psych::sched::ExpCore<()>) -> anyhow::Result<()> {
    let log = log.clone();
    let tag = tag.to_string();
    move |now, _| {
        log.borrow_mut().push((tag.clone(), now));
        Ok(())
    }
}

#[test]
fn timed_moments_run_in_order_at_their_offsets() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let mut exp = Experiment::new(());
    exp.add_moments(vec![
        moment(0.1.secs(), logger(&log, "a")),
        moment(0.2.secs(), logger(&log, "b")),
    ]);
    exp.run(&mut ScriptedSource::empty()).unwrap();

    let log = log.borrow();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].0, "a");
    assert!((log[0].1 - 0.1).abs() < 0.02, "a at {}", log[0].1);
    assert_eq!(log[1].0, "b");
    assert!((log[1].1 - 0.3).abs() < 0.02, "b at {}", log[1].1);
}

#[test]
fn final_moment_waits_for_all_other_work() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let mut exp = Experiment::new(());
    exp.add_moments(vec![
        final_moment(logger(&log, "final")),
        moment(0.05.secs(), logger(&log, "work")),
        compound(vec![moment(0.1.secs(), logger(&log, "parallel"))]),
    ]);
    exp.run(&mut ScriptedSource::empty()).unwrap();

    let log = log.borrow();
    let names: Vec<&str> = log.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names.last(), Some(&"final"));
    assert_eq!(
        names.iter().filter(|n| **n == "final").count(),
        1,
        "final must run exactly once"
    );
    assert!(names.contains(&"work") && names.contains(&"parallel"));
}

#[test]
fn every_final_runs_once_after_drain() {
    let counter = Rc::new(RefCell::new(0));
    let mut exp = Experiment::new(());
    for _ in 0..3 {
        let c = counter.clone();
        exp.add_moment(final_moment(move |_, _| {
            *c.borrow_mut() += 1;
            Ok(())
        }));
    }
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    exp.add_moment(moment(0.05.secs(), logger(&log, "work")));
    exp.run(&mut ScriptedSource::empty()).unwrap();
    assert_eq!(*counter.borrow(), 3);
}

#[test]
fn compound_children_run_parallel_to_the_parent_queue() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let mut exp = Experiment::new(());
    exp.add_moments(vec![
        moment(0.1.secs(), logger(&log, "lead")),
        compound(vec![moment(0.1.secs(), logger(&log, "child"))]),
        moment(0.1.secs(), logger(&log, "main")),
    ]);
    exp.run(&mut ScriptedSource::empty()).unwrap();

    let log = log.borrow();
    let child = log.iter().find(|(n, _)| n == "child").unwrap().1;
    let main = log.iter().find(|(n, _)| n == "main").unwrap().1;
    // both measure 0.1 s from the compound's start, not from each other
    assert!((child - main).abs() < 0.03, "child {child} vs main {main}");
}

#[test]
fn response_accepts_matching_event() {
    let mut exp = Experiment::new(false);
    exp.add_moment(
        response(|ev: &Event, core: &mut psych::sched::ExpCore<bool>| {
            if ev.pressed_char() == Some('y') {
                core.state = true;
                true
            } else {
                false
            }
        })
        .timeout(1.0.secs(), |_, _| Ok(()))
        .build(),
    );
    let mut source = ScriptedSource::new(vec![
        Event::key_down(0.05, Key::Char('n')),
        Event::key_down(0.2, Key::Char('y')),
    ]);
    exp.run(&mut source).unwrap();
    assert!(*exp.state(), "the accepted response must reach the state");
    assert!(source.now < 0.9, "should not have waited for the timeout");
}

#[test]
fn response_times_out() {
    let timed_out = Rc::new(RefCell::new(false));
    let flag = timed_out.clone();
    let mut exp = Experiment::new(());
    exp.add_moment(
        response(|_: &Event, _: &mut psych::sched::ExpCore<()>| true)
            .timeout(0.3.secs(), move |_, _| {
                *flag.borrow_mut() = true;
                Ok(())
            })
            .build(),
    );
    let mut source = ScriptedSource::empty();
    exp.run(&mut source).unwrap();
    assert!(*timed_out.borrow());
    assert!((source.now - 0.3).abs() < 0.05, "timed out at {}", source.now);
}

#[test]
fn early_response_holds_the_atleast_floor() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let mut exp = Experiment::new(());
    exp.add_moment(
        response(|_: &Event, _: &mut psych::sched::ExpCore<()>| true)
            .atleast(0.5.secs())
            .build(),
    );
    exp.add_moment(instant(logger(&log, "after")));
    let mut source = ScriptedSource::new(vec![Event::key_down(0.1, Key::Space)]);
    exp.run(&mut source).unwrap();

    let after = log.borrow()[0].1;
    assert!(after >= 0.5 - 0.02, "floor violated: follow-up at {after}");
    assert!(after <= 0.55, "floor overshot: follow-up at {after}");
}

#[test]
fn watcher_sees_every_event_and_can_be_replaced() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut exp = Experiment::new(());
    {
        let seen = seen.clone();
        exp.set_watcher(move |ev, _| {
            seen.borrow_mut().push(ev.kind);
            Ok(())
        });
    }
    let swapped = Rc::new(RefCell::new(0u32));
    {
        let swapped = swapped.clone();
        exp.add_moment(instant(move |_, core| {
            let swapped = swapped.clone();
            core.set_watcher(move |_, _| {
                *swapped.borrow_mut() += 1;
                Ok(())
            });
            Ok(())
        }));
    }
    exp.add_moment(moment(0.2.secs(), |_, _| Ok(())));
    let mut source = ScriptedSource::new(vec![
        Event::key_down(0.0, Key::Char('a')),
        Event::key_down(0.1, Key::Char('b')),
    ]);
    exp.run(&mut source).unwrap();

    // first event hits the original watcher; the instant moment then
    // installs the replacement which takes the second
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(*swapped.borrow(), 1);
}

#[test]
fn moment_errors_terminate_the_run() {
    let mut exp = Experiment::new(());
    exp.add_moments(vec![
        instant(|_, _| anyhow::bail!("bad trial")),
        moment(0.1.secs(), |_, _| Ok(())),
    ]);
    let err = exp.run(&mut ScriptedSource::empty()).unwrap_err();
    assert!(err.to_string().contains("bad trial"));
}

#[test]
fn quit_event_ends_the_run_early() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let mut exp = Experiment::new(());
    exp.add_moment(moment(5.0.secs(), logger(&log, "never")));
    let mut source = ScriptedSource::new(vec![Event {
        time: 0.05,
        kind: EventKind::Quit,
    }]);
    exp.run(&mut source).unwrap();
    assert!(log.borrow().is_empty());
    assert!(source.now < 1.0);
}

#[test]
fn trial_counters_advance() {
    let counts = Rc::new(RefCell::new(Vec::new()));
    let mut exp = Experiment::new(());
    for _ in 0..2 {
        let counts = counts.clone();
        exp.add_trial(vec![instant(move |_, core| {
            counts.borrow_mut().push((core.trial, core.offset));
            Ok(())
        })]);
    }
    {
        let counts = counts.clone();
        exp.add_practice(vec![instant(move |_, core| {
            counts.borrow_mut().push((core.trial, core.offset));
            Ok(())
        })]);
    }
    exp.run(&mut ScriptedSource::empty()).unwrap();
    assert_eq!(*counts.borrow(), vec![(1, 1), (2, 2), (2, 3)]);
}
