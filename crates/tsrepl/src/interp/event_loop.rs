//! Microtask queue, timers and fault collection for the shared host event loop.

use std::{
    collections::{BTreeMap, VecDeque},
    rc::Rc,
    time::{Duration, Instant},
};

use ahash::AHashMap;

use super::{Interp, JsResult, Throw, object::ObjRef, value::Value};
use crate::events::FaultKind;

/// Session and namespace that scheduled a piece of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Origin {
    pub session_id: String,
    pub namespace_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

/// One line written through a namespace console.
#[derive(Debug, Clone)]
pub(crate) struct ConsoleLine {
    pub origin: Option<Rc<Origin>>,
    pub level: ConsoleLevel,
    pub text: String,
}

/// An exception nobody caught, or a rejection nobody handled.
#[derive(Debug, Clone)]
pub(crate) struct Fault {
    pub origin: Option<Rc<Origin>>,
    pub kind: FaultKind,
    pub value: Value,
}

pub(crate) enum Job {
    /// Runs a promise reaction and settles the derived promise with its outcome.
    Reaction {
        handler: Value,
        argument: Value,
        rejected: bool,
        derived: Option<ObjRef>,
    },
    /// Calls `thenable.then(resolve, reject)` for a promise resolved with a thenable.
    ResolveThenable { promise: ObjRef, thenable: Value, then: Value },
    /// `queueMicrotask` and `process.nextTick` callbacks.
    Callback { callback: Value, args: Vec<Value> },
}

struct Task {
    job: Job,
    origin: Option<Rc<Origin>>,
}

struct Timer {
    id: u64,
    callback: Value,
    args: Vec<Value>,
    interval: Option<Duration>,
    origin: Option<Rc<Origin>>,
}

#[derive(Default)]
pub(crate) struct EventLoop {
    microtasks: VecDeque<Task>,
    /// Pending timers ordered by due time, then by scheduling order.
    timers: BTreeMap<(Instant, u64), Timer>,
    /// Timer id to its key in `timers`.
    timer_keys: AHashMap<u64, (Instant, u64)>,
    next_seq: u64,
}

impl EventLoop {
    pub fn has_microtasks(&self) -> bool {
        !self.microtasks.is_empty()
    }

    pub fn next_timer_due(&self) -> Option<Instant> {
        self.timers.keys().next().map(|(due, _)| *due)
    }

    /// Drops every timer and microtask scheduled from a namespace of `session_id`.
    pub fn cancel_origin(&mut self, session_id: &str) {
        let owned = |origin: &Option<Rc<Origin>>| origin.as_ref().is_some_and(|o| o.session_id == session_id);
        self.microtasks.retain(|task| !owned(&task.origin));
        let doomed: Vec<_> = self
            .timers
            .iter()
            .filter(|(_, timer)| owned(&timer.origin))
            .map(|(key, timer)| (*key, timer.id))
            .collect();
        for (key, id) in doomed {
            self.timers.remove(&key);
            self.timer_keys.remove(&id);
        }
    }
}

impl Interp {
    /// Queues a microtask charged to the running origin.
    pub(crate) fn enqueue_job(&mut self, job: Job) {
        let origin = self.origin.clone();
        self.event_loop.microtasks.push_back(Task { job, origin });
    }

    /// Schedules `callback` after `delay`, returning the timer id.
    pub(crate) fn schedule_timer(&mut self, callback: Value, delay: Duration, args: Vec<Value>, repeat: bool) -> u64 {
        let event_loop = &mut self.event_loop;
        event_loop.next_seq += 1;
        let id = event_loop.next_seq;
        let key = (Instant::now() + delay, id);
        event_loop.timers.insert(key, Timer {
            id,
            callback,
            args,
            interval: repeat.then_some(delay),
            origin: self.origin.clone(),
        });
        event_loop.timer_keys.insert(id, key);
        id
    }

    pub(crate) fn clear_timer(&mut self, id: u64) {
        if let Some(key) = self.event_loop.timer_keys.remove(&id) {
            self.event_loop.timers.remove(&key);
        }
    }

    /// Runs microtasks until the queue is empty, including ones queued along the way.
    pub(crate) fn run_microtasks(&mut self) {
        while let Some(task) = self.event_loop.microtasks.pop_front() {
            self.with_origin(task.origin, |interp| interp.run_job(task.job));
        }
    }

    fn run_job(&mut self, job: Job) {
        match job {
            Job::Reaction {
                handler,
                argument,
                rejected,
                derived,
            } => {
                let outcome = if handler.is_callable() {
                    self.call(&handler, Value::Undefined, &[argument])
                } else if rejected {
                    Err(Throw(argument))
                } else {
                    Ok(argument)
                };
                match (outcome, derived) {
                    (Ok(value), Some(derived)) => self.resolve_promise(&derived, value),
                    (Err(thrown), Some(derived)) => self.reject_promise(&derived, thrown.0),
                    (Err(thrown), None) => self.record_fault(FaultKind::UncaughtException, thrown.0),
                    (Ok(_), None) => {}
                }
            }
            Job::ResolveThenable {
                promise,
                thenable,
                then,
            } => {
                let (resolve, reject) = self.resolving_functions(&promise);
                let args = [Value::Object(resolve), Value::Object(reject)];
                if let Err(thrown) = self.call(&then, thenable, &args) {
                    self.reject_promise(&promise, thrown.0);
                }
            }
            Job::Callback { callback, args } => {
                if let Err(thrown) = self.call(&callback, Value::Undefined, &args) {
                    self.record_fault(FaultKind::UncaughtException, thrown.0);
                }
            }
        }
    }

    pub(crate) fn record_fault(&mut self, kind: FaultKind, value: Value) {
        self.faults.push(Fault {
            origin: self.origin.clone(),
            kind,
            value,
        });
    }

    /// Fires the earliest timer if it is due by `now`. Returns whether one ran.
    fn run_timer_due_by(&mut self, now: Instant) -> bool {
        let Some(entry) = self.event_loop.timers.first_entry() else {
            return false;
        };
        if entry.key().0 > now {
            return false;
        }
        let timer = entry.remove();
        self.event_loop.timer_keys.remove(&timer.id);
        if let Some(interval) = timer.interval {
            // re-arm before running so the callback can clear its own interval
            let key = (now + interval.max(Duration::from_millis(1)), timer.id);
            self.event_loop.timer_keys.insert(timer.id, key);
            self.event_loop.timers.insert(key, Timer {
                id: timer.id,
                callback: timer.callback.clone(),
                args: timer.args.clone(),
                interval: timer.interval,
                origin: timer.origin.clone(),
            });
        }
        self.with_origin(timer.origin, |interp| {
            if let Err(thrown) = interp.call(&timer.callback, Value::Undefined, &timer.args) {
                interp.record_fault(FaultKind::UncaughtException, thrown.0);
            }
            interp.run_microtasks();
        });
        true
    }

    /// Runs every timer due now, draining microtasks after each.
    pub(crate) fn run_due_timers(&mut self) {
        self.run_microtasks();
        let now = Instant::now();
        while self.run_timer_due_by(now) {}
        self.check_unhandled_rejections();
    }

    /// One turn of the loop on behalf of a blocked `await`: drains microtasks or, failing
    /// that, sleeps until the earliest timer and runs it. Returns `false` when nothing is
    /// left that could make progress.
    pub(crate) fn turn_event_loop(&mut self) -> bool {
        if self.event_loop.has_microtasks() {
            self.run_microtasks();
            return true;
        }
        let Some(due) = self.event_loop.next_timer_due() else {
            return false;
        };
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
        self.run_timer_due_by(due.max(now))
    }

    /// Turns rejections that are still unhandled after the microtask drain into faults.
    pub(crate) fn check_unhandled_rejections(&mut self) {
        for (promise, origin) in std::mem::take(&mut self.unhandled) {
            let Some(value) = promise.unhandled_reason() else {
                continue;
            };
            promise.mark_handled();
            self.faults.push(Fault {
                origin,
                kind: FaultKind::UnhandledRejection,
                value,
            });
        }
    }

    /// Drives the loop until `is_done` holds or no work remains.
    pub(crate) fn run_until(&mut self, mut is_done: impl FnMut(&Self) -> bool) -> JsResult<()> {
        while !is_done(self) {
            if !self.turn_event_loop() {
                return Err(self.throw(
                    super::ErrorType::Error,
                    "Promise never settled: no pending jobs or timers remain",
                ));
            }
        }
        Ok(())
    }
}
