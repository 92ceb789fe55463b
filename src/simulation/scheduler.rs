//! Tick-driven process scheduler.
//!
//! Processes are step closures over a shared state `S`. Each step performs one
//! period of work at the current tick and returns the delay (at least one
//! tick) until it wants to run again. The queue maps wake ticks to process
//! ids, so processes due on the same tick resume in registration order.
//!
//! The scheduler never stops by itself: the caller supplies a horizon to
//! [`Scheduler::run_until`] and can call it again later to continue.

use std::collections::BTreeMap;

use super::types::{SimError, Tick};

/// Position of a process in registration order.
pub type ProcessId = usize;

/// One period of a process: `(state, now) -> delay until next activation`.
pub type Step<S> = Box<dyn FnMut(&mut S, Tick) -> Result<Tick, SimError>>;

struct Process<S> {
    name: String,
    step: Step<S>,
}

pub struct Scheduler<S> {
    now: Tick,
    processes: Vec<Process<S>>,
    // Wake tick -> processes due at that tick
    queue: BTreeMap<Tick, Vec<ProcessId>>,
}

impl<S> Default for Scheduler<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Scheduler<S> {
    pub fn new() -> Self {
        Self {
            now: 0,
            processes: Vec::new(),
            queue: BTreeMap::new(),
        }
    }

    /// Tick of the most recent resumption.
    pub fn now(&self) -> Tick {
        self.now
    }

    /// Earliest tick any process is waiting for.
    pub fn next_wake(&self) -> Option<Tick> {
        self.queue.first_key_value().map(|(tick, _)| *tick)
    }

    /// Process names in registration order, which is also their same-tick
    /// resumption order.
    pub fn process_names(&self) -> impl Iterator<Item = &str> {
        self.processes.iter().map(|p| p.name.as_str())
    }

    /// Register a process that first runs at the current tick.
    ///
    /// # Parameters
    ///
    /// * `name` - Label used in logs and in `SimError::ZeroDelay`
    /// * `step` - One period of work, returning the delay until the next one
    ///
    /// # Returns
    ///
    /// The id of the new process. Ids grow with registration order.
    pub fn spawn(&mut self, name: impl Into<String>, step: Step<S>) -> ProcessId {
        let now = self.now;
        self.spawn_at(name, now, step)
    }

    /// Register a process that first runs at `tick` (never earlier than now).
    pub fn spawn_at(&mut self, name: impl Into<String>, tick: Tick, step: Step<S>) -> ProcessId {
        let id = self.processes.len();
        let name = name.into();
        let wake = tick.max(self.now);
        log::debug!("Process {} ({}) scheduled at tick {}", id, name, wake);
        self.processes.push(Process { name, step });
        self.queue.entry(wake).or_default().push(id);
        id
    }

    /// Resume processes until the next wake tick reaches `horizon`.
    ///
    /// Every wake tick strictly below `horizon` is processed. A step error or
    /// a zero delay aborts the run and is returned to the caller.
    ///
    /// # Parameters
    ///
    /// * `state` - Shared state handed to every step
    /// * `horizon` - First tick that is left unprocessed
    ///
    /// # Returns
    ///
    /// `Ok(())` once no process is due before `horizon`. Calling again with a
    /// later horizon continues from the queue.
    pub fn run_until(&mut self, state: &mut S, horizon: Tick) -> Result<(), SimError> {
        while self.next_wake().is_some_and(|tick| tick < horizon) {
            let Some((tick, mut due)) = self.queue.pop_first() else {
                break;
            };
            self.now = tick;
            // Ids are assigned in registration order
            due.sort_unstable();
            for id in due {
                self.resume(state, id)?;
            }
        }
        Ok(())
    }

    fn resume(&mut self, state: &mut S, id: ProcessId) -> Result<(), SimError> {
        let now = self.now;
        let process = self.processes.get_mut(id).ok_or_else(|| SimError::Config(format!("unknown process id {}", id)))?;
        let delay = (process.step)(state, now)?;
        if delay == 0 {
            return Err(SimError::ZeroDelay {
                process: process.name.clone(),
                tick: now,
            });
        }
        self.queue.entry(now + delay).or_default().push(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Vec<(Tick, &'static str)>;

    fn periodic(name: &'static str, period: Tick) -> Step<Log> {
        Box::new(move |log: &mut Log, now| {
            log.push((now, name));
            Ok(period)
        })
    }

    #[test]
    fn same_tick_processes_resume_in_registration_order() {
        let mut scheduler = Scheduler::new();
        scheduler.spawn("channel", periodic("channel", 3));
        scheduler.spawn("align", periodic("align", 2));
        scheduler.spawn("operate", periodic("operate", 1));
        let mut log = Log::new();
        scheduler.run_until(&mut log, 7).unwrap();

        let expected = vec![
            (0, "channel"),
            (0, "align"),
            (0, "operate"),
            (1, "operate"),
            (2, "align"),
            (2, "operate"),
            (3, "channel"),
            (3, "operate"),
            (4, "align"),
            (4, "operate"),
            (5, "operate"),
            (6, "channel"),
            (6, "align"),
            (6, "operate"),
        ];
        assert_eq!(log, expected);
        assert_eq!(scheduler.process_names().collect::<Vec<_>>(), vec!["channel", "align", "operate"]);
        assert_eq!(scheduler.now(), 6);
        assert_eq!(scheduler.next_wake(), Some(7));
    }

    #[test]
    fn run_until_is_reentrant() {
        let mut scheduler = Scheduler::new();
        scheduler.spawn("tick", periodic("tick", 1));
        let mut log = Log::new();
        scheduler.run_until(&mut log, 3).unwrap();
        assert_eq!(log.len(), 3);
        scheduler.run_until(&mut log, 3).unwrap();
        assert_eq!(log.len(), 3);
        scheduler.run_until(&mut log, 5).unwrap();
        let ticks: Vec<Tick> = log.iter().map(|(t, _)| *t).collect();
        assert_eq!(ticks, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn later_process_observes_earlier_update() {
        // Writer bumps the shared counter, reader registered after it sees the new value
        let mut scheduler: Scheduler<(u64, Vec<u64>)> = Scheduler::new();
        scheduler.spawn(
            "writer",
            Box::new(|state: &mut (u64, Vec<u64>), _| {
                state.0 += 1;
                Ok(2)
            }),
        );
        scheduler.spawn(
            "reader",
            Box::new(|state: &mut (u64, Vec<u64>), _| {
                state.1.push(state.0);
                Ok(1)
            }),
        );
        let mut state = (0, Vec::new());
        scheduler.run_until(&mut state, 5).unwrap();
        assert_eq!(state.1, vec![1, 1, 2, 2, 3]);
    }

    #[test]
    fn zero_delay_aborts_the_run() {
        let mut scheduler = Scheduler::new();
        scheduler.spawn("stuck", periodic("stuck", 0));
        let mut log = Log::new();
        assert_eq!(
            scheduler.run_until(&mut log, 10),
            Err(SimError::ZeroDelay {
                process: "stuck".into(),
                tick: 0
            })
        );
    }

    #[test]
    fn step_errors_propagate() {
        let mut scheduler = Scheduler::new();
        scheduler.spawn("ok", periodic("ok", 1));
        scheduler.spawn_at(
            "failing",
            2,
            Box::new(|_: &mut Log, _| Err(SimError::NoNodes)),
        );
        let mut log = Log::new();
        assert_eq!(scheduler.run_until(&mut log, 10), Err(SimError::NoNodes));
        assert_eq!(log, vec![(0, "ok"), (1, "ok"), (2, "ok")]);
    }
}
