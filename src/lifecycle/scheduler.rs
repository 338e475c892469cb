use std::time::{Duration, Instant};

use super::events::TimerKind;

#[derive(Clone, Copy, Debug)]
struct Scheduled {
    kind: TimerKind,
    due: Instant,
    every: Option<Duration>,
}

/// Deadline list for the lifecycle handler's timers.
///
/// Timers are delivered as messages by the handler's own loop, so they never
/// run concurrently with event handling.
#[derive(Debug, Default)]
pub struct Scheduler {
    entries: Vec<Scheduled>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `kind` once at `due`.
    pub fn schedule_once(&mut self, kind: TimerKind, due: Instant) {
        self.entries.push(Scheduled {
            kind,
            due,
            every: None,
        });
    }

    /// Fire `kind` at `first`, then every `every` until cancelled.
    pub fn schedule_every(&mut self, kind: TimerKind, first: Instant, every: Duration) {
        self.entries.push(Scheduled {
            kind,
            due: first,
            every: Some(every),
        });
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.entries.retain(|entry| entry.kind != kind);
    }

    pub fn is_scheduled(&self, kind: TimerKind) -> bool {
        self.entries.iter().any(|entry| entry.kind == kind)
    }

    /// Earliest pending deadline.
    pub fn next_due(&self) -> Option<Instant> {
        self.entries.iter().map(|entry| entry.due).min()
    }

    /// Remove and return every timer due at `now`, earliest first.
    ///
    /// A recurring timer fires at most once per call; if the handler fell
    /// behind, its next deadline is counted from `now` so missed ticks do not
    /// burst.
    pub fn pop_due(&mut self, now: Instant) -> Vec<TimerKind> {
        let mut due: Vec<Scheduled> = self
            .entries
            .iter()
            .copied()
            .filter(|entry| entry.due <= now)
            .collect();
        due.sort_by_key(|entry| entry.due);

        self.entries.retain(|entry| entry.due > now);
        for entry in &due {
            if let Some(every) = entry.every {
                let mut next = entry.due + every;
                if next <= now {
                    next = now + every;
                }
                self.entries.push(Scheduled {
                    kind: entry.kind,
                    due: next,
                    every: Some(every),
                });
            }
        }
        due.into_iter().map(|entry| entry.kind).collect()
    }
}
