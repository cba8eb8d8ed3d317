//! Per-key single-flight guard.
//!
//! The first caller for a key runs the work; callers arriving while it runs
//! block until it finishes and receive its outcome instead of repeating it.
//! Different keys never wait on each other.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::Result;

/// Outcome shared with waiting callers. Errors are carried as text because
/// [`DemError`](crate::DemError) is not `Clone`.
pub(crate) type Shared = std::result::Result<(), String>;

/// How a caller took part in a flight.
#[derive(Debug)]
pub(crate) enum Joined<T> {
    /// This caller ran the work.
    Led(Result<T>),
    /// Another caller ran the work; this is its outcome.
    Followed(Shared),
}

#[derive(Default)]
struct Flight {
    outcome: Mutex<Option<Shared>>,
    done: Condvar,
}

impl Flight {
    fn finish(&self, outcome: Shared) {
        *lock(&self.outcome) = Some(outcome);
        self.done.notify_all();
    }

    fn wait(&self) -> Shared {
        let mut outcome = lock(&self.outcome);
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            outcome = self
                .done
                .wait(outcome)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Tracks in-flight work by key.
pub(crate) struct FlightGroup<K> {
    in_flight: Mutex<HashMap<K, Arc<Flight>>>,
}

impl<K: Hash + Eq + Clone> FlightGroup<K> {
    pub(crate) fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `work` for `key` unless a run is already in progress, in which
    /// case wait for that run instead.
    pub(crate) fn run<T>(&self, key: &K, work: impl FnOnce() -> Result<T>) -> Joined<T> {
        let flight = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.get(key) {
                Some(existing) => Some(existing.clone()),
                None => {
                    in_flight.insert(key.clone(), Arc::new(Flight::default()));
                    None
                }
            }
        };

        if let Some(flight) = flight {
            return Joined::Followed(flight.wait());
        }

        let mut guard = Landing {
            group: self,
            key,
            outcome: Err("single-flight leader did not finish".to_string()),
        };
        let result = work();
        guard.outcome = match &result {
            Ok(_) => Ok(()),
            Err(e) => Err(e.to_string()),
        };
        drop(guard);

        Joined::Led(result)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        lock(&self.in_flight).len()
    }
}

/// Publishes the leader's outcome and clears the key, also when the work
/// panics.
struct Landing<'a, K: Hash + Eq + Clone> {
    group: &'a FlightGroup<K>,
    key: &'a K,
    outcome: Shared,
}

impl<K: Hash + Eq + Clone> Drop for Landing<'_, K> {
    fn drop(&mut self) {
        let flight = lock(&self.group.in_flight).remove(self.key);
        if let Some(flight) = flight {
            flight.finish(std::mem::replace(&mut self.outcome, Ok(())));
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
