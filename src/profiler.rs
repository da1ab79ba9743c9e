//! Build-time instrumentation: named timers and counters.
//!
//! Worker threads accumulate into a thread-owned `ProfilerScope` and
//! merge into the shared registry under a lock only when the scope is
//! dropped or explicitly flushed, keeping the hot path lock-free. The
//! registry is purely diagnostic: compiled output never depends on
//! anything recorded here.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Accumulated timing for one named region.
#[derive(Clone, Debug, Default)]
pub struct TimingEntry {
    pub duration: Duration,
    pub invocations: u64,
}

/// Accumulated count for one named counter.
#[derive(Clone, Debug, Default)]
pub struct CounterEntry {
    pub count: u64,
    pub invocations: u64,
    /// Report order: counters print sorted by first registration.
    pub index: usize,
    /// Counter this one is compared against in the report.
    pub baseline: Option<&'static str>,
}

#[derive(Debug, Default)]
struct Registry {
    times: BTreeMap<&'static str, TimingEntry>,
    counters: BTreeMap<&'static str, CounterEntry>,
}

impl Registry {
    fn merge(&mut self, other: Registry) {
        for (name, entry) in other.times {
            let slot = self.times.entry(name).or_default();
            slot.duration += entry.duration;
            slot.invocations += entry.invocations;
        }
        for (name, entry) in other.counters {
            if let Some(slot) = self.counters.get_mut(name) {
                slot.count += entry.count;
                slot.invocations += entry.invocations;
                if slot.baseline.is_none() {
                    slot.baseline = entry.baseline;
                }
            } else {
                let index = self.counters.len();
                self.counters.insert(name, CounterEntry { index, ..entry });
            }
        }
    }
}

/// The shared instrumentation registry.
#[derive(Debug, Default)]
pub struct Profiler {
    registry: Mutex<Registry>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A thread-owned accumulation scope. Merges back on drop.
    pub fn scope(&self) -> ProfilerScope<'_> {
        ProfilerScope {
            profiler: self,
            local: Registry::default(),
        }
    }

    /// Snapshot of the timing entries, longest first.
    pub fn timings(&self) -> Vec<(&'static str, TimingEntry)> {
        let registry = self.registry.lock().unwrap();
        let mut entries: Vec<_> = registry
            .times
            .iter()
            .map(|(name, entry)| (*name, entry.clone()))
            .collect();
        entries.sort_by(|a, b| b.1.duration.cmp(&a.1.duration).then(a.0.cmp(b.0)));
        entries
    }

    /// Snapshot of the counters in registration order.
    pub fn counters(&self) -> Vec<(&'static str, CounterEntry)> {
        let registry = self.registry.lock().unwrap();
        let mut entries: Vec<_> = registry
            .counters
            .iter()
            .map(|(name, entry)| (*name, entry.clone()))
            .collect();
        entries.sort_by_key(|(_, entry)| entry.index);
        entries
    }

    /// Write the report through the `log` facade.
    pub fn report(&self) {
        let timings = self.timings();
        let counters = self.counters();

        log::debug!("profiling results for {} timers:", timings.len());
        for (name, entry) in &timings {
            let micros = entry.duration.as_micros() as u64;
            log::debug!(
                "{:<32} {:>10} us {:>8} calls {:>8} us/call",
                name,
                micros,
                entry.invocations,
                micros / entry.invocations.max(1)
            );
        }

        log::debug!("profiling results for {} counters:", counters.len());
        for (name, entry) in &counters {
            let diff = entry.baseline.and_then(|base| {
                counters
                    .iter()
                    .find(|(other, _)| *other == base)
                    .map(|(_, other)| entry.count as i64 - other.count as i64)
            });
            match diff {
                Some(diff) => log::debug!(
                    "{:<32} {:>10} counts {:>8} calls {:>+8} diff",
                    name,
                    entry.count,
                    entry.invocations,
                    diff
                ),
                None => log::debug!(
                    "{:<32} {:>10} counts {:>8} calls",
                    name,
                    entry.count,
                    entry.invocations
                ),
            }
        }
    }

    /// Report, then clear the registry.
    pub fn dump(&self) {
        self.report();
        let mut registry = self.registry.lock().unwrap();
        registry.times.clear();
        registry.counters.clear();
    }
}

/// Thread-local accumulation buffers for one worker. Obtained from
/// `Profiler::scope`; everything recorded lands in the shared registry
/// when the scope flushes or drops.
pub struct ProfilerScope<'p> {
    profiler: &'p Profiler,
    local: Registry,
}

impl ProfilerScope<'_> {
    /// Time a region. The closure's result passes through untouched.
    pub fn time<T>(&mut self, name: &'static str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        let entry = self.local.times.entry(name).or_default();
        entry.duration += start.elapsed();
        entry.invocations += 1;
        result
    }

    /// Add to a named counter.
    pub fn count(&mut self, name: &'static str, value: u64) {
        self.add_count(name, value, None);
    }

    /// Add to a named counter that the report compares against `baseline`.
    pub fn count_vs(&mut self, name: &'static str, baseline: &'static str, value: u64) {
        self.add_count(name, value, Some(baseline));
    }

    fn add_count(&mut self, name: &'static str, value: u64, baseline: Option<&'static str>) {
        if let Some(slot) = self.local.counters.get_mut(name) {
            slot.count += value;
            slot.invocations += 1;
            if slot.baseline.is_none() {
                slot.baseline = baseline;
            }
        } else {
            let index = self.local.counters.len();
            self.local.counters.insert(
                name,
                CounterEntry {
                    count: value,
                    invocations: 1,
                    index,
                    baseline,
                },
            );
        }
    }

    /// Merge the local buffers into the shared registry now.
    pub fn flush(&mut self) {
        let local = std::mem::take(&mut self.local);
        if local.times.is_empty() && local.counters.is_empty() {
            return;
        }
        self.profiler.registry.lock().unwrap().merge(local);
    }
}

impl Drop for ProfilerScope<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_merges_on_drop() {
        let profiler = Profiler::new();
        {
            let mut scope = profiler.scope();
            let value = scope.time("region", || 21 * 2);
            assert_eq!(value, 42);
            scope.count("items", 3);
            scope.count("items", 4);
            // Nothing visible until the scope ends.
            assert!(profiler.timings().is_empty());
        }
        let timings = profiler.timings();
        assert_eq!(timings.len(), 1);
        assert_eq!(timings[0].0, "region");
        assert_eq!(timings[0].1.invocations, 1);

        let counters = profiler.counters();
        assert_eq!(counters.len(), 1);
        assert_eq!(counters[0].1.count, 7);
        assert_eq!(counters[0].1.invocations, 2);
    }

    #[test]
    fn test_explicit_flush() {
        let profiler = Profiler::new();
        let mut scope = profiler.scope();
        scope.count("flushed", 1);
        scope.flush();
        assert_eq!(profiler.counters()[0].1.count, 1);

        // A second flush with nothing new is a no-op.
        scope.flush();
        assert_eq!(profiler.counters()[0].1.count, 1);
    }

    #[test]
    fn test_parallel_scopes_accumulate() {
        let profiler = Profiler::new();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let mut scope = profiler.scope();
                    for _ in 0..100 {
                        scope.time("work", || ());
                        scope.count("units", 2);
                    }
                });
            }
        });
        assert_eq!(profiler.timings()[0].1.invocations, 400);
        assert_eq!(profiler.counters()[0].1.count, 800);
    }

    #[test]
    fn test_counter_order_and_baseline() {
        let profiler = Profiler::new();
        {
            let mut scope = profiler.scope();
            scope.count("before", 10);
            scope.count_vs("after", "before", 7);
        }
        let counters = profiler.counters();
        assert_eq!(counters[0].0, "before");
        assert_eq!(counters[1].0, "after");
        assert_eq!(counters[1].1.baseline, Some("before"));
    }

    #[test]
    fn test_dump_clears() {
        let profiler = Profiler::new();
        profiler.scope().count("once", 1);
        profiler.dump();
        assert!(profiler.counters().is_empty());
        assert!(profiler.timings().is_empty());
    }
}
