use std::{collections::HashSet, sync::Arc, time::Duration};

use tracing::{debug, warn};

use crate::{
    clock::now_ms,
    store::{SetOutcome, StateStore},
};

/// What happens to an eligible entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    /// Remove the object entirely.
    Delete,
    /// Reset the value to the zero value of its type.
    Empty,
}

/// Parameters of one garbage collection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sweep {
    /// Only paths at or below this prefix are considered.
    pub prefix: String,
    /// Delete or empty eligible entries.
    pub mode: SweepMode,
    /// Entries last set more than this long ago are eligible.
    pub max_age: Duration,
    /// Case-insensitive substrings protecting a path from collection.
    pub exclude: Vec<String>,
}

impl Sweep {
    /// Sweep deleting stale entries under `prefix`.
    pub fn delete(prefix: impl Into<String>, max_age: Duration) -> Self {
        Self {
            prefix: prefix.into(),
            mode: SweepMode::Delete,
            max_age,
            exclude: Vec::new(),
        }
    }

    /// Sweep emptying stale entries under `prefix`.
    pub fn empty(prefix: impl Into<String>, max_age: Duration) -> Self {
        Self {
            mode: SweepMode::Empty,
            ..Self::delete(prefix, max_age)
        }
    }

    /// Protect every path containing one of `patterns`.
    pub fn excluding<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude
            .extend(patterns.into_iter().map(|pattern| pattern.into().to_lowercase()));
        self
    }

    fn is_excluded(&self, path: &str) -> bool {
        let path = path.to_lowercase();
        self.exclude.iter().any(|pattern| path.contains(pattern))
    }
}

/// Counters describing a finished sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries under the prefix that were inspected.
    pub examined: usize,
    /// Entries deleted or emptied.
    pub collected: usize,
    /// Entries whose collection failed.
    pub failed: usize,
}

/// Prunes state entries by last-write age.
#[derive(Clone)]
pub struct GarbageCollector {
    store: Arc<StateStore>,
}

impl GarbageCollector {
    /// Collector operating on `store`.
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// Run `sweep` against the current time.
    pub async fn collect(&self, sweep: &Sweep) -> SweepReport {
        self.collect_at(sweep, now_ms()).await
    }

    /// Run `sweep` as if the current time were `now` (epoch milliseconds).
    pub async fn collect_at(&self, sweep: &Sweep, now: i64) -> SweepReport {
        let threshold = now.saturating_sub(sweep.max_age.as_millis() as i64);
        let mut report = SweepReport::default();

        for (path, entry) in self.store.entries_under(&sweep.prefix) {
            report.examined += 1;
            if entry.timestamp >= threshold || sweep.is_excluded(&path) {
                continue;
            }

            match sweep.mode {
                SweepMode::Delete => match self.store.delete(&path).await {
                    Ok(()) => report.collected += 1,
                    Err(err) => {
                        warn!(path = %path, error = %err, "failed to delete stale state");
                        report.failed += 1;
                    }
                },
                SweepMode::Empty => match self.store.empty(&path).await {
                    SetOutcome::Failed => report.failed += 1,
                    _ => report.collected += 1,
                },
            }
        }

        if sweep.mode == SweepMode::Delete {
            self.prune_structure(sweep, &mut report).await;
        }

        debug!(
            prefix = %sweep.prefix,
            examined = report.examined,
            collected = report.collected,
            failed = report.failed,
            "garbage sweep finished"
        );
        report
    }

    /// Delete every entry under `prefix` whose path is not in `kept`, then prune the emptied
    /// grouping objects. Used to drop fields a rebuilt document no longer carries.
    pub async fn collect_missing(&self, prefix: &str, kept: &HashSet<String>) -> SweepReport {
        let sweep = Sweep::delete(prefix, Duration::ZERO);
        let mut report = SweepReport::default();

        for (path, _) in self.store.entries_under(prefix) {
            report.examined += 1;
            if kept.contains(&path) {
                continue;
            }
            match self.store.delete(&path).await {
                Ok(()) => report.collected += 1,
                Err(err) => {
                    warn!(path = %path, error = %err, "failed to delete dropped state");
                    report.failed += 1;
                }
            }
        }
        self.prune_structure(&sweep, &mut report).await;

        debug!(
            prefix = %prefix,
            examined = report.examined,
            collected = report.collected,
            "dropped fields swept"
        );
        report
    }

    /// Remove grouping objects that no longer hold any state, deepest first.
    async fn prune_structure(&self, sweep: &Sweep, report: &mut SweepReport) {
        let mut structural = self.store.structural_under(&sweep.prefix);
        structural.sort_by_key(|path| std::cmp::Reverse(path.matches('.').count()));

        for path in structural {
            if sweep.is_excluded(&path) || self.store.has_states_below(&path) {
                continue;
            }
            if let Err(err) = self.store.delete(&path).await {
                warn!(path = %path, error = %err, "failed to delete empty channel");
                report.failed += 1;
            }
        }
    }
}
