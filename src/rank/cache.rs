//! Run-scoped memo of pairwise outcomes.
//!
//! One entry per unordered pair, keyed canonically. A lookup in the reverse
//! orientation returns the mirrored view of the stored result, so the
//! comparator runs at most once per pair for the whole run. Concurrent
//! requests for the same pair await a single computation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OnceCell;

use super::types::PairwiseResult;

/// Order-independent identity of a document pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey(String, String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self(a.to_string(), b.to_string())
        } else {
            Self(b.to_string(), a.to_string())
        }
    }
}

#[derive(Default)]
struct CacheState {
    cells: HashMap<PairKey, Arc<OnceCell<PairwiseResult>>>,
    log: Vec<PairwiseResult>,
    requests: usize,
    hits: usize,
}

#[derive(Default)]
pub struct ComparisonCache {
    state: Mutex<CacheState>,
}

impl ComparisonCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the outcome for `(a, b)`, computing it only if neither orientation is known.
    ///
    /// `compute` must produce the result in the `(a, b)` orientation. It is
    /// appended to the log exactly as computed.
    pub async fn get_or_compute<F, Fut>(&self, a: &str, b: &str, compute: F) -> PairwiseResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PairwiseResult>,
    {
        let cell = {
            let mut state = self.lock();
            state.requests += 1;
            state.cells.entry(PairKey::new(a, b)).or_default().clone()
        };

        let mut computed_here = false;
        let flag = &mut computed_here;
        let stored = cell
            .get_or_init(|| async move {
                *flag = true;
                let result = compute().await;
                self.lock().log.push(result.clone());
                result
            })
            .await;

        if !computed_here {
            self.lock().hits += 1;
        }

        if stored.doc_a == a {
            stored.clone()
        } else {
            stored.swapped()
        }
    }

    /// Distinct pairs evaluated, in the order they completed.
    pub fn log(&self) -> Vec<PairwiseResult> {
        self.lock().log.clone()
    }

    pub fn into_log(self) -> Vec<PairwiseResult> {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .log
    }

    pub fn requests(&self) -> usize {
        self.lock().requests
    }

    pub fn hits(&self) -> usize {
        self.lock().hits
    }

    pub fn len(&self) -> usize {
        self.lock().log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
