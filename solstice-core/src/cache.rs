//! The prerendered-buffer cache.
//!
//! Rendering an instrument offline is expensive, so results are memoized by
//! rendered-instrument name. The correctness property is *at-most-one
//! concurrent render per name*: however many pieces ask for the same name
//! while a render is running, exactly one compute runs and every requester
//! shares its outcome — success and failure alike.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use solstice_audio::{SampleLibrary, SampleSet};

enum Slot {
    /// Computed this process lifetime; never invalidated.
    Resident(Arc<SampleSet>),
    /// A compute is running; waiters block on the shared pending slot.
    InFlight(Arc<Pending>),
}

struct Pending {
    result: Mutex<Option<Result<Arc<SampleSet>, String>>>,
    ready: Condvar,
}

pub struct PrerenderCache {
    slots: Mutex<HashMap<String, Slot>>,
    library: Arc<dyn SampleLibrary>,
}

impl PrerenderCache {
    pub fn new(library: Arc<dyn SampleLibrary>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            library,
        }
    }

    /// True when `name` is resident (tests).
    pub fn is_resident(&self, name: &str) -> bool {
        matches!(
            self.slots.lock().unwrap().get(name),
            Some(Slot::Resident(_))
        )
    }

    /// Obtain the rendered set for `name`, computing it with `compute` when
    /// absent. On first success the result is persisted to the sample
    /// library and stays resident for the process lifetime. On failure the
    /// in-flight marker is cleared so a later call retries, and the error is
    /// delivered to every waiter.
    pub fn obtain<F>(&self, name: &str, compute: F) -> Result<Arc<SampleSet>, String>
    where
        F: FnOnce() -> Result<SampleSet, String>,
    {
        let waiting_on = {
            let mut slots = self.slots.lock().unwrap();
            match slots.get(name) {
                Some(Slot::Resident(set)) => return Ok(set.clone()),
                Some(Slot::InFlight(pending)) => Some(pending.clone()),
                None => {
                    // Marker insertion happens under the map lock: there is
                    // no window between the absence check and the insert.
                    slots.insert(
                        name.to_string(),
                        Slot::InFlight(Arc::new(Pending {
                            result: Mutex::new(None),
                            ready: Condvar::new(),
                        })),
                    );
                    None
                }
            }
        };

        if let Some(pending) = waiting_on {
            let mut result = pending.result.lock().unwrap();
            while result.is_none() {
                result = pending.ready.wait(result).unwrap();
            }
            return result.clone().expect("woken with result set");
        }

        // This caller owns the compute; run it without holding the map lock.
        let outcome = compute().map(Arc::new);
        if let Ok(set) = &outcome {
            // A failed save is not a failed render: the result is still
            // good for this process, only the next run re-renders.
            if let Err(e) = self.library.save(&[(name.to_string(), (**set).clone())]) {
                log::warn!(target: "cache", "could not persist `{}`: {}", name, e);
            }
        }

        let pending = {
            let mut slots = self.slots.lock().unwrap();
            let slot = slots.remove(name);
            if let Ok(set) = &outcome {
                slots.insert(name.to_string(), Slot::Resident(set.clone()));
            }
            match slot {
                Some(Slot::InFlight(pending)) => pending,
                _ => {
                    // The marker we inserted is gone: nothing to wake.
                    return outcome;
                }
            }
        };

        *pending.result.lock().unwrap() = Some(outcome.clone());
        pending.ready.notify_all();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solstice_audio::{AudioBuffer, MemoryLibrary};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    fn cache() -> (Arc<MemoryLibrary>, PrerenderCache) {
        let library = Arc::new(MemoryLibrary::new());
        let cache = PrerenderCache::new(library.clone() as Arc<dyn SampleLibrary>);
        (library, cache)
    }

    fn one_note_set() -> SampleSet {
        let mut set = SampleSet::new();
        set.insert("C4", AudioBuffer::new(8000, vec![0.1; 16]));
        set
    }

    #[test]
    fn resident_entries_never_recompute() {
        let (_, cache) = cache();
        let computes = AtomicUsize::new(0);
        for _ in 0..3 {
            cache
                .obtain("piece__piano", || {
                    computes.fetch_add(1, Ordering::SeqCst);
                    Ok(one_note_set())
                })
                .unwrap();
        }
        assert_eq!(computes.load(Ordering::SeqCst), 1);
        assert!(cache.is_resident("piece__piano"));
    }

    #[test]
    fn success_persists_to_library() {
        let (library, cache) = cache();
        cache.obtain("piece__piano", || Ok(one_note_set())).unwrap();
        assert!(library.contains("piece__piano"));
    }

    #[test]
    fn concurrent_obtain_computes_once() {
        let (_, cache) = cache();
        let cache = Arc::new(cache);
        let computes = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let computes = computes.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    cache.obtain("shared", || {
                        computes.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(20));
                        Ok(one_note_set())
                    })
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        assert_eq!(computes.load(Ordering::SeqCst), 1);
        // All callers share the identical result object.
        for pair in results.windows(2) {
            assert!(Arc::ptr_eq(&pair[0], &pair[1]));
        }
    }

    #[test]
    fn failure_reaches_every_waiter_and_clears_the_slot() {
        let (_, cache) = cache();
        let cache = Arc::new(cache);
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    cache.obtain("broken", || {
                        std::thread::sleep(Duration::from_millis(20));
                        Err("render exploded".to_string())
                    })
                })
            })
            .collect();

        for handle in handles {
            let err = handle.join().unwrap().unwrap_err();
            assert!(err.contains("render exploded"));
        }
        assert!(!cache.is_resident("broken"));

        // The slot was cleared: a later request retries and can succeed.
        let set = cache.obtain("broken", || Ok(one_note_set())).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn distinct_names_compute_independently() {
        let (_, cache) = cache();
        let computes = AtomicUsize::new(0);
        for name in ["a", "b"] {
            cache
                .obtain(name, || {
                    computes.fetch_add(1, Ordering::SeqCst);
                    Ok(one_note_set())
                })
                .unwrap();
        }
        assert_eq!(computes.load(Ordering::SeqCst), 2);
    }
}
