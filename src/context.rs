//! Per-context memoization of resolved configurations.
//!
//! Contexts are keyed by identity: the address of their `Arc` allocation.
//! Each entry keeps only a `Weak` to its context, so the cache never extends
//! a context's lifetime, and the allocation (hence the address) cannot be
//! reused while the entry is present. Entries for dropped contexts are
//! purged on every insertion; callers that need prompt release use
//! [`ContextCache::invalidate`] or [`ContextCache::clear`].

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

struct Entry<C: ?Sized, R> {
    context: Weak<C>,
    resolved: Arc<R>,
}

pub struct ContextCache<C: ?Sized, R> {
    entries: Mutex<HashMap<usize, Entry<C, R>>>,
}

impl<C: ?Sized, R> Default for ContextCache<C, R> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

fn identity<C: ?Sized>(context: &Arc<C>) -> usize {
    Arc::as_ptr(context).cast::<()>() as usize
}

impl<C: ?Sized, R> ContextCache<C, R> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached resolution for this exact context, computing and
    /// storing it on first use.
    ///
    /// `compute` runs without the lock held. If two callers race on the same
    /// context, the entry stored first wins and both get it.
    pub fn resolve<F, E>(&self, context: &Arc<C>, compute: F) -> Result<Arc<R>, E>
    where
        F: FnOnce(&C) -> Result<R, E>,
    {
        if let Some(hit) = self.get(context) {
            tracing::debug!(context = identity(context), "context cache hit");
            return Ok(hit);
        }

        tracing::debug!(context = identity(context), "context cache miss");
        let resolved = Arc::new(compute(context.as_ref())?);

        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.context.strong_count() > 0);
        let entry = entries.entry(identity(context)).or_insert_with(|| Entry {
            context: Arc::downgrade(context),
            resolved,
        });
        Ok(Arc::clone(&entry.resolved))
    }

    /// Cached resolution for `context`, if any. Never computes.
    pub fn get(&self, context: &Arc<C>) -> Option<Arc<R>> {
        let entries = self.entries.lock();
        entries
            .get(&identity(context))
            .filter(|entry| entry.context.strong_count() > 0)
            .map(|entry| Arc::clone(&entry.resolved))
    }

    /// Drops the entry for `context`. Returns whether one existed.
    pub fn invalidate(&self, context: &Arc<C>) -> bool {
        self.entries.lock().remove(&identity(context)).is_some()
    }

    /// Drops entries whose context is no longer referenced. Returns how many
    /// were removed.
    pub fn purge(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.context.strong_count() > 0);
        let purged = before - entries.len();
        if purged > 0 {
            tracing::debug!(purged, "purged unreachable contexts");
        }
        purged
    }

    /// Drops every entry, live or not. Used when the owning driver closes.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of stored entries, including ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: ?Sized, R> std::fmt::Debug for ContextCache<C, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::convert::Infallible;
    use std::sync::Barrier;
    use std::thread;

    #[derive(Debug, PartialEq)]
    struct Segment {
        name: &'static str,
    }

    fn counting<'a>(calls: &'a Cell<usize>) -> impl Fn(&Segment) -> Result<String, Infallible> + 'a {
        move |ctx| {
            calls.set(calls.get() + 1);
            Ok(format!("resolved:{}", ctx.name))
        }
    }

    #[test]
    fn same_context_resolves_once() {
        let cache = ContextCache::new();
        let calls = Cell::new(0);
        let ctx = Arc::new(Segment { name: "beta" });

        let first = cache.resolve(&ctx, counting(&calls)).unwrap();
        let second = cache.resolve(&ctx, counting(&calls)).unwrap();

        assert_eq!(calls.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, "resolved:beta");
    }

    #[test]
    fn equal_but_distinct_contexts_are_separate_entries() {
        let cache = ContextCache::new();
        let calls = Cell::new(0);
        let a = Arc::new(Segment { name: "beta" });
        let b = Arc::new(Segment { name: "beta" });
        assert_eq!(a, b);

        let ra = cache.resolve(&a, counting(&calls)).unwrap();
        let rb = cache.resolve(&b, counting(&calls)).unwrap();

        assert_eq!(calls.get(), 2);
        assert!(!Arc::ptr_eq(&ra, &rb));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clones_of_an_arc_share_the_entry() {
        let cache = ContextCache::new();
        let calls = Cell::new(0);
        let ctx = Arc::new(Segment { name: "gamma" });
        let alias = Arc::clone(&ctx);

        cache.resolve(&ctx, counting(&calls)).unwrap();
        cache.resolve(&alias, counting(&calls)).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn dropped_contexts_are_purged() {
        let cache = ContextCache::new();
        let calls = Cell::new(0);
        let kept = Arc::new(Segment { name: "kept" });
        let dropped = Arc::new(Segment { name: "dropped" });

        cache.resolve(&kept, counting(&calls)).unwrap();
        cache.resolve(&dropped, counting(&calls)).unwrap();
        drop(dropped);

        assert_eq!(cache.purge(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&kept).is_some());
    }

    #[test]
    fn concurrent_resolution_keeps_first_entry() {
        const CALLERS: usize = 8;
        let cache: Arc<ContextCache<Segment, usize>> = Arc::new(ContextCache::new());
        let ctx = Arc::new(Segment { name: "shared" });
        let barrier = Arc::new(Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let ctx = Arc::clone(&ctx);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.resolve(&ctx, |_| Ok::<_, Infallible>(i)).unwrap()
                })
            })
            .collect();
        let results: Vec<Arc<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&cache.get(&ctx).unwrap(), &results[0]));
    }

    #[test]
    fn failed_resolution_is_not_cached() {
        let cache: ContextCache<Segment, String> = ContextCache::new();
        let ctx = Arc::new(Segment { name: "err" });

        let err = cache.resolve(&ctx, |_| Err("boom")).unwrap_err();
        assert_eq!(err, "boom");
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = ContextCache::new();
        let calls = Cell::new(0);
        let ctx = Arc::new(Segment { name: "x" });

        cache.resolve(&ctx, counting(&calls)).unwrap();
        assert!(cache.invalidate(&ctx));
        assert!(!cache.invalidate(&ctx));
        cache.resolve(&ctx, counting(&calls)).unwrap();
        assert_eq!(calls.get(), 2);

        cache.clear();
        assert!(cache.get(&ctx).is_none());
    }
}
