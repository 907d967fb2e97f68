use serde_json::Value;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::context::ContextCache;
use crate::driver::{Flags, SyncDriver, ValueParams};
use crate::errors::{Error, Result};

/// Computes a full configuration for an evaluation context, e.g. by running
/// a rule engine. `None` asks for the context-free (static) configuration.
pub trait ConfigResolver: Send + Sync {
    type Context: ?Sized + Send + Sync;

    fn resolve(&self, context: Option<&Self::Context>) -> Result<Flags>;
}

/// [`ConfigResolver`] backed by a closure. Built with [`from_fn`].
pub struct FnResolver<C: ?Sized, F> {
    f: F,
    _context: PhantomData<fn(&C)>,
}

pub fn from_fn<C, F>(f: F) -> FnResolver<C, F>
where
    C: ?Sized + Send + Sync,
    F: Fn(Option<&C>) -> Result<Flags> + Send + Sync,
{
    FnResolver {
        f,
        _context: PhantomData,
    }
}

impl<C, F> ConfigResolver for FnResolver<C, F>
where
    C: ?Sized + Send + Sync,
    F: Fn(Option<&C>) -> Result<Flags> + Send + Sync,
{
    type Context = C;

    fn resolve(&self, context: Option<&C>) -> Result<Flags> {
        (self.f)(context)
    }
}

/// Driver over a context-evaluating resolver.
///
/// The static configuration is resolved once at construction. Each distinct
/// context `Arc` is resolved once and then served from the cache until the
/// context is dropped or the driver is closed.
pub struct ContextualDriver<R: ConfigResolver> {
    resolver: R,
    static_config: Arc<Flags>,
    cache: ContextCache<R::Context, Flags>,
    closed: AtomicBool,
}

impl<R: ConfigResolver> ContextualDriver<R> {
    pub fn new(resolver: R) -> Result<Self> {
        let static_config = Arc::new(resolver.resolve(None)?);
        Ok(Self {
            resolver,
            static_config,
            cache: ContextCache::new(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn cache(&self) -> &ContextCache<R::Context, Flags> {
        &self.cache
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolved configuration for `context`, or the static one without.
    pub fn config_for(&self, context: Option<&Arc<R::Context>>) -> Result<Arc<Flags>> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        match context {
            Some(ctx) => {
                let config = self.cache.resolve(ctx, |c| self.resolver.resolve(Some(c)))?;
                // a close that landed while the resolver ran must not leave an entry behind
                if self.is_closed() {
                    self.cache.invalidate(ctx);
                    return Err(Error::Closed);
                }
                Ok(config)
            }
            None => Ok(Arc::clone(&self.static_config)),
        }
    }
}

impl<R: ConfigResolver> std::fmt::Debug for ContextualDriver<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextualDriver")
            .field("static_keys", &self.static_config.len())
            .field("cache", &self.cache)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<R: ConfigResolver> SyncDriver for ContextualDriver<R> {
    type Context = R::Context;

    fn get_raw_value_sync(
        &self,
        key: &str,
        params: &ValueParams<Self::Context>,
    ) -> Result<Option<Value>> {
        let config = self.config_for(params.context())?;
        Ok(config.get(key).cloned())
    }

    fn get_all_raw_values_sync(&self, context: Option<&Arc<Self::Context>>) -> Result<Flags> {
        Ok(Flags::clone(&*self.config_for(context)?))
    }

    fn close_sync(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.cache.clear();
            tracing::debug!("contextual driver closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;

    #[derive(Debug)]
    struct Env {
        stage: &'static str,
    }

    struct StageRules {
        calls: AtomicUsize,
    }

    impl ConfigResolver for StageRules {
        type Context = Env;

        fn resolve(&self, context: Option<&Env>) -> Result<Flags> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let level = match context.map(|c| c.stage) {
                Some("production") => "warn",
                Some(_) => "debug",
                None => "info",
            };
            let mut flags = Flags::new();
            flags.insert("log_level".into(), json!(level));
            flags.insert("retries".into(), json!("3"));
            Ok(flags)
        }
    }

    fn driver() -> ContextualDriver<StageRules> {
        ContextualDriver::new(StageRules {
            calls: AtomicUsize::new(0),
        })
        .unwrap()
    }

    fn calls(d: &ContextualDriver<StageRules>) -> usize {
        d.resolver().calls.load(Ordering::SeqCst)
    }

    #[test]
    fn static_resolution_happens_once_at_construction() {
        let d = driver();
        assert_eq!(calls(&d), 1);
        let v = d.get_raw_value_sync("log_level", &ValueParams::default()).unwrap();
        assert_eq!(v, Some(json!("info")));
        d.get_all_raw_values_sync(None).unwrap();
        assert_eq!(calls(&d), 1);
        assert!(d.cache().is_empty());
    }

    #[test]
    fn context_is_resolved_once_per_reference() {
        let d = driver();
        let prod = Arc::new(Env { stage: "production" });
        let params = ValueParams::new().with_context(Arc::clone(&prod));

        assert_eq!(d.get_raw_value_sync("log_level", &params).unwrap(), Some(json!("warn")));
        assert_eq!(d.get_raw_value_sync("retries", &params).unwrap(), Some(json!("3")));
        d.get_all_raw_values_sync(Some(&prod)).unwrap();
        assert_eq!(calls(&d), 2);

        let other_prod = Arc::new(Env { stage: "production" });
        d.get_all_raw_values_sync(Some(&other_prod)).unwrap();
        assert_eq!(calls(&d), 3);
        assert_eq!(d.cache().len(), 2);
    }

    #[test]
    fn closed_driver_rejects_reads() {
        let d = driver();
        let ctx = Arc::new(Env { stage: "staging" });
        d.get_all_raw_values_sync(Some(&ctx)).unwrap();

        d.close_sync().unwrap();
        d.close_sync().unwrap();
        assert!(d.cache().is_empty());
        let err = d.get_raw_value_sync("log_level", &ValueParams::default()).unwrap_err();
        assert!(matches!(err, Error::Closed));
    }

    struct GatedRules {
        entered: Barrier,
        release: Barrier,
    }

    impl ConfigResolver for GatedRules {
        type Context = Env;

        fn resolve(&self, context: Option<&Env>) -> Result<Flags> {
            if context.is_some() {
                self.entered.wait();
                self.release.wait();
            }
            let mut flags = Flags::new();
            flags.insert("log_level".into(), json!("debug"));
            Ok(flags)
        }
    }

    #[test]
    fn close_during_resolution_leaves_cache_empty() {
        let d = ContextualDriver::new(GatedRules {
            entered: Barrier::new(2),
            release: Barrier::new(2),
        })
        .unwrap();
        let ctx = Arc::new(Env { stage: "staging" });

        let outcome = thread::scope(|s| {
            let reader = s.spawn(|| d.get_all_raw_values_sync(Some(&ctx)));
            d.resolver().entered.wait();
            d.close_sync().unwrap();
            d.resolver().release.wait();
            reader.join().unwrap()
        });

        assert!(matches!(outcome, Err(Error::Closed)));
        assert!(d.is_closed());
        assert!(d.cache().is_empty());
    }

    #[test]
    fn closure_resolver() {
        let d = ContextualDriver::new(from_fn(|ctx: Option<&str>| {
            let mut flags = Flags::new();
            flags.insert("who".into(), json!(ctx.unwrap_or("nobody")));
            Ok(flags)
        }))
        .unwrap();

        let ctx: Arc<str> = Arc::from("alice");
        let all = d.get_all_raw_values_sync(Some(&ctx)).unwrap();
        assert_eq!(all["who"], json!("alice"));
        assert_eq!(d.get_all_raw_values_sync(None).unwrap()["who"], json!("nobody"));
    }

    #[test]
    fn resolver_errors_propagate() {
        let d = ContextualDriver::new(from_fn(|ctx: Option<&Env>| match ctx {
            Some(_) => Err(Error::driver("rule evaluation failed")),
            None => Ok(Flags::new()),
        }))
        .unwrap();

        let ctx = Arc::new(Env { stage: "x" });
        let err = d.get_all_raw_values_sync(Some(&ctx)).unwrap_err();
        assert_eq!(err.to_string(), "rule evaluation failed");
        assert!(d.cache().is_empty());
    }
}
