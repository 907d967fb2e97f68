use serde_json::Value;
use std::convert::Infallible;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::driver::{Flags, SyncDriver, ValueParams};
use crate::errors::Result;

/// Placeholder backend: every key is absent and the mapping is empty.
///
/// Lets a facade be constructed before the real backend finishes an
/// asynchronous initialization step.
pub struct DummyDriver<C: ?Sized = Infallible> {
    _context: PhantomData<fn(&C)>,
}

impl<C: ?Sized> DummyDriver<C> {
    pub fn new() -> Self {
        Self {
            _context: PhantomData,
        }
    }
}

impl<C: ?Sized> Default for DummyDriver<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> std::fmt::Debug for DummyDriver<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DummyDriver")
    }
}

impl<C: ?Sized + Send + Sync> SyncDriver for DummyDriver<C> {
    type Context = C;

    fn get_raw_value_sync(&self, _key: &str, _params: &ValueParams<C>) -> Result<Option<Value>> {
        Ok(None)
    }

    fn get_all_raw_values_sync(&self, _context: Option<&Arc<C>>) -> Result<Flags> {
        Ok(Flags::new())
    }

    fn close_sync(&self) -> Result<()> {
        Ok(())
    }
}
