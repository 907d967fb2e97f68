//! Raw-value contract every backend implements.
//!
//! Backends declare their capability by implementing [`SyncDriver`] (which
//! the sync facade also serves asynchronously) or [`AsyncDriver`] alone.
//! [`SyncAsAsync`] lets a sync backend sit behind the async-only facade.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::errors::Result;

/// Full key → raw value mapping.
pub type Flags = Map<String, Value>;

/// Optional lookup parameters.
///
/// `default_value: None` means the caller supplied no default;
/// `Some(Value::Null)` is an explicit null default.
#[derive(Debug)]
pub struct ValueParams<C: ?Sized> {
    pub default_value: Option<Value>,
    pub context: Option<Arc<C>>,
}

impl<C: ?Sized> Default for ValueParams<C> {
    fn default() -> Self {
        Self {
            default_value: None,
            context: None,
        }
    }
}

impl<C: ?Sized> Clone for ValueParams<C> {
    fn clone(&self) -> Self {
        Self {
            default_value: self.default_value.clone(),
            context: self.context.clone(),
        }
    }
}

impl<C: ?Sized> ValueParams<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_context(mut self, context: Arc<C>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn context(&self) -> Option<&Arc<C>> {
        self.context.as_ref()
    }
}

/// Backend with asynchronous retrieval.
#[async_trait]
pub trait AsyncDriver: Send + Sync {
    /// Evaluation context understood by the backend. Backends without
    /// contextual evaluation use `std::convert::Infallible`.
    type Context: ?Sized + Send + Sync;

    async fn get_raw_value(
        &self,
        key: &str,
        params: &ValueParams<Self::Context>,
    ) -> Result<Option<Value>>;

    async fn get_all_raw_values(&self, context: Option<&Arc<Self::Context>>) -> Result<Flags>;

    /// Releases backend resources. Calling it again is a no-op.
    async fn close(&self) -> Result<()>;
}

/// Backend with synchronous retrieval.
pub trait SyncDriver: Send + Sync {
    type Context: ?Sized + Send + Sync;

    fn get_raw_value_sync(
        &self,
        key: &str,
        params: &ValueParams<Self::Context>,
    ) -> Result<Option<Value>>;

    fn get_all_raw_values_sync(&self, context: Option<&Arc<Self::Context>>) -> Result<Flags>;

    fn close_sync(&self) -> Result<()>;
}

/// Serves a [`SyncDriver`] through the [`AsyncDriver`] contract; every
/// future is ready on first poll.
#[derive(Debug, Default)]
pub struct SyncAsAsync<D>(pub D);

impl<D> SyncAsAsync<D> {
    pub fn into_inner(self) -> D {
        self.0
    }
}

#[async_trait]
impl<D: SyncDriver> AsyncDriver for SyncAsAsync<D> {
    type Context = D::Context;

    async fn get_raw_value(
        &self,
        key: &str,
        params: &ValueParams<Self::Context>,
    ) -> Result<Option<Value>> {
        self.0.get_raw_value_sync(key, params)
    }

    async fn get_all_raw_values(&self, context: Option<&Arc<Self::Context>>) -> Result<Flags> {
        self.0.get_all_raw_values_sync(context)
    }

    async fn close(&self) -> Result<()> {
        self.0.close_sync()
    }
}
