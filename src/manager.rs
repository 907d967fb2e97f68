//! Facades layering defaulting and coercion over any driver.
//!
//! Every getter runs the same pipeline: raw retrieval from the driver, then
//! [`derive_value`] with the caller's default, then (for `get_value` and the
//! typed getters) the matching coercion. Driver errors are returned as-is.

use serde_json::{Number, Value};
use std::sync::Arc;

use crate::conversion::{to_bool, to_number, to_object, to_str, to_value};
use crate::defaults::{derive_value, MaybeEmpty};
use crate::driver::{AsyncDriver, Flags, SyncAsAsync, SyncDriver, ValueParams};
use crate::errors::{Error, Result};

fn finish_raw<C: ?Sized>(raw: Option<Value>, params: Option<&ValueParams<C>>) -> Option<Value> {
    derive_value(raw, params.and_then(|p| p.default_value.clone()))
}

fn require(key: &str, value: Option<Value>) -> Result<Value> {
    match value {
        Some(value) if !value.is_empty_value() => Ok(value),
        _ => {
            tracing::debug!(key, "assertion failed: empty value");
            Err(Error::Assertion {
                key: key.to_string(),
            })
        }
    }
}

fn coerce_all(flags: Flags) -> Flags {
    flags
        .into_iter()
        .map(|(key, raw)| {
            let value = to_value(Some(&raw)).unwrap_or(Value::Null);
            (key, value)
        })
        .collect()
}

fn no_params<C: ?Sized>() -> ValueParams<C> {
    ValueParams::default()
}

/// Facade over a driver that only offers asynchronous retrieval.
#[derive(Debug)]
pub struct AsyncFeatureManager<D> {
    driver: D,
}

impl<D: AsyncDriver> AsyncFeatureManager<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Raw value with the default applied; no coercion.
    pub async fn get_raw_value(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Option<Value>> {
        let raw = match params {
            Some(p) => self.driver.get_raw_value(key, p).await?,
            None => self.driver.get_raw_value(key, &no_params()).await?,
        };
        tracing::trace!(key, found = raw.is_some(), "raw lookup");
        Ok(finish_raw(raw, params))
    }

    /// Value with the default applied, then auto-detected by [`to_value`].
    pub async fn get_value(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Option<Value>> {
        let raw = self.get_raw_value(key, params).await?;
        Ok(to_value(raw.as_ref()))
    }

    /// Like [`get_value`](Self::get_value) but an empty result is an
    /// [`Error::Assertion`].
    pub async fn assert_get_value(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Value> {
        require(key, self.get_value(key, params).await?)
    }

    pub async fn assert_get_raw_value(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Value> {
        require(key, self.get_raw_value(key, params).await?)
    }

    pub async fn get_all_raw_values(&self, context: Option<&Arc<D::Context>>) -> Result<Flags> {
        self.driver.get_all_raw_values(context).await
    }

    pub async fn get_all_values(&self, context: Option<&Arc<D::Context>>) -> Result<Flags> {
        Ok(coerce_all(self.get_all_raw_values(context).await?))
    }

    pub async fn get_bool_value(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<bool> {
        Ok(to_bool(self.get_raw_value(key, params).await?.as_ref()))
    }

    pub async fn get_str_value(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Option<String>> {
        Ok(to_str(self.get_raw_value(key, params).await?.as_ref()))
    }

    pub async fn get_num_value(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Option<Number>> {
        Ok(to_number(self.get_raw_value(key, params).await?.as_ref()))
    }

    pub async fn get_obj_value(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Option<Value>> {
        Ok(to_object(self.get_raw_value(key, params).await?.as_ref()))
    }

    pub async fn close(&self) -> Result<()> {
        self.driver.close().await
    }
}

/// Facade over a synchronous driver. Offers the `*_sync` family and an
/// async family whose futures complete immediately with the sync result.
#[derive(Debug)]
pub struct SyncFeatureManager<D> {
    driver: D,
}

impl<D: SyncDriver> SyncFeatureManager<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Re-wraps the driver behind the async-only facade.
    pub fn into_async(self) -> AsyncFeatureManager<SyncAsAsync<D>> {
        AsyncFeatureManager::new(SyncAsAsync(self.driver))
    }

    pub fn get_raw_value_sync(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Option<Value>> {
        let raw = match params {
            Some(p) => self.driver.get_raw_value_sync(key, p)?,
            None => self.driver.get_raw_value_sync(key, &no_params())?,
        };
        tracing::trace!(key, found = raw.is_some(), "raw lookup");
        Ok(finish_raw(raw, params))
    }

    pub fn get_value_sync(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Option<Value>> {
        Ok(to_value(self.get_raw_value_sync(key, params)?.as_ref()))
    }

    pub fn assert_get_value_sync(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Value> {
        require(key, self.get_value_sync(key, params)?)
    }

    pub fn assert_get_raw_value_sync(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Value> {
        require(key, self.get_raw_value_sync(key, params)?)
    }

    pub fn get_all_raw_values_sync(&self, context: Option<&Arc<D::Context>>) -> Result<Flags> {
        self.driver.get_all_raw_values_sync(context)
    }

    pub fn get_all_values_sync(&self, context: Option<&Arc<D::Context>>) -> Result<Flags> {
        Ok(coerce_all(self.get_all_raw_values_sync(context)?))
    }

    pub fn get_bool_value_sync(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<bool> {
        Ok(to_bool(self.get_raw_value_sync(key, params)?.as_ref()))
    }

    pub fn get_str_value_sync(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Option<String>> {
        Ok(to_str(self.get_raw_value_sync(key, params)?.as_ref()))
    }

    pub fn get_num_value_sync(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Option<Number>> {
        Ok(to_number(self.get_raw_value_sync(key, params)?.as_ref()))
    }

    pub fn get_obj_value_sync(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Option<Value>> {
        Ok(to_object(self.get_raw_value_sync(key, params)?.as_ref()))
    }

    pub fn close_sync(&self) -> Result<()> {
        self.driver.close_sync()
    }

    pub async fn get_raw_value(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Option<Value>> {
        self.get_raw_value_sync(key, params)
    }

    pub async fn get_value(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Option<Value>> {
        self.get_value_sync(key, params)
    }

    pub async fn assert_get_value(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Value> {
        self.assert_get_value_sync(key, params)
    }

    pub async fn assert_get_raw_value(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Value> {
        self.assert_get_raw_value_sync(key, params)
    }

    pub async fn get_all_raw_values(&self, context: Option<&Arc<D::Context>>) -> Result<Flags> {
        self.get_all_raw_values_sync(context)
    }

    pub async fn get_all_values(&self, context: Option<&Arc<D::Context>>) -> Result<Flags> {
        self.get_all_values_sync(context)
    }

    pub async fn get_bool_value(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<bool> {
        self.get_bool_value_sync(key, params)
    }

    pub async fn get_str_value(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Option<String>> {
        self.get_str_value_sync(key, params)
    }

    pub async fn get_num_value(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Option<Number>> {
        self.get_num_value_sync(key, params)
    }

    pub async fn get_obj_value(
        &self,
        key: &str,
        params: Option<&ValueParams<D::Context>>,
    ) -> Result<Option<Value>> {
        self.get_obj_value_sync(key, params)
    }

    pub async fn close(&self) -> Result<()> {
        self.close_sync()
    }
}
