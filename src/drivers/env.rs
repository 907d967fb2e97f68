use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;

use crate::driver::{Flags, SyncDriver, ValueParams};
use crate::errors::Result;

/// Reads flags from the process environment. Values are always strings.
///
/// With a prefix, key `flag` reads variable `<prefix>flag` and the bulk
/// listing only contains prefixed variables, keyed without the prefix.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentDriver {
    prefix: Option<String>,
}

impl EnvironmentDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn var_name(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{key}"),
            None => key.to_string(),
        }
    }
}

impl SyncDriver for EnvironmentDriver {
    type Context = Infallible;

    fn get_raw_value_sync(
        &self,
        key: &str,
        _params: &ValueParams<Self::Context>,
    ) -> Result<Option<Value>> {
        let name = self.var_name(key);
        let value = std::env::var_os(&name).map(|v| Value::String(v.to_string_lossy().into_owned()));
        tracing::trace!(var = %name, found = value.is_some(), "environment lookup");
        Ok(value)
    }

    fn get_all_raw_values_sync(&self, _context: Option<&Arc<Self::Context>>) -> Result<Flags> {
        let prefix = self.prefix.as_deref().unwrap_or("");
        Ok(std::env::vars_os()
            .filter_map(|(name, value)| {
                let name = name.to_string_lossy();
                let key = name.strip_prefix(prefix)?;
                Some((
                    key.to_string(),
                    Value::String(value.to_string_lossy().into_owned()),
                ))
            })
            .collect())
    }

    fn close_sync(&self) -> Result<()> {
        Ok(())
    }
}
