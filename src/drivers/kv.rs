use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;

use crate::driver::{Flags, SyncDriver, ValueParams};
use crate::errors::Result;

/// Serves flags from a fixed key/value mapping.
#[derive(Debug, Clone, Default)]
pub struct SimpleKeyValueDriver {
    conf: Flags,
}

impl SimpleKeyValueDriver {
    pub fn new(conf: Flags) -> Self {
        Self { conf }
    }

    /// Builds the mapping from a JSON object.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    pub fn conf(&self) -> &Flags {
        &self.conf
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for SimpleKeyValueDriver {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl SyncDriver for SimpleKeyValueDriver {
    type Context = Infallible;

    fn get_raw_value_sync(
        &self,
        key: &str,
        _params: &ValueParams<Self::Context>,
    ) -> Result<Option<Value>> {
        Ok(self.conf.get(key).cloned())
    }

    fn get_all_raw_values_sync(&self, _context: Option<&Arc<Self::Context>>) -> Result<Flags> {
        Ok(self.conf.clone())
    }

    fn close_sync(&self) -> Result<()> {
        Ok(())
    }
}
