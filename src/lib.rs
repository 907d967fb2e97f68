//! Typed access to feature flags and configuration values from any backend.
//!
//! Backends implement the raw-value contract in [`driver`]; the facades in
//! [`manager`] apply default-value policy ([`defaults`]) and coercion
//! ([`conversion`]) on top. [`context::ContextCache`] memoizes per-context
//! resolutions for backends that evaluate rules against a context.

pub mod context;
pub mod conversion;
pub mod defaults;
pub mod driver;
pub mod drivers;
pub mod errors;
pub mod manager;

pub use context::ContextCache;
pub use conversion::{safe_parse, to_bool, to_number, to_object, to_str, to_value};
pub use defaults::{derive_value, is_empty, MaybeEmpty};
pub use driver::{AsyncDriver, Flags, SyncAsAsync, SyncDriver, ValueParams};
pub use drivers::{
    ConfigResolver, ContextualDriver, DummyDriver, EnvironmentDriver, SimpleKeyValueDriver,
};
pub use errors::{BoxError, Error, Result};
pub use manager::{AsyncFeatureManager, SyncFeatureManager};
