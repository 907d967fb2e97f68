//! Backend adapters that need no network I/O.

mod contextual;
mod dummy;
mod env;
mod kv;

pub use contextual::{from_fn, ConfigResolver, ContextualDriver, FnResolver};
pub use dummy::DummyDriver;
pub use env::EnvironmentDriver;
pub use kv::SimpleKeyValueDriver;
