use clap::Parser;
use feature_manager::{
    EnvironmentDriver, Error, Result, SimpleKeyValueDriver, SyncDriver, SyncFeatureManager,
    ValueParams,
};
use itertools::Itertools;
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use std::process::ExitCode;
use tracing::Level;

/// Look up feature flags from the environment or a JSON document.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Flag keys to look up (required unless --all is given).
    #[arg(required_unless_present = "all")]
    keys: Vec<String>,
    /// Read flags from environment variables (the default backend).
    #[arg(long, conflicts_with = "json")]
    env: bool,
    /// Only read environment variables starting with this prefix.
    #[arg(long, conflicts_with = "json")]
    prefix: Option<String>,
    /// Read flags from this JSON object instead of the environment.
    #[arg(long)]
    json: Option<String>,
    /// Print every flag instead of the listed keys.
    #[arg(long)]
    all: bool,
    /// Skip type detection and print values as stored.
    #[arg(long)]
    raw: bool,
    /// Fallback for empty values (JSON, or plain text if not valid JSON).
    #[arg(long)]
    default: Option<String>,
    /// Fail with exit code 2 if any value is empty.
    #[arg(long)]
    assert: bool,
    /// Log at debug level to stderr.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Lookup<'a> {
    key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
}

fn main() -> ExitCode {
    // Parse CLI arguments.
    let args = Args::parse();

    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    // Pick the backend: JSON document if given, else the environment.
    let outcome = match args.json.as_deref() {
        Some(text) if !args.env => SimpleKeyValueDriver::from_json_str(text)
            .and_then(|driver| run(&SyncFeatureManager::new(driver), &args)),
        _ => {
            let driver = match &args.prefix {
                Some(prefix) => EnvironmentDriver::with_prefix(prefix.as_str()),
                None => EnvironmentDriver::new(),
            };
            run(&SyncFeatureManager::new(driver), &args)
        }
    };

    // Assertion failures get their own exit code.
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            if e.is_assertion() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// Runs the lookup and closes the manager whether or not it succeeded.
fn run<D>(manager: &SyncFeatureManager<D>, args: &Args) -> Result<()>
where
    D: SyncDriver<Context = Infallible>,
{
    let output = lookup(manager, args);
    let closed = manager.close_sync();
    // Lookup errors win over close errors.
    let output = output?;
    closed?;
    println!("{output}");
    Ok(())
}

/// Builds the JSON text to print.
fn lookup<D>(manager: &SyncFeatureManager<D>, args: &Args) -> Result<String>
where
    D: SyncDriver<Context = Infallible>,
{
    // Bulk listing ignores keys and defaults.
    if args.all {
        let all = if args.raw {
            manager.get_all_raw_values_sync(None)?
        } else {
            manager.get_all_values_sync(None)?
        };
        return to_json(&Value::Object(all));
    }

    // Default is JSON when it parses, plain text otherwise.
    let mut params = ValueParams::new();
    if let Some(def) = args.default.as_deref() {
        params = params.with_default(
            serde_json::from_str::<Value>(def).unwrap_or_else(|_| Value::String(def.to_string())),
        );
    }

    // Repeated keys are looked up once.
    let mut lookups = Vec::new();
    for key in args.keys.iter().unique() {
        let value = match (args.assert, args.raw) {
            (true, true) => Some(manager.assert_get_raw_value_sync(key, Some(&params))?),
            (true, false) => Some(manager.assert_get_value_sync(key, Some(&params))?),
            (false, true) => manager.get_raw_value_sync(key, Some(&params))?,
            (false, false) => manager.get_value_sync(key, Some(&params))?,
        };
        lookups.push(Lookup { key, value });
    }
    to_json(&lookups)
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Error::InvalidJson)
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_manager::Flags;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Key/value backend that counts how often it was closed.
    struct CountingClose {
        inner: SimpleKeyValueDriver,
        closes: AtomicUsize,
    }

    impl SyncDriver for CountingClose {
        type Context = Infallible;

        fn get_raw_value_sync(&self, key: &str, params: &ValueParams<Infallible>) -> Result<Option<Value>> {
            self.inner.get_raw_value_sync(key, params)
        }

        fn get_all_raw_values_sync(&self, context: Option<&Arc<Infallible>>) -> Result<Flags> {
            self.inner.get_all_raw_values_sync(context)
        }

        fn close_sync(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn manager() -> SyncFeatureManager<CountingClose> {
        SyncFeatureManager::new(CountingClose {
            inner: [("a", "1"), ("b", "")].into_iter().collect(),
            closes: AtomicUsize::new(0),
        })
    }

    fn closes(manager: &SyncFeatureManager<CountingClose>) -> usize {
        manager.driver().closes.load(Ordering::SeqCst)
    }

    #[test]
    fn keys_are_required_without_all() {
        assert!(Args::try_parse_from(["fmget"]).is_err());
        assert!(Args::try_parse_from(["fmget", "--all"]).is_ok());
        assert!(Args::try_parse_from(["fmget", "flag"]).is_ok());
    }

    #[test]
    fn bulk_listing_closes_the_manager() {
        let fm = manager();
        let args = Args::try_parse_from(["fmget", "--all"]).unwrap();
        run(&fm, &args).unwrap();
        assert_eq!(closes(&fm), 1);
    }

    #[test]
    fn failed_assertion_still_closes() {
        let fm = manager();
        let args = Args::try_parse_from(["fmget", "--assert", "b"]).unwrap();
        assert!(run(&fm, &args).unwrap_err().is_assertion());
        assert_eq!(closes(&fm), 1);
    }

    #[test]
    fn lookups_detect_types_and_dedupe_keys() {
        let fm = manager();
        let args = Args::try_parse_from(["fmget", "a", "a", "missing"]).unwrap();
        let text = lookup(&fm, &args).unwrap();
        let printed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(printed, json!([{"key": "a", "value": 1}, {"key": "missing"}]));
    }
}
