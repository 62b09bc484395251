//! The dispatch contract between the engine and a backend.
//!
//! A backend maps an (action, entity) pair to a [`DriverFn`]. Lookup is
//! total: pairs the backend does not know yield [`unsupported`], a
//! function that always fails, so callers only ever handle execution
//! failure.

pub mod dry_run;
pub mod registry;

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

use scenario::Value;
use thiserror::Error;

pub use dry_run::DryRunDriver;
pub use registry::{DispatchKey, Registry};

/// Fully resolved parameters handed to a driver function. References
/// have already been replaced by the values they were bound to.
pub type Params = BTreeMap<String, Value>;

/// A dispatched, ready-to-call backend function.
pub type DriverFn = Arc<dyn Fn(&Params) -> Result<Value, DriverError> + Send + Sync>;

/// Where a backend writes its human-readable call trace.
pub type LogSink = Box<dyn Write + Send>;

#[derive(Debug, Clone, Error)]
pub enum DriverError {
    #[error("no driver function for '{action} {entity}'")]
    Unsupported { action: String, entity: String },

    #[error("missing required parameter '{0}'")]
    MissingParam(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    /// The function returned a value the engine cannot bind.
    #[error("invalid result: {0}")]
    InvalidResult(String),

    /// Failure reported by the provider itself (permission denied, quota, ...).
    #[error("{0}")]
    Provider(String),
}

pub trait Driver {
    /// Function for `action entity`. Never absent; see [`unsupported`].
    fn lookup(&self, action: &str, entity: &str) -> DriverFn;

    /// Install a sink for call tracing. Advisory only.
    fn set_logger(&mut self, _sink: LogSink) {}
}

/// The function returned for pairs a backend does not support.
pub fn unsupported(action: &str, entity: &str) -> DriverFn {
    let action = action.to_string();
    let entity = entity.to_string();
    Arc::new(move |_params: &Params| {
        Err(DriverError::Unsupported {
            action: action.clone(),
            entity: entity.clone(),
        })
    })
}

/// Shared handle to an optional [`LogSink`]. Write failures are ignored.
#[derive(Clone, Default)]
pub struct CallLog {
    sink: Arc<Mutex<Option<LogSink>>>,
}

impl CallLog {
    pub fn set(&self, sink: LogSink) {
        if let Ok(mut guard) = self.sink.lock() {
            *guard = Some(sink);
        }
    }

    pub fn line(&self, args: fmt::Arguments<'_>) {
        tracing::trace!(target: "driver", "{}", args);
        if let Ok(mut guard) = self.sink.lock() {
            if let Some(sink) = guard.as_mut() {
                let _ = writeln!(sink, "{}", args);
            }
        }
    }
}

impl fmt::Debug for CallLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallLog").finish_non_exhaustive()
    }
}

/// Render params as `key=value` pairs for traces.
pub fn format_params(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fetch a required parameter.
pub fn required<'p>(params: &'p Params, name: &str) -> Result<&'p Value, DriverError> {
    params
        .get(name)
        .ok_or_else(|| DriverError::MissingParam(name.to_string()))
}
