use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use scenario::Value;

use crate::driver::{CallLog, Driver, DriverError, DriverFn, LogSink, Params, format_params, unsupported};

/// Registry key: an (action, entity) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatchKey {
    pub action: String,
    pub entity: String,
}

impl DispatchKey {
    pub fn new(action: impl Into<String>, entity: impl Into<String>) -> Self {
        DispatchKey {
            action: action.into(),
            entity: entity.into(),
        }
    }
}

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.entity)
    }
}

/// Explicit handler table filled when a backend is constructed.
#[derive(Default)]
pub struct Registry {
    handlers: BTreeMap<DispatchKey, DriverFn>,
    log: CallLog,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `action entity`.
    pub fn register<F>(&mut self, action: &str, entity: &str, handler: F)
    where
        F: Fn(&Params) -> Result<Value, DriverError> + Send + Sync + 'static,
    {
        self.handlers
            .insert(DispatchKey::new(action, entity), Arc::new(handler));
    }

    /// Builder-style [`Registry::register`].
    pub fn with<F>(mut self, action: &str, entity: &str, handler: F) -> Self
    where
        F: Fn(&Params) -> Result<Value, DriverError> + Send + Sync + 'static,
    {
        self.register(action, entity, handler);
        self
    }

    pub fn supports(&self, action: &str, entity: &str) -> bool {
        self.handlers.contains_key(&DispatchKey::new(action, entity))
    }

    /// Every supported pair, sorted.
    pub fn pairs(&self) -> impl Iterator<Item = &DispatchKey> {
        self.handlers.keys()
    }
}

impl Driver for Registry {
    fn lookup(&self, action: &str, entity: &str) -> DriverFn {
        let key = DispatchKey::new(action, entity);
        let Some(handler) = self.handlers.get(&key).cloned() else {
            self.log.line(format_args!("{}: unsupported", key));
            return unsupported(action, entity);
        };
        let log = self.log.clone();
        Arc::new(move |params: &Params| {
            let result = handler(params);
            match &result {
                Ok(value) => log.line(format_args!("{} {} -> {}", key, format_params(params), value)),
                Err(e) => log.line(format_args!("{} {} failed: {}", key, format_params(params), e)),
            }
            result
        })
    }

    fn set_logger(&mut self, sink: LogSink) {
        self.log.set(sink);
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("pairs", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};
    use std::sync::Mutex;

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn vpc_registry() -> Registry {
        Registry::new().with("create", "vpc", |params| {
            let count = params.get("count").and_then(Value::as_number).unwrap_or(1.0);
            Ok(Value::String(format!("vpc-x{}", count)))
        })
    }

    #[test]
    fn dispatches_registered_pairs() {
        let registry = vpc_registry();
        let mut params = Params::new();
        params.insert("count".into(), Value::from(2i64));

        let f = registry.lookup("create", "vpc");
        assert_eq!(f(&params).unwrap(), Value::from("vpc-x2"));
        assert!(registry.supports("create", "vpc"));
        assert_eq!(
            registry.pairs().map(|k| k.to_string()).collect::<Vec<_>>(),
            vec!["create vpc"]
        );
    }

    #[test]
    fn unknown_pair_yields_failing_function() {
        let registry = vpc_registry();
        let f = registry.lookup("delete", "vpc");
        assert!(matches!(
            f(&Params::new()),
            Err(DriverError::Unsupported { .. })
        ));
    }

    #[test]
    fn logger_receives_call_trace() {
        let buf = SharedBuf::default();
        let mut registry = vpc_registry();
        registry.set_logger(Box::new(buf.clone()));

        let mut params = Params::new();
        params.insert("count".into(), Value::from(1i64));
        registry.lookup("create", "vpc")(&params).unwrap();

        let trace = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(trace, "create vpc count=1 -> vpc-x1\n");
    }
}
