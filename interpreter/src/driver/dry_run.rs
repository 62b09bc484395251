use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use scenario::Value;

use crate::driver::{Driver, DriverError, DriverFn, LogSink, Params, Registry, required};

/// Verbs understood by the dry-run backend.
pub const ACTIONS: &[&str] = &["create", "delete", "start", "stop", "update", "attach", "detach"];

/// Resource kinds understood by the dry-run backend.
pub const ENTITIES: &[&str] = &[
    "instance",
    "vpc",
    "subnet",
    "securitygroup",
    "volume",
    "keypair",
    "internetgateway",
    "routetable",
    "user",
    "group",
];

/// Backend that performs no provider calls. `create` hands out
/// sequential ids (`vpc-1`, `vpc-2`, ...); every other action requires an
/// `id` parameter and echoes it back.
#[derive(Debug)]
pub struct DryRunDriver {
    registry: Registry,
    counters: Arc<Mutex<HashMap<String, usize>>>,
}

impl Default for DryRunDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DryRunDriver {
    pub fn new() -> Self {
        let counters: Arc<Mutex<HashMap<String, usize>>> = Arc::default();
        let mut registry = Registry::new();

        for entity in ENTITIES {
            let entity_name = entity.to_string();
            let ids = Arc::clone(&counters);
            registry.register("create", entity, move |_params: &Params| {
                let mut ids = ids
                    .lock()
                    .map_err(|_| DriverError::Provider("id counter poisoned".into()))?;
                let n = ids.entry(entity_name.clone()).or_insert(0);
                *n += 1;
                Ok(Value::String(format!("{}-{}", entity_name, n)))
            });

            for action in ACTIONS.iter().filter(|a| **a != "create") {
                registry.register(action, entity, |params: &Params| {
                    Ok(required(params, "id")?.clone())
                });
            }
        }

        DryRunDriver { registry, counters }
    }

    /// Make `action entity` fail with a provider error carrying `message`.
    pub fn fail_on(&mut self, action: &str, entity: &str, message: impl Into<String>) {
        let message = message.into();
        self.registry.register(action, entity, move |_params: &Params| {
            Err(DriverError::Provider(message.clone()))
        });
    }

    /// Number of `create` calls that succeeded for `entity`.
    pub fn created(&self, entity: &str) -> usize {
        self.counters
            .lock()
            .map(|ids| ids.get(entity).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl Driver for DryRunDriver {
    fn lookup(&self, action: &str, entity: &str) -> DriverFn {
        self.registry.lookup(action, entity)
    }

    fn set_logger(&mut self, sink: LogSink) {
        self.registry.set_logger(sink);
    }
}
