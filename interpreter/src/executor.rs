use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use scenario::{Param, Script, Statement, Value};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::driver::{Driver, DriverError, Params};
use crate::error::{DiagnosticError, RuntimeError, StatementContext};
use crate::symbols::SymbolTable;

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    /// `next` is the position of the statement about to execute.
    Running { next: usize },
    Completed,
    Aborted,
}

/// Cooperative cancellation, checked between statements.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A statement that ran successfully.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedStatement {
    pub index: usize,
    pub action: String,
    pub entity: String,
    pub ident: Option<String>,
    pub result: Value,
}

#[derive(Debug)]
pub enum RunStatus {
    Completed,
    Aborted(DiagnosticError),
}

/// Terminal outcome of a run plus everything it produced.
#[derive(Debug)]
pub struct RunReport {
    pub status: RunStatus,
    pub symbols: SymbolTable,
    /// Statements that completed, including those before an abort.
    pub executed: Vec<ExecutedStatement>,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, RunStatus::Completed)
    }

    pub fn error(&self) -> Option<&DiagnosticError> {
        match &self.status {
            RunStatus::Aborted(e) => Some(e),
            RunStatus::Completed => None,
        }
    }

    /// Collapse into a `Result`, keeping the symbol table on success.
    pub fn into_result(self) -> Result<SymbolTable, DiagnosticError> {
        match self.status {
            RunStatus::Completed => Ok(self.symbols),
            RunStatus::Aborted(e) => Err(e),
        }
    }
}

/// Single-pass execution of a script against a driver.
pub struct Execution<'a> {
    script: &'a Script,
    driver: &'a dyn Driver,
    symbols: SymbolTable,
    executed: Vec<ExecutedStatement>,
    state: RunState,
    cancel: Option<CancelToken>,
}

impl<'a> Execution<'a> {
    pub fn new(script: &'a Script, driver: &'a dyn Driver) -> Self {
        Execution {
            script,
            driver,
            symbols: SymbolTable::new(),
            executed: Vec::new(),
            state: RunState::NotStarted,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn executed(&self) -> &[ExecutedStatement] {
        &self.executed
    }

    /// Execute the next statement.
    ///
    /// Returns `Ok(true)` if a statement ran and `Ok(false)` once the run
    /// is terminal. The first error moves the run to `Aborted`; later
    /// calls return `Ok(false)` and execute nothing.
    pub fn step(&mut self) -> Result<bool, DiagnosticError> {
        let index = match self.state {
            RunState::NotStarted => 0,
            RunState::Running { next } => next,
            RunState::Completed | RunState::Aborted => return Ok(false),
        };

        if index >= self.script.statements.len() {
            self.state = RunState::Completed;
            return Ok(false);
        }
        self.state = RunState::Running { next: index };

        let script = self.script;
        let statement = &script.statements[index];
        let cancelled = self.cancel.as_ref().is_some_and(CancelToken::is_cancelled);
        let outcome = if cancelled {
            Err(RuntimeError::Cancelled)
        } else {
            self.execute_statement(index, statement)
        };

        match outcome {
            Ok(record) => {
                self.executed.push(record);
                self.state = if index + 1 == self.script.statements.len() {
                    RunState::Completed
                } else {
                    RunState::Running { next: index + 1 }
                };
                Ok(true)
            }
            Err(error) => {
                self.state = RunState::Aborted;
                let error = DiagnosticError::at(
                    error,
                    StatementContext::of(index, statement),
                    statement.span().clone(),
                    script.source_id,
                );
                warn!(%error, executed = self.executed.len(), "run aborted");
                Err(error)
            }
        }
    }

    /// Drive the run to a terminal state.
    pub fn run(mut self) -> RunReport {
        let span = info_span!("run", statements = self.script.statements.len());
        let _enter = span.enter();

        let status = loop {
            match self.step() {
                Ok(true) => continue,
                Ok(false) => break RunStatus::Completed,
                Err(e) => break RunStatus::Aborted(e),
            }
        };
        if matches!(status, RunStatus::Completed) {
            info!(bound = self.symbols.len(), "run completed");
        }

        RunReport {
            status,
            symbols: self.symbols,
            executed: self.executed,
        }
    }

    fn execute_statement(
        &mut self,
        index: usize,
        statement: &Statement,
    ) -> Result<ExecutedStatement, RuntimeError> {
        let expr = statement.expr();
        let ident = statement.identifier();

        if let Some(name) = ident {
            if self.symbols.contains(name) {
                return Err(RuntimeError::AlreadyBound {
                    name: name.to_string(),
                });
            }
        }

        let params = self.resolve_params(statement)?;
        debug!(index, action = %expr.action, entity = %expr.entity, "dispatching");

        let function = self.driver.lookup(&expr.action, &expr.entity);
        let result = function(&params)?;
        if let Value::Reference(target) = &result {
            return Err(RuntimeError::Execution(DriverError::InvalidResult(format!(
                "backend returned reference ${target}, expected a concrete value"
            ))));
        }

        if let Some(name) = ident {
            self.symbols.bind(name, result.clone())?;
            debug!(index, ident = name, value = %result, "bound");
        }

        Ok(ExecutedStatement {
            index,
            action: expr.action.clone(),
            entity: expr.entity.clone(),
            ident: ident.map(str::to_string),
            result,
        })
    }

    /// Substitute references with their current bindings. Holes and
    /// unbound references are errors.
    fn resolve_params(&self, statement: &Statement) -> Result<Params, RuntimeError> {
        let mut params = Params::new();
        for (name, param) in &statement.expr().params {
            let value = match param {
                Param::Pending(key) => {
                    return Err(RuntimeError::UnresolvedHole {
                        param: name.clone(),
                        key: key.clone(),
                    });
                }
                Param::Resolved(Value::Reference(target)) => self
                    .symbols
                    .get(target)
                    .cloned()
                    .ok_or_else(|| RuntimeError::UnknownReference {
                        name: target.clone(),
                    })?,
                Param::Resolved(value) => value.clone(),
            };
            params.insert(name.clone(), value);
        }
        Ok(params)
    }
}

/// Execute `script` against `driver`.
pub fn execute_script(script: &Script, driver: &dyn Driver) -> RunReport {
    Execution::new(script, driver).run()
}

/// Execute `script`, stopping before the next statement once `token` is
/// cancelled.
pub fn execute_script_with_cancel(
    script: &Script,
    driver: &dyn Driver,
    token: CancelToken,
) -> RunReport {
    Execution::new(script, driver).with_cancel(token).run()
}
