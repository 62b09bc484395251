pub mod driver;
pub mod error;
pub mod executor;
pub mod symbols;

pub use driver::{Driver, DriverError, DriverFn, DryRunDriver, Params, Registry};
pub use error::{DiagnosticError, RuntimeError, StatementContext};
pub use executor::{
    CancelToken, ExecutedStatement, Execution, RunReport, RunState, RunStatus, execute_script,
    execute_script_with_cancel,
};
pub use symbols::SymbolTable;
