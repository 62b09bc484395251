use std::sync::{Arc, Mutex};

use interpreter::{
    CancelToken, Driver, DriverError, DriverFn, DryRunDriver, Execution, Params, Registry,
    RunState, RuntimeError, execute_script, execute_script_with_cancel,
};
use pretty_assertions::assert_eq;
use scenario::parser::Parser;
use scenario::{Expression, Fills, Script, Statement, Value};

type Calls = Arc<Mutex<Vec<String>>>;

/// Registry whose handlers record every invocation as "action entity".
fn recording_registry(calls: &Calls) -> Registry {
    let mut registry = Registry::new();
    for (action, entity, result) in [
        ("create", "vpc", "mynewvpc"),
        ("create", "subnet", "mynewsubnet"),
        ("create", "instance", "mynewinstance"),
    ] {
        let calls = Arc::clone(calls);
        registry.register(action, entity, move |_params: &Params| {
            calls.lock().unwrap().push(format!("{} {}", action, entity));
            Ok(Value::from(result))
        });
    }
    registry
}

fn parse(source: &str) -> Script {
    Parser::new(source.to_string(), 0)
        .parse()
        .expect("parse failed")
}

/// Driver that checks the params it receives against an expectation.
struct ExpectingDriver {
    action: &'static str,
    entity: &'static str,
    expected: Params,
}

impl Driver for ExpectingDriver {
    fn lookup(&self, action: &str, entity: &str) -> DriverFn {
        if action != self.action || entity != self.entity {
            return interpreter::driver::unsupported(action, entity);
        }
        let expected = self.expected.clone();
        Arc::new(move |params: &Params| {
            if params != &expected {
                return Err(DriverError::Provider(format!(
                    "params mismatch: expected {:?}, got {:?}",
                    expected, params
                )));
            }
            Ok(Value::from("mynewvpc"))
        })
    }
}

fn count_one() -> Params {
    let mut params = Params::new();
    params.insert("count".into(), Value::from(1i64));
    params
}

#[test]
fn driver_receives_expression_params() {
    let script = Script::new(vec![Statement::expression(
        Expression::new("create", "vpc").with_param("count", 1i64),
    )]);
    let driver = ExpectingDriver {
        action: "create",
        entity: "vpc",
        expected: count_one(),
    };

    let report = execute_script(&script, &driver);
    assert!(report.is_completed(), "{:?}", report.error());
    assert!(report.symbols.is_empty());
    assert_eq!(report.executed.len(), 1);
    assert_eq!(report.executed[0].result, Value::from("mynewvpc"));
}

#[test]
fn declaration_binds_result() {
    let script = Script::new(vec![Statement::declaration(
        "myvar",
        Expression::new("create", "vpc").with_param("count", 1i64),
    )]);
    let driver = ExpectingDriver {
        action: "create",
        entity: "vpc",
        expected: count_one(),
    };

    let report = execute_script(&script, &driver);
    assert!(report.is_completed());
    assert_eq!(report.symbols.get("myvar"), Some(&Value::from("mynewvpc")));
}

#[test]
fn references_resolve_to_earlier_bindings() {
    let script = parse("net = create vpc\nsub = create subnet vpc=$net\ncreate instance subnet=$sub vpc=$net");
    let driver = DryRunDriver::new();
    let report = execute_script(&script, &driver);

    assert!(report.is_completed(), "{:?}", report.error());
    assert_eq!(report.symbols.get("net"), Some(&Value::from("vpc-1")));
    assert_eq!(report.symbols.get("sub"), Some(&Value::from("subnet-1")));
    let names: Vec<&str> = report.symbols.iter().map(|(k, _)| k).collect();
    assert_eq!(names, vec!["net", "sub"]);
    assert_eq!(report.executed.len(), 3);
}

#[test]
fn unknown_reference_aborts_after_earlier_effects() {
    let calls = Calls::default();
    let registry = recording_registry(&calls);
    let script = parse("net = create vpc\ncreate subnet vpc=$nowhere");

    let report = execute_script(&script, &registry);
    let err = report.error().expect("run should abort");

    assert!(matches!(
        &err.error,
        RuntimeError::UnknownReference { name } if name == "nowhere"
    ));
    let ctx = err.statement.as_ref().unwrap();
    assert_eq!((ctx.index, ctx.action.as_str(), ctx.entity.as_str()), (1, "create", "subnet"));
    assert_eq!(*calls.lock().unwrap(), vec!["create vpc".to_string()]);
    assert_eq!(report.executed.len(), 1);
    assert_eq!(report.symbols.get("net"), Some(&Value::from("mynewvpc")));
}

#[test]
fn forward_references_are_unknown() {
    let calls = Calls::default();
    let registry = recording_registry(&calls);
    let script = parse("create subnet vpc=$net\nnet = create vpc");

    let report = execute_script(&script, &registry);
    assert!(matches!(
        report.error().map(|e| &e.error),
        Some(RuntimeError::UnknownReference { .. })
    ));
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn failing_statement_stops_the_run() {
    let calls = Calls::default();
    let mut registry = recording_registry(&calls);
    registry.register("create", "vpc", |_params: &Params| {
        Err(DriverError::Provider("permission denied".into()))
    });
    let script = parse("create vpc\ncreate subnet");

    let report = execute_script(&script, &registry);
    let err = report.error().expect("run should abort");
    assert!(matches!(err.error, RuntimeError::Execution(DriverError::Provider(_))));
    assert_eq!(
        err.to_string(),
        "statement 1 (create vpc): execution failed: permission denied"
    );
    // the subnet handler was never invoked
    assert!(calls.lock().unwrap().is_empty());
    assert!(report.executed.is_empty());
}

#[test]
fn reference_results_are_never_bound() {
    let seen = Arc::new(Mutex::new(Vec::<Params>::new()));
    let mut registry = Registry::new();
    registry.register("create", "vpc", |_params: &Params| {
        Ok(Value::Reference("ghost".into()))
    });
    let subnet_seen = Arc::clone(&seen);
    registry.register("create", "subnet", move |params: &Params| {
        subnet_seen.lock().unwrap().push(params.clone());
        Ok(Value::from("subnet-1"))
    });
    let script = parse("a = create vpc\ncreate subnet vpc=$a");

    let report = execute_script(&script, &registry);
    let err = report.error().expect("run should abort");
    assert!(matches!(err.error, RuntimeError::Execution(DriverError::InvalidResult(_))));
    assert_eq!(err.statement.as_ref().unwrap().index, 0);
    assert!(!report.symbols.contains("a"));
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn unsupported_pair_is_dispatch_not_found() {
    let calls = Calls::default();
    let registry = recording_registry(&calls);
    let script = parse("web = create instance\ndestroy planet");

    let report = execute_script(&script, &registry);
    let err = report.error().unwrap();
    assert!(matches!(
        &err.error,
        RuntimeError::DispatchNotFound { action, entity } if action == "destroy" && entity == "planet"
    ));
    assert_eq!(err.span, Some(22..36));
    assert_eq!(report.symbols.get("web"), Some(&Value::from("mynewinstance")));
}

#[test]
fn pending_hole_never_reaches_the_driver() {
    let calls = Calls::default();
    let registry = recording_registry(&calls);
    let script = parse("create vpc name={vpc.name}");

    let report = execute_script(&script, &registry);
    assert!(matches!(
        report.error().map(|e| &e.error),
        Some(RuntimeError::UnresolvedHole { param, key }) if param == "name" && key == "vpc.name"
    ));
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn redeclaration_is_rejected_before_dispatch() {
    let calls = Calls::default();
    let registry = recording_registry(&calls);
    let script = parse("a = create vpc\na = create subnet");

    let report = execute_script(&script, &registry);
    assert!(matches!(
        report.error().map(|e| &e.error),
        Some(RuntimeError::AlreadyBound { name }) if name == "a"
    ));
    assert_eq!(*calls.lock().unwrap(), vec!["create vpc".to_string()]);
    assert_eq!(report.symbols.get("a"), Some(&Value::from("mynewvpc")));
}

#[test]
fn step_walks_the_state_machine() {
    let driver = DryRunDriver::new();
    let script = parse("a = create vpc\nb = create subnet vpc=$a");
    let mut run = Execution::new(&script, &driver);

    assert_eq!(run.state(), RunState::NotStarted);
    assert!(run.step().unwrap());
    assert_eq!(run.state(), RunState::Running { next: 1 });
    assert_eq!(run.symbols().get("a"), Some(&Value::from("vpc-1")));
    assert!(run.step().unwrap());
    assert_eq!(run.state(), RunState::Completed);
    assert!(!run.step().unwrap());
    assert_eq!(run.executed().len(), 2);
}

#[test]
fn aborted_is_terminal() {
    let mut driver = DryRunDriver::new();
    driver.fail_on("create", "vpc", "quota exceeded");
    let script = parse("create vpc\ncreate subnet");
    let mut run = Execution::new(&script, &driver);

    assert!(run.step().is_err());
    assert_eq!(run.state(), RunState::Aborted);
    assert!(!run.step().unwrap());
    assert_eq!(driver.created("subnet"), 0);
}

#[test]
fn empty_script_completes() {
    let driver = DryRunDriver::new();
    let report = execute_script(&Script::default(), &driver);
    assert!(report.is_completed());
    assert!(report.executed.is_empty());
}

#[test]
fn cancellation_is_checked_between_statements() {
    let token = CancelToken::new();
    let trigger = token.clone();
    let mut registry = Registry::new();
    registry.register("create", "vpc", move |_params: &Params| {
        trigger.cancel();
        Ok(Value::from("vpc-1"))
    });
    registry.register("create", "subnet", |_params: &Params| {
        panic!("subnet must not be created after cancellation")
    });
    let script = parse("net = create vpc\ncreate subnet vpc=$net");

    let report = execute_script_with_cancel(&script, &registry, token);
    let err = report.error().unwrap();
    assert!(matches!(err.error, RuntimeError::Cancelled));
    assert_eq!(err.statement.as_ref().unwrap().index, 1);
    assert_eq!(report.symbols.get("net"), Some(&Value::from("vpc-1")));
}

#[test]
fn template_filled_then_executed() {
    let mut script = parse(
        "net = create vpc cidr={vpc.cidr}\ncreate instance count={instance.count} type={instance.type} vpc=$net",
    );
    let fills: Fills = [
        ("vpc.cidr", Value::from("10.0.0.0/16")),
        ("instance.count", Value::from(2i64)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    assert_eq!(script.resolve_template(&fills), 2);
    let unresolved = script.ensure_resolved().unwrap_err();
    assert_eq!(unresolved.holes.len(), 1);
    assert_eq!(unresolved.holes[0].key, "instance.type");

    let mut answer = |question: &str| -> Result<Value, scenario::InputError> {
        assert_eq!(question, "Instance type");
        Ok(Value::from("t2.micro"))
    };
    script.interactive_resolve_template(&mut answer).unwrap();
    assert!(script.ensure_resolved().is_ok());

    let driver = DryRunDriver::new();
    let symbols = execute_script(&script, &driver).into_result().unwrap();
    assert_eq!(symbols.get("net"), Some(&Value::from("vpc-1")));
    assert_eq!(driver.created("instance"), 1);
}

#[test]
fn driver_logger_sees_calls_but_not_control_flow() {
    #[derive(Clone, Default)]
    struct Buf(Arc<Mutex<Vec<u8>>>);
    impl std::io::Write for Buf {
        fn write(&mut self, b: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(b);
            Ok(b.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let buf = Buf::default();
    let mut driver = DryRunDriver::new();
    driver.set_logger(Box::new(buf.clone()));
    let script = parse("net = create vpc cidr=10.0.0.0/16\ndelete vpc id=$net");

    let report = execute_script(&script, &driver);
    assert!(report.is_completed());
    let trace = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
    assert_eq!(
        trace,
        "create vpc cidr=10.0.0.0/16 -> vpc-1\ndelete vpc id=vpc-1 -> vpc-1\n"
    );
}
