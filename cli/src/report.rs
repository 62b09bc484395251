use std::io::{self, Write};

use interpreter::{ExecutedStatement, SymbolTable};

/// Write the symbol table, one `name = value` per line or as a JSON object.
pub fn write_bindings(out: &mut dyn Write, symbols: &SymbolTable, json: bool) -> io::Result<()> {
    if json {
        let text = serde_json::to_string_pretty(symbols).map_err(io::Error::other)?;
        return writeln!(out, "{}", text);
    }
    for (name, value) in symbols.iter() {
        writeln!(out, "{} = {}", name, value)?;
    }
    Ok(())
}

/// List the statements that completed before an abort. Their effects
/// stay in place, so the operator needs them to compensate by hand.
pub fn write_executed(out: &mut dyn Write, executed: &[ExecutedStatement]) -> io::Result<()> {
    if executed.is_empty() {
        return writeln!(out, "nothing was executed");
    }
    writeln!(out, "already executed (not rolled back):")?;
    for done in executed {
        write!(out, "  {}. ", done.index + 1)?;
        if let Some(ident) = &done.ident {
            write!(out, "{} = ", ident)?;
        }
        writeln!(out, "{} {} -> {}", done.action, done.entity, done.result)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use interpreter::{DryRunDriver, execute_script};
    use scenario::parser::Parser;

    use super::*;

    fn run(source: &str, driver: &DryRunDriver) -> interpreter::RunReport {
        let script = Parser::new(source.to_string(), 0).parse().unwrap();
        execute_script(&script, driver)
    }

    #[test]
    fn abort_lists_everything_already_executed() {
        let mut driver = DryRunDriver::new();
        driver.fail_on("create", "subnet", "quota exceeded");
        let report = run(
            "net = create vpc\ncreate instance\nsub = create subnet vpc=$net\ncreate volume",
            &driver,
        );

        let error = report.error().unwrap();
        assert_eq!(
            error.to_string(),
            "statement 3 (sub = create subnet): execution failed: quota exceeded"
        );

        let mut out = Vec::new();
        write_executed(&mut out, &report.executed).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "already executed (not rolled back):\n  1. net = create vpc -> vpc-1\n  2. create instance -> instance-1\n"
        );
    }

    #[test]
    fn abort_on_first_statement() {
        let mut driver = DryRunDriver::new();
        driver.fail_on("create", "vpc", "denied");
        let report = run("create vpc", &driver);

        let mut out = Vec::new();
        write_executed(&mut out, &report.executed).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "nothing was executed\n");
    }

    #[test]
    fn bindings_as_text_and_json() {
        let report = run("net = create vpc\nsize = create volume", &DryRunDriver::new());

        let mut text = Vec::new();
        write_bindings(&mut text, &report.symbols, false).unwrap();
        assert_eq!(String::from_utf8(text).unwrap(), "net = vpc-1\nsize = volume-1\n");

        let mut json = Vec::new();
        write_bindings(&mut json, &report.symbols, true).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed, serde_json::json!({"net": "vpc-1", "size": "volume-1"}));
    }
}
