use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use codespan_reporting::term::termcolor::{
    Color, ColorChoice, ColorSpec, StandardStream, WriteColor,
};
use serde::Deserialize;
use tracing::warn;

use interpreter::{DryRunDriver, RunReport};
use scenario::Value;

use crate::values::{fills_from_table, toml_to_value};

const FIXTURE_SUFFIX: &str = ".test.scen";

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Pairs the dry-run backend should fail, written "action entity".
    #[serde(default)]
    pub fail: Vec<String>,

    /// Substring expected in the runtime error message.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// If true, the test expects parsing to fail.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// Question keys expected to remain pending after static resolution.
    /// When set, the scenario is not executed.
    #[serde(default)]
    pub expect_unresolved: Option<Vec<String>>,

    /// Static fills applied before execution.
    #[serde(default)]
    pub fills: toml::Table,

    /// Identifier bindings the run must produce.
    #[serde(default)]
    pub expect_bindings: Option<toml::Table>,
}

/// Parse a `.test.scen` file into its TOML config and scenario source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}'); // strip BOM

    if !content.starts_with("---") {
        return Err("missing opening --- frontmatter delimiter".into());
    }

    let after_open = &content[3..];
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest_start = close_pos + 4; // skip \n---
    let source = after_open[rest_start..]
        .strip_prefix("\r\n")
        .or_else(|| after_open[rest_start..].strip_prefix('\n'))
        .unwrap_or(&after_open[rest_start..]);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    /// Description from the frontmatter, else the file name without suffix.
    fn label(&self) -> String {
        if let Some(description) = &self.description {
            return description.clone();
        }
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.trim_end_matches(FIXTURE_SUFFIX).to_string())
            .unwrap_or_default()
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };
    let description = config.description.clone();

    let parse_result = scenario::parser::Parser::new(source.to_string(), 0).parse();
    if config.expect_parse_error {
        return match parse_result {
            Err(_) => TestResult {
                path: path.to_path_buf(),
                description,
                outcome: TestOutcome::Pass,
            },
            Ok(_) => fail(
                description,
                "expected parse error, but parsing succeeded".into(),
            ),
        };
    }

    let mut script = match parse_result {
        Ok(s) => s,
        Err(errs) => {
            let msgs: Vec<String> = errs.iter().map(|e| e.message.clone()).collect();
            return fail(
                description,
                format!("unexpected parse error: {}", msgs.join("; ")),
            );
        }
    };

    script.resolve_template(&fills_from_table(&config.fills));
    let pending: Vec<String> = script.holes().into_iter().map(|h| h.key).collect();

    if let Some(expected) = &config.expect_unresolved {
        return if &pending == expected {
            TestResult {
                path: path.to_path_buf(),
                description,
                outcome: TestOutcome::Pass,
            }
        } else {
            fail(
                description,
                format!(
                    "unresolved holes mismatch\n  expected: {:?}\n  actual:   {:?}",
                    expected, pending
                ),
            )
        };
    }
    if let Err(e) = script.ensure_resolved() {
        return fail(description, e.to_string());
    }

    let mut driver = DryRunDriver::new();
    for pair in &config.fail {
        let Some((action, entity)) = pair.split_once(' ') else {
            return fail(
                description,
                format!("bad fail entry '{}': expected \"action entity\"", pair),
            );
        };
        driver.fail_on(action.trim(), entity.trim(), format!("injected failure for {}", pair));
    }

    let report = interpreter::execute_script(&script, &driver);

    if let Some(reason) = check_outcome(&config, &report) {
        return fail(description, reason);
    }

    TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Pass,
    }
}

/// Compare a run against the fixture's expectations. Returns `Some(reason)` on mismatch.
fn check_outcome(config: &TestConfig, report: &RunReport) -> Option<String> {
    match (&config.expect_error, report.error()) {
        (Some(expected), Some(err)) => {
            let err_str = err.to_string();
            if !err_str.contains(expected.as_str()) {
                return Some(format!(
                    "expected error containing \"{}\", got: {}",
                    expected, err_str
                ));
            }
        }
        (Some(expected), None) => {
            return Some(format!(
                "expected error containing \"{}\", but execution succeeded",
                expected
            ));
        }
        (None, Some(err)) => return Some(format!("unexpected runtime error: {}", err)),
        (None, None) => {}
    }

    let expected = config.expect_bindings.as_ref()?;
    for (name, want) in expected {
        let want: Value = toml_to_value(want);
        match report.symbols.get(name) {
            Some(got) if *got == want => {}
            Some(got) => {
                return Some(format!(
                    "binding '{}' mismatch\n  expected: {}\n  actual:   {}",
                    name, want, got
                ));
            }
            None => return Some(format!("binding '{}' was never set", name)),
        }
    }
    if report.symbols.len() != expected.len() {
        let actual: Vec<&str> = report.symbols.iter().map(|(k, _)| k).collect();
        return Some(format!(
            "expected {} binding(s), got {}: {}",
            expected.len(),
            report.symbols.len(),
            actual.join(", ")
        ));
    }
    None
}

/// Fixture files grouped by the directory they sit in, relative to the
/// suite root. Fixtures at the root land in the "" group.
struct Suite {
    groups: BTreeMap<String, Vec<PathBuf>>,
}

impl Suite {
    fn load(path: &Path) -> Suite {
        if path.is_file() {
            return Suite {
                groups: BTreeMap::from([(String::new(), vec![path.to_path_buf()])]),
            };
        }

        let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        let mut pending = vec![path.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten().map(|e| e.path()) {
                if entry.is_dir() {
                    pending.push(entry);
                } else if is_fixture(&entry) {
                    groups.entry(category_of(path, &dir)).or_default().push(entry);
                }
            }
        }
        for files in groups.values_mut() {
            files.sort();
        }
        Suite { groups }
    }

    fn is_empty(&self) -> bool {
        self.groups.values().all(Vec::is_empty)
    }

    /// Keep the named categories and everything nested below them. An
    /// empty selection keeps the whole suite.
    fn retain(&mut self, wanted: &[String]) {
        if wanted.is_empty() {
            return;
        }
        let wanted: Vec<&str> = wanted.iter().map(|w| w.trim_matches('/')).collect();
        for name in &wanted {
            if !self.groups.keys().any(|category| within(category, name)) {
                warn!(category = *name, "no fixtures in category");
            }
        }
        self.groups
            .retain(|category, _| wanted.iter().any(|name| within(category, name)));
    }
}

fn within(category: &str, name: &str) -> bool {
    category == name
        || category
            .strip_prefix(name)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn is_fixture(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(FIXTURE_SUFFIX))
}

fn category_of(root: &Path, dir: &Path) -> String {
    let Ok(relative) = dir.strip_prefix(root) else {
        return String::new();
    };
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Print each category under `path` with its fixture count.
pub fn list_categories(path: &Path) {
    let suite = Suite::load(path);
    if suite.is_empty() {
        eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
        return;
    }
    for (category, files) in &suite.groups {
        let name = if category.is_empty() { "." } else { category };
        println!("{} ({} fixture(s))", name, files.len());
    }
}

/// Run every fixture under `path`, or only those in `categories` when
/// given. Returns the process exit code.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let mut suite = Suite::load(path);
    suite.retain(categories);
    if suite.is_empty() {
        eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
        return 1;
    }

    let choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let mut out = StandardStream::stderr(choice);
    match run_suite(&suite, &mut out) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            eprintln!("error: cannot write test report: {}", e);
            1
        }
    }
}

/// Run `suite`, writing one status line per fixture, the failure reasons
/// and a summary. Returns whether every fixture passed.
fn run_suite(suite: &Suite, out: &mut dyn WriteColor) -> io::Result<bool> {
    let mut passed = 0usize;
    let mut failures = Vec::new();

    for (category, files) in &suite.groups {
        if !category.is_empty() {
            writeln!(out)?;
            out.set_color(ColorSpec::new().set_bold(true))?;
            writeln!(out, "{}", category)?;
            out.reset()?;
        }
        for file in files {
            let result = run_single_test(file);
            let ok = matches!(result.outcome, TestOutcome::Pass);
            write!(out, "  ")?;
            write_status(out, ok)?;
            writeln!(out, "  {}", result.label())?;
            if ok {
                passed += 1;
            } else {
                failures.push(result);
            }
        }
    }

    for failure in &failures {
        if let TestOutcome::Fail(reason) = &failure.outcome {
            writeln!(out, "\n  --- {} ---", failure.path.display())?;
            for line in reason.lines() {
                writeln!(out, "  {}", line)?;
            }
        }
    }

    writeln!(out)?;
    write!(out, "test result: ")?;
    write_status(out, failures.is_empty())?;
    writeln!(out, ". {} passed, {} failed", passed, failures.len())?;
    Ok(failures.is_empty())
}

fn write_status(out: &mut dyn WriteColor, ok: bool) -> io::Result<()> {
    let (text, color) = if ok {
        ("PASS", Color::Green)
    } else {
        ("FAIL", Color::Red)
    };
    out.set_color(ColorSpec::new().set_fg(Some(color)))?;
    write!(out, "{}", text)?;
    out.reset()
}
