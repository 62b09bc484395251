mod prompt;
mod report;
mod test_runner;
mod values;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use interpreter::{DiagnosticError, Driver, DryRunDriver, RunReport};
use scenario::template::question_for;
use scenario::{Fills, Script};

use crate::prompt::PromptAsker;

#[derive(Parser)]
#[command(name = "scen", version, about = "Infrastructure scenario runner")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fill holes and execute a scenario against the dry-run backend
    Run(RunArgs),

    /// Parse only, exit 0 if valid
    Check { file: PathBuf },

    /// Echo the parsed statements in canonical form
    Ast {
        file: PathBuf,

        /// Dump the syntax tree with spans instead
        #[arg(long)]
        debug: bool,
    },

    /// List holes still waiting for a value
    Holes {
        file: PathBuf,

        /// TOML file of question key = value fills
        #[arg(long)]
        values: Option<PathBuf>,
    },

    /// Build a scenario interactively and run it
    Create {
        #[command(subcommand)]
        what: CreateCommand,
    },

    /// Run .test.scen fixture files
    Test(TestArgs),
}

#[derive(Subcommand)]
enum CreateCommand {
    /// Create instances
    #[command(visible_aliases = ["inst", "i"])]
    Instance,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Scenario file to execute
    file: PathBuf,

    /// TOML file of question key = value fills
    #[arg(long)]
    values: Option<PathBuf>,

    /// Fill a single hole: --set instance.count=2 (repeatable, wins over --values)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Prompt for holes left after --values and --set
    #[arg(short, long)]
    interactive: bool,

    /// Do not print the backend call trace
    #[arg(short, long)]
    quiet: bool,

    /// Print bindings as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.scen file or directory containing them
    path: PathBuf,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let color = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    match cli.command {
        Command::Run(args) => do_run(args, color),
        Command::Check { file } => {
            let mut files = SimpleFiles::new();
            load_script(&file, &mut files, color);
            eprintln!("ok: {} parsed successfully", file.display());
        }
        Command::Ast { file, debug } => {
            let mut files = SimpleFiles::new();
            let script = load_script(&file, &mut files, color);
            if debug {
                println!("{:#?}", script);
            } else {
                print!("{}", script);
            }
        }
        Command::Holes { file, values } => {
            let mut files = SimpleFiles::new();
            let mut script = load_script(&file, &mut files, color);
            if let Some(path) = values {
                script.resolve_template(&load_values(&path));
            }
            for hole in script.holes() {
                println!("{}  ({}?)", hole, question_for(&hole.key));
            }
        }
        Command::Create {
            what: CreateCommand::Instance,
        } => do_create_instance(color),
        Command::Test(args) => {
            if args.list_categories {
                test_runner::list_categories(&args.path);
                return;
            }
            let exit_code = test_runner::run_tests(&args.path, cli.no_color, &args.category);
            process::exit(exit_code);
        }
    }
}

/// Read and parse a scenario file, exiting with rendered diagnostics on failure.
fn load_script(path: &Path, files: &mut SimpleFiles<String, String>, color: ColorChoice) -> Script {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", path.display(), e);
            process::exit(1);
        }
    };
    parse_source(path.display().to_string(), source, files, color)
}

fn parse_source(
    name: String,
    source: String,
    files: &mut SimpleFiles<String, String>,
    color: ColorChoice,
) -> Script {
    let file_id = files.add(name, source.clone());
    match scenario::parser::Parser::new(source, file_id).parse() {
        Ok(script) => {
            debug!(statements = script.len(), "parsed scenario");
            script
        }
        Err(errors) => {
            let writer = StandardStream::stderr(color);
            let config = term::Config::default();
            for error in &errors {
                let _ = term::emit_to_write_style(
                    &mut writer.lock(),
                    &config,
                    &*files,
                    &error.to_diagnostic(),
                );
            }
            process::exit(1);
        }
    }
}

fn load_values(path: &Path) -> Fills {
    match values::load_fills(path) {
        Ok(fills) => fills,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

fn do_run(args: RunArgs, color: ColorChoice) {
    let mut files = SimpleFiles::new();
    let mut script = load_script(&args.file, &mut files, color);

    let mut fills = match &args.values {
        Some(path) => load_values(path),
        None => Fills::new(),
    };
    for raw in &args.set {
        match values::parse_set(raw) {
            Ok((key, value)) => {
                fills.insert(key, value);
            }
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(2);
            }
        }
    }
    let filled = script.resolve_template(&fills);
    debug!(filled, "static resolution");

    if args.interactive && !script.holes().is_empty() {
        let stdin = io::stdin();
        let mut asker = PromptAsker::new(stdin.lock(), io::stdout());
        if let Err(e) = script.interactive_resolve_template(&mut asker) {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }

    if let Err(unresolved) = script.ensure_resolved() {
        eprintln!("error: {}", unresolved);
        for hole in &unresolved.holes {
            eprintln!("  {}?  (--set {}=...)", question_for(&hole.key), hole.key);
        }
        process::exit(1);
    }

    let report = execute(&script, args.quiet);
    finish(&report, &files, color, args.json);
}

fn do_create_instance(color: ColorChoice) {
    let stdin = io::stdin();
    let mut asker = PromptAsker::new(stdin.lock(), io::stdout());
    let text = match prompt::build_instance_scenario(&mut asker) {
        Ok(Some(text)) => text,
        Ok(None) => return,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let mut files = SimpleFiles::new();
    let script = parse_source("<create instance>".into(), text, &mut files, color);
    let report = execute(&script, false);
    finish(&report, &files, color, false);
}

fn execute(script: &Script, quiet: bool) -> RunReport {
    let mut driver = DryRunDriver::new();
    if !quiet {
        driver.set_logger(Box::new(Prefixed::new("[dry-run] ", io::stdout())));
    }
    info!(statements = script.len(), "executing scenario");
    interpreter::execute_script(script, &driver)
}

/// Print bindings, or the failing statement plus everything that already
/// ran, and exit non-zero on abort.
fn finish(report: &RunReport, files: &SimpleFiles<String, String>, color: ColorChoice, json: bool) {
    if let Err(e) = report::write_bindings(&mut io::stdout().lock(), &report.symbols, json) {
        eprintln!("error: cannot print bindings: {}", e);
        process::exit(1);
    }

    let Some(error) = report.error() else {
        return;
    };

    let writer = StandardStream::stderr(color);
    emit_diagnostic_error(&writer, &term::Config::default(), files, error);
    let _ = report::write_executed(&mut io::stderr().lock(), &report.executed);
    process::exit(1);
}

fn emit_diagnostic_error(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    error: &DiagnosticError,
) {
    match &error.span {
        Some(span) => {
            let diagnostic = Diagnostic::new(Severity::Error)
                .with_message(error.to_string())
                .with_labels(vec![Label::primary(error.source_id, span.clone())]);
            let _ = term::emit_to_write_style(&mut writer.lock(), config, files, &diagnostic);
        }
        None => eprintln!("runtime error: {}", error),
    }
}

/// Line-prefixing writer for the driver call trace.
struct Prefixed<W> {
    prefix: &'static str,
    inner: W,
    at_line_start: bool,
}

impl<W: Write> Prefixed<W> {
    fn new(prefix: &'static str, inner: W) -> Self {
        Prefixed {
            prefix,
            inner,
            at_line_start: true,
        }
    }
}

impl<W: Write> Write for Prefixed<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for line in buf.split_inclusive(|&b| b == b'\n') {
            if self.at_line_start {
                self.inner.write_all(self.prefix.as_bytes())?;
            }
            self.inner.write_all(line)?;
            self.at_line_start = line.ends_with(b"\n");
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
