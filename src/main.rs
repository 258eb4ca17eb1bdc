use clap::{Parser, Subcommand};
use ez_lang::config::{self, DiagnosticFormat};
use ez_lang::error::InterpreterError;
use ez_lang::eval::Interpreter;
use ez_lang::repl;
use std::path::PathBuf;
use std::process::ExitCode;

/// Interpreter for the EZ language
#[derive(Parser, Debug)]
#[command(name = "ez")]
#[command(version = config::VERSION)]
#[command(about = "Interpreter for the EZ language")]
#[command(args_conflicts_with_subcommands = true)]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Command>,

    /// Source file to evaluate (omit to start the REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Maximum call depth before E5018
    #[arg(long = "max-recursion", value_name = "N", default_value_t = config::DEFAULT_MAX_RECURSION)]
    max_recursion: usize,

    /// Diagnostic rendering style
    #[arg(long = "diagnostics", value_enum, default_value = "human")]
    diagnostics: DiagnosticFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the interactive REPL
    Repl,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = CliArgs::parse();

    let result = match (&args.command, &args.script) {
        (Some(Command::Repl), _) | (None, None) => run_repl(&args),
        (None, Some(path)) => return run_file(path, &args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(2)
        }
    }
}

fn run_repl(args: &CliArgs) -> Result<(), InterpreterError> {
    let mut interp = Interpreter::new();
    interp.set_max_recursion(args.max_recursion);
    repl::run(&mut interp, args.diagnostics)
}

/// Exit code 0 on clean evaluation, 1 on any error diagnostic, 2 when the
/// interpreter itself cannot run.
fn run_file(path: &PathBuf, args: &CliArgs) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            let err = InterpreterError::ReadSource {
                path: path.display().to_string(),
                source: e,
            };
            eprintln!("{}", err);
            return ExitCode::from(2);
        }
    };

    let root = path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut interp = Interpreter::with_root(root);
    interp.set_max_recursion(args.max_recursion);
    interp.set_current_file(Some(path.canonicalize().unwrap_or_else(|_| path.clone())));

    let file_name = path.display().to_string();
    let result = interp.eval_source(&source);

    // Warnings never affect the exit code
    for warning in interp.take_warnings() {
        let warning = if warning.file.is_empty() {
            warning.with_file(file_name.clone())
        } else {
            warning
        };
        render(&warning, args);
    }

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(diags) => {
            for diag in diags {
                let diag = if diag.file.is_empty() {
                    diag.with_file(file_name.clone())
                } else {
                    diag
                };
                render(&diag, args);
            }
            ExitCode::FAILURE
        }
    }
}

fn render(diag: &ez_lang::diagnostics::Diagnostic, args: &CliArgs) {
    match args.diagnostics {
        DiagnosticFormat::Human => eprint!("{}", diag.render()),
        DiagnosticFormat::Json => eprintln!("{}", diag.render_json()),
    }
}
