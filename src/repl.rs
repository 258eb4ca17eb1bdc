// ABOUTME: Interactive REPL over rustyline
// The helper keeps multi-line input open until braces, brackets, and
// parentheses balance, so blocks can be typed naturally.

use crate::config::{DiagnosticFormat, WELCOME_FOOTER, WELCOME_MESSAGE, VERSION};
use crate::error::InterpreterError;
use crate::eval::Interpreter;
use crate::registry;
use crate::value::Value;
use rustyline::error::ReadlineError;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config, Editor};
use rustyline_derive::{Completer, Helper, Highlighter, Hinter};

const HISTORY_FILE: &str = ".ez_history";

#[derive(Completer, Helper, Highlighter, Hinter)]
pub struct EzHelper;

impl Validator for EzHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        if delimiters_balanced(ctx.input()) {
            Ok(ValidationResult::Valid(None))
        } else {
            Ok(ValidationResult::Incomplete)
        }
    }
}

/// Count delimiters outside strings, chars, and comments.
fn delimiters_balanced(input: &str) -> bool {
    let mut depth: i64 = 0;
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '(' | '{' | '[' => depth += 1,
            ')' | '}' | ']' => depth -= 1,
            '"' => {
                while let Some(sc) = chars.next() {
                    match sc {
                        '\\' => {
                            chars.next();
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '\'' => {
                while let Some(cc) = chars.next() {
                    match cc {
                        '\\' => {
                            chars.next();
                        }
                        '\'' => break,
                        _ => {}
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for lc in chars.by_ref() {
                    if lc == '\n' {
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    depth <= 0
}

pub fn run(interp: &mut Interpreter, format: DiagnosticFormat) -> Result<(), InterpreterError> {
    let config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<EzHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(EzHelper));
    let _ = rl.load_history(HISTORY_FILE);

    println!("{} v{}", WELCOME_MESSAGE, VERSION);
    println!("{}", WELCOME_FOOTER);

    loop {
        match rl.readline("ez> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match trimmed {
                    ":quit" | ":exit" => break,
                    ":clear" => {
                        print!("\x1B[2J\x1B[H");
                        continue;
                    }
                    ":help" => {
                        println!(":builtins  list standard-library functions");
                        println!(":clear     clear the screen");
                        println!(":quit      exit");
                        continue;
                    }
                    ":builtins" => {
                        for (name, summary) in registry::summaries() {
                            println!("  {:24} {}", name, summary);
                        }
                        continue;
                    }
                    _ => {}
                }

                match interp.eval_source(&line) {
                    Ok(Value::Nil) => {}
                    Ok(value) => println!("=> {}", value),
                    Err(diags) => {
                        for diag in diags {
                            match format {
                                DiagnosticFormat::Human => eprint!("{}", diag.render()),
                                DiagnosticFormat::Json => eprintln!("{}", diag.render_json()),
                            }
                        }
                    }
                }
                for warning in interp.take_warnings() {
                    match format {
                        DiagnosticFormat::Human => eprint!("{}", warning.render()),
                        DiagnosticFormat::Json => eprintln!("{}", warning.render_json()),
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }

    let _ = rl.save_history(HISTORY_FILE);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_tracking() {
        assert!(delimiters_balanced("temp x int = 1"));
        assert!(!delimiters_balanced("do f() {"));
        assert!(delimiters_balanced("do f() { return 1 }"));
        // Delimiters inside strings and comments do not count
        assert!(delimiters_balanced(r#"temp s = "{[(""#));
        assert!(delimiters_balanced("temp x = 1 // {"));
        assert!(delimiters_balanced("temp c = '{'"));
    }
}
