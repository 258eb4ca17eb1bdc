// ABOUTME: Host-side failures where the interpreter itself cannot run
// These are distinct from diagnostics produced *by* the interpreter for
// user code.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InterpreterError {
    #[error("cannot read `{path}`: {source}")]
    ReadSource {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("readline failed: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),

    #[error("internal failure: {0}")]
    Internal(String),
}
