//! Terminal prompting on stdin/stderr.

use std::io::{self, BufRead, Write};

use crate::application::credentials::Prompt;

/// Reads answers line by line from stdin, writing labels to stderr so that
/// stdout stays clean.  Secret answers are read with echo turned off.
#[derive(Debug, Default)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, label: &str, secret: bool) -> io::Result<String> {
        {
            let mut stderr = io::stderr().lock();
            write!(stderr, "{label}: ")?;
            stderr.flush()?;
        }
        if secret {
            return rpassword::read_password();
        }
        read_answer(&mut io::stdin().lock())
    }
}

/// Blocks until the operator presses Enter.
pub fn wait_for_enter() -> io::Result<()> {
    let mut stderr = io::stderr().lock();
    writeln!(stderr, "Press enter to exit.")?;
    stderr.flush()?;
    read_answer(&mut io::stdin().lock()).map(|_| ())
}

fn read_answer(input: &mut impl BufRead) -> io::Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}
