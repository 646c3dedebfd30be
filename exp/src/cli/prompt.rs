//! Interactive confirmation prompts on stderr/stdin.

use std::io::{self, BufRead, IsTerminal, Write};

/// Whether a human can answer prompts.
pub fn is_interactive() -> bool {
    io::stdin().is_terminal()
}

/// Ask a yes/no question; anything but `y`/`yes` is no.
pub fn confirm(question: &str) -> io::Result<bool> {
    confirm_with(&mut io::stdin().lock(), &mut io::stderr(), question)
}

/// Ask for a line of text.
pub fn ask(question: &str) -> io::Result<String> {
    ask_with(&mut io::stdin().lock(), &mut io::stderr(), question)
}

fn confirm_with<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool> {
    let answer = ask_with(input, output, &format!("{question} [y/N]"))?;
    Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn ask_with<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<String> {
    write!(output, "{question} ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}
