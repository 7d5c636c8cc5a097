//! Prompt and output styling. Plain stdin/stdout line reading — no
//! raw-mode input handling or history, just a styled prompt.

use std::io::{self, Write};

use crossterm::style::Stylize;

pub fn print_prompt() -> io::Result<()> {
    print!("{} ", "db >".bold());
    io::stdout().flush()
}

pub fn echo(line: impl AsRef<str>) {
    println!("{}", line.as_ref());
}
