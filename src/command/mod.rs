mod pipeline;

use std::fmt::Display;
use colored::{Colorize, ColoredString};

const PROGRAM: &'static str = env!("CARGO_PKG_NAME");

/// Print tool version and authors.
fn print_version() {
    println!("{} {}", PROGRAM.underline(), format!("v{}", env!("CARGO_PKG_VERSION")).green());
    let authors: Vec<_> = env!("CARGO_PKG_AUTHORS").split(':').filter(|s| !s.is_empty()).collect();
    let n = authors.len();
    if n == 0 {
        return;
    }
    print!("Created by ");
    for (i, author) in authors.iter().enumerate() {
        if i == 0 {
            print!("{}", author.bright_blue());
        } else if i < n - 1 {
            print!(", {}", author.bright_blue());
        } else {
            print!(" and {}", author.bright_blue());
        }
    }
    println!();
}

/// Formats default value for the help message.
fn fmt_def(val: impl Display) -> ColoredString {
    val.to_string().cyan()
}

/// Placeholder for arguments without values.
fn flag() -> ColoredString {
    "".normal()
}

/// Parses arguments and runs the pipeline.
/// Returns `Ok(false)` if the run finished, but some samples or QC jobs failed.
pub fn run(argv: &[String]) -> crate::Result<bool> {
    let args = argv.get(1..).unwrap_or(&[]);
    match args.first().map(String::as_str) {
        Some("help" | "h") => {
            pipeline::print_help();
            Ok(true)
        }
        Some("version") => {
            print_version();
            Ok(true)
        }
        _ => pipeline::run(args),
    }
}
