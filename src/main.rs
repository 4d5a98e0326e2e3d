//! CLI tool to check and pretty-print refactoring scripts.

use std::fs;
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        eprintln!("Usage: refactor-script <command> [files...]");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  check  Check if script(s) parse");
        eprintln!("  print  Parse script(s) and print the normalized form");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  refactor-script check AddNullCheck.script");
        eprintln!("  refactor-script print AddNullCheck.script");
        return ExitCode::from(2);
    }

    let command = args[1].as_str();
    let files = &args[2..];

    if files.is_empty() {
        eprintln!("Error: no files specified");
        return ExitCode::from(2);
    }

    let mut had_error = false;

    for path in files {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{path}: {e}");
                had_error = true;
                continue;
            }
        };

        match command {
            "check" => match refactor_script::parse(&content) {
                Ok(script) => {
                    let methods = script.methods.len();
                    eprintln!("{path}: valid ({methods} method(s))");
                }
                Err(e) => {
                    eprintln!("{path}: {e}");
                    had_error = true;
                }
            },
            "print" => match refactor_script::parse(&content) {
                Ok(script) => {
                    print!("{script}");
                }
                Err(e) => {
                    eprintln!("{path}: {e}");
                    had_error = true;
                }
            },
            _ => {
                eprintln!("Unknown command: {command}");
                return ExitCode::from(2);
            }
        }
    }

    if had_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
