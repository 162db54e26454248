//! HAR Linter CLI
//!
//! Validates an HTTP archive before it is replayed or transformed.
//!
//! Usage:
//!   harhar-lint <file> [OPTIONS]

use clap::Parser;
use harhar_lint::{lint_file, render_json, render_text, LintOptions};
use std::path::PathBuf;

/// HAR Linter
#[derive(Parser, Debug)]
#[command(name = "harhar-lint")]
#[command(author, version, about = "Validate HTTP archive (HAR) files")]
struct Args {
    /// Path to the archive file
    #[arg(required = true)]
    path: PathBuf,

    /// Request header every entry must carry (repeatable)
    #[arg(long = "require-request-header")]
    require_request_headers: Vec<String>,

    /// Response header every entry must carry (repeatable)
    #[arg(long = "require-response-header")]
    require_response_headers: Vec<String>,

    /// Output format: text (default), json
    #[arg(short, long, default_value = "text")]
    output: String,

    /// Only show errors (hide warnings and info)
    #[arg(short = 'e', long)]
    errors_only: bool,

    /// Strict mode - exit 1 when errors are found
    #[arg(short, long)]
    strict: bool,
}

fn main() {
    let args = Args::parse();
    let options = LintOptions {
        require_request_headers: args.require_request_headers.clone(),
        require_response_headers: args.require_response_headers.clone(),
    };

    let result = lint_file(&args.path, &options);

    if args.output == "json" {
        match render_json(&result) {
            Ok(output) => println!("{output}"),
            Err(e) => {
                eprintln!("Failed to render results: {e}");
                std::process::exit(2);
            }
        }
    } else {
        print!(
            "{}",
            render_text(&result, &args.path.display().to_string(), args.errors_only)
        );
    }

    std::process::exit(if args.strict && result.has_errors() { 1 } else { 0 });
}
