//! Expressive Compiler CLI
//!
//! Usage: expressc <input.exp> [-o output] [-f format] [-v...]

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser as ClapParser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use expressive::ast::Program;
use expressive::codegen::generate;
use expressive::lexer::tokenize;
use expressive::Diagnostics;

#[derive(ClapParser)]
#[command(name = "expressc")]
#[command(version = "0.1.0")]
#[command(about = "Expressive compiler targeting LLVM IR", long_about = None)]
struct Cli {
    /// Input Expressive source file
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "ir")]
    format: OutputFormat,

    /// Log more (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    /// LLVM IR text
    Ir,
    /// Annotated AST dump (for debugging)
    Ast,
    /// Token stream (for debugging)
    Tokens,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.input.extension().and_then(|ext| ext.to_str()) != Some("exp") {
        warn!(input = %cli.input.display(), "input does not have the .exp extension");
    }

    // Read input
    let source = fs::read_to_string(&cli.input)?;
    let filename = cli.input.display().to_string();
    debug!(bytes = source.len(), "read {}", filename);

    let output = match cli.format {
        OutputFormat::Tokens => {
            let tokens = tokenize(&source)?;
            tokens
                .iter()
                .map(|t| format!("{}..{} {:?}\n", t.span.start, t.span.end, t.token))
                .collect::<String>()
        }
        OutputFormat::Ast => {
            let (program, _) = checked(&source, &filename)?;
            format!("{:#?}\n", program)
        }
        OutputFormat::Ir => {
            let (program, diagnostics) = checked(&source, &filename)?;
            generate(&program, &diagnostics)?
        }
    };

    write_output(cli.output.as_deref(), &output)
}

/// Parse and analyse, printing every diagnostic before giving up
fn checked(
    source: &str,
    filename: &str,
) -> Result<(Program, Diagnostics), Box<dyn std::error::Error>> {
    expressive::check(source).map_err(|diagnostics| {
        eprint!("{}", diagnostics.render(filename, source));
        format!("{} error(s) in {}", diagnostics.error_count(), filename).into()
    })
}

fn write_output(path: Option<&Path>, output: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = path {
        fs::write(path, output)?;
        eprintln!("Wrote {}", path.display());
    } else {
        print!("{}", output);
    }
    Ok(())
}
