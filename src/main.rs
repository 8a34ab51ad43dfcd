use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use typthon::ast_printer::AstPrinter;
use typthon::interpreter::{Interpreter, InterpreterOptions};
use typthon::lexer::Lexer;
use typthon::parser::Parser;
use typthon::resolver::Resolver;

#[derive(ClapParser, Debug)]
#[command(version, about = "Typthon scripting language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,

    /// Emit tokens or the AST as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Maximum nested call depth before RecursionError
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Skip runtime checks of type annotations
    #[arg(long, global = true)]
    no_type_checks: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize { filename: Option<PathBuf> },

    /// Parses input from a file and prints its AST
    Parse { filename: Option<PathBuf> },

    /// Runs input from a file as a Typthon program
    Run { filename: Option<PathBuf> },
}

/// Reads the contents of a file into a String
fn read_file(filename: PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(&filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    String::from_utf8(buf).context(format!("File {:?} is not valid UTF-8", filename))
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            // Strip 'typthon::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("typthon::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn options(args: &Cli) -> InterpreterOptions {
    let mut options = InterpreterOptions::default();

    if let Some(depth) = args.max_depth {
        options.max_call_depth = depth;
    }
    options.check_types = !args.no_type_checks;

    options
}

fn no_input(command: &str) -> ! {
    info!("No filepath provided for {}", command);
    println!("No input filepath was provided. Exiting...");
    std::process::exit(0);
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match &args.commands {
        Commands::Tokenize { filename } => {
            let Some(filename) = filename.clone() else {
                no_input("Tokenize")
            };

            info!("Running Tokenize subcommand");
            let source = read_file(filename)?;
            let mut tokens = Vec::new();
            let mut tokenized = true;

            for token in Lexer::new(&source) {
                match token {
                    Ok(token) => {
                        debug!("Scanned token: {}", token);

                        if !args.json {
                            println!("{}", token);
                        }
                        tokens.push(token);
                    }

                    Err(e) => {
                        tokenized = false;
                        debug!("Tokenization debug: {}", e);
                        eprintln!("{}", e);
                        break;
                    }
                }
            }

            if args.json {
                println!("{}", serde_json::to_string_pretty(&tokens)?);
            }

            if !tokenized {
                debug!("Tokenization failed, exiting with code 65");
                std::process::exit(65);
            }

            info!("Tokenization completed successfully");
        }

        Commands::Parse { filename } => {
            let Some(filename) = filename.clone() else {
                no_input("Parse")
            };

            info!("Running Parse subcommand");
            let source = read_file(filename)?;

            let parsed = Parser::new(&source)
                .parse()
                .and_then(|statements| Resolver::new().resolve(&statements).map(|_| statements));

            match parsed {
                Ok(statements) => {
                    info!("Program parsed successfully");

                    if args.json {
                        println!("{}", serde_json::to_string_pretty(&statements)?);
                    } else {
                        println!("{}", AstPrinter::print_program(&statements));
                    }
                }

                Err(e) => {
                    debug!("Parse debug: {}", e);
                    eprintln!("{}", e);
                    std::process::exit(65);
                }
            }

            info!("Parse subcommand completed");
        }

        Commands::Run { filename } => {
            let Some(filename) = filename.clone() else {
                no_input("Run")
            };

            info!("Running Run subcommand");
            let source = read_file(filename)?;
            info!("Provided input:\n {}", source);

            let mut interpreter = Interpreter::with_options(source, options(&args));

            match interpreter.run() {
                Ok(()) => info!("Program executed successfully"),

                Err(e) if e.is_structural() => {
                    debug!("Static debug: {}", e);
                    eprintln!("{}", e);
                    std::process::exit(65);
                }

                Err(e) => {
                    debug!("Runtime debug: {}", e);
                    eprintln!("{}", e);
                    std::process::exit(70);
                }
            }
        }
    }

    Ok(())
}
