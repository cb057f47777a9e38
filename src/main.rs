use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::Parser as ClapParser;
use clap::Subcommand;

use walkdir::WalkDir;

use clou::ast_printer::Ast;
use clou::error::{ClouError, Result};
use clou::interpreter::Clou;
use clou::parser::Parser;
use clou::scanner::Scanner;
use clou::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes the provided input from a given valid filepath
    Tokenize { filename: PathBuf },

    /// Parses the provided input and prints the AST
    Parse { filename: PathBuf },

    /// Runs a script, resolving `require` against the script's directory
    Run { filename: PathBuf },

    /// Starts an interactive prompt
    Repl,
}

fn main() -> anyhow::Result<()> {
    let args: Cli = Cli::parse();

    match args.commands {
        Commands::Tokenize { filename } => {
            let source: String = fs::read_to_string(&filename)?;

            let mut tokenized = true;

            for token in Scanner::new(&source) {
                match token {
                    Ok(token) => println!("{}", token),

                    Err(e) => {
                        tokenized = false;
                        eprintln!("{}", e);
                    }
                }
            }

            if !tokenized {
                std::process::exit(65);
            }
        }

        Commands::Parse { filename } => {
            let source: String = fs::read_to_string(&filename)?;

            match parse_source(&source) {
                Ok(rendered) => println!("{}", rendered),

                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(65);
                }
            }
        }

        Commands::Run { filename } => {
            run_script(&filename)?;
        }

        Commands::Repl => {
            repl()?;
        }
    }

    Ok(())
}

fn parse_source(source: &str) -> Result<String> {
    let tokens: Vec<Token> = Scanner::new(source).collect::<Result<Vec<Token>>>()?;
    let program = Parser::new(tokens).parse()?;

    Ok(Ast.print_program(&program))
}

/// Preload every `.clou` file under the script's directory into the module
/// store, then run the script.  `require` never touches the disk itself.
fn run_script(filename: &Path) -> anyhow::Result<()> {
    let base_dir: PathBuf = filename
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut clou = Clou::new();

    for entry in WalkDir::new(&base_dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();

        if path.extension().is_some_and(|ext| ext == "clou") {
            let key: String = path
                .strip_prefix(&base_dir)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");

            clou.modules().add_file(key, fs::read_to_string(path)?);
        }
    }

    let script: String = filename
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Err(e) = clou.run_file(&script) {
        eprintln!("{}", e);
        std::process::exit(exit_code(&e));
    }

    Ok(())
}

fn repl() -> anyhow::Result<()> {
    let mut clou = Clou::new();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();

        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        if let Err(e) = clou.run_prompt(trimmed) {
            eprintln!("{}", e);
        }
    }

    Ok(())
}

fn exit_code(error: &ClouError) -> i32 {
    match error {
        ClouError::Lex { .. } | ClouError::Parse { .. } => 65,

        _ => 70,
    }
}
