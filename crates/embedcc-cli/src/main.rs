use anyhow::Result;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use embedcc_runtime::OutputType;
use env_logger::Env;
use std::io;
use std::path::PathBuf;

mod commands;
mod config;

use config::CompileFlags;

/// Compile and run C code through libtcc.
///
/// embedcc loads the Tiny C Compiler library at run time and drives it
/// in-process: C files can be run straight from memory, checked, or built
/// into executables, shared libraries and object files.
///
/// EXAMPLES:
///     embedcc run hello.c                 Compile in memory and run main
///     embedcc run tool.c -- --verbose     Pass arguments to main
///     embedcc check lib.c -I include      Compile and link without running
///     embedcc build lib.c -o lib.so --output dll
///
/// ENVIRONMENT VARIABLES:
///     EMBEDCC_LIBRARY   Path to libtcc (file or directory)
///     EMBEDCC_LIB_PATH  Directory with libtcc runtime files
///     EMBEDCC_OPTIONS   Default compiler option string
///     EMBEDCC_OUTPUT    Default output type for build
///     RUST_LOG          Log filter (overrides -v)
#[derive(Parser)]
#[command(name = "embedcc")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the libtcc shared library, or a directory containing it
    #[arg(long, global = true, env = "EMBEDCC_LIBRARY", value_name = "PATH")]
    library: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a C file in memory and run its main function
    ///
    /// The process exits with the value returned by main.
    ///
    /// EXAMPLES:
    ///     embedcc run main.c
    ///     embedcc run main.c -DDEBUG -lm
    ///     embedcc run main.c -- first second
    #[command(visible_alias = "r")]
    Run {
        /// Path to the C source file
        file: PathBuf,
        #[command(flatten)]
        flags: CompileFlags,
        /// Arguments passed to main
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Compile and link a C file in memory without running it
    ///
    /// EXAMPLES:
    ///     embedcc check main.c
    ///     embedcc check main.c -I include -DNDEBUG
    #[command(visible_alias = "c")]
    Check {
        /// Path to the C source file
        file: PathBuf,
        #[command(flatten)]
        flags: CompileFlags,
    },

    /// Build a C file into an executable, shared library or object file
    ///
    /// EXAMPLES:
    ///     embedcc build main.c -o main
    ///     embedcc build plugin.c -o plugin.so --output dll
    ///     embedcc build unit.c -o unit.o --output obj
    #[command(visible_alias = "b")]
    Build {
        /// Path to the C source file
        file: PathBuf,
        /// File to write
        #[arg(short = 'o', long = "out", value_name = "FILE")]
        out: PathBuf,
        /// Output type: exe, dll, obj or preprocess (default exe)
        #[arg(long, value_name = "TYPE")]
        output: Option<OutputType>,
        #[command(flatten)]
        flags: CompileFlags,
    },

    /// Generate shell completions
    ///
    /// EXAMPLES:
    ///     embedcc completions bash > ~/.bash_completions/embedcc.bash
    ///     embedcc completions zsh > ~/.zfunc/_embedcc
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Run { file, flags, args } => {
            let settings = config::resolve(&flags, cli.library, Some(OutputType::Memory), &cwd)?;
            let code = commands::run::run(commands::run::RunArgs {
                file,
                args,
                settings,
            })?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Check { file, flags } => {
            let settings = config::resolve(&flags, cli.library, Some(OutputType::Memory), &cwd)?;
            commands::check::run(&file, &settings)?;
        }
        Commands::Build {
            file,
            out,
            output,
            flags,
        } => {
            let settings = config::resolve(&flags, cli.library, output, &cwd)?;
            commands::build::run(commands::build::BuildArgs {
                file,
                out,
                settings,
            })?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }

    Ok(())
}
