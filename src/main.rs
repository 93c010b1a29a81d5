use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use tracing_subscriber::EnvFilter;

use oak::cli::{self, DEFAULT_RUNTIME, USAGE};
use oak::{Options, UsageError, lsp};

fn main() -> ExitCode {
    init_logging();

    let home = std::env::var_os("HOME").map(PathBuf::from);
    let options = match Options::parse(std::env::args().skip(1), home.as_deref()) {
        Ok(options) => options,
        Err(UsageError::Help) => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("error: {err}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    match run(&options) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("OAK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(options: &Options) -> anyhow::Result<ExitCode> {
    if options.lsp {
        let cache = options.cache.clone();
        match options.tcp {
            Some(port) => lsp::serve_tcp(port, cache)?,
            None => lsp::serve_stdio(cache)?,
        }
        return Ok(ExitCode::SUCCESS);
    }

    let base = std::env::current_dir().context("cannot determine the working directory")?;
    let build = cli::build(options, &base)?;
    for diagnostic in &build.compilation.diagnostics {
        eprintln!("{}", diagnostic.display_with_source());
    }
    if !build.compilation.is_success() {
        let errors = build.compilation.diagnostics.iter().filter(|d| d.is_error()).count();
        eprintln!("compilation failed with {errors} error(s)");
        return Ok(ExitCode::FAILURE);
    }

    cli::write_binary(&build.compilation, &options.out)
        .with_context(|| format!("cannot write {}", options.out.display()))?;
    if !options.run {
        return Ok(ExitCode::SUCCESS);
    }

    let runtime = std::env::var("OAK_RUNTIME").unwrap_or_else(|_| DEFAULT_RUNTIME.to_string());
    let status = cli::run_binary(&runtime, Path::new(&options.out), build.main.as_deref())?;
    match status.code() {
        Some(0) => Ok(ExitCode::SUCCESS),
        Some(code) => Ok(ExitCode::from(code.clamp(1, 255) as u8)),
        None => bail!("{runtime} was terminated by a signal"),
    }
}
