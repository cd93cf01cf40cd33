//! tokentrim binary: find an interpreter, install the compressor, compress text.
//!
//! Subcommands: `detect`, `install`, `compress`, `status`.

mod log_format;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use cli::{exit, render_result, resolve_asset_dir, write_json, StatusReport, TerminalConsent};
use tokentrim::settings::is_valid_rate;
use tokentrim::{
    Bridge, BridgeSettings, CompressionError, DependencyInstaller, InstallConsent, OptimizeError,
    OptimizeOptions, RuntimeLocator, StaticConsent, TokioProcessRunner,
};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

const APP_NAME: &str = "tokentrim";

#[derive(Parser, Debug)]
#[command(name = "tokentrim", version)]
#[command(about = "TokenTrim: shrink prompts with an external LLMLingua compression job")]
struct Args {
    #[command(subcommand)]
    cmd: Command,

    /// Directory holding compress.py and requirements.txt
    /// (default: TOKENTRIM_ASSET_DIR, then <exe dir>/python, then ./python)
    #[arg(long, global = true, value_name = "DIR")]
    assets: Option<PathBuf>,

    /// Print machine-readable JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// With --json, pretty-print
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find a compatible Python interpreter
    Detect,
    /// Make sure the compression package is installed, installing it if allowed
    Install(InstallArgs),
    /// Compress text from arguments, --file, or stdin
    Compress(CompressArgs),
    /// Show settings, config layers, and readiness without installing anything
    Status,
}

#[derive(clap::Args, Debug)]
struct InstallArgs {
    /// Install without asking
    #[arg(short = 'y', long)]
    yes: bool,
}

#[derive(clap::Args, Debug)]
struct CompressArgs {
    /// Fraction of tokens to keep, in (0, 1]
    #[arg(short, long, value_name = "RATE")]
    rate: Option<f64>,

    /// Model name passed to the compression script
    #[arg(short, long, value_name = "NAME")]
    model: Option<String>,

    /// Token that must survive compression (repeatable; replaces the defaults)
    #[arg(long = "force-token", value_name = "TOKEN")]
    force_tokens: Vec<String>,

    /// Read the text from this file
    #[arg(short, long, value_name = "PATH", conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Install the compression package without asking when it is missing
    #[arg(short = 'y', long)]
    yes: bool,

    /// Text to compress (default: stdin)
    #[arg(trailing_var_arg = true)]
    text: Vec<String>,
}

fn settings_for(args: &Args) -> BridgeSettings {
    let exe = std::env::current_exe().ok();
    let cwd = std::env::current_dir().ok();
    let asset_dir = resolve_asset_dir(
        args.assets.as_deref(),
        |key| std::env::var(key).ok(),
        exe.as_deref(),
        cwd.as_deref(),
    );
    BridgeSettings::from_env(asset_dir)
}

fn progress_to_stderr(message: &str) {
    eprintln!("{}", message);
}

/// Cancels the token on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted");
            trigger.cancel();
        }
    });
    token
}

async fn run_detect(args: &Args) -> Result<i32, Box<dyn std::error::Error>> {
    let settings = settings_for(args);
    let runner: Arc<TokioProcessRunner> = Arc::new(TokioProcessRunner::new());
    let locator = RuntimeLocator::from_settings(runner.clone(), &settings);
    let runtime = locator.detect().await;
    let installer = DependencyInstaller::from_settings(runner, &settings);
    let installed = match &runtime {
        Some(rt) => installer.is_installed(rt).await,
        None => false,
    };
    if args.json {
        write_json(
            std::io::stdout(),
            &serde_json::json!({ "runtime": runtime, "installed": installed }),
            args.pretty,
        )?;
    } else {
        match &runtime {
            Some(rt) => {
                println!("Found Python {} ({})", rt.version, rt.executable);
                let status = if installed { "installed" } else { "not installed" };
                println!("{} {}", installer.module(), status);
            }
            None => eprintln!(
                "Python not found: none of [{}] is Python {}",
                locator.candidates().join(", "),
                settings.required_version
            ),
        }
    }
    Ok(if runtime.is_some() { exit::OK } else { exit::FAILURE })
}

async fn run_install(args: &Args, install: &InstallArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut bridge = Bridge::new(settings_for(args));
    let consent: Box<dyn InstallConsent> = if install.yes {
        Box::new(StaticConsent(true))
    } else {
        Box::new(TerminalConsent)
    };
    let token = cancel_on_ctrl_c();
    let ready = tokio::select! {
        ready = bridge.initialize(consent.as_ref(), Some(&progress_to_stderr)) => ready,
        _ = token.cancelled() => return Ok(exit::CANCELLED),
    };
    if args.json {
        write_json(
            std::io::stdout(),
            &serde_json::json!({ "ready": ready, "state": bridge.state(), "runtime": bridge.runtime() }),
            args.pretty,
        )?;
    }
    Ok(if ready { exit::OK } else { exit::FAILURE })
}

async fn read_text(compress: &CompressArgs) -> std::io::Result<String> {
    if !compress.text.is_empty() {
        return Ok(compress.text.join(" "));
    }
    if let Some(path) = &compress.file {
        return tokio::fs::read_to_string(path).await;
    }
    let mut text = String::new();
    tokio::io::stdin().read_to_string(&mut text).await?;
    Ok(text)
}

async fn run_compress(
    args: &Args,
    compress: &CompressArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    if let Some(rate) = compress.rate.filter(|r| !is_valid_rate(*r)) {
        eprintln!("tokentrim: --rate must be in (0, 1], got {}", rate);
        return Ok(exit::USAGE);
    }
    let text = match read_text(compress).await {
        Ok(text) => text,
        Err(e) => {
            eprintln!("tokentrim: cannot read input: {}", e);
            return Ok(exit::USAGE);
        }
    };
    if text.trim().is_empty() {
        eprintln!("tokentrim: no text to compress");
        return Ok(exit::USAGE);
    }

    // Stdin already carried the text, so it cannot also answer a prompt.
    let reads_stdin = compress.text.is_empty() && compress.file.is_none();
    let consent: Box<dyn InstallConsent> = if compress.yes || reads_stdin {
        Box::new(StaticConsent(compress.yes))
    } else {
        Box::new(TerminalConsent)
    };

    let token = cancel_on_ctrl_c();
    let mut bridge = Bridge::new(settings_for(args));
    let ready = tokio::select! {
        ready = bridge.initialize(consent.as_ref(), Some(&progress_to_stderr)) => ready,
        _ = token.cancelled() => return Ok(exit::CANCELLED),
    };
    if !ready {
        eprintln!("tokentrim: compression bridge unavailable ({})", bridge.state());
        return Ok(exit::FAILURE);
    }

    let mut options = OptimizeOptions::default().cancel(token);
    options.compression_rate = compress.rate;
    options.model = compress.model.clone();
    if !compress.force_tokens.is_empty() {
        options = options.forced_tokens(compress.force_tokens.iter().cloned());
    }

    match bridge.optimize(&text, options).await {
        Ok(result) => {
            if args.json {
                write_json(std::io::stdout(), &result, args.pretty)?;
            } else {
                println!("{}", result.optimized);
                eprintln!("{}", render_result(&result));
            }
            Ok(exit::OK)
        }
        Err(OptimizeError::Compression(CompressionError::Cancelled)) => {
            eprintln!("tokentrim: cancelled");
            Ok(exit::CANCELLED)
        }
        Err(OptimizeError::Compression(e @ CompressionError::InvalidRate(_))) => {
            eprintln!("tokentrim: {}", e);
            Ok(exit::USAGE)
        }
        Err(e) => {
            eprintln!("tokentrim: {}", e);
            Ok(exit::FAILURE)
        }
    }
}

async fn run_status(
    args: &Args,
    applied: &config::Applied,
) -> Result<i32, Box<dyn std::error::Error>> {
    let mut bridge = Bridge::new(settings_for(args));
    bridge.initialize(&StaticConsent(false), None).await;
    let report = StatusReport::from_bridge(&bridge, config::config_path(APP_NAME), applied);
    if args.json {
        write_json(std::io::stdout(), &report, args.pretty)?;
    } else {
        print!("{}", report);
    }
    Ok(exit::OK)
}

#[tokio::main]
async fn main() {
    let loaded = config::load_and_apply(APP_NAME, None);
    let guard = match logging::init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("tokentrim: logging: {}", e);
            None
        }
    };
    let applied = loaded.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "configuration not loaded");
        eprintln!("tokentrim: ignoring configuration: {}", e);
        config::Applied::default()
    });

    let args = Args::parse();
    let outcome = match &args.cmd {
        Command::Detect => run_detect(&args).await,
        Command::Install(install) => run_install(&args, install).await,
        Command::Compress(compress) => run_compress(&args, compress).await,
        Command::Status => run_status(&args, &applied).await,
    };
    let code = outcome.unwrap_or_else(|e| {
        eprintln!("tokentrim: {}", e);
        exit::FAILURE
    });

    drop(guard);
    std::process::exit(code);
}
