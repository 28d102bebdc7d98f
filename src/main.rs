/*!
 * Steadfast CLI - Command Line Interface
 */

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{error, info};

use steadfast::{
    backend::{FaultPlan, FaultyObject, HashKind, LocalStore, OpenOption, RangeSpec, RemoteObject},
    config::SteadfastConfig,
    core::HardObject,
    error::{ErrorCategory, SteadfastError, EXIT_FATAL, EXIT_SUCCESS},
    logging, RetryPolicy,
};

#[derive(Parser)]
#[command(name = "steadfast")]
#[command(version, about = "Read objects from unreliable stores, reconnecting mid-stream", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Root directory of the object store (overrides the config file)
    #[arg(short = 'r', long = "remote", value_name = "DIR", global = true)]
    remote: Option<String>,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Scripted faults per open, e.g. "reject-open,drop-after:4096,then:healthy"
    #[arg(long = "inject-faults", value_name = "SPEC", global = true)]
    inject_faults: Option<FaultPlan>,

    /// Retry forever without backoff, ignoring the configured policy
    #[arg(long, global = true)]
    legacy_retry: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream an object (or part of it) to stdout or a file
    Cat(CatArgs),

    /// Show object size, metadata and optionally a checksum
    Stat(StatArgs),
}

#[derive(Args)]
struct CatArgs {
    /// Object path relative to the store root
    object: String,

    /// Start reading at this byte
    #[arg(long, default_value_t = 0)]
    offset: u64,

    /// Read at most this many bytes
    #[arg(long, conflicts_with = "range")]
    count: Option<u64>,

    /// Inclusive byte range: "a-b", "a-" or "-n"
    #[arg(long, value_name = "RANGE", conflicts_with = "offset")]
    range: Option<RangeSpec>,

    /// Extra header sent with every open, as KEY=VALUE
    #[arg(long = "header", value_name = "KEY=VALUE", value_parser = parse_header)]
    headers: Vec<OpenOption>,

    /// Write to this file instead of stdout
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct StatArgs {
    /// Object path relative to the store root
    object: String,

    /// Also compute a checksum (sha256 or blake3)
    #[arg(long, value_name = "ALGO")]
    hash: Option<HashKind>,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

fn parse_header(s: &str) -> Result<OpenOption, String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.trim().is_empty() {
        return Err("header name must not be empty".to_string());
    }
    Ok(OpenOption::header(key.trim(), value))
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let (code, category) = classify(&e);
            error!(category = %category, exit_code = code, "{:#}", e);
            eprintln!("Error [{}]: {:#}", category, e);
            code
        }
    };
    std::process::exit(code);
}

/// Exit code and category for a failed run
fn classify(err: &anyhow::Error) -> (i32, ErrorCategory) {
    match err.downcast_ref::<SteadfastError>() {
        Some(err) => (err.exit_code(), err.category()),
        None => (EXIT_FATAL, ErrorCategory::Unknown),
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => SteadfastConfig::from_file(path).map_err(SteadfastError::from)?,
        None => SteadfastConfig::default(),
    };
    if let Some(ref remote) = cli.remote {
        config.remote = remote.clone();
        config.validate().map_err(SteadfastError::from)?;
    }

    logging::init_logging(&config.logging, cli.verbose).map_err(SteadfastError::from)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        match cli.command {
            Commands::Cat(ref args) => cat(&cli, &config, args).await,
            Commands::Stat(ref args) => stat(&cli, &config, args).await,
        }
    })
}

async fn lookup(cli: &Cli, config: &SteadfastConfig, remote: &str) -> anyhow::Result<HardObject> {
    let store = LocalStore::new(&config.remote);
    let local = store
        .object(remote)
        .await
        .map_err(SteadfastError::from)
        .with_context(|| format!("failed to look up {}", remote))?;

    let object: Arc<dyn RemoteObject> = match cli.inject_faults {
        Some(ref plan) => {
            info!(plan = ?plan, "fault injection enabled");
            Arc::new(FaultyObject::new(Arc::new(local), plan.clone()))
        }
        None => Arc::new(local),
    };

    let policy = if cli.legacy_retry {
        RetryPolicy::legacy_unbounded()
    } else {
        config.retry_policy()
    };

    Ok(HardObject::new(object).with_policy(policy))
}

fn cat_options(args: &CatArgs) -> Option<Vec<OpenOption>> {
    let mut options = args.headers.clone();
    match (args.range, args.count) {
        (Some(range), _) => options.push(OpenOption::Range(range)),
        (None, Some(0)) => return None,
        (None, Some(count)) => options.push(OpenOption::Range(RangeSpec::new(
            args.offset,
            args.offset.saturating_add(count - 1),
        ))),
        (None, None) if args.offset > 0 => options.push(OpenOption::Seek {
            offset: args.offset,
        }),
        (None, None) => {}
    }
    Some(options)
}

async fn cat(cli: &Cli, config: &SteadfastConfig, args: &CatArgs) -> anyhow::Result<()> {
    let object = lookup(cli, config, &args.object).await?;

    let mut writer: Box<dyn AsyncWrite + Unpin + Send> = match args.out {
        Some(ref path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    let Some(options) = cat_options(args) else {
        writer.flush().await?;
        return Ok(());
    };

    let mut reader = object.open(&options);
    let mut buffer = vec![0u8; config.reader.buffer_size];
    let mut copied = 0u64;

    loop {
        let n = reader
            .read(&mut buffer)
            .await
            .map_err(SteadfastError::from)
            .with_context(|| format!("reading {} at offset {}", object, reader.offset()))?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&buffer[..n])
            .await
            .map_err(SteadfastError::from)?;
        copied += n as u64;
    }
    writer.flush().await.map_err(SteadfastError::from)?;

    let stats = reader.stats();
    reader.close().await.map_err(SteadfastError::from)?;

    info!(
        remote = %object.remote(),
        bytes = copied,
        opens = stats.opens,
        failed_opens = stats.failed_opens,
        discarded_streams = stats.discarded_streams,
        recovered_reads = stats.recovered_reads,
        "cat complete"
    );
    Ok(())
}

async fn stat(cli: &Cli, config: &SteadfastConfig, args: &StatArgs) -> anyhow::Result<()> {
    let object = lookup(cli, config, &args.object).await?;

    let metadata = object
        .metadata()
        .await
        .map_err(SteadfastError::from)?
        .unwrap_or_default();
    let hash = match args.hash {
        Some(kind) => object
            .hash(kind)
            .await
            .map_err(SteadfastError::from)?
            .map(|digest| (kind, digest)),
        None => None,
    };

    if args.json {
        let mut value = serde_json::json!({
            "remote": object.remote(),
            "size": object.size(),
            "backend": object.unwrap().backend_name(),
            "mime_type": object.mime_type(),
            "metadata": metadata,
        });
        if let Some((kind, digest)) = hash {
            value[kind.to_string()] = serde_json::Value::String(digest);
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", object);
    println!("  size:    {}", object.size());
    println!("  backend: {}", object.unwrap().backend_name());
    if let Some(mime_type) = object.mime_type() {
        println!("  mime:    {}", mime_type);
    }
    let mut keys: Vec<_> = metadata.keys().collect();
    keys.sort();
    for key in keys {
        println!("  {}: {}", key, metadata[key]);
    }
    if let Some((kind, digest)) = hash {
        println!("  {}: {}", kind, digest);
    }
    Ok(())
}
