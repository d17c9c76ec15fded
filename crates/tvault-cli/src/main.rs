//! tvault: time-locked message vault CLI
//!
//! Commands:
//!   seal <file>         - encrypt, upload, and anchor a file for a recipient
//!   open <content-id>   - download, verify, and decrypt a sealed message
//!   hash <file>         - print the SHA-256 integrity digest of a file
//!   inspect <file>      - report whether a blob is standard or chunked
//!   status              - show storage backend reachability and contents
//!   config show         - display current configuration

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use tvault_core::config::{StorageBackend, TvaultConfig};
use tvault_core::types::{OwnershipProof, ProgressEvent, Stage};
use tvault_core::{IdentityProver, ValidationError, VaultError, VaultResult};
use tvault_crypto::BlobFormat;
use tvault_pipeline::{
    MessagePipeline, OpenCredential, PipelineError, PipelineOptions, ProgressSink, Recipient, SendRequest,
};
use tvault_storage::{OpendalAnchor, OpendalBlobStore, S3Credentials};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "tvault",
    version,
    about = "Time-locked message vault",
    long_about = "tvault: seal files into time-locked encrypted messages and open them after the unlock time"
)]
struct Cli {
    /// Path to tvault.toml configuration file
    #[arg(long, short = 'c', env = "TVAULT_CONFIG", default_value = "/etc/tvault/config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [logging] level
    #[arg(long, env = "TVAULT_LOG")]
    log: Option<String>,

    /// Log format; overrides [logging] format
    #[arg(long, env = "TVAULT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file, upload the ciphertext, and anchor the message record
    ///
    /// Prints the sealed message record and anchor receipt as JSON.
    Seal {
        /// File to seal
        file: PathBuf,
        /// Sender wallet address (0x + 40 hex digits)
        #[arg(long)]
        sender: String,
        /// Recipient wallet address
        #[arg(long, conflicts_with = "passphrase", required_unless_present = "passphrase")]
        recipient: Option<String>,
        /// Seal under a passphrase instead (claim-link flow); read from
        /// TVAULT_PASSPHRASE or prompted
        #[arg(long)]
        passphrase: bool,
        /// Unlock time, RFC 3339 (e.g. 2030-01-01T00:00:00Z)
        #[arg(long, conflicts_with = "unlock_in", required_unless_present = "unlock_in")]
        unlock_at: Option<String>,
        /// Unlock after this many seconds
        #[arg(long)]
        unlock_in: Option<u64>,
    },

    /// Open a sealed message and write the plaintext to a file
    Open {
        /// Content id printed by `tvault seal`
        content_id: String,
        /// Output file
        #[arg(long, short = 'o')]
        out: PathBuf,
        /// Open as this wallet address
        #[arg(long = "as", conflicts_with = "passphrase", required_unless_present = "passphrase")]
        address: Option<String>,
        /// Open with the claim-link passphrase
        #[arg(long)]
        passphrase: bool,
    },

    /// Print the SHA-256 integrity digest of a file
    Hash {
        file: PathBuf,
    },

    /// Report the ciphertext format of a blob file
    Inspect {
        file: PathBuf,
    },

    /// Show storage backend status
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = TvaultConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.logging.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.logging.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "tvault starting"
    );

    match cli.command {
        Commands::Seal {
            file,
            sender,
            recipient,
            passphrase,
            unlock_at,
            unlock_in,
        } => {
            let unlock_at = resolve_unlock_time(unlock_at.as_deref(), unlock_in)?;
            let recipient = match recipient {
                Some(address) if !passphrase => Recipient::Address(address),
                _ => Recipient::Passphrase(read_passphrase("Claim-link passphrase: ", true)?),
            };
            cmd_seal(&config, &file, sender, recipient, unlock_at).await
        }
        Commands::Open {
            content_id,
            out,
            address,
            passphrase,
        } => {
            let address = if passphrase { None } else { address };
            cmd_open(&config, &content_id, &out, address.as_deref()).await
        }
        Commands::Hash { file } => cmd_hash(&file).await,
        Commands::Inspect { file } => cmd_inspect(&file).await,
        Commands::Status => cmd_status(&config).await,
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr; stdout carries command output.
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Pipeline construction ─────────────────────────────────────────────────────

/// S3 credentials from AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY, if set.
fn credentials_from_env() -> Option<S3Credentials> {
    let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
    let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
    Some(S3Credentials {
        access_key_id,
        secret_access_key,
    })
}

fn build_storage(config: &TvaultConfig) -> Result<opendal::Operator> {
    let creds = match config.storage.backend {
        StorageBackend::S3 => credentials_from_env(),
        _ => None,
    };
    if config.storage.backend == StorageBackend::Memory {
        warn!("memory storage backend: sealed messages are lost when tvault exits");
    }

    tvault_storage::build_from_config(&config.storage, creds.as_ref()).context("building storage operator")
}

fn build_pipeline(config: &TvaultConfig, progress: ProgressSink) -> Result<MessagePipeline> {
    let op = build_storage(config)?;
    let prefix = config.storage.prefix.clone();

    Ok(MessagePipeline::new(
        Arc::new(OpendalBlobStore::new(op.clone(), prefix.clone())),
        Arc::new(OpendalAnchor::new(op, prefix)),
    )
    .with_options(PipelineOptions::from_config(config))
    .with_progress(progress))
}

/// Wallet stand-in: asserts ownership of the address typed on the command
/// line without a signature. Real deployments plug in a signing wallet.
struct DeclaredIdentity;

#[async_trait]
impl IdentityProver for DeclaredIdentity {
    async fn prove_ownership(&self, address: &str) -> VaultResult<OwnershipProof> {
        warn!(address, "using an unsigned, self-declared ownership proof");
        Ok(OwnershipProof {
            address: address.to_string(),
            signature: Vec::new(),
        })
    }
}

// ── Input helpers ─────────────────────────────────────────────────────────────

fn resolve_unlock_time(unlock_at: Option<&str>, unlock_in: Option<u64>) -> Result<DateTime<Utc>> {
    match (unlock_at, unlock_in) {
        (Some(at), _) => Ok(DateTime::parse_from_rfc3339(at)
            .with_context(|| format!("--unlock-at must be RFC 3339, got {at:?}"))?
            .with_timezone(&Utc)),
        (None, Some(secs)) => {
            let secs = i64::try_from(secs).context("--unlock-in is too large")?;
            let delta = chrono::Duration::try_seconds(secs).context("--unlock-in is too large")?;
            Utc::now()
                .checked_add_signed(delta)
                .context("--unlock-in is too large")
        }
        (None, None) => anyhow::bail!("one of --unlock-at or --unlock-in is required"),
    }
}

/// TVAULT_PASSPHRASE if set, otherwise an interactive prompt.
fn read_passphrase(prompt: &str, confirm: bool) -> Result<SecretString> {
    if let Ok(from_env) = std::env::var("TVAULT_PASSPHRASE") {
        return Ok(SecretString::from(from_env));
    }

    eprint!("{prompt}");
    std::io::stderr().flush()?;
    let passphrase = rpassword::read_password().context("reading passphrase")?;
    if passphrase.is_empty() {
        anyhow::bail!("passphrase cannot be empty");
    }

    if confirm {
        eprint!("Confirm passphrase: ");
        std::io::stderr().flush()?;
        let again = rpassword::read_password().context("reading passphrase")?;
        if again != passphrase {
            anyhow::bail!("passphrases do not match");
        }
    }
    Ok(SecretString::from(passphrase))
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(prefix: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn progress_sink(pb: &ProgressBar) -> ProgressSink {
    let pb = pb.clone();
    Arc::new(move |event: &ProgressEvent| {
        pb.set_position(u64::from(event.percent));
        pb.set_message(event.message.clone());
        if event.stage.is_terminal() {
            pb.disable_steady_tick();
        }
    })
}

/// The only place pipeline errors become user-facing text.
fn describe_failure(err: &PipelineError) -> String {
    let stage = err.stage.as_ref().map(Stage::as_str).unwrap_or("validation");
    let what = match err.kind() {
        VaultError::AuthenticationFailed(_) => "wrong key or passphrase (the ciphertext did not authenticate)".to_string(),
        VaultError::IntegrityMismatch { .. } => {
            "the stored ciphertext does not match its recorded digest; it is corrupted or was tampered with".to_string()
        }
        VaultError::Validation(ValidationError::StillLocked(until)) => {
            format!("this message is still locked; it opens at {until}")
        }
        VaultError::Validation(v) => format!("invalid request: {v}"),
        VaultError::Identity(msg) => format!("identity check failed: {msg}"),
        other => other.to_string(),
    };
    format!("{stage}: {what}")
}

// ── `tvault seal` ─────────────────────────────────────────────────────────────

async fn cmd_seal(
    config: &TvaultConfig,
    file: &Path,
    sender: String,
    recipient: Recipient,
    unlock_at: DateTime<Utc>,
) -> Result<()> {
    let media = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;

    let pb = make_progress_bar("seal")?;
    let pipeline = build_pipeline(config, progress_sink(&pb))?;

    let result = pipeline
        .seal(SendRequest {
            media,
            sender,
            recipient,
            unlock_at,
        })
        .await;

    match result {
        Ok(receipt) => {
            pb.finish_with_message("sealed");
            println!(
                "{}",
                serde_json::to_string_pretty(&receipt).context("serializing receipt")?
            );
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message("failed");
            anyhow::bail!("seal failed at {}", describe_failure(&e))
        }
    }
}

// ── `tvault open` ─────────────────────────────────────────────────────────────

async fn cmd_open(
    config: &TvaultConfig,
    content_id: &str,
    out: &Path,
    address: Option<&str>,
) -> Result<()> {
    let credential = match address {
        Some(_) => None,
        None => Some(read_passphrase("Passphrase: ", false)?),
    };

    let pb = make_progress_bar("open")?;
    let pipeline = build_pipeline(config, progress_sink(&pb))?;

    let identity = DeclaredIdentity;
    let credential = match (address, credential) {
        (Some(address), _) => OpenCredential::Identity(&identity, address),
        (None, Some(passphrase)) => OpenCredential::Passphrase(passphrase),
        (None, None) => anyhow::bail!("either --as or --passphrase is required"),
    };

    let plaintext = match pipeline.open_by_id(content_id, credential).await {
        Ok(plaintext) => {
            pb.finish_with_message("opened");
            plaintext
        }
        Err(e) => {
            pb.abandon_with_message("failed");
            anyhow::bail!("open failed at {}", describe_failure(&e));
        }
    };

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tokio::fs::write(out, plaintext.as_slice())
        .await
        .with_context(|| format!("writing {}", out.display()))?;

    println!("Wrote {} bytes to {}", plaintext.len(), out.display());
    Ok(())
}

// ── `tvault hash` / `tvault inspect` ──────────────────────────────────────────

async fn cmd_hash(file: &Path) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    println!("{}  {}", tvault_crypto::hash(&bytes), file.display());
    Ok(())
}

async fn cmd_inspect(file: &Path) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let format = tvault_crypto::detect_format(&bytes);

    println!("File:   {}", file.display());
    println!("Size:   {} bytes", bytes.len());
    println!("Format: {format}");
    if format == BlobFormat::Chunked {
        let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        println!("Chunks: {count}");
    }
    println!("Digest: {}", tvault_crypto::hash(&bytes));
    Ok(())
}

// ── `tvault status` ───────────────────────────────────────────────────────────

async fn cmd_status(config: &TvaultConfig) -> Result<()> {
    let op = build_storage(config)?;
    let status = tvault_storage::check_health(&op, &config.storage.prefix)
        .await
        .context("storage is unreachable")?;

    println!("Backend:  {}", status.backend);
    println!("Root:     {}", status.root);
    println!("Prefix:   {}", config.storage.prefix);
    println!("Blobs:    {}", status.blobs);
    println!("Records:  {}", status.anchored_records);
    Ok(())
}

// ── `tvault config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &TvaultConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = config.to_toml().context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
