//! cv: cryptovault command-line interface
//!
//! Commands:
//!   keys generate|list|show|delete|stats  - manage a user's keys
//!   encrypt <file> --key <id>             - encrypt a file, print its document record
//!   decrypt <document-id> [-o <file>]     - decrypt a document to a file or stdout
//!   documents show|delete <id>            - inspect or remove a document
//!   config show                           - display the active configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use cv_core::config::{BlobBackend, VaultConfig};
use cv_core::{Algorithm, KeyRecord};
use cv_crypto::SystemCrypto;
use cv_envelope::EnvelopeEngine;
use cv_storage::{build_operator, Catalog, OpendalBlobStore, S3Credentials};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "cv",
    version,
    about = "cryptovault envelope encryption",
    long_about = "cv: encrypt documents for a user's RSA key and manage the keys that protect them"
)]
struct Cli {
    /// Path to the cryptovault TOML configuration file
    #[arg(long, short = 'c', env = "CV_CONFIG", default_value = "cryptovault.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "CV_LOG")]
    log: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "CV_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Key management
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Encrypt a file for an asymmetric key and print the document record
    Encrypt {
        /// File to encrypt
        input: PathBuf,
        /// Id of the recipient's RSA key
        #[arg(long, short = 'k')]
        key: Uuid,
        /// Stored filename (default: the input's file name)
        #[arg(long)]
        name: Option<String>,
        /// MIME type recorded with the document
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
    },

    /// Decrypt a document and verify its digest
    Decrypt {
        /// Document id
        document: Uuid,
        /// Write plaintext here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Document records
    Documents {
        #[command(subcommand)]
        action: DocumentsAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum KeysAction {
    /// Generate a key for an owner
    Generate {
        #[arg(long)]
        owner: String,
        /// AES-256-GCM, RSA-2048-OAEP or RSA-3072-OAEP (default: from config)
        #[arg(long)]
        algorithm: Option<Algorithm>,
    },
    /// List an owner's keys
    List {
        #[arg(long)]
        owner: String,
    },
    /// Show one of an owner's keys (public parts only)
    Show {
        id: Uuid,
        #[arg(long)]
        owner: String,
    },
    /// Delete one of an owner's keys that no document references
    Delete {
        id: Uuid,
        #[arg(long)]
        owner: String,
    },
    /// Key and document counts for an owner
    Stats {
        #[arg(long)]
        owner: String,
    },
}

#[derive(Subcommand, Debug)]
enum DocumentsAction {
    /// Print a document record
    Show { id: Uuid },
    /// Delete a document record and its ciphertext
    Delete { id: Uuid },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    let level = cli.log.as_deref().unwrap_or(&config.logging.level);
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| parse_log_format(&config.logging.format));
    init_logging(level, &format);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "cv starting"
    );

    match cli.command {
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
        Commands::Keys { action } => cmd_keys(&build_engine(&config)?, &config, action).await,
        Commands::Encrypt {
            input,
            key,
            name,
            content_type,
        } => {
            let engine = build_engine(&config)?;
            cmd_encrypt(&engine, &input, key, name.as_deref(), &content_type).await
        }
        Commands::Decrypt { document, output } => {
            cmd_decrypt(&build_engine(&config)?, document, output.as_deref()).await
        }
        Commands::Documents { action } => cmd_documents(&build_engine(&config)?, action).await,
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

async fn load_config(path: &Path) -> Result<VaultConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(VaultConfig::default())
    }
}

fn parse_log_format(format: &str) -> LogFormat {
    if format.eq_ignore_ascii_case("json") {
        LogFormat::Json
    } else {
        LogFormat::Text
    }
}

/// Logs go to stderr; stdout carries command output and decrypted data.
fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

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

// ── Engine wiring ─────────────────────────────────────────────────────────────

fn s3_credentials_from_env() -> Result<S3Credentials> {
    let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").context(
        "S3 credentials not set\n\
         Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY environment variables.",
    )?;
    let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
        .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
    Ok(S3Credentials {
        access_key_id,
        secret_access_key,
    })
}

fn build_engine(config: &VaultConfig) -> Result<EnvelopeEngine> {
    let credentials = match config.storage.backend {
        BlobBackend::S3 => Some(s3_credentials_from_env()?),
        BlobBackend::Fs | BlobBackend::Memory => None,
    };
    if config.storage.backend == BlobBackend::Memory {
        tracing::warn!("memory blob backend: ciphertext is lost when cv exits");
    }

    let op = build_operator(&config.storage, credentials.as_ref())
        .context("building storage operator")?;
    let blobs = Arc::new(OpendalBlobStore::new(op, config.storage.prefix.clone()));
    let catalog = Arc::new(
        Catalog::open(&config.catalog.path)
            .with_context(|| format!("opening catalog: {}", config.catalog.path.display()))?,
    );

    Ok(
        EnvelopeEngine::new(Arc::new(SystemCrypto), catalog.clone(), catalog, blobs)
            .with_operation_timeout(Duration::from_secs(config.engine.operation_timeout_secs)),
    )
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{rendered}");
    Ok(())
}

/// Key fields safe to print. Private key material never leaves the catalog.
fn key_summary(key: &KeyRecord) -> serde_json::Value {
    serde_json::json!({
        "id": key.id,
        "owner": key.owner,
        "kind": key.kind,
        "algorithm": key.algorithm,
        "public_key": key.public_key,
        "created_at": key.created_at,
    })
}

// ── `cv keys` ─────────────────────────────────────────────────────────────────

async fn cmd_keys(engine: &EnvelopeEngine, config: &VaultConfig, action: KeysAction) -> Result<()> {
    match action {
        KeysAction::Generate { owner, algorithm } => {
            let algorithm = algorithm.unwrap_or(config.crypto.default_asymmetric_algorithm);
            let key = match algorithm {
                Algorithm::Aes256Gcm => engine.generate_symmetric_key(&owner).await,
                rsa => engine.generate_key_pair(&owner, rsa).await,
            }
            .with_context(|| format!("generating {algorithm} key for {owner}"))?;
            print_json(&key_summary(&key))
        }
        KeysAction::List { owner } => {
            let keys = engine
                .list_keys(&owner)
                .await
                .with_context(|| format!("listing keys for {owner}"))?;
            let summaries: Vec<_> = keys.iter().map(key_summary).collect();
            print_json(&summaries)
        }
        KeysAction::Show { id, owner } => {
            let key = engine
                .get_key(id, &owner)
                .await
                .with_context(|| format!("loading key {id} for {owner}"))?;
            print_json(&key_summary(&key))
        }
        KeysAction::Delete { id, owner } => {
            engine
                .delete_key(id, &owner)
                .await
                .with_context(|| format!("deleting key {id} for {owner}"))?;
            println!("deleted key {id}");
            Ok(())
        }
        KeysAction::Stats { owner } => {
            let stats = engine
                .key_statistics(&owner)
                .await
                .with_context(|| format!("collecting key statistics for {owner}"))?;
            print_json(&stats)
        }
    }
}

// ── `cv encrypt` / `cv decrypt` ───────────────────────────────────────────────

async fn cmd_encrypt(
    engine: &EnvelopeEngine,
    input: &Path,
    key: Uuid,
    name: Option<&str>,
    content_type: &str,
) -> Result<()> {
    let filename = match name {
        Some(n) => n.to_string(),
        None => input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("no file name in {}", input.display()))?,
    };
    let plaintext = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;

    let record = engine
        .encrypt_with_timeout(plaintext, key, &filename, content_type)
        .await
        .with_context(|| format!("encrypting {}", input.display()))?;
    print_json(&record)
}

async fn cmd_decrypt(engine: &EnvelopeEngine, document: Uuid, output: Option<&Path>) -> Result<()> {
    let record = engine
        .document(document)
        .await
        .with_context(|| format!("loading document {document}"))?;
    let plaintext = engine
        .decrypt_with_timeout(&record)
        .await
        .with_context(|| format!("decrypting document {document}"))?;

    match output {
        Some(path) => {
            tokio::fs::write(path, plaintext.as_slice())
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!(
                "decrypted {} ({} bytes) -> {}",
                record.filename,
                plaintext.len(),
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&plaintext)
                .and_then(|_| stdout.flush())
                .context("writing plaintext to stdout")?;
        }
    }
    Ok(())
}

// ── `cv documents` ────────────────────────────────────────────────────────────

async fn cmd_documents(engine: &EnvelopeEngine, action: DocumentsAction) -> Result<()> {
    match action {
        DocumentsAction::Show { id } => {
            let record = engine
                .document(id)
                .await
                .with_context(|| format!("loading document {id}"))?;
            print_json(&record)
        }
        DocumentsAction::Delete { id } => {
            engine
                .delete_document(id)
                .await
                .with_context(|| format!("deleting document {id}"))?;
            println!("deleted document {id}");
            Ok(())
        }
    }
}

// ── `cv config show` ──────────────────────────────────────────────────────────

fn cmd_config_show(config: &VaultConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
