//! vaultium: encrypted, chunked object storage with split key custody
//!
//! Objects:
//!   store <file>                 - encrypt, chunk and upload; prints the object address
//!   retrieve <address>           - download, decrypt and verify
//!   list                         - objects recorded on the ledger
//!
//! Ownership:
//!   prove <file> <address>       - prove the file is the stored object
//!   verify <proof> <address>     - check a proof
//!   circuit-setup                - generate Groth16 artifacts (development)
//!
//! Sharing:
//!   identity                     - generate an age identity
//!   share <address> <recipient>  - seal the object key to a recipient
//!   shared <recipient>           - list objects shared with a recipient
//!   fetch-shared <recipient> <address> --identity FILE

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use vaultium_core::config::{StorageBackend, VaultiumConfig};
use vaultium_core::VaultError;
use vaultium_storage::S3Credentials;
use vaultium_vault::{ProgressFn, Vault};
use vaultium_zk::{OwnershipProof, ProofProtocol};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "vaultium",
    version,
    about = "Encrypted object vault",
    long_about = "vaultium: store files encrypted and chunked, prove ownership, share keys"
)]
struct Cli {
    /// Path to vaultium.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "VAULTIUM_CONFIG",
        default_value = "~/.config/vaultium/vaultium.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "VAULTIUM_LOG")]
    log: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "VAULTIUM_LOG_FORMAT")]
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
    /// Encrypt, chunk and store a file
    ///
    /// For the s3 backend, credentials are read from AWS_ACCESS_KEY_ID and
    /// AWS_SECRET_ACCESS_KEY.
    Store {
        file: PathBuf,
        /// MIME type to record (default: application/octet-stream)
        #[arg(long)]
        mime: Option<String>,
    },

    /// Download, decrypt and verify a stored object
    Retrieve {
        /// Object address printed by `store`
        address: String,
        /// Output path (default: the stored file name in the current directory)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// List objects recorded on the ledger
    List,

    /// Prove that a local file is the stored object
    Prove {
        file: PathBuf,
        address: String,
        /// Write the proof here instead of stdout
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Verify an ownership proof against a stored object
    Verify {
        /// Proof JSON written by `prove`
        proof: PathBuf,
        address: String,
    },

    /// Generate an age identity for receiving shared objects
    Identity {
        /// Write the secret identity here (default: print it)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Share a stored object with an age recipient
    Share { address: String, recipient: String },

    /// List objects shared with a recipient
    Shared { recipient: String },

    /// Retrieve an object shared with you
    #[command(name = "fetch-shared")]
    FetchShared {
        recipient: String,
        address: String,
        /// File holding your AGE-SECRET-KEY-1... identity
        #[arg(long, env = "VAULTIUM_IDENTITY_FILE")]
        identity: PathBuf,
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Generate Groth16 proving and verifying keys
    ///
    /// The keys come from a local trusted setup; use them for development only.
    #[cfg(feature = "groth16")]
    #[command(name = "circuit-setup")]
    CircuitSetup {
        /// Artifact directory (default: proof.artifacts_dir from config)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

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
async fn main() {
    if let Err(e) = run().await {
        // Tampering is reported apart from every other failure
        match e.chain().find_map(|cause| cause.downcast_ref::<VaultError>()) {
            Some(vault_err) if vault_err.is_tampered() => {
                eprintln!("TAMPERED: {vault_err}");
                eprintln!("  the object failed authentication; do not trust any copy of it");
                std::process::exit(3);
            }
            Some(vault_err) if vault_err.is_retryable() => {
                eprintln!("error: {e:#}");
                eprintln!("  storage was unreachable or incomplete; retrying may help");
                std::process::exit(2);
            }
            _ => {
                eprintln!("error: {e:#}");
                std::process::exit(1);
            }
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let (mut config, found) = load_config(&config_path).await?;
    expand_paths(&mut config);

    let level = cli.log.clone().unwrap_or_else(|| config.logging.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.logging.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    if !found {
        tracing::debug!("config file not found: {}  (using defaults)", config_path.display());
    }
    config.validate().context("invalid configuration")?;

    let timeout = Duration::from_secs(config.operation_timeout_secs);

    match cli.command {
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
        Commands::Identity { out } => cmd_identity(out.as_deref()).await,
        #[cfg(feature = "groth16")]
        Commands::CircuitSetup { dir } => {
            let dir = dir.map(|d| expand_tilde(&d)).unwrap_or_else(|| config.proof.artifacts_dir.clone());
            with_timeout(timeout, cmd_circuit_setup(&dir)).await
        }
        command => {
            let vault = open_vault(&config).await?;
            with_timeout(timeout, dispatch(&vault, command)).await
        }
    }
}

async fn dispatch(vault: &Vault, command: Commands) -> Result<()> {
    match command {
        Commands::Store { file, mime } => cmd_store(vault, &file, mime.as_deref()).await,
        Commands::Retrieve { address, out } => cmd_retrieve(vault, &address, out.as_deref()).await,
        Commands::List => cmd_list(vault).await,
        Commands::Prove { file, address, out } => cmd_prove(vault, &file, &address, out.as_deref()).await,
        Commands::Verify { proof, address } => cmd_verify(vault, &proof, &address).await,
        Commands::Share { address, recipient } => cmd_share(vault, &address, &recipient).await,
        Commands::Shared { recipient } => cmd_shared(vault, &recipient).await,
        Commands::FetchShared {
            recipient,
            address,
            identity,
            out,
        } => cmd_fetch_shared(vault, &recipient, &address, &identity, out.as_deref()).await,
        other => anyhow::bail!("{other:?} does not run against the vault"),
    }
}

/// Abort `fut` once the configured operation timeout elapses.
async fn with_timeout<F>(limit: Duration, fut: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .with_context(|| format!("operation timed out after {}s", limit.as_secs()))?
}

// ── Config loading ────────────────────────────────────────────────────────────

async fn load_config(path: &Path) -> Result<(VaultiumConfig, bool)> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        let config = toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((VaultiumConfig::default(), false))
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so stdout stays clean for proofs and listings
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

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(format!("{home}/{rest}"))
    } else {
        path.to_path_buf()
    }
}

fn expand_paths(config: &mut VaultiumConfig) {
    if config.storage.backend == StorageBackend::Fs {
        config.storage.root = expand_tilde(&config.storage.root);
    }
    config.custody.device_dir = expand_tilde(&config.custody.device_dir);
    config.custody.backup_dir = expand_tilde(&config.custody.backup_dir);
    config.ledger.root = expand_tilde(&config.ledger.root);
    config.proof.artifacts_dir = expand_tilde(&config.proof.artifacts_dir);
    config.sharing.root = expand_tilde(&config.sharing.root);
}

async fn open_vault(config: &VaultiumConfig) -> Result<Vault> {
    let credentials = if config.storage.backend == StorageBackend::S3 {
        Some(S3Credentials::from_env().context(
            "S3 credentials not set\n\
             Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY environment variables.\n\
             Example:\n\
             \texport AWS_ACCESS_KEY_ID=your-key\n\
             \texport AWS_SECRET_ACCESS_KEY=your-secret",
        )?)
    } else {
        None
    };

    Vault::from_config(config, credentials.as_ref())
        .await
        .context("opening vault")
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn progress_for(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Box::new(move |done, total, msg| {
        pb.set_length(total);
        pb.set_position(done);
        pb.set_message(msg.to_string());
    })
}

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ── Output helpers ────────────────────────────────────────────────────────────

/// Write via a sibling temp file and rename into place.
async fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating directory: {}", parent.display()))?;
    }
    let file_name = path
        .file_name()
        .with_context(|| format!("not a file path: {}", path.display()))?;
    let tmp = path.with_file_name(format!(".{}.part", file_name.to_string_lossy()));

    tokio::fs::write(&tmp, data)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

/// Default output path for a retrieved object: its stored base name.
fn default_output(stored_name: &str, address: &str) -> PathBuf {
    Path::new(stored_name)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(address))
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn warn_if_simulated(protocol: ProofProtocol) {
    if protocol == ProofProtocol::Simulated {
        eprintln!("note: simulated proof (no Groth16 artifacts); it is not zero-knowledge and proves nothing to a third party");
    }
}

// ── `vaultium store` ──────────────────────────────────────────────────────────

async fn cmd_store(vault: &Vault, file: &Path, mime: Option<&str>) -> Result<()> {
    println!("Storing {}", file.display());

    let pb = make_progress_bar("store");
    pb.set_message("encrypting...".to_string());
    let progress = progress_for(&pb);

    let receipt = vault
        .store_file(file, mime, Some(&progress))
        .await
        .with_context(|| format!("storing {}", file.display()))?;
    pb.finish_with_message("done".to_string());

    println!();
    println!("Stored:");
    println!("  address: {}", receipt.address);
    println!("  sha256:  {}", receipt.digest);
    println!("  size:    {}", fmt_bytes(receipt.size));
    println!("  chunks:  {}", receipt.chunks);
    println!("  tx:      {} (#{})", receipt.ledger.tx_hash, receipt.ledger.sequence);
    Ok(())
}

// ── `vaultium retrieve` ───────────────────────────────────────────────────────

async fn cmd_retrieve(vault: &Vault, address: &str, out: Option<&Path>) -> Result<()> {
    let pb = make_progress_bar("retrieve");
    pb.set_message("fetching manifest...".to_string());
    let progress = progress_for(&pb);

    let result = vault.retrieve_object(address, Some(&progress)).await;
    let object = match result {
        Ok(object) => object,
        Err(e) => {
            pb.abandon_with_message("failed".to_string());
            return Err(e).with_context(|| format!("retrieving {address}"));
        }
    };
    pb.finish_with_message("verified".to_string());

    let path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output(&object.manifest.name, address));
    write_output(&path, &object.content).await?;

    println!();
    println!("Retrieved:");
    println!("  name:   {}", object.manifest.name);
    println!("  type:   {}", object.manifest.mime_type);
    println!("  size:   {}", fmt_bytes(object.content.len() as u64));
    println!("  local:  {}", path.display());
    Ok(())
}

// ── `vaultium list` ───────────────────────────────────────────────────────────

async fn cmd_list(vault: &Vault) -> Result<()> {
    let records = vault.list_objects().await.context("listing ledger")?;
    if records.is_empty() {
        println!("No objects recorded for {}", vault.owner());
        return Ok(());
    }

    println!("{:<64}  {:>10}  {:<20}  {:<24}  NAME", "ADDRESS", "SIZE", "RECORDED", "TYPE");
    for record in &records {
        println!(
            "{:<64}  {:>10}  {:<20}  {:<24}  {}",
            record.address,
            fmt_bytes(record.size),
            record.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            record.mime_type,
            record.name,
        );
    }
    println!();
    println!("{} object(s)", records.len());
    Ok(())
}

// ── `vaultium prove` / `vaultium verify` ──────────────────────────────────────

async fn cmd_prove(vault: &Vault, file: &Path, address: &str, out: Option<&Path>) -> Result<()> {
    warn_if_simulated(vault.proof_protocol());

    let pb = make_spinner("prove");
    pb.set_message(format!("{} ({})", file.display(), vault.proof_protocol()));
    let result = vault.prove_file(file, address).await;
    pb.finish_and_clear();

    let proof = result.with_context(|| format!("proving ownership of {address}"))?;
    let json = proof.to_json()?;
    match out {
        Some(path) => {
            write_output(path, json.as_bytes()).await?;
            println!("Proof written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn cmd_verify(vault: &Vault, proof_path: &Path, address: &str) -> Result<()> {
    let json = tokio::fs::read_to_string(proof_path)
        .await
        .with_context(|| format!("reading proof: {}", proof_path.display()))?;
    let proof = OwnershipProof::from_json(&json)?;
    warn_if_simulated(proof.protocol);

    let pb = make_spinner("verify");
    pb.set_message(format!("{} proof", proof.protocol));
    let result = vault.verify_ownership(proof, address).await;
    pb.finish_and_clear();

    if result.with_context(|| format!("verifying proof for {address}"))? {
        println!("valid: proof matches {address}");
        Ok(())
    } else {
        anyhow::bail!("INVALID: proof does not match {address}")
    }
}

#[cfg(feature = "groth16")]
async fn cmd_circuit_setup(dir: &Path) -> Result<()> {
    let pb = make_spinner("setup");
    pb.set_message("generating Groth16 keys...".to_string());
    let result = vaultium_zk::setup_artifacts(dir).await;
    pb.finish_and_clear();

    let paths = result.with_context(|| format!("writing artifacts to {}", dir.display()))?;
    println!("Groth16 artifacts written:");
    println!("  proving key:   {}", paths.proving_key.display());
    println!("  verifying key: {}", paths.verifying_key.display());
    println!("These keys come from a local setup; use them for development only.");
    Ok(())
}

// ── Sharing ───────────────────────────────────────────────────────────────────

async fn cmd_identity(out: Option<&Path>) -> Result<()> {
    let identity = vaultium_crypto::generate_identity();

    match out {
        Some(path) => {
            write_output(path, identity.secret.expose_secret().as_bytes()).await?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                    .await
                    .with_context(|| format!("restricting permissions on {}", path.display()))?;
            }
            println!("Identity written to {}", path.display());
        }
        None => println!("{}", identity.secret.expose_secret()),
    }
    println!("Recipient: {}", identity.recipient);
    Ok(())
}

async fn cmd_share(vault: &Vault, address: &str, recipient: &str) -> Result<()> {
    let record = vault
        .share_object(address, recipient)
        .await
        .with_context(|| format!("sharing {address}"))?;

    println!("Shared {} ({}) with {}", record.descriptor.name, fmt_bytes(record.descriptor.size), record.to);
    println!("  since: {}", record.shared_at.format("%Y-%m-%d %H:%M:%S"));
    Ok(())
}

async fn cmd_shared(vault: &Vault, recipient: &str) -> Result<()> {
    let records = vault.shared_with(recipient).await.context("listing shared objects")?;
    if records.is_empty() {
        println!("Nothing shared with {recipient}");
        return Ok(());
    }
    for record in &records {
        println!(
            "{}  {:>10}  from {:<16}  {}",
            record.address,
            fmt_bytes(record.descriptor.size),
            record.from,
            record.descriptor.name,
        );
    }
    Ok(())
}

async fn cmd_fetch_shared(
    vault: &Vault,
    recipient: &str,
    address: &str,
    identity_path: &Path,
    out: Option<&Path>,
) -> Result<()> {
    let identity = tokio::fs::read_to_string(identity_path)
        .await
        .with_context(|| format!("reading identity: {}", identity_path.display()))?;
    let identity = SecretString::from(identity.trim().to_string());

    let record = vault
        .shared_with(recipient)
        .await?
        .into_iter()
        .find(|r| r.address == address)
        .with_context(|| format!("{address} has not been shared with {recipient}"))?;

    let pb = make_progress_bar("fetch");
    let progress = progress_for(&pb);
    let result = vault.retrieve_shared(&record, &identity, Some(&progress)).await;
    let object = match result {
        Ok(object) => object,
        Err(e) => {
            pb.abandon_with_message("failed".to_string());
            return Err(e).with_context(|| format!("retrieving shared {address}"));
        }
    };
    pb.finish_with_message("verified".to_string());

    let path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output(&record.descriptor.name, address));
    write_output(&path, &object.content).await?;
    println!("Retrieved {} from {} → {}", object.manifest.name, record.from, path.display());
    Ok(())
}

// ── `vaultium config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &VaultiumConfig, path: &Path) -> Result<()> {
    println!("# config: {}", path.display());
    print!("{}", toml::to_string_pretty(config).context("serializing config")?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_expands_to_home() {
        let home = std::env::var("HOME").unwrap_or_default();
        assert_eq!(
            expand_tilde(Path::new("~/.local/share/vaultium")),
            PathBuf::from(format!("{home}/.local/share/vaultium"))
        );
        assert_eq!(expand_tilde(Path::new("/abs/path")), PathBuf::from("/abs/path"));
    }

    #[test]
    fn stored_names_cannot_escape_output_dir() {
        assert_eq!(default_output("../../etc/passwd", "addr"), PathBuf::from("passwd"));
        assert_eq!(default_output("report.pdf", "addr"), PathBuf::from("report.pdf"));
        assert_eq!(default_output("..", "addr"), PathBuf::from("addr"));
    }

    #[tokio::test]
    async fn missing_config_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let (config, found) = load_config(&tmp.path().join("absent.toml")).await.unwrap();
        assert!(!found);
        assert_eq!(config.custody.threshold, 2);
    }

    #[tokio::test]
    async fn partial_config_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vaultium.toml");
        std::fs::write(&path, "[chunking]\nchunk_size = 4096\n").unwrap();

        let (config, found) = load_config(&path).await.unwrap();
        assert!(found);
        assert_eq!(config.chunking.chunk_size, 4096);
        assert_eq!(config.chunking.max_concurrent_transfers, 8);
    }

    #[tokio::test]
    async fn write_output_replaces_atomically() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/out.bin");
        write_output(&path, b"first").await.unwrap();
        write_output(&path, b"second").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert!(!tmp.path().join("nested/.out.bin.part").exists());
    }

    #[test]
    fn cli_parses_fetch_shared() {
        let cli = Cli::try_parse_from([
            "vaultium",
            "fetch-shared",
            "age1xyz",
            "abc",
            "--identity",
            "/tmp/id.txt",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::FetchShared { .. }));
    }
}
