//! lsfs: encrypted block stream CLI
//!
//! Commands:
//!   keygen <out>                      - write a new base64 master key
//!   encrypt <plain> <encrypted>       - encrypt a file into an lsfs stream
//!   decrypt <encrypted> <plain>       - decrypt an lsfs stream
//!   stat <encrypted>                  - show logical/physical geometry
//!   verify <encrypted>                - authenticate every block
//!   truncate <encrypted> <len>        - resize the logical content
//!   config show                       - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::{ExposeSecret, SecretString};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use lsfs_core::{FileId, LsfsConfig, StreamConfig};
use lsfs_crypto::MasterKey;
use lsfs_storage::{FileStream, StorageStream};
use lsfs_stream::{open_lite_stream, BlockCodec, LiteStream, StreamCursor};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "lsfs",
    version,
    about = "Encrypted block stream tool",
    long_about = "lsfs: encrypt files into authenticated, randomly accessible block streams"
)]
struct Cli {
    /// Path to lsfs.toml configuration file
    #[arg(long, short = 'c', env = "LSFS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "LSFS_LOG")]
    log: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "LSFS_LOG_FORMAT")]
    log_format: Option<CliLogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliLogFormat {
    Json,
    Text,
}

impl From<CliLogFormat> for lsfs_core::LogFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Json => Self::Json,
            CliLogFormat::Text => Self::Text,
        }
    }
}

/// Master key and file identity shared by every stream command.
#[derive(clap::Args, Debug)]
struct StreamArgs {
    /// File holding the base64-encoded 32-byte master key
    #[arg(long, short = 'k', env = "LSFS_KEY_FILE")]
    key_file: PathBuf,

    /// File id (UUID) the stream was encrypted under
    #[arg(long)]
    file_id: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a new master key file
    Keygen {
        /// Destination path (must not exist)
        out: PathBuf,
    },

    /// Encrypt a plaintext file into a new lsfs stream
    ///
    /// Prints the file id; the same id is required to decrypt.
    Encrypt {
        plain: PathBuf,
        encrypted: PathBuf,
        #[arg(long, short = 'k', env = "LSFS_KEY_FILE")]
        key_file: PathBuf,
        /// File id to bind the blocks to (default: random UUIDv4)
        #[arg(long)]
        file_id: Option<String>,
    },

    /// Decrypt an lsfs stream into a plaintext file
    Decrypt {
        encrypted: PathBuf,
        plain: PathBuf,
        #[command(flatten)]
        stream: StreamArgs,
        /// Return unauthenticated data instead of failing on tampered blocks
        #[arg(long)]
        best_effort: bool,
    },

    /// Show logical size, physical size and block geometry
    Stat {
        encrypted: PathBuf,
        #[command(flatten)]
        stream: StreamArgs,
    },

    /// Authenticate every block and report the ones that fail
    Verify {
        encrypted: PathBuf,
        #[command(flatten)]
        stream: StreamArgs,
    },

    /// Truncate or extend the logical content to <len> bytes
    Truncate {
        encrypted: PathBuf,
        len: u64,
        #[command(flatten)]
        stream: StreamArgs,
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

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => LsfsConfig::load(path)
            .with_context(|| format!("loading config: {}", path.display()))?,
        None => LsfsConfig::default(),
    };
    if let Some(level) = &cli.log {
        config.log.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log.format = format.into();
    }

    init_logging(&config.log.level, config.log.format);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        block_size = config.stream.block_size,
        iv_size = config.stream.iv_size,
        "lsfs starting"
    );

    match cli.command {
        Commands::Keygen { out } => cmd_keygen(&out),
        Commands::Encrypt {
            plain,
            encrypted,
            key_file,
            file_id,
        } => cmd_encrypt(&config.stream, &plain, &encrypted, &key_file, file_id.as_deref()),
        Commands::Decrypt {
            encrypted,
            plain,
            stream,
            best_effort,
        } => {
            let mut stream_config = config.stream.clone();
            if best_effort {
                stream_config.integrity_check = false;
            }
            cmd_decrypt(&stream_config, &encrypted, &plain, &stream)
        }
        Commands::Stat { encrypted, stream } => cmd_stat(&config.stream, &encrypted, &stream),
        Commands::Verify { encrypted, stream } => cmd_verify(&config.stream, &encrypted, &stream),
        Commands::Truncate {
            encrypted,
            len,
            stream,
        } => cmd_truncate(&config.stream, &encrypted, len, &stream),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, cli.config.as_deref()),
    }
}

fn init_logging(level: &str, format: lsfs_core::LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so decrypted output on stdout stays clean.
    match format {
        lsfs_core::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        lsfs_core::LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
}

// ── Key and stream helpers ────────────────────────────────────────────────────

fn load_master_key(path: &Path) -> Result<MasterKey> {
    let encoded = SecretString::from(
        std::fs::read_to_string(path)
            .with_context(|| format!("reading key file: {}", path.display()))?,
    );
    MasterKey::from_base64(&encoded)
        .with_context(|| format!("decoding key file: {}", path.display()))
}

fn parse_file_id(raw: &str) -> Result<FileId> {
    let uuid = uuid::Uuid::parse_str(raw).with_context(|| format!("invalid file id: {raw}"))?;
    Ok(FileId::from_bytes(*uuid.as_bytes()))
}

fn open_existing(
    config: &StreamConfig,
    path: &Path,
    args: &StreamArgs,
) -> Result<LiteStream<FileStream>> {
    let master = load_master_key(&args.key_file)?;
    let id = parse_file_id(&args.file_id)?;
    let storage = FileStream::open(path).with_context(|| format!("opening {}", path.display()))?;
    if storage.size()? == 0 {
        anyhow::bail!("{} is empty, not an lsfs stream", path.display());
    }
    open_lite_stream(storage, &master, id, config)
        .with_context(|| format!("opening lsfs stream: {}", path.display()))
}

// ── `lsfs keygen` ─────────────────────────────────────────────────────────────

fn cmd_keygen(out: &Path) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(out)
        .with_context(|| format!("creating key file (refusing to overwrite): {}", out.display()))?;

    let encoded = MasterKey::generate().to_base64();
    writeln!(file, "{}", encoded.expose_secret())
        .with_context(|| format!("writing key file: {}", out.display()))?;
    file.sync_all()?;

    info!(path = %out.display(), "generated master key");
    println!("wrote master key to {}", out.display());
    Ok(())
}

// ── `lsfs encrypt` ────────────────────────────────────────────────────────────

fn cmd_encrypt(
    config: &StreamConfig,
    plain: &Path,
    encrypted: &Path,
    key_file: &Path,
    file_id: Option<&str>,
) -> Result<()> {
    let master = load_master_key(key_file)?;
    let uuid = match file_id {
        Some(raw) => {
            uuid::Uuid::parse_str(raw).with_context(|| format!("invalid file id: {raw}"))?
        }
        None => uuid::Uuid::new_v4(),
    };
    let id = FileId::from_bytes(*uuid.as_bytes());

    let mut input = File::open(plain).with_context(|| format!("opening {}", plain.display()))?;
    let storage = FileStream::create(encrypted)
        .with_context(|| format!("creating {}", encrypted.display()))?;
    let stream = open_lite_stream(storage, &master, id, config)?;

    let mut cursor = StreamCursor::new(stream);
    let copied = io::copy(&mut input, &mut cursor)
        .with_context(|| format!("encrypting {}", plain.display()))?;
    cursor.flush()?;

    let physical = cursor.get_ref().codec().physical_size()?;
    info!(file = %id, bytes = copied, physical, "encrypted");
    println!("file-id: {uuid}");
    println!(
        "{} → {} ({copied} bytes, {physical} on disk)",
        plain.display(),
        encrypted.display()
    );
    Ok(())
}

// ── `lsfs decrypt` ────────────────────────────────────────────────────────────

fn cmd_decrypt(
    config: &StreamConfig,
    encrypted: &Path,
    plain: &Path,
    args: &StreamArgs,
) -> Result<()> {
    let stream = open_existing(config, encrypted, args)?;
    let mut cursor = StreamCursor::new(stream);
    let mut output = File::create(plain).with_context(|| format!("creating {}", plain.display()))?;

    let copied = io::copy(&mut cursor, &mut output)
        .with_context(|| format!("decrypting {}", encrypted.display()))?;
    output.sync_all()?;

    info!(bytes = copied, "decrypted");
    println!("{} → {} ({copied} bytes)", encrypted.display(), plain.display());
    Ok(())
}

// ── `lsfs stat` ───────────────────────────────────────────────────────────────

fn cmd_stat(config: &StreamConfig, encrypted: &Path, args: &StreamArgs) -> Result<()> {
    let stream = open_existing(config, encrypted, args)?;
    let codec = stream.codec();

    println!("file:            {}", encrypted.display());
    println!("file id:         {}", codec.file_id());
    println!("logical size:    {}", stream.size()?);
    println!("physical size:   {}", codec.physical_size()?);
    println!("blocks:          {}", codec.block_count()?);
    println!("block size:      {}", codec.block_size());
    println!("physical block:  {}", codec.physical_block_size());
    println!("iv size:         {}", codec.iv_size());
    Ok(())
}

// ── `lsfs verify` ─────────────────────────────────────────────────────────────

fn cmd_verify(config: &StreamConfig, encrypted: &Path, args: &StreamArgs) -> Result<()> {
    let strict = StreamConfig {
        integrity_check: true,
        ..config.clone()
    };
    let mut stream = open_existing(&strict, encrypted, args)?;
    let codec = stream.codec_mut();
    let blocks = codec.block_count()?;
    let mut block = vec![0u8; codec.block_size()];
    let mut failures = 0u64;

    for index in 0..blocks {
        match codec.read_block(index, &mut block) {
            Ok(_) => {}
            Err(e) if e.is_verification() => {
                failures += 1;
                println!("FAIL  block {index}: {e}");
            }
            Err(e) => return Err(e).with_context(|| format!("reading block {index}")),
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {blocks} blocks failed verification");
    }
    println!("OK    {blocks} blocks verified");
    Ok(())
}

// ── `lsfs truncate` ───────────────────────────────────────────────────────────

fn cmd_truncate(
    config: &StreamConfig,
    encrypted: &Path,
    len: u64,
    args: &StreamArgs,
) -> Result<()> {
    let mut stream = open_existing(config, encrypted, args)?;
    let before = stream.size()?;
    stream
        .resize(len)
        .with_context(|| format!("resizing {} to {len}", encrypted.display()))?;
    stream.flush()?;

    info!(from = before, to = len, "truncated");
    println!("{}: {before} → {len} bytes", encrypted.display());
    Ok(())
}

// ── `lsfs config show` ────────────────────────────────────────────────────────

fn cmd_config_show(config: &LsfsConfig, config_path: Option<&Path>) -> Result<()> {
    match config_path {
        Some(path) if path.exists() => println!("# Configuration from: {}", path.display()),
        Some(path) => println!("# Configuration: defaults (no file at {})", path.display()),
        None => println!("# Configuration: defaults"),
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
