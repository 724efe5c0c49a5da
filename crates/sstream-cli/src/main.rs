//! sstream: chunked streaming encryption CLI
//!
//! Commands:
//!   keygen [--output PATH]   - generate a random 32-byte stream key (base64)
//!   nonce                    - generate a random 16-byte stream nonce (base64)
//!   encrypt <in> <out>       - encrypt a file as a chunked stream
//!   decrypt <in> <out>       - authenticate and decrypt a chunked stream
//!   inspect <in>             - list the wire chunks of an encrypted file
//!   config show              - display the effective configuration

mod keyfile;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use secrecy::ExposeSecret;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use sstream_core::{SstreamConfig, StreamConfig, Variant};
use sstream_crypto::{
    decrypt_stream, encrypt_stream, read_chunk_length, wire, StreamDecryptor, StreamEncryptor,
    WireChunks,
};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sstream",
    version,
    about = "Chunked streaming encryption over XSalsa20-Poly1305",
    long_about = "sstream: encrypt and decrypt files as authenticated chunk streams that detect truncation, reordering and splicing"
)]
struct Cli {
    /// Path to sstream.toml configuration file
    #[arg(long, short = 'c', env = "SSTREAM_CONFIG", default_value = "sstream.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "SSTREAM_LOG")]
    log: Option<String>,

    /// Log format (json, text)
    #[arg(long, env = "SSTREAM_LOG_FORMAT")]
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
    /// Generate a random stream key
    Keygen {
        /// Write the key to this file (mode 0600) instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Generate a random stream nonce
    ///
    /// A nonce must never be reused with the same key.
    Nonce,

    /// Encrypt a file
    Encrypt(StreamArgs),

    /// Decrypt a file
    ///
    /// Plaintext is written to a temporary file next to the output and only
    /// renamed into place once the whole stream has authenticated.
    Decrypt(StreamArgs),

    /// List the wire chunks of an encrypted file without decrypting it
    Inspect {
        /// Encrypted file
        input: PathBuf,
        /// Wire variant (overrides config)
        #[arg(long)]
        variant: Option<Variant>,
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

#[derive(Args, Debug)]
struct StreamArgs {
    /// File holding the base64 stream key
    #[arg(long, short = 'k', env = "SSTREAM_KEY_FILE")]
    key_file: PathBuf,
    /// Base64 16-byte stream nonce
    #[arg(long, short = 'n')]
    nonce: String,
    /// Wire variant (overrides config)
    #[arg(long)]
    variant: Option<Variant>,
    /// Maximum plaintext bytes per chunk (overrides config)
    #[arg(long)]
    max_chunk_len: Option<usize>,
    /// Input file
    input: PathBuf,
    /// Output file
    output: PathBuf,
}

impl StreamArgs {
    fn stream_config(&self, base: &StreamConfig) -> StreamConfig {
        StreamConfig::new(
            self.variant.unwrap_or(base.variant),
            self.max_chunk_len.unwrap_or(base.max_chunk_len),
        )
    }
}

// ── Entry point ────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = SstreamConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    let level = cli.log.as_deref().unwrap_or(&config.log.level);
    let format = match cli.log_format {
        Some(format) => format,
        None => LogFormat::from_str(&config.log.format, true)
            .map_err(|e| anyhow::anyhow!("invalid log format in config: {e}"))?,
    };
    init_logging(level, &format);

    match cli.command {
        Commands::Keygen { output } => cmd_keygen(output.as_deref()),
        Commands::Nonce => cmd_nonce(),
        Commands::Encrypt(args) => cmd_encrypt(&config, &args),
        Commands::Decrypt(args) => cmd_decrypt(&config, &args),
        Commands::Inspect { input, variant } => {
            cmd_inspect(&input, variant.unwrap_or(config.stream.variant))
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so stdout stays clean for keys and nonces.
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

// ── Key material ───────────────────────────────────────────────────────────────

fn cmd_keygen(output: Option<&Path>) -> Result<()> {
    let key = keyfile::generate_key();
    match output {
        Some(path) => {
            keyfile::write_key(path, &key)?;
            tracing::info!(path = %path.display(), "stream key written");
            eprintln!("wrote key to {}", path.display());
        }
        None => println!("{}", keyfile::encode_key(&key).expose_secret()),
    }
    Ok(())
}

fn cmd_nonce() -> Result<()> {
    println!("{}", keyfile::encode_nonce(&keyfile::generate_nonce()));
    Ok(())
}

// ── Encrypt / decrypt ──────────────────────────────────────────────────────────

fn cmd_encrypt(config: &SstreamConfig, args: &StreamArgs) -> Result<()> {
    let key = keyfile::read_key(&args.key_file)?;
    let nonce = keyfile::parse_nonce(&args.nonce)?;
    let stream_config = args.stream_config(&config.stream);

    let mut encryptor = StreamEncryptor::new(key.as_bytes(), &nonce, &stream_config)
        .context("creating stream encryptor")?;

    let input = File::open(&args.input)
        .with_context(|| format!("opening input: {}", args.input.display()))?;
    let output = File::create(&args.output)
        .with_context(|| format!("creating output: {}", args.output.display()))?;

    let bytes = encrypt_stream(&mut encryptor, BufReader::new(input), BufWriter::new(output))
        .with_context(|| format!("encrypting {}", args.input.display()))?;
    let chunks = encryptor.chunks_processed();
    encryptor.release();

    tracing::info!(
        input = %args.input.display(),
        output = %args.output.display(),
        bytes,
        chunks,
        variant = %stream_config.variant,
        "encrypted"
    );
    println!(
        "encrypted {bytes} bytes in {chunks} chunks -> {}",
        args.output.display()
    );
    Ok(())
}

fn cmd_decrypt(config: &SstreamConfig, args: &StreamArgs) -> Result<()> {
    let key = keyfile::read_key(&args.key_file)?;
    let nonce = keyfile::parse_nonce(&args.nonce)?;
    let stream_config = args.stream_config(&config.stream);

    let mut decryptor = StreamDecryptor::new(key.as_bytes(), &nonce, &stream_config)
        .context("creating stream decryptor")?;

    let input = File::open(&args.input)
        .with_context(|| format!("opening input: {}", args.input.display()))?;

    let dir = args
        .output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut staging = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;

    // The temp file is removed on drop if anything below fails.
    let bytes = decrypt_stream(
        &mut decryptor,
        BufReader::new(input),
        BufWriter::new(staging.as_file_mut()),
    )
    .with_context(|| format!("decrypting {}", args.input.display()))?;
    let chunks = decryptor.chunks_processed();
    decryptor.release();

    staging
        .persist(&args.output)
        .with_context(|| format!("writing output: {}", args.output.display()))?;

    tracing::info!(
        input = %args.input.display(),
        output = %args.output.display(),
        bytes,
        chunks,
        "decrypted"
    );
    println!(
        "decrypted {bytes} bytes in {chunks} chunks -> {}",
        args.output.display()
    );
    Ok(())
}

// ── Inspect ────────────────────────────────────────────────────────────────────

fn cmd_inspect(input: &Path, variant: Variant) -> Result<()> {
    let data =
        std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;

    println!("file:     {}", input.display());
    println!("variant:  {variant}");
    println!("size:     {} bytes", data.len());
    println!();
    println!("{:>6}  {:>10}  {:>10}  last", "chunk", "plaintext", "wire");

    let mut offset = 0;
    let mut payload = 0u64;
    for (index, item) in WireChunks::new(&data, variant).enumerate() {
        match item {
            Ok((chunk, is_last)) => {
                let len = read_chunk_length(chunk, 0, variant).unwrap_or_default();
                println!(
                    "{index:>6}  {len:>10}  {:>10}  {}",
                    chunk.len(),
                    if is_last { "yes" } else { "" }
                );
                offset += chunk.len();
                payload += len as u64;
            }
            Err(failure) => {
                println!(
                    "{index:>6}  incomplete chunk at offset {offset}: {failure} ({} bytes left)",
                    data.len() - offset
                );
                anyhow::bail!("{} is not a complete {variant} stream", input.display());
            }
        }
    }

    println!();
    println!(
        "payload:  {payload} bytes (overhead {} bytes per chunk)",
        wire::overhead(variant)
    );
    Ok(())
}

// ── Config ─────────────────────────────────────────────────────────────────────

fn cmd_config_show(config: &SstreamConfig, path: &Path) -> Result<()> {
    println!("# config: {}", path.display());
    print!("{}", config.to_toml()?);
    Ok(())
}
