//! chto: password-based file encryption
//!
//! Commands:
//!   enc <input>        - seal a file into <input>.chto
//!   dec <input.chto>   - open a container back to its original name
//!   config show        - display the active configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretSlice;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use zeroize::Zeroizing;

use chto_core::{ChtoConfig, ChtoError, Cipher};
use chto_crypto::{EncryptOptions, Engine};

/// Extension of encrypted containers
const EXTENSION: &str = "chto";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "chto",
    version,
    about = "Encrypt files into password-protected containers",
    long_about = "chto: seal files with AES-256-GCM, ChaCha20-Poly1305, or both in cascade, \
                  under an Argon2id-derived key"
)]
struct Cli {
    /// Path to chto.toml configuration file
    #[arg(long, short = 'c', env = "CHTO_CONFIG", default_value = "~/.config/chto/config.toml")]
    config: PathBuf,

    /// Log level filter, e.g. "debug" or "chto_crypto=trace" (overrides config)
    #[arg(long, env = "CHTO_LOG")]
    log: Option<String>,

    /// Log output format (overrides config)
    #[arg(long, env = "CHTO_LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file
    Enc {
        /// File to encrypt
        input: PathBuf,
        /// Output path (default: <input>.chto)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Compress with zstd before encrypting
        #[arg(long)]
        compress: bool,
        /// Do not compress, even if the config enables it
        #[arg(long, conflicts_with = "compress")]
        no_compress: bool,
        /// Cipher for single-layer encryption
        #[arg(long, value_enum)]
        cipher: Option<CipherArg>,
        /// Cascade mode: AES-256-GCM sealed again under ChaCha20-Poly1305 (ignores --cipher)
        #[arg(long)]
        paranoid: bool,
        /// Password (prompted for when absent)
        #[arg(long, env = "CHTO_PASSWORD", hide_env_values = true)]
        key: Option<String>,
    },

    /// Decrypt a .chto container
    Dec {
        /// Container to decrypt (must end in .chto)
        input: PathBuf,
        /// Output path (default: input without .chto)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Password (prompted for when absent)
        #[arg(long, env = "CHTO_PASSWORD", hide_env_values = true)]
        key: Option<String>,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CipherArg {
    /// AES-256-GCM
    Aes,
    /// ChaCha20-Poly1305
    Chacha,
}

impl From<CipherArg> for Cipher {
    fn from(arg: CipherArg) -> Self {
        match arg {
            CipherArg::Aes => Cipher::Aes256Gcm,
            CipherArg::Chacha => Cipher::ChaCha20Poly1305,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = ChtoConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.as_deref().unwrap_or(&config.log.level);
    let format = match cli.log_format {
        Some(format) => format,
        None => LogFormat::from_str(&config.log.format, true)
            .map_err(|e| anyhow::anyhow!("invalid log.format in config: {e}"))?,
    };
    init_logging(level, format);

    let engine = Engine::default();

    match cli.command {
        Commands::Enc { input, output, compress, no_compress, cipher, paranoid, key } => {
            let mut options = EncryptOptions::from(&config.encrypt);
            apply_enc_flags(&mut options, compress, no_compress, paranoid, cipher);
            let password = read_password(key, true)?;
            cmd_enc(&engine, &input, output.as_deref(), &password, &options)
        }
        Commands::Dec { input, output, key } => {
            let default_output = decrypted_path(&input)?;
            let output = output.unwrap_or(default_output);
            let password = read_password(key, false)?;
            cmd_dec(&engine, &input, &output, &password)
        }
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
    }
}

/// Layer command-line flags over the configured encrypt defaults.
fn apply_enc_flags(
    options: &mut EncryptOptions,
    compress: bool,
    no_compress: bool,
    paranoid: bool,
    cipher: Option<CipherArg>,
) {
    if compress {
        options.compress = true;
    } else if no_compress {
        options.compress = false;
    }
    options.cascade |= paranoid;
    if let Some(cipher) = cipher {
        options.cipher = cipher.into();
    }
}

// ── Logging ───────────────────────────────────────────────────────────────────

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the command summary; logs go to stderr
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

// ── Paths ─────────────────────────────────────────────────────────────────────

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(home).join(rest)
    } else {
        path.to_path_buf()
    }
}

/// `<input>.chto`
fn encrypted_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(".");
    name.push(EXTENSION);
    PathBuf::from(name)
}

fn check_container_name(input: &Path) -> Result<()> {
    match input.extension() {
        Some(ext) if ext == EXTENSION => Ok(()),
        _ => anyhow::bail!("{} is not a .{EXTENSION} container", input.display()),
    }
}

/// Input path with its `.chto` extension removed
fn decrypted_path(input: &Path) -> Result<PathBuf> {
    check_container_name(input)?;
    Ok(input.with_extension(""))
}

// ── Password input ────────────────────────────────────────────────────────────

/// Use `key` if given, otherwise prompt on the terminal (twice when `confirm`).
fn read_password(key: Option<String>, confirm: bool) -> Result<SecretSlice<u8>> {
    let mut password = match key {
        Some(key) => Zeroizing::new(key),
        None => {
            let first = Zeroizing::new(
                rpassword::prompt_password("Password: ").context("reading password")?,
            );
            if confirm {
                let second = Zeroizing::new(
                    rpassword::prompt_password("Confirm password: ")
                        .context("reading password")?,
                );
                if first != second {
                    anyhow::bail!("passwords do not match");
                }
            }
            first
        }
    };
    if password.is_empty() {
        anyhow::bail!("password must not be empty");
    }
    // Move the bytes out so no unzeroized copy is left behind.
    Ok(SecretSlice::from(std::mem::take(&mut *password).into_bytes()))
}

// ── Output ────────────────────────────────────────────────────────────────────

/// Run `write` against a temp file next to `path`, then move it into place.
///
/// On any error the temp file is removed and `path` is left untouched.
fn write_atomic<T, F>(path: &Path, write: F) -> Result<T>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<T, ChtoError>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("creating temp file in {}", parent.display()))?;

    let value = {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        let value = write(&mut writer)?;
        writer.flush().context("flushing output")?;
        value
    };
    tmp.as_file().sync_all().context("syncing output")?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(value)
}

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    // Template is a literal; a parse failure falls back to the default style.
    if let Ok(style) = ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn file_len(path: &Path) -> Result<u64> {
    Ok(std::fs::metadata(path)
        .with_context(|| format!("reading metadata: {}", path.display()))?
        .len())
}

// ── `chto enc` ────────────────────────────────────────────────────────────────

fn cmd_enc(
    engine: &Engine,
    input: &Path,
    output: Option<&Path>,
    password: &SecretSlice<u8>,
    options: &EncryptOptions,
) -> Result<()> {
    let output = output.map_or_else(|| encrypted_path(input), Path::to_path_buf);
    let source = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let input_len = file_len(input)?;

    let pb = make_spinner("enc");
    pb.set_message(format!("{} (Argon2id + {})", input.display(), options.algorithm()));
    let result = write_atomic(&output, |dest| {
        engine.encrypt(BufReader::new(source), dest, password, options)
    });
    pb.finish_and_clear();
    let report = result.with_context(|| format!("encrypting {}", input.display()))?;

    let chunks: Vec<String> = report.layer_chunks.iter().map(u64::to_string).collect();
    println!("Encrypted: {} → {}", input.display(), output.display());
    println!("  algorithm:  {}", report.algorithm);
    println!("  compressed: {}", options.compress);
    println!("  chunks:     {}", chunks.join(" + "));
    println!("  size:       {} → {}", fmt_bytes(input_len), fmt_bytes(file_len(&output)?));
    Ok(())
}

// ── `chto dec` ────────────────────────────────────────────────────────────────

fn cmd_dec(
    engine: &Engine,
    input: &Path,
    output: &Path,
    password: &SecretSlice<u8>,
) -> Result<()> {
    let source = File::open(input).with_context(|| format!("opening {}", input.display()))?;

    let pb = make_spinner("dec");
    pb.set_message(input.display().to_string());
    let result = write_atomic(output, |dest| engine.decrypt(BufReader::new(source), dest, password));
    pb.finish_and_clear();
    let report = result.with_context(|| format!("decrypting {}", input.display()))?;

    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    let layers: Vec<String> = report.layers.iter().map(ToString::to_string).collect();
    println!("Decrypted: {} → {}", input.display(), output.display());
    println!("  layers: {}", layers.join(" → "));
    println!("  size:   {}", fmt_bytes(report.plaintext_bytes));
    Ok(())
}

// ── `chto config show` ────────────────────────────────────────────────────────

fn cmd_config_show(config: &ChtoConfig, config_path: &Path) -> Result<()> {
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

// ── Utilities ─────────────────────────────────────────────────────────────────

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
        format!("{} B", bytes)
    }
}
