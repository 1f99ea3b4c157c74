//! Pocket Print Tool
//!
//! CLI for decoding console printer captures and listening on a printer link.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pocket_print_core::transport::{list_ports, DEFAULT_BAUD_RATE};
use pocket_print_core::{
    decode_capture, start_session, BackendKind, ChecksumPolicy, PngOptions, PrintedImage,
    SerialTransport, SessionConfig, SessionOutcome, Shades,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum CliPolicy {
    /// Abandon the job when a packet the console marked good is corrupt
    #[default]
    Strict,
    /// Skip every corrupt packet
    Lenient,
}

impl From<CliPolicy> for ChecksumPolicy {
    fn from(policy: CliPolicy) -> Self {
        match policy {
            CliPolicy::Strict => ChecksumPolicy::Strict,
            CliPolicy::Lenient => ChecksumPolicy::Lenient,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum CliBackend {
    /// 2-bit palette PNG
    #[default]
    Indexed,
    /// 8-bit RGBA PNG
    Rgba,
}

impl From<CliBackend> for BackendKind {
    fn from(backend: CliBackend) -> Self {
        match backend {
            CliBackend::Indexed => BackendKind::Indexed,
            CliBackend::Rgba => BackendKind::Rgba,
        }
    }
}

#[derive(Parser)]
#[command(name = "pocketprint")]
#[command(about = "Decode handheld console printer traffic into PNG images")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct DecodeOptions {
    /// Checksum policy
    #[arg(long, default_value = "strict", value_enum)]
    policy: CliPolicy,

    /// PNG backend
    #[arg(long, default_value = "indexed", value_enum)]
    backend: CliBackend,

    /// Shade colors, darkest first (four hex colors, comma separated)
    #[arg(long, value_delimiter = ',')]
    palette: Option<Vec<String>>,

    /// zlib compression level (0-9)
    #[arg(long, default_value = "6")]
    compression: u32,
}

impl DecodeOptions {
    fn session_config(&self) -> Result<SessionConfig> {
        let shades = match &self.palette {
            Some(colors) => Shades::from_hex(colors.as_slice()).context("Invalid --palette")?,
            None => Shades::grayscale(),
        };
        Ok(SessionConfig {
            checksum_policy: self.policy.into(),
            png: PngOptions {
                backend: self.backend.into(),
                shades,
                compression: self.compression,
            },
            ..SessionConfig::default()
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List serial ports
    Ports,
    /// Decode a raw byte capture of one print job
    Decode {
        /// Capture file
        capture: PathBuf,

        /// Output PNG path or directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the PNG as a data URI instead of writing a file
        #[arg(long)]
        data_uri: bool,

        #[command(flatten)]
        options: DecodeOptions,
    },
    /// Listen on a serial port and save every print
    Listen {
        /// Serial port path
        device: String,

        /// Baud rate
        #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
        baud_rate: u32,

        /// Directory for saved prints
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Idle time that ends a print job, in milliseconds
        #[arg(long, default_value = "500")]
        idle_timeout: u64,

        #[command(flatten)]
        options: DecodeOptions,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .init();

    match cli.command {
        Commands::Ports => handle_ports(),
        Commands::Decode {
            capture,
            output,
            data_uri,
            options,
        } => handle_decode(&capture, output.as_deref(), data_uri, &options).await,
        Commands::Listen {
            device,
            baud_rate,
            output,
            idle_timeout,
            options,
        } => handle_listen(&device, baud_rate, &output, idle_timeout, &options).await,
    }
}

/// `--verbose` forces debug output, otherwise `RUST_LOG` or `info`.
fn log_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn handle_ports() -> Result<()> {
    let ports = list_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{:<24} {}", port.name, port.description);
    }
    Ok(())
}

async fn handle_decode(
    capture: &Path,
    output: Option<&Path>,
    data_uri: bool,
    options: &DecodeOptions,
) -> Result<()> {
    let bytes = std::fs::read(capture)
        .with_context(|| format!("Failed to read capture {}", capture.display()))?;
    let config = options.session_config()?;

    let image = match decode_capture(&bytes, &config).await {
        SessionOutcome::Image(image) => image,
        SessionOutcome::Empty => bail!("Capture contains no printed image"),
        SessionOutcome::Failed(e) => return Err(e).context("Decoding failed"),
    };

    if data_uri {
        println!("{}", image.data_uri());
        return Ok(());
    }

    let path = write_image(&image, output)?;
    println!(
        "Decoded {}x{} image: {}",
        image.width(),
        image.height(),
        path.display()
    );
    Ok(())
}

fn write_image(image: &PrintedImage, output: Option<&Path>) -> Result<PathBuf> {
    match output {
        Some(path) if !path.is_dir() => {
            std::fs::write(path, image.png())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(path.to_path_buf())
        }
        Some(dir) => Ok(image.save_to(dir)?),
        None => Ok(image.save_to(".")?),
    }
}

async fn handle_listen(
    device: &str,
    baud_rate: u32,
    output: &Path,
    idle_timeout: u64,
    options: &DecodeOptions,
) -> Result<()> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let config = SessionConfig {
        idle_timeout: Duration::from_millis(idle_timeout),
        ..options.session_config()?
    };

    let dir = output.to_path_buf();
    let (handle, controller) = start_session(config, move |image| match image.save_to(&dir) {
        Ok(path) => println!(
            "Saved {}x{} print: {}",
            image.width(),
            image.height(),
            path.display()
        ),
        Err(e) => warn!("Failed to save print: {}", e),
    });

    info!("Listening on {} @ {} baud (Ctrl-C to stop)", device, baud_rate);
    let transport = SerialTransport::new(device, baud_rate);
    let result = tokio::select! {
        result = transport.pump(&handle) => result.context("Serial link failed"),
        _ = tokio::signal::ctrl_c() => Ok(()),
    };

    // Finalize whatever is in flight
    handle.disconnect();
    drop(handle);
    controller.await.context("Session controller panicked")?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_filter() {
        assert_eq!(log_filter(true).to_string(), "debug");
    }

    #[test]
    fn test_decode_options() {
        let cli = Cli::try_parse_from([
            "pocketprint",
            "decode",
            "capture.bin",
            "--policy",
            "lenient",
            "--backend",
            "rgba",
            "--palette",
            "#0F380F,#306230,#8BAC0F,#9BBC0F",
        ])
        .unwrap();

        let Commands::Decode { options, .. } = cli.command else {
            panic!("expected decode");
        };
        let config = options.session_config().unwrap();
        assert_eq!(config.checksum_policy, ChecksumPolicy::Lenient);
        assert_eq!(config.png.backend, BackendKind::Rgba);
        assert_eq!(config.png.shades.rgb(3), [0x9B, 0xBC, 0x0F]);
    }

    #[test]
    fn test_listen_defaults() {
        let cli = Cli::try_parse_from(["pocketprint", "listen", "/dev/ttyACM0"]).unwrap();
        let Commands::Listen {
            baud_rate,
            idle_timeout,
            options,
            ..
        } = cli.command
        else {
            panic!("expected listen");
        };
        assert_eq!(baud_rate, 115_200);
        assert_eq!(idle_timeout, 500);
        assert_eq!(
            options.session_config().unwrap().checksum_policy,
            ChecksumPolicy::Strict
        );
    }
}
