//! MJPEG server streaming a directory of JPEG files
//!
//! Run with: cargo run --example mjpeg_server IMAGE_DIR [BIND_ADDR] [OPTIONS]
//!
//! Examples:
//!   cargo run --example mjpeg_server ./frames                      # binds to all interfaces, port 8000
//!   cargo run --example mjpeg_server ./frames localhost            # binds to 127.0.0.1:8000
//!   cargo run --example mjpeg_server ./frames 0.0.0.0:9000 --fps 15
//!   cargo run --example mjpeg_server ./frames --www ./www --auth user:secret
//!
//! ## Watching
//!
//! Browser:  http://localhost:8000/stream/0
//! ffplay:   ffplay -f mjpeg http://localhost:8000/stream/0
//! curl:     curl -o still.jpg http://localhost:8000/still/0

use std::net::SocketAddr;
use std::path::PathBuf;

use hawkeye_rs::capture::{FrameSource, ImageSequenceSource};
use hawkeye_rs::protocol::constants::DEFAULT_PORT;
use hawkeye_rs::{Server, ServerConfig, TlsConfig};

/// Options beyond the positional arguments
#[derive(Debug, Default)]
struct Options {
    image_dir: Option<PathBuf>,
    bind_addr: Option<SocketAddr>,
    www: Option<PathBuf>,
    auth: Option<String>,
    cert: Option<PathBuf>,
    key: Option<PathBuf>,
    fps: Option<u32>,
}

fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("Missing value for {}", name))
        };

        match arg.as_str() {
            "--www" => options.www = Some(value("--www")?.into()),
            "--auth" => options.auth = Some(value("--auth")?),
            "--cert" => options.cert = Some(value("--cert")?.into()),
            "--key" => options.key = Some(value("--key")?.into()),
            "--fps" => {
                let fps = value("--fps")?;
                options.fps = Some(fps.parse().map_err(|_| format!("Invalid fps: '{}'", fps))?);
            }
            flag if flag.starts_with("--") => return Err(format!("Unknown option: {}", flag)),
            positional if options.image_dir.is_none() => {
                options.image_dir = Some(positional.into())
            }
            positional if options.bind_addr.is_none() => {
                options.bind_addr = Some(parse_bind_addr(positional)?)
            }
            extra => return Err(format!("Unexpected argument: {}", extra)),
        }
    }

    if options.cert.is_some() != options.key.is_some() {
        return Err("--cert and --key must be given together".into());
    }

    Ok(options)
}

fn print_usage() {
    eprintln!("Usage: mjpeg_server IMAGE_DIR [BIND_ADDR] [OPTIONS]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  IMAGE_DIR    Directory of .jpg files streamed in a loop");
    eprintln!("  BIND_ADDR    Address to bind to (default: all interfaces, port 8000)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --www DIR          Serve static files from DIR");
    eprintln!("  --auth USER:PASS   Require HTTP Basic auth");
    eprintln!("  --cert FILE        PEM certificate chain (enables HTTPS)");
    eprintln!("  --key FILE         PEM private key");
    eprintln!("  --fps N            Frames per second (1-50, default 5)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let options = match parse_args(&args) {
        Ok(Options {
            image_dir: None, ..
        }) => {
            print_usage();
            std::process::exit(1);
        }
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hawkeye_rs=info".parse()?)
                .add_directive("mjpeg_server=debug".parse()?),
        )
        .init();

    let mut config = match options.bind_addr {
        Some(addr) => ServerConfig::with_addr(addr.ip().to_string(), addr.port()),
        None => ServerConfig::default(),
    };
    if let Some(www) = options.www {
        config = config.static_root(www);
    }
    if let Some(auth) = options.auth {
        config = config.credentials(auth);
    }
    if let (Some(cert), Some(key)) = (options.cert, options.key) {
        config = config.tls(TlsConfig::new(cert, key));
    }
    if let Some(fps) = options.fps {
        config = config.fps(fps);
    }

    let image_dir = options.image_dir.unwrap_or_default();
    let source = ImageSequenceSource::open(&image_dir)?;
    tracing::info!(dir = %image_dir.display(), images = source.len(), "Loaded image sequence");

    let sources: Vec<Box<dyn FrameSource>> = vec![Box::new(source)];
    let mut server = Server::bind(config, sources).await?;

    for addr in server.local_addrs() {
        println!("Streaming on http://{}/stream/0", addr);
    }

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
