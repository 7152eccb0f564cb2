mod config;

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use clap::{Parser, Subcommand};
use config::CliConfig;
use tracing::info;
use webpush_crypto::KeyPair;
use webpush_proto::jwt::{decode_vapid_claims, parse_authorization};
use webpush_proto::{PushRequestBuilder, Subscription};

#[derive(Debug, Parser)]
#[command(name = "webpush-cli", version, about = "Build encrypted Web Push requests offline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Encrypt a message for a subscription and print the resulting request.
    Build {
        #[arg(long, default_value = "webpush.toml")]
        config: PathBuf,
        /// File containing the browser's PushSubscription JSON.
        #[arg(long)]
        subscription: PathBuf,
        #[arg(long)]
        message: String,
        /// Write the binary body here instead of printing it as base64url.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a VAPID key pair for the `[vapid]` config section.
    Keygen,
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn build(
    config_path: &Path,
    subscription_path: &Path,
    message: &str,
    out: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match CliConfig::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };
    init_logging(&config.logging.level);

    let signer = config.vapid.signer()?;
    let subscription = Subscription::from_json(&std::fs::read_to_string(subscription_path)?)?;
    info!("Subscription endpoint: {}", subscription.endpoint());

    let request = PushRequestBuilder::new(&subscription)
        .ttl(config.push.ttl)
        .vapid(&signer)
        .build(message.as_bytes())?;

    if let Some(authorization) = request.header("Authorization") {
        let parts = parse_authorization(authorization)?;
        let claims = decode_vapid_claims(&parts.jwt)?;
        info!("VAPID token for {} expires at {}", claims.aud, claims.exp);
    }

    println!("{} {}", request.method, request.endpoint);
    for (name, value) in &request.headers {
        println!("{name}: {value}");
    }
    match out {
        Some(path) => {
            std::fs::write(path, &request.body)?;
            info!("Wrote {} body bytes to {}", request.body.len(), path.display());
        }
        None => {
            println!();
            println!("{}", URL_SAFE_NO_PAD.encode(&request.body));
        }
    }
    Ok(())
}

/// `[vapid]` config section for a fresh key, with the browser-facing key as a comment.
fn vapid_section(keypair: &KeyPair) -> String {
    format!(
        "[vapid]\nprivate_key = \"{}\"\n# applicationServerKey: {}\n",
        URL_SAFE_NO_PAD.encode(&keypair.private_key_bytes()[..]),
        URL_SAFE_NO_PAD.encode(keypair.public_key_bytes())
    )
}

fn keygen() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info");
    let keypair = KeyPair::generate()?;
    info!(
        "Generated VAPID key pair, applicationServerKey {}",
        URL_SAFE_NO_PAD.encode(keypair.public_key_bytes())
    );
    print!("{}", vapid_section(&keypair));
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Build {
            config,
            subscription,
            message,
            out,
        } => build(config, subscription, message, out.as_deref()),
        Command::Keygen => keygen(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
