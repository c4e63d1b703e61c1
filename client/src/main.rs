// client/src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use rustls::pki_types::ServerName;
use rustls::RootCertStore;
use sslkeylog::{default_transport, load_certs, SessionSummary, TlsTransport};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// TLS client that writes session secrets to $SSLKEYLOGFILE.
#[derive(Parser)]
struct Args {
    #[clap(long, default_value = "127.0.0.1:8443")]
    addr: SocketAddr,
    #[clap(long, default_value = "localhost")]
    hostname: String,
    #[clap(long, value_parser = ["1.2", "1.3"], default_value = "1.3")]
    tls_version: String,
    /// Path to the server's self-signed certificate to trust.
    #[clap(long, default_value = "cert.pem")]
    cafile: PathBuf,
    /// Install the transport as the process default and patch it through
    /// `sslkeylog::autopatch` instead of patching it directly.
    #[clap(long)]
    default_transport: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let transport = build_transport(&args)?;
    run_client(&transport, args.addr, &args.hostname).await
}

fn build_transport(args: &Args) -> Result<TlsTransport> {
    // 只信任给定的证书
    let mut root_store = RootCertStore::empty();
    let certs = load_certs(&args.cafile)
        .with_context(|| format!("loading {}", args.cafile.display()))?;
    for cert in certs {
        root_store.add(cert)?;
    }

    let versions = if args.tls_version == "1.2" {
        &[&rustls::version::TLS12]
    } else {
        &[&rustls::version::TLS13]
    };
    let config = sslkeylog::client_config(root_store.clone(), versions)?;
    let mut transport = TlsTransport::new(root_store).with_tls_config(Arc::new(config));

    if args.default_transport {
        sslkeylog::set_default_transport(Box::new(transport));
        let logging = sslkeylog::autopatch::install().context("patching default transport")?;
        info!(enabled = logging.is_enabled(), "default transport ready");
        let guard = default_transport().read();
        let patched = guard
            .as_any()
            .downcast_ref::<TlsTransport>()
            .context("default transport is not a TlsTransport")?;
        return Ok(patched.clone());
    }

    let logging = sslkeylog::KeyLogging::from_env();
    logging.patch_transport(&mut transport)?;
    Ok(transport)
}

async fn run_client(transport: &TlsTransport, addr: SocketAddr, hostname: &str) -> Result<()> {
    let domain = ServerName::try_from(hostname.to_string())?;

    info!(%addr, "connecting");
    let mut stream = transport.connect(addr, domain).await?;

    println!("[Client] TLS connection established with {}", addr);
    println!("\n--- [Client] TLS Connection Details ---");
    print!("{}", SessionSummary::from_state(stream.get_ref().1));
    println!("--------------------------------------\n");

    loop {
        print!("[Client] Enter message (or Ctrl+D to exit): ");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            println!("\n[Client] Disconnecting.");
            break;
        }
        stream.write_all(line.as_bytes()).await?;
        let mut res = vec![0; 1024];
        let n = stream.read(&mut res).await?;
        if n == 0 {
            println!("\n[Server] Closed connection.");
            break;
        }
        print!("[Client] Received: {}", String::from_utf8_lossy(&res[..n]));
    }
    Ok(())
}
