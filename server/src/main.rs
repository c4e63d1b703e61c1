// server/src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use rustls::crypto::ring;
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use sslkeylog::{load_certs, load_private_key, KeyLogging, SessionSummary};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// TLS echo server that writes session secrets to $SSLKEYLOGFILE.
#[derive(Parser)]
struct Args {
    #[clap(long, default_value = "0.0.0.0:8443")]
    addr: SocketAddr,
    #[clap(long, default_value = "server/server.crt")]
    cert: PathBuf,
    #[clap(long, default_value = "server/server.key")]
    key: PathBuf,
    #[clap(long, value_parser = ["1.2", "1.3"], default_value = "1.3")]
    tls_version: String,
    /// CA used to verify client certificates. Without it clients are not authenticated.
    #[clap(long)]
    ca_cert: Option<PathBuf>,
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
    let keylog = KeyLogging::from_env();
    let config = server_config(&args, &keylog)?;
    run_server(args.addr, config, &args.tls_version).await
}

fn server_config(args: &Args, keylog: &KeyLogging) -> Result<ServerConfig> {
    let certs =
        load_certs(&args.cert).with_context(|| format!("loading {}", args.cert.display()))?;
    let key =
        load_private_key(&args.key).with_context(|| format!("loading {}", args.key.display()))?;

    let versions = if args.tls_version == "1.2" {
        &[&rustls::version::TLS12]
    } else {
        &[&rustls::version::TLS13]
    };
    let builder = ServerConfig::builder_with_provider(ring::default_provider().into())
        .with_protocol_versions(versions)?;

    let mut config = match &args.ca_cert {
        Some(ca_cert) => {
            // 要求客户端提供由该 CA 签发的证书
            let mut client_auth_roots = RootCertStore::empty();
            for cert in load_certs(ca_cert)? {
                client_auth_roots.add(cert)?;
            }
            let client_verifier = WebPkiClientVerifier::builder_with_provider(
                client_auth_roots.into(),
                ring::default_provider().into(),
            )
            .build()?;
            builder
                .with_client_cert_verifier(client_verifier)
                .with_single_cert(certs, key)?
        }
        None => builder.with_no_client_auth().with_single_cert(certs, key)?,
    };

    // One key log file for every connection accepted with this config.
    keylog.apply_to_server(&mut config)?;
    Ok(config)
}

async fn run_server(addr: SocketAddr, config: ServerConfig, tls_version: &str) -> Result<()> {
    let acceptor = TlsAcceptor::from(Arc::new(config));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, tls_version, "listening");

    loop {
        let (tcp, peer_addr) = listener.accept().await?;
        let acceptor = acceptor.clone();

        tokio::spawn(async move {
            let stream = match acceptor.accept(tcp).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(%peer_addr, error = %e, "accept error");
                    return;
                }
            };
            if let Err(e) = handle_connection(stream).await {
                warn!(%peer_addr, error = %e, "connection error");
            }
        });
    }
}

async fn handle_connection(mut stream: TlsStream<TcpStream>) -> Result<()> {
    let summary = SessionSummary::from_state(stream.get_ref().1);
    info!(
        version = ?summary.protocol_version,
        suite = ?summary.cipher_suite,
        "TLS connection established"
    );
    let mut buf = vec![0; 1024];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        print!("[Server] Received: {}", String::from_utf8_lossy(&buf[..n]));
        stream.write_all(&buf[..n]).await?;
    }
    Ok(())
}
