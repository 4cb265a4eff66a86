//! TLS client setup for the Mind connection.
//!
//! The service is reached over TLS only. Trust anchors come from a PEM
//! bundle shipped next to the client; when that bundle also carries a
//! private key, its certificate chain is presented as the client identity.
use std::{
    fs,
    net::{TcpStream, ToSocketAddrs},
    path::Path,
    sync::Arc,
};

use log::{debug, info};
use rustls::{
    ClientConfig, ClientConnection, RootCertStore, StreamOwned,
    pki_types::{CertificateDer, PrivateKeyDer, ServerName, pem::PemObject},
};

use crate::{MindConfig, protocol::TransportError};

pub type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// Builds a client configuration from the PEM bytes of a certificate bundle.
pub fn client_config(pem: &[u8]) -> Result<ClientConfig, TransportError> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TransportError::Tls(format!("failed to parse certificates: {e}")))?;
    if certs.is_empty() {
        return Err(TransportError::Tls("no certificates found in bundle".into()));
    }

    let mut roots = RootCertStore::empty();
    for cert in &certs {
        roots
            .add(cert.clone())
            .map_err(|e| TransportError::Tls(format!("failed to add trust anchor: {e}")))?;
    }

    let builder = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| TransportError::Tls(e.to_string()))?
    .with_root_certificates(roots);

    let config = match PrivateKeyDer::from_pem_slice(pem) {
        Ok(key) => {
            debug!("presenting bundled client certificate");
            builder
                .with_client_auth_cert(certs, key)
                .map_err(|e| TransportError::Tls(format!("client identity rejected: {e}")))?
        }
        Err(_) => builder.with_no_client_auth(),
    };
    Ok(config)
}

pub fn load_client_config(path: &Path) -> Result<ClientConfig, TransportError> {
    let pem = fs::read(path).map_err(|e| {
        TransportError::Tls(format!("failed to read {}: {e}", path.display()))
    })?;
    client_config(&pem)
}

/// Opens a TCP connection and completes the TLS handshake before returning.
pub fn connect(config: &MindConfig) -> Result<TlsStream, TransportError> {
    let tls = Arc::new(load_client_config(&config.cert_path)?);
    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|e| TransportError::Tls(format!("invalid server name: {e}")))?;

    let addr = (config.host.as_str(), config.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no address for {}", config.host),
            )
        })?;

    info!("connecting to {}:{} ({addr})", config.host, config.port);
    let mut socket = TcpStream::connect_timeout(&addr, config.connect_timeout)?;
    socket.set_read_timeout(Some(config.read_timeout))?;
    socket.set_write_timeout(Some(config.read_timeout))?;
    socket.set_nodelay(true)?;

    let mut conn = ClientConnection::new(tls, server_name)
        .map_err(|e| TransportError::Tls(e.to_string()))?;
    while conn.is_handshaking() {
        conn.complete_io(&mut socket).map_err(|e| match e.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
                TransportError::Timeout
            }
            _ => TransportError::Tls(format!("handshake failed: {e}")),
        })?;
    }
    debug!("TLS handshake complete");

    Ok(StreamOwned::new(conn, socket))
}
