//! Connection orchestration: TLS setup, multi-port retry, session driving.

use std::fs::File;
use std::io::BufReader;
use std::net::TcpStream;
use std::panic;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConnection, RootCertStore, StreamOwned};
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::protocol::Session;
use crate::solver::PowSolverBuilder;
use crate::transport::TlsTransport;

/// Connection attempts before giving up; ports are tried round-robin.
const MAX_ATTEMPTS: u32 = 10;
const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Challenge-server client tying configuration, TLS, and the protocol
/// session together.
pub struct Client {
    config: ClientConfig,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Connect, run the challenge dialogue to completion, and disconnect.
    ///
    /// The transport is closed with a close-notify on every exit path,
    /// including a panic unwinding out of the session.
    pub fn run(&self) -> Result<(), ClientError> {
        let transport = self.connect()?;
        let solver = PowSolverBuilder::default().build_validated()?;
        let mut session = Session::new(transport, self.config.identity.clone(), solver);
        let result = panic::catch_unwind(panic::AssertUnwindSafe(|| session.run()));
        let mut transport = session.into_inner();
        transport.close();
        info!("client disconnected");
        match result {
            Ok(outcome) => outcome.map_err(ClientError::from),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Establish a verified TLS stream, retrying across the configured
    /// ports with a fixed delay between attempts.
    fn connect(&self) -> Result<TlsTransport, ClientError> {
        let tls_config = Arc::new(self.build_tls_config()?);
        let server_name = self.server_name()?;

        let mut last_error = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            let port = self.config.ports[(attempt as usize - 1) % self.config.ports.len()];
            match self.try_connect(&tls_config, server_name.clone(), port) {
                Ok(transport) => {
                    info!(
                        port,
                        attempt,
                        cipher = transport.cipher().as_deref().unwrap_or("unknown"),
                        "connected to server"
                    );
                    return Ok(transport);
                }
                Err(err) => {
                    last_error = err.to_string();
                    if attempt < MAX_ATTEMPTS {
                        warn!(port, attempt, error = %last_error, "connect attempt failed, retrying");
                        thread::sleep(RETRY_DELAY);
                    }
                }
            }
        }

        Err(ClientError::ConnectFailed {
            attempts: MAX_ATTEMPTS,
            last: last_error,
        })
    }

    fn try_connect(
        &self,
        tls_config: &Arc<rustls::ClientConfig>,
        server_name: ServerName<'static>,
        port: u16,
    ) -> Result<TlsTransport, ClientError> {
        let tcp = TcpStream::connect((self.config.address.as_str(), port))?;
        let conn = ClientConnection::new(tls_config.clone(), server_name)?;
        let mut stream = StreamOwned::new(conn, tcp);

        // Drive the handshake eagerly so certificate problems surface here
        // instead of on the first protocol read.
        while stream.conn.is_handshaking() {
            stream.conn.complete_io(&mut stream.sock)?;
        }

        Ok(TlsTransport::new(stream))
    }

    fn build_tls_config(&self) -> Result<rustls::ClientConfig, ClientError> {
        let mut roots = RootCertStore::empty();
        for cert in load_certs(&self.config.ca_cert)? {
            roots.add(cert)?;
        }

        let builder = rustls::ClientConfig::builder().with_root_certificates(roots);
        let tls_config = match (&self.config.client_cert, &self.config.client_key) {
            (Some(cert_path), Some(key_path)) => {
                let certs = load_certs(cert_path)?;
                let key = load_key(key_path)?;
                builder.with_client_auth_cert(certs, key)?
            }
            _ => builder.with_no_client_auth(),
        };
        Ok(tls_config)
    }

    fn server_name(&self) -> Result<ServerName<'static>, ClientError> {
        let name = self
            .config
            .server_name
            .clone()
            .unwrap_or_else(|| self.config.address.clone());
        ServerName::try_from(name.clone()).map_err(|_| ClientError::InvalidServerName(name))
    }
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, ClientError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    Ok(certs)
}

fn load_key(path: &str) -> Result<PrivateKeyDer<'static>, ClientError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| ClientError::NoPrivateKey(path.to_owned()))
}
