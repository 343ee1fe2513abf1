//! A bounded pool of tokio-postgres clients.
//!
//! Each client owns one connection, driven by a spawned task. A client goes
//! back to the pool only if it was released in a clean state; anything else
//! is dropped, which closes the connection and lets the server roll back
//! whatever was in flight.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_postgres::{Client, Config, NoTls};
use tokio_postgres_rustls::MakeRustlsConnect;

use crate::error::DriverError;

/// Sizing and recycling of pooled connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    pub max_connections: u32,
    /// Connections opened up front by [`crate::postgres::PostgresPool::connect`].
    pub min_connections: u32,
    /// Connections older than this are closed instead of reused.
    pub max_lifetime: Option<Duration>,
    /// Connections idle for longer than this are closed instead of reused.
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        PoolOptions {
            max_connections: 10,
            min_connections: 0,
            max_lifetime: None,
            idle_timeout: None,
        }
    }
}

/// Transport security for new connections.
#[derive(Clone)]
pub enum Tls {
    Disabled,
    /// Encrypt, without verifying the server certificate. This is what libpq
    /// calls `sslmode=require`.
    Required(MakeRustlsConnect),
}

impl Tls {
    pub fn required() -> Result<Tls, DriverError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(DriverError::connection)?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(EncryptOnly(provider)))
            .with_no_client_auth();
        Ok(Tls::Required(MakeRustlsConnect::new(config)))
    }
}

impl fmt::Debug for Tls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tls::Disabled => f.write_str("Disabled"),
            Tls::Required(_) => f.write_str("Required"),
        }
    }
}

/// Accepts any server certificate but still checks handshake signatures.
#[derive(Debug)]
struct EncryptOnly(Arc<CryptoProvider>);

impl ServerCertVerifier for EncryptOnly {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

struct Live {
    client: Client,
    opened: Instant,
}

struct Idle {
    live: Live,
    since: Instant,
}

pub(crate) struct Pool {
    config: Config,
    tls: Tls,
    options: PoolOptions,
    idle: Mutex<VecDeque<Idle>>,
    permits: Arc<Semaphore>,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("hosts", &self.config.get_hosts())
            .field("dbname", &self.config.get_dbname())
            .field("tls", &self.tls)
            .field("options", &self.options)
            .field("idle", &self.idle_count())
            .finish_non_exhaustive()
    }
}

impl Pool {
    pub(crate) fn new(config: Config, tls: Tls, options: PoolOptions) -> Pool {
        let permits = Arc::new(Semaphore::new(options.max_connections as usize));
        Pool {
            config,
            tls,
            options,
            idle: Mutex::new(VecDeque::new()),
            permits,
        }
    }

    /// Open `min_connections`, and at least one, so an unreachable server
    /// fails here rather than on first use.
    pub(crate) async fn fill(&self) -> Result<(), DriverError> {
        for _ in 0..self.options.min_connections.max(1) {
            let live = self.open().await?;
            self.release(live);
        }
        Ok(())
    }

    /// Check out a client, reusing an idle one when possible. Waits while
    /// `max_connections` clients are checked out.
    pub(crate) async fn acquire(self: &Arc<Self>) -> Result<PooledClient, DriverError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| DriverError::connection("connection pool is closed"))?;
        let live = match self.take_idle() {
            Some(live) => live,
            None => self.open().await?,
        };
        Ok(PooledClient {
            live: Some(live),
            pool: Arc::clone(self),
            clean: true,
            _permit: permit,
        })
    }

    pub(crate) fn close(&self) {
        self.permits.close();
        self.lock_idle().clear();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    pub(crate) fn idle_count(&self) -> usize {
        self.lock_idle().len()
    }

    async fn open(&self) -> Result<Live, DriverError> {
        let client = match &self.tls {
            Tls::Disabled => {
                let (client, connection) =
                    self.config.connect(NoTls).await.map_err(DriverError::connection)?;
                tokio::spawn(drive(connection));
                client
            }
            Tls::Required(tls) => {
                let (client, connection) = self
                    .config
                    .connect(tls.clone())
                    .await
                    .map_err(DriverError::connection)?;
                tokio::spawn(drive(connection));
                client
            }
        };
        tracing::debug!("opened database connection");
        Ok(Live {
            client,
            opened: Instant::now(),
        })
    }

    fn take_idle(&self) -> Option<Live> {
        let mut idle = self.lock_idle();
        while let Some(entry) = idle.pop_back() {
            if self.reusable(&entry) {
                return Some(entry.live);
            }
        }
        None
    }

    fn reusable(&self, entry: &Idle) -> bool {
        let young = self
            .options
            .max_lifetime
            .map_or(true, |max| entry.live.opened.elapsed() < max);
        let fresh = self
            .options
            .idle_timeout
            .map_or(true, |max| entry.since.elapsed() < max);
        young && fresh && !entry.live.client.is_closed()
    }

    fn release(&self, live: Live) {
        if self.is_closed() || live.client.is_closed() {
            return;
        }
        self.lock_idle().push_back(Idle {
            live,
            since: Instant::now(),
        });
    }

    fn lock_idle(&self) -> std::sync::MutexGuard<'_, VecDeque<Idle>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn drive<F>(connection: F)
where
    F: Future<Output = Result<(), tokio_postgres::Error>>,
{
    if let Err(error) = connection.await {
        tracing::warn!(%error, "database connection failed");
    }
}

/// A checked out client. Dropping it returns the client to the pool if it is
/// still marked clean.
pub(crate) struct PooledClient {
    live: Option<Live>,
    pool: Arc<Pool>,
    clean: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledClient {
    pub(crate) fn client(&self) -> Result<&Client, DriverError> {
        self.live
            .as_ref()
            .map(|live| &live.client)
            .ok_or(DriverError::TxClosed)
    }

    /// Mark whether the connection is between requests. A client dropped
    /// while dirty is closed instead of pooled.
    pub(crate) fn set_clean(&mut self, clean: bool) {
        self.clean = clean;
    }
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            if self.clean {
                self.pool.release(live);
            } else {
                tracing::debug!("discarding database connection in an unknown state");
            }
        }
    }
}
