//! Multi-listener relay built from [`RelayConfig`].
//!
//! Every listener shares one key and one metrics instance. Listeners run
//! concurrently; the relay stops when the shutdown token is cancelled or
//! when any listener hits a fatal error.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::try_join_all;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, Instrument};

use crate::config::{ListenerAction, ListenerConfig, RelayConfig};
use crate::error::{ProtocolError, Result};
use crate::protocol::handler::RequestHandler;
use crate::protocol::processor::{DiscardProcessor, EchoProcessor, ForwardProcessor, Processor};
use crate::transport::udp::{self, ServeOptions};
use crate::utils::crypto::Crypto;
use crate::utils::metrics::{global_metrics, Metrics};

/// Processor selected by a listener's configured action.
#[derive(Debug)]
pub enum ListenerProcessor {
    Echo(EchoProcessor),
    Forward(ForwardProcessor),
    Discard(DiscardProcessor),
}

impl Processor for ListenerProcessor {
    fn process(&self, plaintext: &[u8], peer: SocketAddr) -> Option<Vec<u8>> {
        match self {
            ListenerProcessor::Echo(p) => p.process(plaintext, peer),
            ListenerProcessor::Forward(p) => p.process(plaintext, peer),
            ListenerProcessor::Discard(p) => p.process(plaintext, peer),
        }
    }
}

/// Validated relay, ready to bind.
#[derive(Debug)]
pub struct Relay {
    crypto: Arc<Crypto>,
    listeners: Vec<ListenerConfig>,
    options: ServeOptions,
    metrics: Arc<Metrics>,
    log_plaintext: bool,
}

impl Relay {
    /// Validate `config` and decode its key. Any error here is fatal.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        config.validate_strict()?;
        let key = config.server.symmetric_key()?;

        Ok(Self {
            crypto: Arc::new(Crypto::new(&key)),
            listeners: config.listeners.clone(),
            options: ServeOptions::from(&config.server),
            metrics: global_metrics(),
            log_plaintext: config.logging.log_plaintext,
        })
    }

    /// Record into `metrics` instead of the process-wide instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Bind every listener socket and prepare its processor.
    pub async fn bind(self) -> Result<BoundRelay> {
        let mut bound = Vec::with_capacity(self.listeners.len());

        for listener in &self.listeners {
            let addr = parse_addr(&listener.bind, "bind")?;
            let socket = Arc::new(udp::bind(addr).await?);

            let processor = match &listener.action {
                ListenerAction::Echo => ListenerProcessor::Echo(EchoProcessor),
                ListenerAction::Discard => ListenerProcessor::Discard(DiscardProcessor),
                ListenerAction::Forward { address } => {
                    let forwarder =
                        ForwardProcessor::connect(address, self.metrics.clone()).await?;
                    info!(
                        bind = %listener.bind,
                        forward = %address,
                        resolved = %forwarder.destination(),
                        "Forwarding authenticated messages"
                    );
                    ListenerProcessor::Forward(forwarder)
                }
            };

            let handler = RequestHandler::new(self.crypto.clone(), processor)
                .with_metrics(self.metrics.clone())
                .with_plaintext_logging(self.log_plaintext);

            bound.push(BoundListener {
                socket,
                handler: Arc::new(handler),
            });
        }

        Ok(BoundRelay {
            listeners: bound,
            options: self.options,
            metrics: self.metrics,
        })
    }
}

fn parse_addr(value: &str, what: &str) -> Result<SocketAddr> {
    value
        .parse()
        .map_err(|_| ProtocolError::ConfigError(format!("Invalid {what} address: '{value}'")))
}

struct BoundListener {
    socket: Arc<UdpSocket>,
    handler: Arc<RequestHandler<ListenerProcessor>>,
}

/// Relay with all sockets bound.
pub struct BoundRelay {
    listeners: Vec<BoundListener>,
    options: ServeOptions,
    metrics: Arc<Metrics>,
}

impl BoundRelay {
    /// Local address of each listener, in configuration order.
    pub fn local_addrs(&self) -> Result<Vec<SocketAddr>> {
        self.listeners
            .iter()
            .map(|l| Ok(l.socket.local_addr()?))
            .collect()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Serve every listener until `shutdown` is cancelled.
    #[instrument(skip_all, fields(listeners = self.listeners.len()))]
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let local_addrs = self.local_addrs()?;
        let serving = self
            .listeners
            .into_iter()
            .zip(local_addrs)
            .map(|(listener, local)| {
                let shutdown = shutdown.clone();
                let options = self.options.clone();
                async move {
                    let result =
                        udp::serve(listener.socket, listener.handler, options, shutdown.clone())
                            .await;
                    if let Err(ref e) = result {
                        error!(%local, error = %e, "Listener failed");
                        shutdown.cancel();
                    }
                    result
                }
                .instrument(tracing::info_span!("listener", %local))
            });

        let result = try_join_all(serving).await.map(|_| ());
        self.metrics.log_metrics();
        result
    }

    /// Serve until Ctrl-C.
    pub async fn run_until_ctrl_c(self) -> Result<()> {
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
                trigger.cancel();
            }
        });

        self.run(shutdown).await
    }
}
