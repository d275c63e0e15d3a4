use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_stream::wrappers::TcpListenerStream;

use crate::config::Config;
use crate::discovery::Responder;
use crate::error::{Error, Result};
use crate::listener::next_connection;
use crate::rpc::codec;
use crate::rpc::registry::{
    control_request, ControlRequest, ControlResponse, LookupRequest, LookupResponse, Operation,
    ServiceEndpoint,
};

use super::store::Store;

#[derive(Debug)]
pub struct RegistryService {
    config: Config,
    store: Arc<Store>,
}

impl RegistryService {
    pub fn new(config: Config) -> Self {
        Self::with_store(config, Arc::new(Store::new()))
    }

    pub fn with_store(config: Config, store: Arc<Store>) -> Self {
        RegistryService { config, store }
    }

    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    /// Opens the control listener on an ephemeral port and the discovery
    /// responder on the configured one.
    pub async fn bind(self) -> Result<RegistryServer> {
        let listener = TcpListener::bind((self.config.bind_host, 0)).await?;
        let responder = Responder::bind(&self.config).await?;
        let control_addr = listener.local_addr()?;
        info!("Registry control port listening on {}", control_addr);

        Ok(RegistryServer {
            control_addr,
            listener,
            responder,
            limiter: Arc::new(Semaphore::new(self.config.max_connections)),
            store: self.store,
        })
    }

    /// Serves one control connection: a single request, at most one reply.
    pub async fn handle_connection(
        store: &Store,
        mut stream: TcpStream,
        peer: SocketAddr,
    ) -> Result<()> {
        let request: ControlRequest = codec::read_frame(&mut stream).await?;

        let response = match request.kind {
            Some(control_request::Kind::Register(endpoint)) => {
                let endpoint = Self::register(store, endpoint, peer).await?;
                ControlResponse::registered(endpoint)
            }
            Some(control_request::Kind::Lookup(lookup)) => {
                ControlResponse::lookup(Self::lookup(store, lookup).await?)
            }
            None => return Err(Error::Decode("control request without a kind".into())),
        };

        codec::write_frame(&mut stream, &response).await
    }

    /// Stores `endpoint` under its contract name. The claimed port is
    /// combined with the IP the connection came from.
    async fn register(
        store: &Store,
        mut endpoint: ServiceEndpoint,
        peer: SocketAddr,
    ) -> Result<ServiceEndpoint> {
        if endpoint.address.is_empty() {
            return Err(Error::Decode("registration without a claimed port".into()));
        }
        let name = match endpoint.name() {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => return Err(Error::Decode("registration without a service name".into())),
        };

        let port: u16 = endpoint.address.trim().parse()?;
        endpoint.address = SocketAddr::new(peer.ip(), port).to_string();

        info!("Registering {} on address {}", name, endpoint.address);
        if let Some(previous) = store.put(&name, endpoint.clone()).await {
            info!("Replaced {} previously on {}", name, previous.address);
        }

        Ok(endpoint)
    }

    async fn lookup(store: &Store, lookup: LookupRequest) -> Result<LookupResponse> {
        let operation = Operation::from_i32(lookup.operation);
        let name = lookup.service_name;
        debug!("Lookup {:?} for {:?}", operation, name);

        let response = match operation {
            Some(Operation::Address) => match store.get(&name).await {
                Some(endpoint) => LookupResponse::address(endpoint.address),
                None => LookupResponse::not_found(name),
            },
            Some(Operation::Info) => match store.get(&name).await {
                Some(endpoint) => LookupResponse::endpoint(endpoint),
                None => LookupResponse::not_found(name),
            },
            Some(Operation::List) => LookupResponse::listing(store.list().await),
            Some(Operation::Unspecified) | None => {
                return Err(Error::Decode(format!(
                    "unknown lookup operation {}",
                    lookup.operation
                )))
            }
        };

        Ok(response)
    }
}

/// A bound registry, ready to [`run`](RegistryServer::run).
#[derive(Debug)]
pub struct RegistryServer {
    control_addr: SocketAddr,
    listener: TcpListener,
    responder: Responder,
    limiter: Arc<Semaphore>,
    store: Arc<Store>,
}

impl RegistryServer {
    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    /// Answers discovery and serves control connections until the process
    /// exits. Failures on a single connection are logged and do not stop
    /// the loop.
    pub async fn run(self) -> Result<()> {
        let responder = self.responder;
        let control_addr = self.control_addr;
        tokio::spawn(async move {
            if let Err(err) = responder.run(control_addr).await {
                warn!("Discovery responder stopped: {}", err);
            }
        });

        let mut incoming = TcpListenerStream::new(self.listener);
        loop {
            let permit = self.limiter.clone().acquire_owned().await?;
            let stream = match next_connection(&mut incoming, "control port").await {
                Some(stream) => stream,
                None => return Ok(()),
            };

            let store = self.store.clone();
            tokio::spawn(async move {
                let peer = match stream.peer_addr() {
                    Ok(peer) => peer,
                    Err(err) => {
                        warn!("Dropping control connection without peer: {}", err);
                        return;
                    }
                };
                if let Err(err) = RegistryService::handle_connection(&store, stream, peer).await {
                    warn!("Control connection from {} failed: {}", peer, err);
                }
                drop(permit);
            });
        }
    }
}
