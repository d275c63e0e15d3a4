use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_stream::wrappers::TcpListenerStream;

use crate::config::Config;
use crate::discovery::discover_registry;
use crate::error::{Error, Result};
use crate::listener::next_connection;
use crate::rpc::codec;
use crate::rpc::registry::{control_response, ControlRequest, ControlResponse, ServiceEndpoint};
use crate::rpc::service::{CallEnvelope, ResultEnvelope, ServiceContract};

/// A service that has registered with the registry and owns the listener its
/// calls arrive on.
#[derive(Debug)]
pub struct ServiceRuntime {
    contract: ServiceContract,
    listener: TcpListener,
    address: String,
    limiter: Arc<Semaphore>,
}

impl ServiceRuntime {
    /// Finds the registry, opens a call listener on an ephemeral port and
    /// registers `contract` with that port. Returns once the registry has
    /// stored the endpoint.
    pub async fn register(config: &Config, contract: ServiceContract) -> Result<Self> {
        let registry = discover_registry(config).await?;
        let mut control = TcpStream::connect(registry).await?;
        let listener = TcpListener::bind((config.bind_host, 0)).await?;
        let port = listener.local_addr()?.port();

        info!("Registering {} with registry {}", contract.name, registry);
        let request = ControlRequest::register(ServiceEndpoint::new(
            port.to_string(),
            contract.clone(),
        ));
        codec::write_frame(&mut control, &request).await?;

        let response: ControlResponse = codec::read_frame(&mut control).await?;
        let address = match response.reply {
            Some(control_response::Reply::Registered(endpoint)) => endpoint.address,
            other => {
                return Err(Error::Internal(format!(
                    "unexpected registration reply: {:?}",
                    other
                )))
            }
        };
        info!("Registered {} as {}", contract.name, address);

        Ok(ServiceRuntime {
            contract,
            listener,
            address,
            limiter: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    pub fn contract(&self) -> &ServiceContract {
        &self.contract
    }

    /// Address as recorded by the registry.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts calls forever, each on its own task. A failed connection is
    /// logged and does not affect the others.
    pub async fn run<H, Fut>(self, handler: H) -> Result<()>
    where
        H: Fn(CallEnvelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let mut incoming = TcpListenerStream::new(self.listener);

        loop {
            let permit = self.limiter.clone().acquire_owned().await?;
            let stream = match next_connection(&mut incoming, &self.contract.name).await {
                Some(stream) => stream,
                None => return Ok(()),
            };

            let handler = handler.clone();
            let name = self.contract.name.clone();
            tokio::spawn(async move {
                if let Err(err) = Self::handle_call(stream, handler.as_ref()).await {
                    warn!("{}: call failed: {}", name, err);
                }
                drop(permit);
            });
        }
    }

    async fn handle_call<H, Fut>(mut stream: TcpStream, handler: &H) -> Result<()>
    where
        H: Fn(CallEnvelope) -> Fut,
        Fut: Future<Output = String>,
    {
        let call: CallEnvelope = codec::read_frame(&mut stream).await?;
        debug!("Call {}({:?})", call.service_name, call.arguments);

        let result = handler(call).await;
        codec::write_frame(&mut stream, &ResultEnvelope { result }).await
    }
}

/// Registers `contract` and serves calls with `handler` until a fatal error.
pub async fn serve<H, Fut>(config: &Config, contract: ServiceContract, handler: H) -> Result<()>
where
    H: Fn(CallEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = String> + Send + 'static,
{
    ServiceRuntime::register(config, contract).await?.run(handler).await
}
