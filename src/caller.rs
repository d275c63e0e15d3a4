//! Resolving services through the registry and invoking them.
//!
//! Every operation discovers the registry afresh and uses one TCP
//! connection per request. There are no retries and no timeouts beyond the
//! discovery wait, so a handler that never answers blocks its caller.

use std::collections::HashMap;
use std::net::SocketAddr;

use log::debug;
use tokio::net::TcpStream;
use tokio::sync::oneshot;

use crate::config::Config;
use crate::discovery::discover_registry;
use crate::error::{Error, Result};
use crate::rpc::codec;
use crate::rpc::registry::{
    control_response, lookup_response, ControlRequest, ControlResponse, Operation,
    ServiceEndpoint,
};
use crate::rpc::service::{CallEnvelope, ResultEnvelope};

#[derive(Debug, Clone, Default)]
pub struct Caller {
    config: Config,
}

impl Caller {
    pub fn new(config: Config) -> Self {
        Caller { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Invokes `name` with positional string arguments and returns its result.
    pub async fn call<I, S>(&self, name: &str, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let address = self.lookup_address(name).await?;
        let call = CallEnvelope::new(name, args);
        debug!("Calling {}({:?}) on {}", name, call.arguments, address);

        let mut stream = TcpStream::connect(address).await?;
        codec::write_frame(&mut stream, &call).await?;
        let result: ResultEnvelope = codec::read_frame(&mut stream).await?;

        Ok(result.result)
    }

    /// Starts `call` on a detached task. The returned handle can be polled
    /// or awaited later; dropping it does not cancel the call.
    pub fn spawn_call<I, S>(&self, name: &str, args: I) -> PendingCall
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (tx, rx) = oneshot::channel();
        let caller = self.clone();
        let name = name.to_owned();
        let args: Vec<String> = args.into_iter().map(Into::into).collect();

        let service = name.clone();
        tokio::spawn(async move {
            let result = caller.call(&service, args).await;
            let _ = tx.send(result);
        });

        PendingCall { name, rx: Some(rx) }
    }

    pub async fn lookup_address(&self, name: &str) -> Result<SocketAddr> {
        let outcome = self
            .lookup(Operation::Address, name)
            .await
            .map_err(|err| match err {
                Error::Decode(msg) => Error::ServiceNotFound(format!("{}: {}", name, msg)),
                err => err,
            })?;

        match outcome {
            lookup_response::Outcome::Address(address) => address
                .parse::<SocketAddr>()
                .map_err(|_| Error::ServiceNotFound(format!("{}: bad address {:?}", name, address))),
            lookup_response::Outcome::NotFound(_) => Err(Error::ServiceNotFound(name.to_owned())),
            other => Err(Error::Internal(format!("unexpected lookup outcome {:?}", other))),
        }
    }

    /// Address and contract registered under `name`.
    pub async fn get_service_info(&self, name: &str) -> Result<ServiceEndpoint> {
        match self.lookup(Operation::Info, name).await? {
            lookup_response::Outcome::Endpoint(endpoint) => Ok(endpoint),
            lookup_response::Outcome::NotFound(_) => Err(Error::ServiceNotFound(name.to_owned())),
            other => Err(Error::Internal(format!("unexpected lookup outcome {:?}", other))),
        }
    }

    pub async fn list_services(&self) -> Result<HashMap<String, ServiceEndpoint>> {
        match self.lookup(Operation::List, "").await? {
            lookup_response::Outcome::Listing(listing) => Ok(listing.services),
            other => Err(Error::Internal(format!("unexpected lookup outcome {:?}", other))),
        }
    }

    async fn lookup(&self, operation: Operation, name: &str) -> Result<lookup_response::Outcome> {
        let registry = discover_registry(&self.config).await?;
        let mut stream = TcpStream::connect(registry).await?;
        codec::write_frame(&mut stream, &ControlRequest::lookup(operation, name)).await?;
        let response: ControlResponse = codec::read_frame(&mut stream).await?;

        match response.reply {
            Some(control_response::Reply::Lookup(lookup)) => lookup
                .outcome
                .ok_or_else(|| Error::Decode("lookup reply without an outcome".into())),
            other => Err(Error::Decode(format!("unexpected registry reply {:?}", other))),
        }
    }
}

/// A call running on its own task, started with [`Caller::spawn_call`].
///
/// Used for fire-and-forget composition: a handler can start chained work
/// and reply immediately. That reply says nothing about whether the chained
/// work has finished.
#[derive(Debug)]
pub struct PendingCall {
    name: String,
    rx: Option<oneshot::Receiver<Result<String>>>,
}

impl PendingCall {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the outcome once the call has finished, without waiting.
    /// Yields `None` while it is still running and after the outcome has
    /// been taken.
    pub fn try_result(&mut self) -> Option<Result<String>> {
        let rx = self.rx.as_mut()?;
        let outcome = match rx.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Empty) => return None,
            Err(oneshot::error::TryRecvError::Closed) => Err(self.abandoned()),
        };
        self.rx = None;
        Some(outcome)
    }

    pub async fn wait(mut self) -> Result<String> {
        match self.rx.take() {
            Some(rx) => rx.await.map_err(|_| self.abandoned())?,
            None => Err(Error::Internal(format!(
                "result of {} was already taken",
                self.name
            ))),
        }
    }

    fn abandoned(&self) -> Error {
        Error::Internal(format!("call to {} ended without a result", self.name))
    }
}
