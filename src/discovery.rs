//! Multicast discovery of the registry's control address.
//!
//! A process that needs the registry sends a small datagram to the multicast
//! group and, as a fallback for hosts with multicast loopback disabled, to the
//! same port on 127.0.0.1. The registry's [`Responder`] answers each datagram
//! with the address of its control listener.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use log::{debug, info, warn};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::config::{Config, MAX_FRAME_SIZE, REGISTRY_SERVICE_NAME};
use crate::error::{Error, Result};
use crate::rpc::codec;
use crate::rpc::registry::{lookup_response, LookupRequest, LookupResponse, Operation};

/// Finds the registry's control address. Runs a fresh handshake on every
/// call; nothing is cached.
pub async fn discover_registry(config: &Config) -> Result<SocketAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    let request = codec::encode(&LookupRequest::new(
        Operation::Address,
        REGISTRY_SERVICE_NAME,
    ))?;

    let group = SocketAddrV4::new(config.multicast_group, config.discovery_port);
    if let Err(err) = socket.send_to(&request, group).await {
        // Hosts without a multicast route can still reach a local registry.
        warn!("Discovery multicast to {} failed: {}", group, err);
    }
    let loopback = SocketAddrV4::new(Ipv4Addr::LOCALHOST, config.discovery_port);
    socket.send_to(&request, loopback).await?;

    let mut buf = vec![0u8; MAX_FRAME_SIZE];
    let (len, sender) = timeout(config.discovery_timeout, socket.recv_from(&mut buf))
        .await
        .map_err(|_| {
            Error::RegistryUnavailable(format!(
                "no reply on port {} within {:?}",
                config.discovery_port, config.discovery_timeout
            ))
        })??;

    let response: LookupResponse = codec::decode(&buf[..len]).map_err(|err| {
        Error::RegistryUnavailable(format!("malformed reply from {}: {}", sender, err))
    })?;

    let advertised = match response.outcome {
        Some(lookup_response::Outcome::Address(address)) => address,
        other => {
            return Err(Error::RegistryUnavailable(format!(
                "unexpected reply from {}: {:?}",
                sender, other
            )))
        }
    };
    let advertised = advertised.parse::<SocketAddr>().map_err(|err| {
        Error::RegistryUnavailable(format!("bad address {:?} from {}: {}", advertised, sender, err))
    })?;

    // The registry advertises its listener as bound, which may be the
    // unspecified address; the reply's source IP is the reachable one.
    let registry = SocketAddr::new(sender.ip(), advertised.port());
    debug!("Discovered registry at {}", registry);
    Ok(registry)
}

/// Registry side of discovery.
#[derive(Debug)]
pub struct Responder {
    socket: UdpSocket,
}

impl Responder {
    /// Binds the discovery port on all interfaces and joins the multicast
    /// group. Failing to join is logged only, since loopback requests are
    /// still answered.
    pub async fn bind(config: &Config) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, config.discovery_port)).await?;
        if let Err(err) = socket.join_multicast_v4(config.multicast_group, Ipv4Addr::UNSPECIFIED) {
            warn!(
                "Could not join multicast group {}: {}",
                config.multicast_group, err
            );
        }
        Ok(Responder { socket })
    }

    /// Answers every inbound datagram with `control_addr`. The request
    /// payload is not inspected.
    pub async fn run(self, control_addr: SocketAddr) -> Result<()> {
        let reply = codec::encode(&LookupResponse::address(control_addr.to_string()))?;
        let mut buf = vec![0u8; MAX_FRAME_SIZE];

        info!(
            "Answering discovery on {} with {}",
            self.socket.local_addr()?,
            control_addr
        );
        loop {
            let sender = match self.socket.recv_from(&mut buf).await {
                Ok((_, sender)) => sender,
                Err(err) => {
                    warn!("Discovery receive failed: {}", err);
                    continue;
                }
            };
            debug!("Discovery request from {}", sender);
            if let Err(err) = self.socket.send_to(&reply, sender).await {
                warn!("Discovery reply to {} failed: {}", sender, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_discover_without_registry_times_out() {
        let config = Config::default()
            .with_discovery_port(47311)
            .with_discovery_timeout(Duration::from_millis(300));

        let started = Instant::now();
        let result = discover_registry(&config).await;

        assert!(matches!(result, Err(Error::RegistryUnavailable(_))));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_discover_local_responder() -> Result<()> {
        let config = Config::default().with_discovery_port(47312);
        let responder = Responder::bind(&config).await?;
        let control: SocketAddr = "0.0.0.0:47999".parse()?;
        tokio::spawn(responder.run(control));

        let registry = discover_registry(&config).await?;
        assert_eq!(registry.port(), 47999);
        assert!(!registry.ip().is_unspecified());
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_reply_is_unavailable() -> Result<()> {
        let config = Config::default().with_discovery_port(47313);
        let fake = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, config.discovery_port)).await?;
        tokio::spawn(async move {
            let mut buf = vec![0u8; 64];
            if let Ok((_, sender)) = fake.recv_from(&mut buf).await {
                let _ = fake.send_to(&[0xff, 0xff, 0xff], sender).await;
            }
        });

        let result = discover_registry(&config).await;
        assert!(matches!(result, Err(Error::RegistryUnavailable(_))));
        Ok(())
    }
}
