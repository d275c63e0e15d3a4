//! Encoding and framing of wire messages.
//!
//! On TCP every message is sent as a 4-byte big-endian length followed by
//! the encoded body. UDP datagrams carry the bare body. Either way a body is
//! never larger than [`MAX_FRAME_SIZE`].

use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::MAX_FRAME_SIZE;
use crate::error::{Error, Result};

pub fn encode<M: Message>(message: &M) -> Result<Vec<u8>> {
    let len = message.encoded_len();
    if len > MAX_FRAME_SIZE {
        return Err(Error::Oversize(len));
    }
    Ok(message.encode_to_vec())
}

pub fn decode<M: Message + Default>(buf: &[u8]) -> Result<M> {
    if buf.len() > MAX_FRAME_SIZE {
        return Err(Error::Oversize(buf.len()));
    }
    Ok(M::decode(buf)?)
}

pub async fn write_frame<W, M>(writer: &mut W, message: &M) -> Result<()>
where
    W: AsyncWrite + Unpin,
    M: Message,
{
    let body = encode(message)?;
    writer.write_u32(body.len() as u32).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R, M>(reader: &mut R) -> Result<M>
where
    R: AsyncRead + Unpin,
    M: Message + Default,
{
    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_SIZE {
        return Err(Error::Oversize(len));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    decode(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::registry::{
        control_request, lookup_response, ControlRequest, LookupResponse, Operation,
        ServiceEndpoint,
    };
    use crate::rpc::service::{CallEnvelope, ResultEnvelope, ServiceContract};
    use std::collections::HashMap;

    fn contract() -> ServiceContract {
        ServiceContract::new("isprime", "bool", "Checks whether x is prime.")
            .with_argument("x", "int", "number to test")
    }

    #[test]
    fn test_empty_fields_survive() -> Result<()> {
        let call = CallEnvelope::new("", Vec::<String>::new());
        let decoded: CallEnvelope = decode(&encode(&call)?)?;
        assert_eq!(decoded, call);

        let call = CallEnvelope::new("concat", ["", "b", ""]);
        let decoded: CallEnvelope = decode(&encode(&call)?)?;
        assert_eq!(decoded.arguments, vec!["", "b", ""]);

        let result = ResultEnvelope { result: String::new() };
        let decoded: ResultEnvelope = decode(&encode(&result)?)?;
        assert_eq!(decoded, result);
        Ok(())
    }

    #[test]
    fn test_listing_survives() -> Result<()> {
        let mut services = HashMap::new();
        services.insert(
            "isprime".to_owned(),
            ServiceEndpoint::new("10.0.0.7:4100", contract()),
        );
        services.insert(
            "random".to_owned(),
            ServiceEndpoint::new(
                "10.0.0.8:4200",
                ServiceContract::new("random", "int", "").with_void_argument(),
            ),
        );
        let response = LookupResponse::listing(services.clone());

        let decoded: LookupResponse = decode(&encode(&response)?)?;
        match decoded.outcome {
            Some(lookup_response::Outcome::Listing(listing)) => {
                assert_eq!(listing.services, services)
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_control_request_keeps_kind() -> Result<()> {
        let request = ControlRequest::lookup(Operation::Info, "isprime");
        let decoded: ControlRequest = decode(&encode(&request)?)?;
        match decoded.kind {
            Some(control_request::Kind::Lookup(lookup)) => {
                assert_eq!(lookup.operation(), Operation::Info);
                assert_eq!(lookup.service_name, "isprime");
            }
            other => panic!("unexpected kind {:?}", other),
        }

        let request = ControlRequest::register(ServiceEndpoint::new("4100", contract()));
        let decoded: ControlRequest = decode(&encode(&request)?)?;
        assert_eq!(decoded, request);
        Ok(())
    }

    #[test]
    fn test_truncated_buffer_fails() -> Result<()> {
        let request = ControlRequest::register(ServiceEndpoint::new("4100", contract()));
        let bytes = encode(&request)?;
        let truncated = &bytes[..bytes.len() - 3];

        let decoded: Result<ControlRequest> = decode(truncated);
        assert!(matches!(decoded, Err(Error::Decode(_))));
        Ok(())
    }

    #[test]
    fn test_oversize_encode_fails() {
        let call = CallEnvelope::new("echo", ["x".repeat(MAX_FRAME_SIZE)]);
        assert!(matches!(encode(&call), Err(Error::Oversize(_))));
    }

    #[tokio::test]
    async fn test_frame_over_stream() -> Result<()> {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let call = CallEnvelope::new("double", ["21"]);

        let writer = tokio::spawn(async move { write_frame(&mut client, &call).await });
        let received: CallEnvelope = read_frame(&mut server).await?;
        writer.await.unwrap()?;

        assert_eq!(received.service_name, "double");
        assert_eq!(received.arguments, vec!["21"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_oversize_frame_header_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_u32(MAX_FRAME_SIZE as u32 + 1).await.unwrap();

        let received: Result<CallEnvelope> = read_frame(&mut server).await;
        assert!(matches!(received, Err(Error::Oversize(_))));
    }

    #[tokio::test]
    async fn test_short_frame_is_connection_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_u32(10).await.unwrap();
        client.write_all(b"abc").await.unwrap();
        drop(client);

        let received: Result<CallEnvelope> = read_frame(&mut server).await;
        assert!(matches!(received, Err(Error::Connection(_))));
    }

    #[test]
    fn test_field_names_stay_off_the_wire() -> Result<()> {
        let bytes = encode(&ServiceEndpoint::new("10.0.0.7:4100", contract()))?;
        for name in ["address", "contract", "result_type", "type_tag", "arguments"] {
            assert!(
                !bytes.windows(name.len()).any(|w| w == name.as_bytes()),
                "{} found in encoded endpoint",
                name
            );
        }
        Ok(())
    }
}
