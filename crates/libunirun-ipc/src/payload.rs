//! Payload wire format
//!
//! One JSON object per connection: `{"command_line_arguments": [...]}`. The
//! sender half-closes after writing, so the reader simply reads to EOF. There
//! is no length prefix and no version field.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::IpcError;

/// Arguments forwarded from a follower launch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Raw argument vector of the follower, argv[0] included
    pub command_line_arguments: Vec<String>,
}

impl Payload {
    pub fn new(args: Vec<String>) -> Self {
        Self {
            command_line_arguments: args,
        }
    }

    /// Arguments of the current process; non-UTF-8 arguments are converted lossily
    pub fn from_env() -> Self {
        Self::new(
            std::env::args_os()
                .map(|a| a.to_string_lossy().into_owned())
                .collect(),
        )
    }

    pub fn args(&self) -> &[String] {
        &self.command_line_arguments
    }

    pub fn into_args(self) -> Vec<String> {
        self.command_line_arguments
    }

    pub fn encode(&self) -> Result<Vec<u8>, IpcError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, IpcError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Write one payload and close our write half
pub async fn write_payload<W>(writer: &mut W, payload: &Payload) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = payload.encode()?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    writer.shutdown().await?;
    Ok(())
}

/// Read one payload up to EOF, bounded in size and time
pub async fn read_payload<R>(
    reader: R,
    max_bytes: usize,
    timeout: Duration,
) -> Result<Payload, IpcError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut limited = reader.take(max_bytes as u64 + 1);

    tokio::time::timeout(timeout, limited.read_to_end(&mut buf))
        .await
        .map_err(|_| IpcError::Timeout(timeout.as_millis() as u64))??;

    if buf.len() > max_bytes {
        return Err(IpcError::PayloadTooLarge { limit: max_bytes });
    }
    Payload::decode(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let payload = Payload::new(vec!["app".to_string(), "--file".to_string()]);
        let json = String::from_utf8(payload.encode().unwrap()).unwrap();
        assert_eq!(json, r#"{"command_line_arguments":["app","--file"]}"#);
    }

    #[test]
    fn test_awkward_arguments_survive() {
        let args = vec![
            String::new(),
            "with space".to_string(),
            "quote\"and\\slash".to_string(),
            "日本語 ünïcödé 🚀".to_string(),
            "line\nbreak".to_string(),
        ];
        let payload = Payload::new(args.clone());
        let decoded = Payload::decode(&payload.encode().unwrap()).unwrap();
        assert_eq!(decoded.into_args(), args);
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(matches!(
            Payload::decode(b"not json"),
            Err(IpcError::Json(_))
        ));
        assert!(matches!(
            Payload::decode(br#"{"command_line_arguments": "one"}"#),
            Err(IpcError::Json(_))
        ));
        assert!(matches!(Payload::decode(b""), Err(IpcError::Json(_))));
    }

    #[test]
    fn test_from_env_has_argv0() {
        assert!(!Payload::from_env().args().is_empty());
    }

    #[tokio::test]
    async fn test_read_write_over_duplex() {
        let (mut client, server) = tokio::io::duplex(64);
        let payload = Payload::new(vec!["--file".to_string(), "report.csv".to_string()]);

        let writer = {
            let payload = payload.clone();
            tokio::spawn(async move { write_payload(&mut client, &payload).await })
        };
        let read = read_payload(server, 1024, Duration::from_secs(5)).await.unwrap();
        writer.await.unwrap().unwrap();
        assert_eq!(read, payload);
    }

    #[tokio::test]
    async fn test_read_enforces_limit() {
        let (mut client, server) = tokio::io::duplex(4096);
        let payload = Payload::new(vec!["x".repeat(200)]);
        tokio::spawn(async move { write_payload(&mut client, &payload).await });

        let err = read_payload(server, 64, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, IpcError::PayloadTooLarge { limit: 64 }));
    }

    #[tokio::test]
    async fn test_read_times_out_on_silent_peer() {
        let (_client, server) = tokio::io::duplex(64);
        let err = read_payload(server, 1024, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, IpcError::Timeout(50)));
    }
}
