//! 4-byte big-endian length framing.
//!
//! Every message on the wire is `[u32 length][payload]`. The length counts
//! payload bytes only. Both sides enforce [`MAX_FRAME`] so a corrupt or
//! hostile length prefix cannot trigger an unbounded allocation.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use tabreport_shared::{Result, TabreportError};

/// Upper bound on a single frame's payload.
pub const MAX_FRAME: usize = 16 * 1024 * 1024;

/// Write one frame: length prefix, payload, flush.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME {
        return Err(TabreportError::Protocol(format!(
            "frame of {} bytes exceeds maximum {MAX_FRAME}",
            payload.len()
        )));
    }

    let len = u32::try_from(payload.len())
        .map_err(|_| TabreportError::Protocol("frame length does not fit in u32".into()))?;

    writer
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| TabreportError::Protocol(format!("write length prefix: {e}")))?;
    writer
        .write_all(payload)
        .await
        .map_err(|e| TabreportError::Protocol(format!("write payload: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| TabreportError::Protocol(format!("flush frame: {e}")))?;
    Ok(())
}

/// Read one complete frame, or fail on a bad prefix or truncated payload.
///
/// A peer that closes before the declared length arrives produces a protocol
/// error, never a partial payload.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    reader
        .read_exact(&mut prefix)
        .await
        .map_err(|e| TabreportError::Protocol(format!("read length prefix: {e}")))?;

    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_FRAME {
        return Err(TabreportError::Protocol(format!(
            "declared frame of {len} bytes exceeds maximum {MAX_FRAME}"
        )));
    }

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| TabreportError::Protocol(format!("read {len}-byte payload: {e}")))?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_roundtrip() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        write_frame(&mut a, br#"{"status":"OK"}"#).await.unwrap();
        let payload = read_frame(&mut b).await.unwrap();
        assert_eq!(payload, br#"{"status":"OK"}"#);
    }

    #[tokio::test]
    async fn request_survives_framing_exactly() {
        use tabreport_shared::{CanonicalRecord, WireRequest};

        let request = WireRequest {
            id_requisicao: "3c1d9b7e-req".into(),
            mapper: [("Nome_Pais".to_string(), "Nome".to_string())].into(),
            mapper_version: "1.0".into(),
            webhook_url: "http://127.0.0.1:5001/webhook".into(),
            dados: vec![
                CanonicalRecord {
                    internal_id: Some("CSV_PORTUGAL_1".into()),
                    name: Some("Portugal".into()),
                    density: Some(111.91),
                    ..Default::default()
                },
                CanonicalRecord::default(),
            ],
        };

        let (mut a, mut b) = tokio::io::duplex(4096);
        let payload = serde_json::to_vec(&request).unwrap();
        write_frame(&mut a, &payload).await.unwrap();

        let received = read_frame(&mut b).await.unwrap();
        let decoded: WireRequest = serde_json::from_slice(&received).unwrap();
        assert_eq!(decoded.id_requisicao, request.id_requisicao);
        assert_eq!(decoded.dados.len(), 2);
        assert_eq!(decoded.dados[0], request.dados[0]);
        assert_eq!(decoded.mapper, request.mapper);
    }

    #[tokio::test]
    async fn empty_frame_is_legal() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_frame(&mut a, b"").await.unwrap();
        assert!(read_frame(&mut b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_declared_length_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let bogus = u32::try_from(MAX_FRAME + 1).unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut a, &bogus.to_be_bytes())
            .await
            .unwrap();

        let err = read_frame(&mut b).await.unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[tokio::test]
    async fn truncated_payload_is_an_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        // Declare 10 bytes, send 3, then hang up.
        tokio::io::AsyncWriteExt::write_all(&mut a, &10u32.to_be_bytes())
            .await
            .unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut a, b"abc").await.unwrap();
        drop(a);

        let err = read_frame(&mut b).await.unwrap_err();
        assert!(err.to_string().contains("payload"));
    }
}
