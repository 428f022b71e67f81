//! Accept loop for the document service.
//!
//! Each connection carries exactly one request frame and receives exactly one
//! response frame. Malformed input still gets a best-effort `ERRO` response
//! before the connection closes; a handler is only ever invoked with a fully
//! decoded request.

use std::future::Future;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use tabreport_shared::{Result, TabreportError, WireRequest, WireResponse, WireStatus};

use crate::frame::{read_frame, write_frame};

/// Accept connections forever, spawning one task per connection.
///
/// `read_timeout` bounds how long a connection may sit on an incomplete
/// frame; a peer that declares more bytes than it sends is cut off rather
/// than holding a task hostage.
pub async fn serve<H, Fut>(listener: TcpListener, read_timeout: Duration, handler: H) -> Result<()>
where
    H: Fn(WireRequest) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = WireResponse> + Send + 'static,
{
    let local = listener
        .local_addr()
        .map_err(|e| TabreportError::Transport(format!("listener address: {e}")))?;
    info!(%local, "document service listening");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, "connection accepted");
                let handler = handler.clone();
                tokio::spawn(async move {
                    handle_connection(stream, read_timeout, handler).await;
                });
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
            }
        }
    }
}

async fn handle_connection<H, Fut>(mut stream: TcpStream, read_timeout: Duration, handler: H)
where
    H: Fn(WireRequest) -> Fut,
    Fut: Future<Output = WireResponse>,
{
    let payload = match timeout(read_timeout, read_frame(&mut stream)).await {
        Ok(Ok(payload)) => payload,
        Ok(Err(e)) => {
            warn!(error = %e, "bad request frame");
            respond(
                &mut stream,
                &WireResponse::failure(WireStatus::Error, e.to_string()),
            )
            .await;
            return;
        }
        Err(_) => {
            warn!("request frame incomplete after {read_timeout:?}");
            respond(
                &mut stream,
                &WireResponse::failure(WireStatus::Error, "request frame timed out"),
            )
            .await;
            return;
        }
    };

    let request: WireRequest = match serde_json::from_slice(&payload) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "request payload is not valid JSON");
            respond(
                &mut stream,
                &WireResponse::failure(WireStatus::Error, format!("decode request: {e}")),
            )
            .await;
            return;
        }
    };

    let response = handler(request).await;
    respond(&mut stream, &response).await;
}

/// Best-effort response write. A peer that hung up already got nothing to
/// lose; the failure is logged and swallowed.
async fn respond(stream: &mut TcpStream, response: &WireResponse) {
    let payload = match serde_json::to_vec(response) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "response failed to encode");
            return;
        }
    };
    if let Err(e) = write_frame(stream, &payload).await {
        debug!(error = %e, "response write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn spawn_echo_server(read_timeout: Duration) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, read_timeout, |request: WireRequest| async move {
            WireResponse::ok(request.dados.len() as i64)
        }));
        address
    }

    #[tokio::test]
    async fn round_trip_over_tcp() {
        let address = spawn_echo_server(Duration::from_secs(5)).await;

        let config = tabreport_shared::config::WireConfig {
            host: address.ip().to_string(),
            port: address.port(),
            timeout_secs: 5,
        };
        let client = crate::WireClient::new(&config);

        let request = WireRequest {
            id_requisicao: "req-1".into(),
            mapper: Default::default(),
            mapper_version: "1.0".into(),
            webhook_url: "http://127.0.0.1:5001/webhook".into(),
            dados: vec![Default::default(), Default::default()],
        };

        let response = client.submit(&request).await.unwrap();
        assert_eq!(response.status, WireStatus::Ok);
        assert_eq!(response.document_id, Some(2));
    }

    #[tokio::test]
    async fn invalid_json_payload_gets_erro() {
        let address = spawn_echo_server(Duration::from_secs(5)).await;

        let mut stream = TcpStream::connect(address).await.unwrap();
        write_frame(&mut stream, b"definitely not json").await.unwrap();

        let payload = read_frame(&mut stream).await.unwrap();
        let response: WireResponse = serde_json::from_slice(&payload).unwrap();
        assert_eq!(response.status, WireStatus::Error);
        assert!(response.error.unwrap().contains("decode request"));
    }

    #[tokio::test]
    async fn incomplete_frame_is_answered_not_hung() {
        let address = spawn_echo_server(Duration::from_millis(100)).await;

        let mut stream = TcpStream::connect(address).await.unwrap();
        // Declare 100 bytes, deliver 3, then go quiet with the socket open.
        stream.write_all(&100u32.to_be_bytes()).await.unwrap();
        stream.write_all(b"abc").await.unwrap();

        let payload = timeout(Duration::from_secs(2), read_frame(&mut stream))
            .await
            .expect("server must answer within its read timeout")
            .unwrap();
        let response: WireResponse = serde_json::from_slice(&payload).unwrap();
        assert_eq!(response.status, WireStatus::Error);
    }
}
