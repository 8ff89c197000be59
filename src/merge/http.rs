use std::time::Duration;

use super::{MergeRequest, MergeResponse, MergeService};
use crate::config::MergeConfig;
use crate::error::MergeServiceError;

/// Merge service reached over HTTP: the request is POSTed as JSON and the
/// JSON reply decoded.
#[derive(Debug, Clone)]
pub struct HttpMergeService {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpMergeService {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, MergeServiceError> {
        let client = reqwest::Client::builder()
            .user_agent("scoremerge")
            .timeout(timeout)
            .build()
            .map_err(|e| MergeServiceError::Transport(format!("build http client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn from_config(config: &MergeConfig) -> Result<Self, MergeServiceError> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| MergeServiceError::Transport("no merge endpoint configured".to_string()))?;
        Self::new(endpoint, Duration::from_millis(config.timeout_ms))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl MergeService for HttpMergeService {
    async fn merge(&self, request: &MergeRequest) -> Result<MergeResponse, MergeServiceError> {
        log::debug!("POST merge request to {}", self.endpoint);
        let resp = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            log::warn!("merge service answered HTTP {status}");
            return Err(MergeServiceError::Status(status.as_u16()));
        }

        resp.json::<MergeResponse>().await.map_err(|e| {
            if e.is_timeout() {
                MergeServiceError::Timeout
            } else {
                MergeServiceError::Protocol(format!("decode merge reply: {e}"))
            }
        })
    }
}

fn classify(err: reqwest::Error) -> MergeServiceError {
    if err.is_timeout() {
        MergeServiceError::Timeout
    } else if let Some(status) = err.status() {
        MergeServiceError::Status(status.as_u16())
    } else {
        MergeServiceError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Subtree;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answers a single HTTP request with `status` and `body`, handing back
    /// the request body it received.
    async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/merge", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            let body_start = loop {
                let n = stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "connection closed before the request head ended");
                received.extend_from_slice(&buf[..n]);
                if let Some(pos) = received.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&received[..body_start]).to_ascii_lowercase();
            let length: usize = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .map(|v| v.trim().parse().unwrap())
                .unwrap_or(0);
            while received.len() < body_start + length {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }

            let reply = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(reply.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
            String::from_utf8(received[body_start..].to_vec()).unwrap()
        });
        (url, handle)
    }

    fn measure() -> Subtree {
        Subtree::parse(br#"<measure xml:id="m1"><staff xml:id="s1"/></measure>"#).unwrap()
    }

    fn service(url: String) -> HttpMergeService {
        HttpMergeService::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn resolved_reply_round_trips() {
        let reply = serde_json::to_string(&MergeResponse::resolved(&measure())).unwrap();
        assert!(reply.contains(r#""resolved":"true""#));
        let (url, server) = serve_once("200 OK", reply).await;

        let request = MergeRequest::from_subtree(&measure());
        let response = service(url).merge(&request).await.unwrap();
        let merged = response.into_reply().unwrap();
        assert!(merged.resolved);
        assert_eq!(merged.measure.unwrap().root(), measure().root());

        // The POSTed body is the JSON request payload
        let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent, serde_json::to_value(&request).unwrap());
        assert_eq!(sent["content"]["mei"]["encoding"], "base64");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let (url, server) = serve_once("503 Service Unavailable", String::new()).await;
        let err = service(url)
            .merge(&MergeRequest::from_subtree(&measure()))
            .await
            .unwrap_err();
        assert_eq!(err, MergeServiceError::Status(503));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn undecodable_body_is_protocol_error() {
        let (url, server) = serve_once("200 OK", "<html>not json</html>".to_string()).await;
        let err = service(url)
            .merge(&MergeRequest::from_subtree(&measure()))
            .await
            .unwrap_err();
        assert!(matches!(err, MergeServiceError::Protocol(_)), "got {err:?}");
        server.await.unwrap();
    }

    #[test]
    fn missing_endpoint_is_reported() {
        let err = HttpMergeService::from_config(&MergeConfig::default()).unwrap_err();
        assert!(matches!(err, MergeServiceError::Transport(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        // Port 9 (discard) on localhost is closed on CI machines
        let service =
            HttpMergeService::new("http://127.0.0.1:9/merge", Duration::from_millis(500)).unwrap();
        let measure = crate::document::Subtree::parse(br#"<measure xml:id="m1"/>"#).unwrap();
        let err = service
            .merge(&MergeRequest::from_subtree(&measure))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MergeServiceError::Transport(_) | MergeServiceError::Timeout
        ));
    }
}
