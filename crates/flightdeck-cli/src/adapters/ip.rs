//! Public address lookup of the machine running the deploy.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use flightdeck_deploy::IpResolver;
use http_body_util::BodyExt;
use tracing::debug;

const CHECKIP_HOST: &str = "checkip.amazonaws.com";
const CHECKIP_PORT: u16 = 80;
const CHECKIP_TIMEOUT: Duration = Duration::from_secs(10);

/// Validate the echo service's response body.
pub fn parse_ip(body: &[u8]) -> anyhow::Result<String> {
    let text = std::str::from_utf8(body).context("address lookup returned non-UTF-8 body")?;
    let ip: IpAddr = text
        .trim()
        .parse()
        .with_context(|| format!("address lookup returned {:?}", text.trim()))?;
    Ok(ip.to_string())
}

/// Asks an external echo service over plain HTTP.
pub struct CheckIp {
    host: String,
    port: u16,
    timeout: Duration,
}

impl Default for CheckIp {
    fn default() -> Self {
        Self {
            host: CHECKIP_HOST.to_string(),
            port: CHECKIP_PORT,
            timeout: CHECKIP_TIMEOUT,
        }
    }
}

impl CheckIp {
    async fn fetch(&self) -> anyhow::Result<Vec<u8>> {
        let address = format!("{}:{}", self.host, self.port);
        let stream = tokio::net::TcpStream::connect(&address)
            .await
            .with_context(|| format!("failed to connect to {address}"))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "address lookup connection closed");
            }
        });

        let req = http::Request::builder()
            .method("GET")
            .uri("/")
            .header("host", &self.host)
            .header("user-agent", concat!("flightdeck/", env!("CARGO_PKG_VERSION")))
            .body(http_body_util::Empty::<bytes::Bytes>::new())?;

        let resp = sender.send_request(req).await?;
        if !resp.status().is_success() {
            bail!("address lookup at {} returned {}", self.host, resp.status());
        }
        let body = resp.into_body().collect().await?.to_bytes();
        Ok(body.to_vec())
    }
}

#[async_trait]
impl IpResolver for CheckIp {
    async fn find_user_ip(&self) -> anyhow::Result<String> {
        let body = tokio::time::timeout(self.timeout, self.fetch())
            .await
            .with_context(|| format!("address lookup at {} timed out", self.host))??;
        let ip = parse_ip(&body)?;
        debug!(%ip, "resolved operator address");
        Ok(ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_newline() {
        assert_eq!(parse_ip(b"203.0.113.7\n").unwrap(), "203.0.113.7");
    }

    #[test]
    fn accepts_ipv6() {
        assert_eq!(parse_ip(b"2001:db8::1\n").unwrap(), "2001:db8::1");
    }

    #[test]
    fn rejects_html() {
        assert!(parse_ip(b"<html>rate limited</html>").is_err());
    }

    #[tokio::test]
    async fn unreachable_host_is_an_error() {
        let resolver = CheckIp {
            host: "127.0.0.1".to_string(),
            port: 1,
            timeout: Duration::from_secs(2),
        };
        assert!(resolver.find_user_ip().await.is_err());
    }
}
