//! gRPC endpoint handling: where the plugin listens and how it serves.

use futures::stream;
use quobyte_csi_proto::{ControllerPlugin, ControllerService};
use std::{
  future::Future,
  io,
  net::SocketAddr,
  path::{Path, PathBuf},
  pin::Pin,
  str::FromStr,
  sync::Arc,
  task::{Context, Poll},
};
use thiserror::Error;
use tokio::{
  io::{AsyncRead, AsyncWrite, ReadBuf},
  net::UnixListener,
};
use tonic::transport::{server::Connected, Server};
use tracing::{debug, info, warn};

pub const DEFAULT_ENDPOINT: &str = "unix:///var/lib/kubelet/plugins/csi.quobyte.com/csi.sock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
  Unix(PathBuf),
  Tcp(SocketAddr),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
  #[error("unsupported endpoint '{0}', expected unix://<path> or tcp://<ip>:<port>")]
  Scheme(String),

  #[error("endpoint '{0}' has an empty socket path")]
  EmptyPath(String),

  #[error("invalid tcp endpoint '{0}': {1}")]
  Address(String, std::net::AddrParseError),
}

impl FromStr for Endpoint {
  type Err = EndpointError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if let Some(path) = s.strip_prefix("unix://").or_else(|| s.strip_prefix("unix:")) {
      if path.is_empty() {
        return Err(EndpointError::EmptyPath(s.to_owned()));
      }
      return Ok(Endpoint::Unix(PathBuf::from(path)));
    }

    if let Some(addr) = s.strip_prefix("tcp://") {
      return addr
        .parse()
        .map(Endpoint::Tcp)
        .map_err(|e| EndpointError::Address(s.to_owned(), e));
    }

    if s.starts_with('/') {
      return Ok(Endpoint::Unix(PathBuf::from(s)));
    }

    Err(EndpointError::Scheme(s.to_owned()))
  }
}

#[derive(Debug, Error)]
pub enum ServeError {
  #[error("failed to prepare socket {path}: {source}")]
  Socket { path: PathBuf, source: io::Error },

  #[error(transparent)]
  Transport(#[from] tonic::transport::Error),
}

/// Serve the Identity and Controller services on `endpoint` until
/// `shutdown` completes.
pub async fn serve<T, F>(endpoint: &Endpoint, service: Arc<T>, shutdown: F) -> Result<(), ServeError>
where
  T: ControllerService,
  F: Future<Output = ()> + Send,
{
  let plugin = ControllerPlugin::new(service);
  let router = Server::builder()
    .add_service(plugin.identity_server())
    .add_service(plugin.controller_server());

  match endpoint {
    Endpoint::Tcp(addr) => {
      info!(%addr, "Serving CSI on tcp");
      router.serve_with_shutdown(*addr, shutdown).await?;
    }
    Endpoint::Unix(path) => {
      let listener = bind_unix(path).await?;
      info!(path = %path.display(), "Serving CSI on unix socket");

      let incoming = stream::unfold(listener, |listener| async move {
        let conn = listener.accept().await.map(|(stream, _)| UdsStream(stream));
        Some((conn, listener))
      });

      let result = router
        .serve_with_incoming_shutdown(Box::pin(incoming), shutdown)
        .await;

      if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove socket");
      }
      result?;
    }
  }

  info!("CSI server stopped");
  Ok(())
}

/// Bind `path`, removing a socket left behind by a previous run.
async fn bind_unix(path: &Path) -> Result<UnixListener, ServeError> {
  let socket_error = |source: io::Error| ServeError::Socket {
    path: path.to_owned(),
    source,
  };

  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent).await.map_err(socket_error)?;
  }

  match tokio::fs::remove_file(path).await {
    Ok(()) => debug!(path = %path.display(), "Removed stale socket"),
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(socket_error(e)),
  }

  UnixListener::bind(path).map_err(socket_error)
}

#[derive(Debug)]
struct UdsStream(tokio::net::UnixStream);

impl Connected for UdsStream {
  fn remote_addr(&self) -> Option<SocketAddr> {
    None
  }
}

impl AsyncRead for UdsStream {
  fn poll_read(
    mut self: Pin<&mut Self>,
    cx: &mut Context<'_>,
    buf: &mut ReadBuf<'_>,
  ) -> Poll<io::Result<()>> {
    Pin::new(&mut self.0).poll_read(cx, buf)
  }
}

impl AsyncWrite for UdsStream {
  fn poll_write(
    mut self: Pin<&mut Self>,
    cx: &mut Context<'_>,
    buf: &[u8],
  ) -> Poll<io::Result<usize>> {
    Pin::new(&mut self.0).poll_write(cx, buf)
  }

  fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
    Pin::new(&mut self.0).poll_flush(cx)
  }

  fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
    Pin::new(&mut self.0).poll_shutdown(cx)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use test_case::test_case;

  #[test_case(DEFAULT_ENDPOINT => Ok(Endpoint::Unix("/var/lib/kubelet/plugins/csi.quobyte.com/csi.sock".into())) ; "default")]
  #[test_case("unix:///csi/csi.sock" => Ok(Endpoint::Unix("/csi/csi.sock".into())) ; "unix url")]
  #[test_case("unix:/csi/csi.sock" => Ok(Endpoint::Unix("/csi/csi.sock".into())) ; "short unix")]
  #[test_case("/csi/csi.sock" => Ok(Endpoint::Unix("/csi/csi.sock".into())) ; "bare path")]
  #[test_case("tcp://127.0.0.1:10000" => Ok(Endpoint::Tcp(([127, 0, 0, 1], 10000).into())) ; "tcp")]
  fn parse(endpoint: &str) -> Result<Endpoint, EndpointError> {
    endpoint.parse()
  }

  #[test_case("http://localhost:80" ; "other scheme")]
  #[test_case("unix://" ; "empty path")]
  #[test_case("tcp://localhost" ; "no port")]
  #[test_case("csi.sock" ; "relative path")]
  fn rejects(endpoint: &str) {
    assert!(endpoint.parse::<Endpoint>().is_err());
  }

  #[tokio::test]
  async fn stale_socket_is_replaced() {
    let dir = std::env::temp_dir().join(format!("quobyte-csi-{}", uuid::Uuid::new_v4()));
    let path = dir.join("csi.sock");

    drop(bind_unix(&path).await.unwrap());
    assert!(path.exists());

    drop(bind_unix(&path).await.unwrap());
    std::fs::remove_dir_all(&dir).unwrap();
  }
}
