use std::time::Duration;
use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, trace, warn};
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend, ZmqMessage};
use crate::error::{RemoteApiError, Result};

/// One request, one reply. Implementations block until the reply arrives.
pub trait Transport {
    fn round_trip(&mut self, request: Vec<u8>) -> Result<Vec<u8>>;
}

/// REQ socket talking to the simulator's remote API server.
///
/// After a timeout the socket is thrown away and a fresh one is opened on
/// the next call, so a late reply is never taken as the answer to a later
/// request.
pub struct ZmqTransport {
    // dropped before the runtime that drives it
    socket: Option<ReqSocket>,
    runtime: Runtime,
    host: String,
    port: u16,
    endpoint: String,
    timeout: Duration,
}

impl ZmqTransport {
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("Remote API IO")
            .enable_all()
            .build()?;

        let mut transport = Self {
            socket: None,
            runtime,
            host: host.to_owned(),
            port,
            endpoint: format!("tcp://{}:{}", host, port),
            timeout,
        };
        transport.socket = Some(transport.open()?);

        debug!("Connected to {}", transport.endpoint);

        Ok(transport)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn open(&self) -> Result<ReqSocket> {
        let timeout = self.timeout;
        let address = (self.host.as_str(), self.port);

        // zeromq retries refused connections forever, so check the port first
        let reachable = self.runtime.block_on(async {
            tokio::time::timeout(timeout, TcpStream::connect(address)).await
                .map(|connected| connected.map(drop))
        });
        match reachable {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(self.connect_error(err.to_string())),
            Err(_) => return Err(self.timed_out()),
        }

        let mut socket = ReqSocket::new();
        let connected = self.runtime.block_on(async {
            tokio::time::timeout(timeout, socket.connect(&self.endpoint)).await
        });

        match connected {
            Ok(Ok(())) => Ok(socket),
            Ok(Err(err)) => Err(self.connect_error(err.to_string())),
            Err(_) => Err(self.timed_out()),
        }
    }

    fn discard_socket(&mut self) {
        let _guard = self.runtime.enter();
        self.socket = None;
    }

    fn connect_error(&self, message: String) -> RemoteApiError {
        RemoteApiError::Connect { endpoint: self.endpoint.clone(), message }
    }

    fn timed_out(&self) -> RemoteApiError {
        RemoteApiError::Timeout { endpoint: self.endpoint.clone(), timeout: self.timeout }
    }
}

impl Transport for ZmqTransport {
    fn round_trip(&mut self, request: Vec<u8>) -> Result<Vec<u8>> {
        let mut socket = match self.socket.take() {
            Some(socket) => socket,
            None => {
                debug!("Reopening socket to {}", self.endpoint);
                self.open()?
            }
        };

        trace!("sending {} bytes", request.len());

        let timeout = self.timeout;
        let reply = self.runtime.block_on(async {
            let exchange = async {
                socket.send(ZmqMessage::from(Bytes::from(request))).await?;
                socket.recv().await
            };
            tokio::time::timeout(timeout, exchange).await
        });
        self.socket = Some(socket);

        let reply = match reply {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => {
                self.discard_socket();
                return Err(RemoteApiError::Transport(err.to_string()));
            }
            Err(_) => {
                warn!("No reply from {} within {:?}, dropping the socket", self.endpoint, timeout);
                self.discard_socket();
                return Err(self.timed_out());
            }
        };

        let mut buffer = Vec::new();
        for frame in reply.into_vec() {
            buffer.extend_from_slice(&frame);
        }

        trace!("received {} bytes", buffer.len());

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use zeromq::{Endpoint, RepSocket};
    use super::*;

    /// Echoes one request per entry of `delays`, waiting that long before
    /// answering. Returns the bound port.
    fn echo_server(delays: Vec<Duration>) -> u16 {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let runtime = Builder::new_current_thread().enable_all().build().unwrap();
            runtime.block_on(async move {
                let mut socket = RepSocket::new();
                let port = match socket.bind("tcp://127.0.0.1:0").await.unwrap() {
                    Endpoint::Tcp(_, port) => port,
                    other => panic!("bound to {:?}", other),
                };
                tx.send(port).unwrap();

                for delay in delays {
                    let request = loop {
                        if let Ok(request) = socket.recv().await {
                            break request;
                        }
                    };
                    tokio::time::sleep(delay).await;
                    let _ = socket.send(request).await;
                }

                tokio::time::sleep(Duration::from_millis(500)).await;
            });
        });

        rx.recv().unwrap()
    }

    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn round_trip_over_loopback() {
        let port = echo_server(vec![Duration::ZERO, Duration::ZERO]);
        let mut transport = ZmqTransport::connect("127.0.0.1", port, Duration::from_secs(5)).unwrap();

        assert_eq!(transport.endpoint(), format!("tcp://127.0.0.1:{}", port));
        assert_eq!(transport.round_trip(b"ping".to_vec()).unwrap(), b"ping");
        assert_eq!(transport.round_trip(b"pong".to_vec()).unwrap(), b"pong");
    }

    #[test]
    fn refused_connection_is_a_connect_error() {
        let port = closed_port();

        match ZmqTransport::connect("127.0.0.1", port, Duration::from_secs(2)) {
            Err(RemoteApiError::Connect { endpoint, .. }) => {
                assert_eq!(endpoint, format!("tcp://127.0.0.1:{}", port));
            }
            Err(other) => panic!("expected a connect error, got {}", other),
            Ok(_) => panic!("connected to a closed port"),
        }
    }

    #[test]
    fn late_reply_is_not_paired_with_the_next_request() {
        let port = echo_server(vec![Duration::from_millis(1000), Duration::ZERO, Duration::ZERO]);
        let mut transport = ZmqTransport::connect("127.0.0.1", port, Duration::from_millis(800)).unwrap();

        assert!(matches!(
            transport.round_trip(b"first".to_vec()),
            Err(RemoteApiError::Timeout { .. })
        ));
        assert_eq!(transport.round_trip(b"second".to_vec()).unwrap(), b"second");
        assert_eq!(transport.round_trip(b"third".to_vec()).unwrap(), b"third");
    }
}
