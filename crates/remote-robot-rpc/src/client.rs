//! [`RemoteConnection`] – a blocking session to a robot server.
//!
//! One request is in flight at a time: [`RemoteConnection::call`] sends a
//! [`Request`] and blocks until the matching [`Response`] arrives or the
//! read timeout expires.

use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use remote_robot_types::{RemoteEndpoint, RobotError};
use tracing::{debug, info, warn};
use tungstenite::handshake::HandshakeError;
use tungstenite::http::StatusCode;
use tungstenite::{Message, WebSocket};

use crate::protocol::{Call, Reply, Request, Response, ServerInfo, UNKNOWN_REQUEST_ID};

/// Session establishment and per-call timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// TCP connect timeout, and read/write timeout of every call.
    pub timeout: Duration,
    /// Attempts made by [`RemoteConnection::open`] before giving up.
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// An open WebSocket session to a robot server.
pub struct RemoteConnection {
    endpoint: RemoteEndpoint,
    socket: WebSocket<TcpStream>,
    next_id: u64,
}

impl RemoteConnection {
    /// Connect to `endpoint`, retrying per `options`.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Connection`] naming the endpoint and the last
    /// failure once every attempt has failed, including when the server is
    /// busy with another client.
    pub fn open(endpoint: &RemoteEndpoint, options: &ClientOptions) -> Result<Self, RobotError> {
        let attempts = options.retry_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match Self::try_open(endpoint, options) {
                Ok(conn) => {
                    info!(%endpoint, attempt, "session established");
                    return Ok(conn);
                }
                Err(e) => {
                    warn!(%endpoint, attempt, attempts, error = %e, "connection attempt failed");
                    last_error = e;
                    if attempt < attempts {
                        thread::sleep(options.retry_delay);
                    }
                }
            }
        }
        Err(RobotError::Connection(format!(
            "could not reach robot server at {endpoint} after {attempts} attempt(s): {last_error}"
        )))
    }

    fn try_open(endpoint: &RemoteEndpoint, options: &ClientOptions) -> Result<Self, String> {
        let addrs = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|e| format!("cannot resolve {endpoint}: {e}"))?;

        let mut last_error = format!("{endpoint} resolved to no address");
        let mut stream = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, options.timeout) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => last_error = format!("{addr}: {e}"),
            }
        }
        let stream = stream.ok_or(last_error)?;

        stream
            .set_read_timeout(Some(options.timeout))
            .and_then(|()| stream.set_write_timeout(Some(options.timeout)))
            .and_then(|()| stream.set_nodelay(true))
            .map_err(|e| format!("socket setup failed: {e}"))?;

        let url = format!("ws://{endpoint}/");
        let (socket, _response) =
            tungstenite::client::client(url.as_str(), stream).map_err(|e| match e {
                HandshakeError::Failure(tungstenite::Error::Http(resp))
                    if resp.status() == StatusCode::SERVICE_UNAVAILABLE =>
                {
                    "server is busy with another client".to_string()
                }
                other => format!("handshake failed: {other}"),
            })?;

        Ok(Self {
            endpoint: endpoint.clone(),
            socket,
            next_id: 0,
        })
    }

    pub fn endpoint(&self) -> &RemoteEndpoint {
        &self.endpoint
    }

    /// Send one call and wait for its reply.
    ///
    /// # Errors
    ///
    /// A robot-side failure is returned with its original kind. A failure of
    /// the session itself is [`RobotError::Transport`].
    pub fn call(&mut self, call: Call) -> Result<Reply, RobotError> {
        self.next_id += 1;
        let id = self.next_id;
        let method = call.method();

        let text = serde_json::to_string(&Request { id, call })
            .map_err(|e| RobotError::Codec(format!("{method}: {e}")))?;
        self.socket
            .send(Message::Text(text.into()))
            .map_err(|e| RobotError::Transport(format!("{method} to {}: {e}", self.endpoint)))?;
        debug!(id, method, "call sent");

        loop {
            let msg = self.socket.read().map_err(|e| {
                RobotError::Transport(format!("{method} to {}: {e}", self.endpoint))
            })?;
            match msg {
                Message::Text(text) => {
                    let resp: Response = serde_json::from_str(text.as_str()).map_err(|e| {
                        RobotError::Protocol(format!("malformed response to {method}: {e}"))
                    })?;
                    if resp.id == id || resp.id == UNKNOWN_REQUEST_ID {
                        return resp.outcome.into_result();
                    }
                    warn!(expected = id, got = resp.id, "discarding stale response");
                }
                Message::Close(_) => {
                    return Err(RobotError::Transport(format!(
                        "{} closed the session during {method}",
                        self.endpoint
                    )));
                }
                Message::Binary(_) => {
                    return Err(RobotError::Protocol(format!(
                        "unexpected binary frame in response to {method}"
                    )));
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    /// Ask the server who it is.
    pub fn ping(&mut self) -> Result<ServerInfo, RobotError> {
        self.call(Call::Ping)?.into_server_info()
    }

    /// Whether the session still answers.
    pub fn test_connection(&mut self) -> bool {
        self.ping().is_ok()
    }

    /// Close the session, waiting for the server to acknowledge.
    pub fn close(mut self) {
        if let Err(e) = self.socket.close(None) {
            debug!(endpoint = %self.endpoint, error = %e, "close frame not sent");
            return;
        }
        // Drain until the server's close frame completes the handshake.
        while self.socket.read().is_ok() {}
        info!(endpoint = %self.endpoint, "session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn fast_options() -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_millis(500),
            retry_attempts: 2,
            retry_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn default_options() {
        let opts = ClientOptions::default();
        assert_eq!(opts.timeout, Duration::from_secs(30));
        assert_eq!(opts.retry_attempts, 3);
        assert_eq!(opts.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn unreachable_server_is_a_connection_error() {
        // Bind then drop to get a port with nothing listening.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let endpoint = RemoteEndpoint::new("127.0.0.1", port);
        let err = RemoteConnection::open(&endpoint, &fast_options()).err().unwrap();
        match err {
            RobotError::Connection(msg) => {
                assert!(msg.contains(&endpoint.to_string()));
                assert!(msg.contains("2 attempt(s)"));
            }
            other => panic!("expected Connection, got {other:?}"),
        }
    }

    #[test]
    fn unresolvable_host_is_a_connection_error() {
        let endpoint = RemoteEndpoint::new("no-such-host.invalid", 18861);
        let opts = ClientOptions {
            retry_attempts: 1,
            ..fast_options()
        };
        assert!(matches!(
            RemoteConnection::open(&endpoint, &opts),
            Err(RobotError::Connection(_))
        ));
    }

    #[test]
    fn non_websocket_peer_fails_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let peer = thread::spawn(move || {
            use std::io::{Read, Write};
            let (mut s, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1024];
            let _ = s.read(&mut buf);
            let _ = s.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        });
        let opts = ClientOptions {
            retry_attempts: 1,
            ..fast_options()
        };
        let err = RemoteConnection::open(&RemoteEndpoint::new("127.0.0.1", port), &opts)
            .err()
            .unwrap();
        assert!(matches!(err, RobotError::Connection(msg) if msg.contains("handshake")));
        peer.join().unwrap();
    }
}
