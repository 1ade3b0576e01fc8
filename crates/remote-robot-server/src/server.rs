//! [`RobotServer`] – hosts one robot and serves it to one client at a time.
//!
//! * WebSocket handshakes while a session is active are refused with
//!   `503 Service Unavailable`. The session slot is claimed only once a
//!   handshake request arrives, and a handshake that stalls is dropped after
//!   [`RobotServer::with_handshake_timeout`].
//! * A session with no incoming frame for [`RobotServer::with_idle_timeout`]
//!   is closed like a departed client.
//! * Every text frame is one [`Request`]; the robot call runs on a blocking
//!   thread and its [`Response`] is sent back on the same socket.
//! * When a client goes away, the robot is disconnected (motors stopped,
//!   torque released) unless cleanup was disabled with
//!   [`RobotServer::with_cleanup`].

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use remote_robot_hal::Robot;
use remote_robot_rpc::protocol::UNKNOWN_REQUEST_ID;
use remote_robot_rpc::{Request, Response, ServerInfo};
use remote_robot_types::RobotError;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request as HandshakeRequest, Response as HandshakeResponse,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::service::dispatch;

/// Interface the server listens on unless overridden.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Time a new peer gets to complete the WebSocket handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Silence after which an active session is closed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// The hosted robot, shared between the session task and blocking calls.
pub type SharedRobot = Arc<Mutex<Box<dyn Robot>>>;

fn lock(robot: &SharedRobot) -> MutexGuard<'_, Box<dyn Robot>> {
    robot.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// RobotServer
// ---------------------------------------------------------------------------

/// Builder for a robot server.
///
/// # Example
///
/// ```rust,no_run
/// use remote_robot_hal::Jetbot;
/// use remote_robot_server::RobotServer;
/// use remote_robot_types::{DEFAULT_JETBOT_PORT, JetbotConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), remote_robot_types::RobotError> {
///     let robot = Jetbot::new(JetbotConfig::mock());
///     RobotServer::new(Box::new(robot), DEFAULT_JETBOT_PORT).run().await
/// }
/// ```
pub struct RobotServer {
    robot: SharedRobot,
    robot_name: String,
    host: String,
    port: u16,
    stop_on_client_disconnect: bool,
    handshake_timeout: Duration,
    idle_timeout: Option<Duration>,
}

impl RobotServer {
    /// Host `robot` on [`DEFAULT_HOST`]`:port`.
    pub fn new(robot: Box<dyn Robot>, port: u16) -> Self {
        let robot_name = robot.name().to_string();
        Self {
            robot: Arc::new(Mutex::new(robot)),
            robot_name,
            host: DEFAULT_HOST.to_string(),
            port,
            stop_on_client_disconnect: true,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Override the listening port; `0` picks a free one.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Whether a still-connected robot is disconnected when its client
    /// goes away (default `true`).
    pub fn with_cleanup(mut self, stop_on_client_disconnect: bool) -> Self {
        self.stop_on_client_disconnect = stop_on_client_disconnect;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Close a session after `timeout` without a frame from its client;
    /// `None` keeps quiet sessions open forever.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Handle onto the hosted robot.
    pub fn robot(&self) -> SharedRobot {
        Arc::clone(&self.robot)
    }

    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Connection`] if the address cannot be bound.
    pub async fn bind(self) -> Result<ListeningServer, RobotError> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RobotError::Connection(format!("cannot listen on {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| RobotError::Connection(format!("cannot read bound address: {e}")))?;

        info!(robot = %self.robot_name, %local_addr, "robot server listening");

        Ok(ListeningServer {
            listener,
            local_addr,
            state: Arc::new(ServerState {
                robot: self.robot,
                robot_name: self.robot_name,
                stop_on_client_disconnect: self.stop_on_client_disconnect,
                handshake_timeout: self.handshake_timeout,
                idle_timeout: self.idle_timeout,
                session_slot: Arc::new(Semaphore::new(1)),
                shutting_down: AtomicBool::new(false),
            }),
        })
    }

    /// Bind and serve forever.
    pub async fn run(self) -> Result<(), RobotError> {
        self.bind().await?.run().await
    }
}

// ---------------------------------------------------------------------------
// ListeningServer
// ---------------------------------------------------------------------------

struct ServerState {
    robot: SharedRobot,
    robot_name: String,
    stop_on_client_disconnect: bool,
    handshake_timeout: Duration,
    idle_timeout: Option<Duration>,
    /// One permit: the active session.
    session_slot: Arc<Semaphore>,
    /// Set before shutdown; robot calls still queued are refused.
    shutting_down: AtomicBool,
}

/// A bound server, ready to accept clients.
pub struct ListeningServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: Arc<ServerState>,
}

impl ListeningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept clients until the process ends.
    pub async fn run(self) -> Result<(), RobotError> {
        self.run_until(std::future::pending()).await
    }

    /// Accept clients until `shutdown` completes, then end every session
    /// and disconnect the robot if it is still connected.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), RobotError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut sessions = JoinSet::new();
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "session task failed");
                    }
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let state = Arc::clone(&self.state);
                        sessions.spawn(async move {
                            if let Err(e) = handle_connection(stream, peer, state).await {
                                warn!(%peer, error = %e, "session ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "accept error");
                    }
                },
            }
        }

        info!(
            robot = %self.state.robot_name,
            open_sessions = sessions.len(),
            "shutting down robot server"
        );
        self.state.shutting_down.store(true, Ordering::SeqCst);
        sessions.shutdown().await;
        release_robot(&self.state.robot).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Per-connection handler
// ---------------------------------------------------------------------------

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState>,
) -> Result<(), RobotError> {
    // The slot is claimed in the handshake callback, after the upgrade
    // request has been read.
    let mut permit: Option<OwnedSemaphorePermit> = None;
    let mut busy = false;
    let slot = Arc::clone(&state.session_slot);
    let (claimed, refused) = (&mut permit, &mut busy);
    let admit = move |_req: &HandshakeRequest,
                      resp: HandshakeResponse|
          -> Result<HandshakeResponse, ErrorResponse> {
        match slot.try_acquire_owned() {
            Ok(p) => {
                *claimed = Some(p);
                Ok(resp)
            }
            Err(_) => {
                *refused = true;
                let mut rejection = ErrorResponse::new(Some(
                    "robot server is busy with another client".to_string(),
                ));
                *rejection.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
                Err(rejection)
            }
        }
    };

    let handshake = tokio::time::timeout(state.handshake_timeout, accept_hdr_async(stream, admit)).await;
    if busy {
        warn!(%peer, "rejected client: another session is active");
        return Ok(());
    }
    let ws_stream = handshake
        .map_err(|_| {
            RobotError::Transport(format!(
                "WebSocket handshake from {peer} timed out after {:?}",
                state.handshake_timeout
            ))
        })?
        .map_err(|e| RobotError::Transport(format!("WebSocket handshake from {peer}: {e}")))?;

    let session = ServerInfo {
        robot: state.robot_name.clone(),
        session_id: Uuid::new_v4().to_string(),
        connected_at: Utc::now().to_rfc3339(),
        server_version: env!("CARGO_PKG_VERSION").to_string(),
    };
    info!(%peer, session = %session.session_id, "client connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    loop {
        let next = match state.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, ws_rx.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!(%peer, session = %session.session_id, idle = ?limit, "closing idle session");
                    if let Err(e) = ws_tx.close().await {
                        debug!(%peer, error = %e, "close frame not sent");
                    }
                    break;
                }
            },
            None => ws_rx.next().await,
        };
        let Some(msg) = next else {
            break;
        };
        let response = match msg {
            Ok(Message::Text(text)) => handle_request(&state, &session, text.as_str()).await,
            Ok(Message::Binary(_)) => Response::new(
                UNKNOWN_REQUEST_ID,
                Err(RobotError::Protocol("binary frames are not supported".to_string())),
            ),
            // Close replies are queued by the stream; it ends on the next poll.
            Ok(_) => continue,
            Err(e) => {
                warn!(%peer, error = %e, "session read error");
                break;
            }
        };
        let Some(json) = encode_response(&response) else {
            break;
        };
        if ws_tx.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }

    info!(%peer, session = %session.session_id, "client disconnected");
    if state.stop_on_client_disconnect {
        release_robot(&state.robot).await;
    }
    drop(permit);
    Ok(())
}

async fn handle_request(state: &Arc<ServerState>, session: &ServerInfo, text: &str) -> Response {
    let request: Request = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "unparseable request");
            return Response::new(
                UNKNOWN_REQUEST_ID,
                Err(RobotError::Protocol(format!("invalid request: {e}"))),
            );
        }
    };

    let id = request.id;
    debug!(id, method = request.call.method(), "dispatching call");
    let robot = Arc::clone(&state.robot);
    let session = session.clone();
    let state_flag = Arc::clone(state);
    let result = tokio::task::spawn_blocking(move || {
        let mut robot = lock(&robot);
        if state_flag.shutting_down.load(Ordering::SeqCst) {
            return Err(RobotError::Transport("robot server is shutting down".to_string()));
        }
        dispatch(&mut **robot, request.call, &session)
    })
    .await
    .unwrap_or_else(|e| Err(RobotError::Transport(format!("robot call aborted: {e}"))));

    if let Err(e) = &result {
        debug!(id, error = %e, "call failed");
    }
    Response::new(id, result)
}

fn encode_response(response: &Response) -> Option<String> {
    match serde_json::to_string(response) {
        Ok(json) => Some(json),
        Err(e) => {
            error!(id = response.id, error = %e, "response serialization failed");
            let fallback = Response::new(response.id, Err(RobotError::Codec(e.to_string())));
            serde_json::to_string(&fallback).ok()
        }
    }
}

/// Disconnect the robot if it is still connected, logging failures.
async fn release_robot(robot: &SharedRobot) {
    let robot = Arc::clone(robot);
    let released = tokio::task::spawn_blocking(move || {
        let mut robot = lock(&robot);
        if robot.is_connected() {
            info!(robot = %robot.name(), "disconnecting robot left connected by client");
            if let Err(e) = robot.disconnect() {
                warn!(robot = %robot.name(), error = %e, "cleanup disconnect failed");
            }
        }
    })
    .await;
    if let Err(e) = released {
        error!(error = %e, "cleanup task failed");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use remote_robot_hal::Jetbot;
    use remote_robot_hal::sim::SimMotorDriver;
    use remote_robot_rpc::{Call, ClientOptions, RemoteConnection, RemoteRobot};
    use remote_robot_types::{
        Action, CameraConfig, JetbotConfig, RemoteEndpoint, So101Config,
    };

    fn jetbot_config() -> JetbotConfig {
        JetbotConfig::mock().with_camera("front", CameraConfig::new(8, 6))
    }

    async fn start(robot: Box<dyn Robot>) -> (RemoteEndpoint, SharedRobot) {
        start_server(RobotServer::new(robot, 0)).await
    }

    async fn start_server(server: RobotServer) -> (RemoteEndpoint, SharedRobot) {
        let server = server.with_host("127.0.0.1");
        let shared = server.robot();
        let listening = server.bind().await.unwrap();
        let endpoint = RemoteEndpoint::new("127.0.0.1", listening.local_addr().port());
        tokio::spawn(listening.run());
        (endpoint, shared)
    }

    /// A server that stops when the returned sender fires.
    async fn start_stoppable(
        robot: Box<dyn Robot>,
    ) -> (
        RemoteEndpoint,
        SharedRobot,
        tokio::sync::oneshot::Sender<()>,
        tokio::task::JoinHandle<Result<(), RobotError>>,
    ) {
        let server = RobotServer::new(robot, 0).with_host("127.0.0.1");
        let shared = server.robot();
        let listening = server.bind().await.unwrap();
        let endpoint = RemoteEndpoint::new("127.0.0.1", listening.local_addr().port());
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(listening.run_until(async move {
            stop_rx.await.ok();
        }));
        (endpoint, shared, stop_tx, handle)
    }

    fn options() -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_secs(5),
            retry_attempts: 1,
            retry_delay: Duration::from_millis(10),
        }
    }

    fn drive(left: f64, right: f64) -> Action {
        [
            ("left_motor.value".to_string(), left),
            ("right_motor.value".to_string(), right),
        ]
        .into()
    }

    async fn wait_until_disconnected(robot: &SharedRobot) -> bool {
        for _ in 0..100 {
            if !lock(robot).is_connected() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[test]
    fn builder_defaults() {
        let server = RobotServer::new(Box::new(Jetbot::new(JetbotConfig::mock())), 18861);
        assert_eq!(server.host(), DEFAULT_HOST);
        assert_eq!(server.port(), 18861);
        let server = server.with_port(9000).with_host("127.0.0.1");
        assert_eq!((server.host(), server.port()), ("127.0.0.1", 9000));
        assert_eq!(server.handshake_timeout, DEFAULT_HANDSHAKE_TIMEOUT);
        assert_eq!(server.idle_timeout, Some(DEFAULT_IDLE_TIMEOUT));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn silent_tcp_peer_does_not_take_the_session_slot() {
        let (endpoint, _robot) = start(Box::new(Jetbot::new(JetbotConfig::mock()))).await;

        // Connected, but never sends an upgrade request.
        let silent = TcpStream::connect(("127.0.0.1", endpoint.port)).await.unwrap();

        tokio::task::spawn_blocking(move || {
            let mut conn = RemoteConnection::open(&endpoint, &options()).unwrap();
            assert!(conn.test_connection());
            conn.close();
        })
        .await
        .unwrap();
        drop(silent);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stalled_handshake_is_dropped() {
        let server = RobotServer::new(Box::new(Jetbot::new(JetbotConfig::mock())), 0)
            .with_handshake_timeout(Duration::from_millis(100));
        let (endpoint, _robot) = start_server(server).await;

        let read = tokio::task::spawn_blocking(move || {
            use std::io::Read;
            let mut stream = std::net::TcpStream::connect(("127.0.0.1", endpoint.port)).unwrap();
            stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
            let mut buf = [0u8; 16];
            stream.read(&mut buf)
        })
        .await
        .unwrap();
        // The server hung up without a response.
        assert!(matches!(read, Ok(0)) || read.is_err_and(|e| e.kind() == std::io::ErrorKind::ConnectionReset));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn idle_session_is_closed_and_robot_released() {
        let server = RobotServer::new(Box::new(Jetbot::new(JetbotConfig::mock())), 0)
            .with_idle_timeout(Some(Duration::from_millis(150)));
        let (endpoint, robot) = start_server(server).await;

        let mut conn = tokio::task::spawn_blocking(move || {
            let mut conn = RemoteConnection::open(&endpoint, &options()).unwrap();
            conn.call(Call::Connect { calibrate: false }).unwrap();
            conn
        })
        .await
        .unwrap();

        assert!(wait_until_disconnected(&robot).await);
        let err = tokio::task::spawn_blocking(move || conn.call(Call::Ping))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, RobotError::Transport(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_ends_sessions_before_releasing_robot() {
        let (endpoint, robot, stop, server) =
            start_stoppable(Box::new(Jetbot::new(JetbotConfig::mock()))).await;

        let mut conn = tokio::task::spawn_blocking(move || {
            let mut conn = RemoteConnection::open(&endpoint, &options()).unwrap();
            conn.call(Call::Connect { calibrate: false }).unwrap();
            conn
        })
        .await
        .unwrap();

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert!(!lock(&robot).is_connected());

        // The session is gone; a late call cannot reconnect the robot.
        let late = tokio::task::spawn_blocking(move || conn.call(Call::Connect { calibrate: false }))
            .await
            .unwrap();
        assert!(matches!(late, Err(RobotError::Transport(_))));
        assert!(!lock(&robot).is_connected());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lost_server_surfaces_as_transport_error() {
        let (endpoint, _robot, stop, server) =
            start_stoppable(Box::new(Jetbot::new(jetbot_config()))).await;

        let mut client = tokio::task::spawn_blocking(move || {
            let mut client = RemoteRobot::jetbot(endpoint, &jetbot_config()).with_options(options());
            client.connect(true).unwrap();
            client.get_observation().unwrap();
            client
        })
        .await
        .unwrap();

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();

        tokio::task::spawn_blocking(move || {
            assert!(matches!(client.get_observation(), Err(RobotError::Transport(_))));
            assert!(matches!(
                client.send_action(&drive(0.2, 0.2)),
                Err(RobotError::Transport(_))
            ));
            // Disconnect still leaves the adapter disconnected.
            client.disconnect().unwrap();
            assert!(!client.is_connected());
        })
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remote_observation_equals_local_observation() {
        let (endpoint, _robot) = start(Box::new(Jetbot::new(jetbot_config()))).await;

        let (remote_echo, remote_obs, remote_features) = tokio::task::spawn_blocking(move || {
            let mut robot = RemoteRobot::jetbot(endpoint, &jetbot_config()).with_options(options());
            robot.connect(true).unwrap();
            let echo = robot.send_action(&drive(0.1 + 0.2, -1.0 / 3.0)).unwrap();
            let obs = robot.get_observation().unwrap();
            let features = robot.observation_features().clone();
            robot.disconnect().unwrap();
            assert!(!robot.is_connected());
            (echo, obs, features)
        })
        .await
        .unwrap();

        let mut local = Jetbot::new(jetbot_config());
        local.connect(true).unwrap();
        let local_echo = local.send_action(&drive(0.1 + 0.2, -1.0 / 3.0)).unwrap();
        let local_obs = local.get_observation().unwrap();

        assert_eq!(remote_echo, local_echo);
        assert_eq!(remote_obs, local_obs);
        assert_eq!(&remote_features, local.observation_features());
        let bits = |obs: &remote_robot_types::Observation| {
            obs["left_motor.value"].as_scalar().map(f64::to_bits)
        };
        assert_eq!(bits(&remote_obs), bits(&local_obs));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_client_is_rejected_until_first_leaves() {
        let (endpoint, _robot) = start(Box::new(Jetbot::new(JetbotConfig::mock()))).await;

        tokio::task::spawn_blocking(move || {
            let first = RemoteConnection::open(&endpoint, &options()).unwrap();

            let err = RemoteConnection::open(&endpoint, &options()).err().unwrap();
            assert!(matches!(&err, RobotError::Connection(msg) if msg.contains("busy")));

            first.close();
            let patient = ClientOptions {
                retry_attempts: 50,
                retry_delay: Duration::from_millis(20),
                ..options()
            };
            let mut second = RemoteConnection::open(&endpoint, &patient).unwrap();
            assert!(second.test_connection());
            second.close();
        })
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropped_client_leaves_robot_stopped() {
        let driver = SimMotorDriver::new();
        let probe = driver.probe();
        let jetbot = Jetbot::new(JetbotConfig::mock()).with_motor_driver(Box::new(driver));
        let (endpoint, robot) = start(Box::new(jetbot)).await;

        tokio::task::spawn_blocking(move || {
            let mut client = RemoteRobot::jetbot(endpoint, &JetbotConfig::default())
                .with_options(options());
            client.connect(true).unwrap();
            client.send_action(&drive(0.8, 0.8)).unwrap();
            // Dropped without disconnect.
        })
        .await
        .unwrap();

        assert!(wait_until_disconnected(&robot).await);
        let state = probe.snapshot();
        assert_eq!((state.left, state.right), (0.0, 0.0));
        assert!(state.stops >= 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cleanup_can_be_disabled() {
        let server = RobotServer::new(Box::new(Jetbot::new(JetbotConfig::mock())), 0)
            .with_host("127.0.0.1")
            .with_cleanup(false);
        let robot = server.robot();
        let listening = server.bind().await.unwrap();
        let endpoint = RemoteEndpoint::new("127.0.0.1", listening.local_addr().port());
        tokio::spawn(listening.run());

        tokio::task::spawn_blocking(move || {
            let mut conn = RemoteConnection::open(&endpoint, &options()).unwrap();
            conn.call(Call::Connect { calibrate: false }).unwrap();
            conn.close();
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(lock(&robot).is_connected());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn robot_errors_keep_their_kind() {
        let (endpoint, _robot) = start(Box::new(Jetbot::new(JetbotConfig::mock()))).await;

        tokio::task::spawn_blocking(move || {
            let mut conn = RemoteConnection::open(&endpoint, &options()).unwrap();
            assert_eq!(
                conn.call(Call::GetObservation),
                Err(RobotError::NotConnected("jetbot".to_string()))
            );
            conn.call(Call::Connect { calibrate: true }).unwrap();
            let bad: Action = [("nonexistent.value".to_string(), 1.0)].into();
            assert!(matches!(
                conn.call(Call::SendAction { action: bad }),
                Err(RobotError::Validation { robot, .. }) if robot == "jetbot"
            ));
            conn.call(Call::Disconnect).unwrap();
            assert!(matches!(
                conn.call(Call::Disconnect),
                Err(RobotError::NotConnected(_))
            ));
            conn.close();
        })
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn garbage_frame_gets_protocol_error_and_session_continues() {
        let (endpoint, _robot) = start(Box::new(Jetbot::new(JetbotConfig::mock()))).await;

        tokio::task::spawn_blocking(move || {
            let url = format!("ws://{endpoint}/");
            let (mut ws, _) = tokio_tungstenite::tungstenite::connect(url.as_str()).unwrap();

            ws.send(Message::Text("not json at all".into())).unwrap();
            let reply = ws.read().unwrap();
            let resp: Response = serde_json::from_str(reply.to_text().unwrap()).unwrap();
            assert_eq!(resp.id, UNKNOWN_REQUEST_ID);
            assert!(matches!(
                resp.outcome.into_result(),
                Err(RobotError::Protocol(_))
            ));

            let ping = serde_json::to_string(&Request { id: 5, call: Call::Ping }).unwrap();
            ws.send(Message::Text(ping.into())).unwrap();
            let resp: Response = serde_json::from_str(ws.read().unwrap().to_text().unwrap()).unwrap();
            assert_eq!(resp.id, 5);
            let info = resp.outcome.into_result().unwrap().into_server_info().unwrap();
            assert_eq!(info.robot, "jetbot");
            ws.close(None).unwrap();
        })
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ping_reports_a_fresh_session_each_time() {
        let (endpoint, _robot) = start(Box::new(Jetbot::new(JetbotConfig::mock()))).await;

        let (first, second) = tokio::task::spawn_blocking(move || {
            let patient = ClientOptions {
                retry_attempts: 50,
                retry_delay: Duration::from_millis(20),
                ..options()
            };
            let mut conn = RemoteConnection::open(&endpoint, &patient).unwrap();
            let first = conn.ping().unwrap();
            conn.close();
            let mut conn = RemoteConnection::open(&endpoint, &patient).unwrap();
            let second = conn.ping().unwrap();
            conn.close();
            (first, second)
        })
        .await
        .unwrap();

        assert!(Uuid::parse_str(&first.session_id).is_ok());
        assert_ne!(first.session_id, second.session_id);
        assert!(chrono::DateTime::parse_from_rfc3339(&first.connected_at).is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remote_so101_arm_round_trip() {
        let arm = remote_robot_hal::So101Follower::new(So101Config::mock()).unwrap();
        let (endpoint, _robot) = start(Box::new(arm)).await;

        tokio::task::spawn_blocking(move || {
            let mut arm = remote_robot_rpc::So101Remote::remote(endpoint, &So101Config::default())
                .with_options(options());
            arm.connect(true).unwrap();
            assert!(arm.is_calibrated());
            let action: Action = [("shoulder_lift.pos".to_string(), 150.0)].into();
            let applied = arm.send_action(&action).unwrap();
            assert_eq!(applied["shoulder_lift.pos"], 100.0);
            let obs = arm.get_observation().unwrap();
            assert_eq!(obs["shoulder_lift.pos"].as_scalar(), Some(100.0));
            arm.disconnect().unwrap();
        })
        .await
        .unwrap();
    }
}
