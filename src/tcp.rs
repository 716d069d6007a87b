//! TCP front end: accepts connections and pumps bytes between each socket
//! and its RPC message handler.
//!
//! Every connection gets its own tasks and its own ordered call queue; the
//! server state behind them is shared.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::protocol::rpc;
use crate::state::ServerState;
use crate::store::BackingStore;

/// NFSv4 server bound to a TCP address.
pub struct NFSTcpListener {
    /// Socket accepting client connections.
    listener: TcpListener,
    /// Address actually bound, which differs from the request for port 0.
    local_addr: SocketAddr,
    /// State shared by every connection.
    state: Arc<ServerState>,
    /// Retransmission detection shared by every connection.
    transaction_tracker: Arc<rpc::TransactionTracker>,
}

/// A loopback address in 127.88.0.0/16, used by `auto` binding.
pub fn generate_host_ip(hostnum: u16) -> String {
    format!("127.88.{}.{}", ((hostnum >> 8) & 0xFF) as u8, (hostnum & 0xFF) as u8)
}

/// Moves bytes between `socket` and the connection's message handler until
/// either side gives up.
async fn process_socket(mut socket: TcpStream, context: rpc::Context) -> anyhow::Result<()> {
    let (mut message_handler, mut socksend, mut msgrecvchan) =
        rpc::SocketMessageHandler::new(&context);
    let _ = socket.set_nodelay(true);

    tokio::spawn(async move {
        loop {
            if let Err(e) = message_handler.read().await {
                debug!("Message loop broken due to {:?}", e);
                break;
            }
        }
    });
    loop {
        tokio::select! {
            _ = socket.readable() => {
                let mut buf = [0; 128_000];
                match socket.try_read(&mut buf) {
                    Ok(0) => return Ok(()),
                    Ok(n) => {
                        if socksend.write_all(&buf[..n]).await.is_err() {
                            return Err(anyhow::anyhow!("message handler stopped reading"));
                        }
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => {
                        debug!("Message handling closed : {:?}", e);
                        return Err(e.into());
                    }
                }
            },
            reply = msgrecvchan.recv() => {
                match reply {
                    Some(Err(e)) => {
                        debug!("Message handling closed : {:?}", e);
                        return Err(e);
                    }
                    Some(Ok(msg)) => {
                        if let Err(e) = rpc::write_fragment(&mut socket, &msg).await {
                            error!("Write error {:?}", e);
                        }
                    }
                    None => {
                        return Err(anyhow::anyhow!("Unexpected socket context termination"));
                    }
                }
            }
        }
    }
}

/// Releases the state of clients that stopped renewing their lease, checking
/// once per lease period.
async fn expire_clients_forever(state: Arc<ServerState>) {
    let mut interval = tokio::time::interval(state.clients.lease().max(Duration::from_secs(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        state.expire_clients().await;
    }
}

#[async_trait]
pub trait NFSTcp: Send + Sync {
    /// Port actually bound, useful after binding port 0.
    fn get_listen_port(&self) -> u16;

    fn get_listen_ip(&self) -> IpAddr;

    /// Accepts connections until the listener fails.
    async fn handle_forever(&self) -> io::Result<()>;
}

impl NFSTcpListener {
    /// Binds `config.bind_address` and prepares to serve `store`.
    ///
    /// The address is `ip:port`; the ip `auto` picks the first free loopback
    /// address from [`generate_host_ip`].
    pub async fn bind_with_config(
        config: ServerConfig,
        store: Arc<dyn BackingStore>,
    ) -> io::Result<NFSTcpListener> {
        let (ip, port) = config.bind_address.split_once(':').ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "IP Address must be of form ip:port")
        })?;
        let port = port.parse::<u16>().map_err(|_| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "Port not in range 0..=65535")
        })?;
        let ip = ip.to_string();
        let retention = config.transaction_retention;
        let state = ServerState::new(store, config)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let state = Arc::new(state);

        if ip != "auto" {
            return NFSTcpListener::bind_internal(&ip, port, state, retention).await;
        }
        const NUM_TRIES: u16 = 32;
        for try_ip in 1..=NUM_TRIES {
            let candidate = generate_host_ip(try_ip);
            let result =
                NFSTcpListener::bind_internal(&candidate, port, state.clone(), retention).await;
            if result.is_ok() {
                return result;
            }
        }
        Err(io::Error::other("Can't bind automatically"))
    }

    /// Binds `ipstr` with the default configuration.
    pub async fn bind(ipstr: &str, store: Arc<dyn BackingStore>) -> io::Result<NFSTcpListener> {
        NFSTcpListener::bind_with_config(ServerConfig::default().with_bind_address(ipstr), store)
            .await
    }

    async fn bind_internal(
        ip: &str,
        port: u16,
        state: Arc<ServerState>,
        retention: Duration,
    ) -> io::Result<NFSTcpListener> {
        let ipstr = format!("{ip}:{port}");
        let listener = TcpListener::bind(&ipstr).await?;
        let local_addr = listener.local_addr()?;
        info!("Listening on {:?}", local_addr);
        Ok(NFSTcpListener {
            listener,
            local_addr,
            state,
            transaction_tracker: Arc::new(rpc::TransactionTracker::new(retention)),
        })
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }
}

#[async_trait]
impl NFSTcp for NFSTcpListener {
    fn get_listen_port(&self) -> u16 {
        self.local_addr.port()
    }

    fn get_listen_ip(&self) -> IpAddr {
        self.local_addr.ip()
    }

    async fn handle_forever(&self) -> io::Result<()> {
        let reaper = tokio::spawn(expire_clients_forever(self.state.clone()));
        let result = self.accept_forever().await;
        reaper.abort();
        result
    }
}

impl NFSTcpListener {
    async fn accept_forever(&self) -> io::Result<()> {
        loop {
            let (socket, peer) = self.listener.accept().await?;
            let context = rpc::Context::new(
                &peer.to_string(),
                self.state.clone(),
                self.transaction_tracker.clone(),
            );
            info!("Accepting connection from {}", context.client_addr);
            debug!("Accepting socket {:?} {:?}", socket, context);
            tokio::spawn(async move {
                let _ = process_socket(socket, context).await;
            });
        }
    }
}
