//! Diameter peer session state machine
//!
//! Owns one TCP peer relationship end to end: perpetual dial/redial, the
//! capability-exchange handshake, watchdog answering, hop-by-hop/end-to-end
//! identifier assignment, and the fan-out between the wire and the
//! application queues.
//!
//! Task layout per peer:
//! - one reader task: dial loop plus blocking read loop feeding the
//!   [`Framer`]; any read error marks the link DOWN and redials forever
//! - a pool of dispatcher tasks, each selecting over the inbound frame
//!   queue, the outbound application queue and the internal management
//!   queue (first-ready-wins, no priority between them)
//! - a pool of writer tasks draining a single outbound byte-frame queue
//!
//! Frames from the socket reach dispatchers in emission order, but with
//! several dispatchers consuming one queue there is no guarantee two frames
//! finish processing in arrival order; applications needing strict ordering
//! must serialize their own sends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use crate::avp::Avp;
use crate::common::{app_id, avp_code, cmd_code};
use crate::config::PeerConfig;
use crate::dictionary::Dictionary;
use crate::error::{DiameterError, DiameterResult, ResultCode};
use crate::framer::Framer;
use crate::message::{Header, Message};

const CHANNEL_DEPTH: usize = 100;

/// Management events surfaced to the application
#[derive(Debug)]
pub enum PeerEvent {
    /// TCP connection established, CER sent
    TcpUp,
    /// Capabilities-Exchange-Answer received from the peer
    CeaReceived(Message),
    /// An outbound frame was dropped or failed to write; only emitted when
    /// `surface_write_errors` is set
    WriteFailed,
}

/// Internal events from the reader to the dispatchers
enum LinkEvent {
    TcpUp,
}

/// Application-side receive channels for one peer
pub struct PeerChannels {
    /// Fully decoded inbound messages
    pub incoming: mpsc::Receiver<Message>,
    /// Connection management events
    pub events: mpsc::Receiver<PeerEvent>,
}

/// Hop-by-hop/end-to-end identifier and session-id counters.
///
/// All three counters live behind one lock; every access is a
/// read-modify-write, so they are never distributed across components.
pub struct Counters {
    state: StdMutex<CounterState>,
    start_time: String,
}

struct CounterState {
    hop_by_hop: u32,
    end_to_end: u32,
    run_index: u32,
}

impl Counters {
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        // current time mixed with a random offset, fixed for the lifetime
        // of the connection
        let start_time = now.saturating_sub((rng.gen::<u32>() >> 3) as u64);
        Self {
            state: StdMutex::new(CounterState {
                hop_by_hop: rng.gen(),
                end_to_end: rng.gen(),
                run_index: 0,
            }),
            start_time: start_time.to_string(),
        }
    }

    pub fn next_hop_by_hop(&self) -> u32 {
        let mut state = self.state.lock().unwrap();
        state.hop_by_hop = state.hop_by_hop.wrapping_add(1);
        state.hop_by_hop
    }

    pub fn next_end_to_end(&self) -> u32 {
        let mut state = self.state.lock().unwrap();
        state.end_to_end = state.end_to_end.wrapping_add(1);
        state.end_to_end
    }

    /// Globally unique session id: `origin_host;start_time;run_index`
    pub fn session_id(&self, origin_host: &str) -> String {
        let run = {
            let mut state = self.state.lock().unwrap();
            state.run_index = state.run_index.wrapping_add(1);
            state.run_index
        };
        format!("{origin_host};{};{run}", self.start_time)
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

/// Link state shared between the reader and the writer pool. The write half
/// is replaced wholesale on every reconnect, never mutated in place, and the
/// UP flag is published with release ordering so writers observing UP also
/// observe the new socket.
struct Link {
    up: AtomicBool,
    writer: Mutex<Option<OwnedWriteHalf>>,
}

type SharedRx<T> = Arc<Mutex<mpsc::Receiver<T>>>;

async fn recv_shared<T>(rx: &SharedRx<T>) -> Option<T> {
    rx.lock().await.recv().await
}

/// Handle to a running peer connection
pub struct Peer {
    cfg: Arc<PeerConfig>,
    counters: Arc<Counters>,
    outgoing: mpsc::Sender<Message>,
}

impl Peer {
    /// Spawn the reader, dispatcher and writer tasks for one peer and return
    /// the handle plus the application-side channels. Must be called from
    /// within a tokio runtime.
    pub fn connect(cfg: PeerConfig, dict: Arc<Dictionary>) -> (Peer, PeerChannels) {
        let cfg = Arc::new(cfg);
        let counters = Arc::new(Counters::new());
        let link = Arc::new(Link {
            up: AtomicBool::new(false),
            writer: Mutex::new(None),
        });

        let (frame_tx, frame_rx) = mpsc::channel::<Bytes>(CHANNEL_DEPTH);
        let (mgmt_tx, mgmt_rx) = mpsc::channel::<LinkEvent>(CHANNEL_DEPTH);
        let (out_tx, out_rx) = mpsc::channel::<Message>(CHANNEL_DEPTH);
        let (byte_tx, byte_rx) = mpsc::channel::<Bytes>(CHANNEL_DEPTH);
        let (in_tx, incoming) = mpsc::channel::<Message>(CHANNEL_DEPTH);
        let (event_tx, events) = mpsc::channel::<PeerEvent>(CHANNEL_DEPTH);

        tokio::spawn(reader_task(
            cfg.clone(),
            link.clone(),
            frame_tx,
            mgmt_tx,
        ));

        let frame_rx: SharedRx<Bytes> = Arc::new(Mutex::new(frame_rx));
        let out_rx: SharedRx<Message> = Arc::new(Mutex::new(out_rx));
        let mgmt_rx: SharedRx<LinkEvent> = Arc::new(Mutex::new(mgmt_rx));
        let byte_rx: SharedRx<Bytes> = Arc::new(Mutex::new(byte_rx));

        for _ in 0..cfg.dispatcher_pool.max(1) {
            let dispatcher = Dispatcher {
                cfg: cfg.clone(),
                dict: dict.clone(),
                counters: counters.clone(),
                frame_rx: frame_rx.clone(),
                out_rx: out_rx.clone(),
                mgmt_rx: mgmt_rx.clone(),
                byte_tx: byte_tx.clone(),
                in_tx: in_tx.clone(),
                event_tx: event_tx.clone(),
            };
            tokio::spawn(dispatcher.run());
        }

        for _ in 0..cfg.writer_pool.max(1) {
            tokio::spawn(writer_task(
                cfg.clone(),
                link.clone(),
                byte_rx.clone(),
                event_tx.clone(),
            ));
        }

        let peer = Peer {
            cfg,
            counters,
            outgoing: out_tx,
        };
        (peer, PeerChannels { incoming, events })
    }

    /// Clone the outbound message sender
    pub fn sender(&self) -> mpsc::Sender<Message> {
        self.outgoing.clone()
    }

    /// Queue a message for sending. Zero hop-by-hop/end-to-end identifiers
    /// are assigned from the connection counters before encoding.
    pub async fn send(&self, msg: Message) -> DiameterResult<()> {
        self.outgoing
            .send(msg)
            .await
            .map_err(|_| DiameterError::ChannelClosed)
    }

    /// Generate the next session id for this connection
    pub fn session_id(&self) -> String {
        self.counters.session_id(&self.cfg.origin_host)
    }

    /// Explicitly start the periodic watchdog sender. Never armed
    /// automatically; most deployments rely on answering the peer's DWR
    /// instead.
    pub fn start_watchdog(&self, interval: Duration) -> JoinHandle<()> {
        let cfg = self.cfg.clone();
        let outgoing = self.outgoing.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // the first tick fires immediately
            loop {
                ticker.tick().await;
                log::trace!("{} sending watchdog request", cfg.name);
                if outgoing.send(build_dwr(&cfg)).await.is_err() {
                    break;
                }
            }
        })
    }
}

/// Dial loop plus read loop; runs for the life of the peer
async fn reader_task(
    cfg: Arc<PeerConfig>,
    link: Arc<Link>,
    frame_tx: mpsc::Sender<Bytes>,
    mgmt_tx: mpsc::Sender<LinkEvent>,
) {
    let mut read_buf = vec![0u8; 64 * 1024];
    loop {
        let stream = dial(&cfg).await;
        let (mut read_half, write_half) = stream.into_split();

        *link.writer.lock().await = Some(write_half);
        link.up.store(true, Ordering::Release);

        if mgmt_tx.send(LinkEvent::TcpUp).await.is_err() {
            return;
        }

        let mut framer = Framer::new();
        loop {
            match read_half.read(&mut read_buf).await {
                Ok(0) => {
                    log::info!("{} connection closed by peer", cfg.name);
                    break;
                }
                Ok(n) => {
                    for frame in framer.push(&read_buf[..n]) {
                        if frame_tx.send(frame).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    log::info!("{} error received from socket: {e}", cfg.name);
                    break;
                }
            }
        }

        link.up.store(false, Ordering::Release);
        *link.writer.lock().await = None;
    }
}

/// Perpetual connect-retry loop: bounded per-attempt timeout, fixed backoff,
/// no retry limit
async fn dial(cfg: &PeerConfig) -> TcpStream {
    loop {
        log::trace!("{} initiating connection: {}", cfg.name, cfg.peer_addr);
        match timeout(cfg.dial_timeout, TcpStream::connect(&cfg.peer_addr)).await {
            Ok(Ok(stream)) => {
                log::trace!("{} connection established: {}", cfg.name, cfg.peer_addr);
                return stream;
            }
            Ok(Err(e)) => log::error!("{} {e}", cfg.name),
            Err(_) => log::error!("{} dial timeout: {}", cfg.name, cfg.peer_addr),
        }
        sleep(cfg.retry_interval).await;
    }
}

struct Dispatcher {
    cfg: Arc<PeerConfig>,
    dict: Arc<Dictionary>,
    counters: Arc<Counters>,
    frame_rx: SharedRx<Bytes>,
    out_rx: SharedRx<Message>,
    mgmt_rx: SharedRx<LinkEvent>,
    byte_tx: mpsc::Sender<Bytes>,
    in_tx: mpsc::Sender<Message>,
    event_tx: mpsc::Sender<PeerEvent>,
}

impl Dispatcher {
    async fn run(self) {
        loop {
            tokio::select! {
                frame = recv_shared(&self.frame_rx) => match frame {
                    Some(frame) => self.handle_frame(frame).await,
                    None => break,
                },
                msg = recv_shared(&self.out_rx) => match msg {
                    Some(msg) => self.handle_outbound(msg).await,
                    None => break,
                },
                event = recv_shared(&self.mgmt_rx) => match event {
                    Some(LinkEvent::TcpUp) => self.handle_tcp_up().await,
                    None => break,
                },
            }
        }
    }

    /// Classify an inbound frame from its header alone; control traffic is
    /// intercepted without a full decode of the whole message body.
    async fn handle_frame(&self, frame: Bytes) {
        let header = match Header::decode(&frame) {
            Ok(h) => h,
            Err(e) => {
                log::warn!("{} dropping unparseable frame: {e}", self.cfg.name);
                return;
            }
        };

        if header.length as usize != frame.len() {
            log::error!(
                "{} invalid message length: declared {}, frame {}",
                self.cfg.name,
                header.length,
                frame.len()
            );
        }

        if header.is_answer() && header.command_code == cmd_code::CAPABILITIES_EXCHANGE {
            log::trace!("{} got CEA", self.cfg.name);
            match Message::decode(&frame, &self.dict) {
                Ok(cea) => {
                    let _ = self.event_tx.send(PeerEvent::CeaReceived(cea)).await;
                }
                Err(e) => log::warn!("{} failed to decode CEA: {e}", self.cfg.name),
            }
            return;
        }

        if header.is_request() && header.command_code == cmd_code::DEVICE_WATCHDOG {
            log::trace!("{} got watchdog", self.cfg.name);
            let dwa = build_dwa(&self.cfg, &header);
            let _ = self.byte_tx.send(dwa.encode().freeze()).await;
            return;
        }

        match Message::decode(&frame, &self.dict) {
            Ok(msg) => {
                let _ = self.in_tx.send(msg).await;
            }
            Err(e) => log::warn!("{} failed to decode message: {e}", self.cfg.name),
        }
    }

    /// Assign identifiers where the application left them zero, then encode
    /// and hand the frame to the write path
    async fn handle_outbound(&self, mut msg: Message) {
        if msg.header.hop_by_hop_id == 0 {
            msg.header.hop_by_hop_id = self.counters.next_hop_by_hop();
        }
        if msg.header.end_to_end_id == 0 {
            msg.header.end_to_end_id = self.counters.next_end_to_end();
        }
        let _ = self.byte_tx.send(msg.encode().freeze()).await;
    }

    /// TCP came up: send the CER and tell the application
    async fn handle_tcp_up(&self) {
        let cer = build_cer(&self.cfg, &self.counters);
        let _ = self.byte_tx.send(cer.encode().freeze()).await;
        let _ = self.event_tx.send(PeerEvent::TcpUp).await;
    }
}

/// Drains the outbound byte-frame queue onto the live socket. A frame queued
/// while the link is down is discarded with a warning and is not requeued;
/// `surface_write_errors` additionally reports it as a peer event. Write
/// errors do not transition the link, only read errors do.
async fn writer_task(
    cfg: Arc<PeerConfig>,
    link: Arc<Link>,
    byte_rx: SharedRx<Bytes>,
    event_tx: mpsc::Sender<PeerEvent>,
) {
    loop {
        let frame = match recv_shared(&byte_rx).await {
            Some(frame) => frame,
            None => break,
        };

        if !link.up.load(Ordering::Acquire) {
            log::warn!(
                "{} trying to write, but tcp connection is down: {} bytes dropped",
                cfg.name,
                frame.len()
            );
            if cfg.surface_write_errors {
                let _ = event_tx.send(PeerEvent::WriteFailed).await;
            }
            continue;
        }

        let mut guard = link.writer.lock().await;
        match guard.as_mut() {
            None => {
                log::warn!("{} no socket, {} bytes dropped", cfg.name, frame.len());
                if cfg.surface_write_errors {
                    let _ = event_tx.send(PeerEvent::WriteFailed).await;
                }
            }
            Some(writer) => {
                if let Err(e) = writer.write_all(&frame).await {
                    log::warn!("{} write failed: {e}", cfg.name);
                    if cfg.surface_write_errors {
                        let _ = event_tx.send(PeerEvent::WriteFailed).await;
                    }
                }
            }
        }
    }
}

/// Capabilities-Exchange-Request advertising the local identity
fn build_cer(cfg: &PeerConfig, counters: &Counters) -> Message {
    let avps = vec![
        Avp::utf8_string(avp_code::ORIGIN_HOST, cfg.origin_host.clone(), true, 0),
        Avp::utf8_string(avp_code::ORIGIN_REALM, cfg.origin_realm.clone(), true, 0),
        Avp::address_ipv4(avp_code::HOST_IP_ADDRESS, cfg.host_ip, true, 0),
        Avp::utf8_string(avp_code::PRODUCT_NAME, cfg.product_name.clone(), true, 0),
        Avp::unsigned32(avp_code::VENDOR_ID, cfg.vendor_id, true, 0),
        Avp::unsigned32(avp_code::AUTH_APPLICATION_ID, cfg.auth_application_id, true, 0),
    ];
    Message::new(
        cmd_code::CAPABILITIES_EXCHANGE,
        true,
        false,
        app_id::COMMON,
        counters.next_hop_by_hop(),
        counters.next_end_to_end(),
        avps,
    )
}

/// Device-Watchdog-Answer echoing the request's identifiers
fn build_dwa(cfg: &PeerConfig, dwr: &Header) -> Message {
    let mut dwa = Message::answer_to(dwr);
    dwa.add_avp(Avp::utf8_string(
        avp_code::ORIGIN_HOST,
        cfg.origin_host.clone(),
        true,
        0,
    ));
    dwa.add_avp(Avp::utf8_string(
        avp_code::ORIGIN_REALM,
        cfg.origin_realm.clone(),
        true,
        0,
    ));
    dwa.add_avp(Avp::unsigned32(
        avp_code::RESULT_CODE,
        ResultCode::Success as u32,
        true,
        0,
    ));
    dwa
}

/// Device-Watchdog-Request; identifiers are assigned on the outbound path
fn build_dwr(cfg: &PeerConfig) -> Message {
    Message::new(
        cmd_code::DEVICE_WATCHDOG,
        true,
        false,
        app_id::COMMON,
        0,
        0,
        vec![
            Avp::utf8_string(avp_code::ORIGIN_HOST, cfg.origin_host.clone(), true, 0),
            Avp::utf8_string(avp_code::ORIGIN_REALM, cfg.origin_realm.clone(), true, 0),
        ],
    )
}
