use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use portable_atomic::{AtomicBool, Ordering};
use tokio::net::UdpSocket;
use tokio::runtime;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::error;

use crate::common::{BuildError, Error};
use crate::telemetry::Telemetry;

/// Delivers rendered datagrams to a stats daemon.
///
/// The default is [`UdpTransport`]; anything else (a unix socket, a test double) can be
/// plugged in through [`DogStatsdBuilder::with_transport`](crate::DogStatsdBuilder::with_transport).
pub trait Transport: Send + Sync {
    /// Short name reported in the client telemetry tags.
    fn kind(&self) -> &str {
        "custom"
    }

    /// Queues a single datagram line, without a trailing newline.
    fn send(&self, datagram: String) -> Result<(), Error>;

    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn kind(&self) -> &str {
        (**self).kind()
    }

    fn send(&self, datagram: String) -> Result<(), Error> {
        (**self).send(datagram)
    }

    fn flush(&self) -> Result<(), Error> {
        (**self).flush()
    }

    fn close(&self) -> Result<(), Error> {
        (**self).close()
    }
}

enum Command {
    Datagram(String),
    Flush,
    Close,
}

/// Sends datagrams over UDP from a background exporter task.
///
/// Lines are queued without blocking and batched into packets of at most the configured
/// size, which are sent when full, on every flush interval, and on close.
pub struct UdpTransport {
    sender: mpsc::UnboundedSender<Command>,
    closed: AtomicBool,
}

impl UdpTransport {
    /// Starts the exporter.
    ///
    /// When called from within a Tokio runtime, the exporter future is spawned directly
    /// into the runtime.  Otherwise, a new single-threaded Tokio runtime is created
    /// on a background thread, and the exporter is spawned there.
    pub(crate) fn spawn(
        endpoint: SocketAddr,
        max_packet_size: usize,
        flush_interval: Duration,
        telemetry: Option<Arc<Telemetry>>,
    ) -> Result<Self, BuildError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let exporter = async move {
            let result = run_exporter(
                receiver,
                endpoint,
                max_packet_size,
                flush_interval,
                telemetry,
            )
            .await;
            if let Err(e) = result {
                error!("dogstatsd exporter stopped: {:?}", e);
            }
        };

        if let Ok(handle) = runtime::Handle::try_current() {
            handle.spawn(exporter);
        } else {
            let runtime = runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| BuildError::FailedToCreateRuntime(e.to_string()))?;

            thread::Builder::new()
                .name("tagged-metrics-dogstatsd-udp".to_string())
                .spawn(move || runtime.block_on(exporter))
                .map_err(|e| BuildError::FailedToCreateRuntime(e.to_string()))?;
        }

        Ok(Self {
            sender,
            closed: AtomicBool::new(false),
        })
    }

    fn command(&self, command: Command) -> Result<(), Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        self.sender.send(command).map_err(|_| Error::Closed)
    }
}

impl Transport for UdpTransport {
    fn kind(&self) -> &str {
        "udp"
    }

    fn send(&self, datagram: String) -> Result<(), Error> {
        self.command(Command::Datagram(datagram))
    }

    fn flush(&self) -> Result<(), Error> {
        self.command(Command::Flush)
    }

    fn close(&self) -> Result<(), Error> {
        self.command(Command::Close)?;
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Newline separated lines waiting to go out as one datagram.
///
/// A line is only added while the packet stays within `max_size`, so a packet is over the
/// limit only when it holds a single line that is larger on its own.
struct Packet {
    buf: String,
    max_size: usize,
}

impl Packet {
    fn new(max_size: usize) -> Self {
        Self {
            buf: String::new(),
            max_size,
        }
    }

    fn fits(&self, line: &str) -> bool {
        self.buf.is_empty() || self.buf.len() + line.len() + 1 <= self.max_size
    }

    fn push(&mut self, line: &str) {
        self.buf.push_str(line);
        self.buf.push('\n');
    }

    fn take(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }
}

async fn run_exporter(
    mut receiver: mpsc::UnboundedReceiver<Command>,
    endpoint: SocketAddr,
    max_packet_size: usize,
    flush_interval: Duration,
    telemetry: Option<Arc<Telemetry>>,
) -> io::Result<()> {
    let bind = if endpoint.is_ipv4() {
        "0.0.0.0:0"
    } else {
        "[::]:0"
    };
    let socket = UdpSocket::bind(bind).await?;
    let telemetry = telemetry.as_deref();

    let mut packet = Packet::new(max_packet_size);
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = receiver.recv() => match command {
                Some(Command::Datagram(line)) => {
                    if !packet.fits(&line) {
                        send_packet(&socket, &mut packet, &endpoint, telemetry).await;
                    }
                    packet.push(&line);
                }
                Some(Command::Flush) => {
                    send_packet(&socket, &mut packet, &endpoint, telemetry).await;
                }
                Some(Command::Close) | None => {
                    send_packet(&socket, &mut packet, &endpoint, telemetry).await;
                    return Ok(());
                }
            },
            _ = ticker.tick() => {
                send_packet(&socket, &mut packet, &endpoint, telemetry).await;
            }
        }
    }
}

/// Sends the buffered lines, if any. A failed send drops the packet and the exporter
/// carries on with the next one.
async fn send_packet(
    socket: &UdpSocket,
    packet: &mut Packet,
    endpoint: &SocketAddr,
    telemetry: Option<&Telemetry>,
) {
    let Some(body) = packet.take() else {
        return;
    };

    match socket.send_to(body.as_bytes(), endpoint).await {
        Ok(sent) => {
            if sent != body.len() {
                error!("UDP socket sent {} of {} bytes", sent, body.len());
            }
            if let Some(telemetry) = telemetry {
                telemetry.packets_sent.fetch_add(1, Ordering::Relaxed);
                telemetry.bytes_sent.fetch_add(sent as u64, Ordering::Relaxed);
            }
        }
        Err(e) => {
            error!("error sending metrics to the daemon: {:?}", e);
            if let Some(telemetry) = telemetry {
                telemetry.packets_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
