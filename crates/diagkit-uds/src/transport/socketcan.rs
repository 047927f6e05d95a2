//! SocketCAN ISO-TP transport (Linux only, `socketcan` feature).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use socketcan::ExtendedId;
use socketcan_isotp::IsoTpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::{Transport, TransportError, TransportFrame};

/// ISO-TP socket bound to one tx/rx CAN id pair.
///
/// A blocking listener thread drains the socket and feeds the inbound
/// queue; `recv` pulls from that queue. The kernel ISO-TP stack performs
/// all segmentation and reassembly.
pub struct SocketCanTransport {
    socket: Arc<Mutex<IsoTpSocket>>,
    rx_id: u32,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<TransportFrame>>,
    running: Arc<AtomicBool>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SocketCanTransport {
    pub fn open(interface: &str, tx_id: u32, rx_id: u32) -> Result<Self, TransportError> {
        let mut socket = Self::create_socket(interface, tx_id, rx_id)?;
        Self::drain_socket(&mut socket);

        let (inbound_tx, inbound_rx) = mpsc::channel(1024);
        let transport = Self {
            socket: Arc::new(Mutex::new(socket)),
            rx_id,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            running: Arc::new(AtomicBool::new(true)),
            listener: Mutex::new(None),
        };
        transport.start_listener(inbound_tx);
        Ok(transport)
    }

    fn create_socket(
        interface: &str,
        tx_id: u32,
        rx_id: u32,
    ) -> Result<IsoTpSocket, TransportError> {
        let ext_rx_id = ExtendedId::new(rx_id).ok_or_else(|| {
            TransportError::InvalidConfig(format!("Invalid extended CAN ID: 0x{:X}", rx_id))
        })?;
        let ext_tx_id = ExtendedId::new(tx_id).ok_or_else(|| {
            TransportError::InvalidConfig(format!("Invalid extended CAN ID: 0x{:X}", tx_id))
        })?;

        let socket = IsoTpSocket::open(interface, ext_rx_id, ext_tx_id).map_err(|e| {
            TransportError::ConnectionFailed(format!("Failed to open ISO-TP socket: {}", e))
        })?;
        socket.set_nonblocking(true).map_err(|e| {
            TransportError::InvalidConfig(format!("Failed to set non-blocking: {}", e))
        })?;
        Ok(socket)
    }

    /// Clear stale payloads left over from previous sessions.
    fn drain_socket(socket: &mut IsoTpSocket) {
        loop {
            match socket.read() {
                Ok(data) if !data.is_empty() => {
                    debug!(data = ?data, "Drained stale message from socket");
                }
                Ok(_) | Err(_) => break,
            }
        }
    }

    fn start_listener(&self, inbound_tx: mpsc::Sender<TransportFrame>) {
        let socket = self.socket.clone();
        let running = self.running.clone();
        let rx_id = self.rx_id;

        let handle = tokio::task::spawn_blocking(move || {
            while running.load(Ordering::SeqCst) {
                let result = {
                    let mut guard = socket.lock();
                    guard.read().map(|d| d.to_vec())
                };
                match result {
                    Ok(data) if !data.is_empty() => {
                        if inbound_tx
                            .blocking_send(TransportFrame::new(rx_id, data))
                            .is_err()
                        {
                            break;
                        }
                    }
                    Ok(_) => std::thread::sleep(Duration::from_millis(1)),
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    Err(e) => {
                        error!(?e, "SocketCAN read error");
                        std::thread::sleep(Duration::from_millis(100));
                    }
                }
            }
            debug!("SocketCAN listener stopped");
        });

        *self.listener.lock() = Some(handle);
    }
}

#[async_trait]
impl Transport for SocketCanTransport {
    async fn recv(&self) -> Result<Option<TransportFrame>, TransportError> {
        // The queue closes when the listener stops: orderly session end.
        Ok(self.inbound_rx.lock().await.recv().await)
    }

    async fn send(&self, _address: u32, data: &[u8]) -> Result<(), TransportError> {
        let socket = self.socket.clone();
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || {
            let guard = socket.lock();
            guard
                .write(&data)
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        })
        .await
        .map_err(|e| TransportError::SendFailed(format!("Task join error: {}", e)))?
    }
}

impl Drop for SocketCanTransport {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
