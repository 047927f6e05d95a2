//! The transaction broker: one transport, many logical exchanges.
//!
//! A single dispatch task drains the transport and matches responses to
//! pending transactions by service id. Callers submit requests from any
//! task; at most one transaction is in flight per service id, enforced
//! by one async mutex per sid so unrelated services never contend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::component::Component;
use crate::transport::{Transport, TransportFrame};
use crate::uds::frame::{self, Direction, FrameBody};
use crate::uds::{NegativeResponseCode, Request, Response, ServiceRegistry, UdsError};

/// Default wait budget for one request/response exchange.
pub const DEFAULT_RESPONSE_BUDGET: Duration = Duration::from_millis(2000);

/// A pending negative response may precede the terminal outcome, so the
/// completion queue holds a few entries rather than exactly one.
const COMPLETION_QUEUE_DEPTH: usize = 4;

enum Outcome {
    Response(Response),
    Negative {
        sid: u8,
        code: NegativeResponseCode,
    },
}

/// Active transactions keyed by service id. Inserted by `request`,
/// removed when the transaction closes, looked up by the dispatch task.
#[derive(Default)]
struct ActiveTable {
    slots: Mutex<HashMap<u8, mpsc::Sender<Outcome>>>,
}

impl ActiveTable {
    fn insert(&self, sid: u8, tx: mpsc::Sender<Outcome>) {
        self.slots.lock().insert(sid, tx);
    }

    fn remove(&self, sid: u8) {
        self.slots.lock().remove(&sid);
    }

    fn get(&self, sid: u8) -> Option<mpsc::Sender<Outcome>> {
        self.slots.lock().get(&sid).cloned()
    }

    fn contains(&self, sid: u8) -> bool {
        self.slots.lock().contains_key(&sid)
    }

    /// Drop every sender; blocked waiters observe a closed channel.
    fn clear(&self) {
        self.slots.lock().clear();
    }
}

struct Shared {
    transport: Arc<dyn Transport>,
    registry: ServiceRegistry,
    active: ActiveTable,
    sid_locks: Mutex<HashMap<u8, Arc<tokio::sync::Mutex<()>>>>,
    reply_addresses: Vec<u32>,
    budget: Duration,
}

impl Shared {
    fn sid_lock(&self, sid: u8) -> Arc<tokio::sync::Mutex<()>> {
        self.sid_locks
            .lock()
            .entry(sid)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Builder for a [`Broker`]; `start` spawns the dispatch task.
pub struct BrokerBuilder {
    transport: Arc<dyn Transport>,
    registry: ServiceRegistry,
    budget: Duration,
    reply_addresses: Vec<u32>,
}

impl BrokerBuilder {
    /// Per-transaction wait budget (default 2000 ms).
    pub fn response_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Only accept inbound frames from these components' reply addresses.
    /// Without a filter, every inbound frame reaches the dispatcher.
    pub fn filter_replies_to(mut self, components: &[Component]) -> Self {
        self.reply_addresses = components.iter().map(|c| c.reply_id).collect();
        self
    }

    pub fn start(self) -> Broker {
        let shared = Arc::new(Shared {
            transport: self.transport,
            registry: self.registry,
            active: ActiveTable::default(),
            sid_locks: Mutex::new(HashMap::new()),
            reply_addresses: self.reply_addresses,
            budget: self.budget,
        });
        let dispatch = tokio::spawn(dispatch_loop(shared.clone()));
        Broker {
            shared,
            dispatch: Mutex::new(Some(dispatch)),
        }
    }
}

/// The session engine. Owns the transport for its lifetime; dropping the
/// broker aborts the dispatch task.
pub struct Broker {
    shared: Arc<Shared>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl Broker {
    pub fn builder(transport: Arc<dyn Transport>, registry: ServiceRegistry) -> BrokerBuilder {
        BrokerBuilder {
            transport,
            registry,
            budget: DEFAULT_RESPONSE_BUDGET,
            reply_addresses: Vec::new(),
        }
    }

    pub fn new(transport: Arc<dyn Transport>, registry: ServiceRegistry) -> Self {
        Self::builder(transport, registry).start()
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.shared.registry
    }

    /// Whether a transaction is currently registered for `sid`.
    /// Diagnostic introspection, mainly for tests.
    pub fn is_service_busy(&self, sid: u8) -> bool {
        self.shared.active.contains(sid)
    }

    /// Submit a request to a component.
    ///
    /// Waits for any prior transaction on the same service id to close
    /// before issuing. The returned [`Transaction`] must be consumed (or
    /// dropped) to free the service id for the next caller. If the
    /// transport write fails the transaction is torn down immediately
    /// and the error is returned here.
    pub async fn request(
        &self,
        component: &Component,
        request: Request,
    ) -> Result<Transaction, UdsError> {
        let sid = self.shared.registry.sid(request.kind())?;
        let bytes = frame::encode_request(&self.shared.registry, &request)?;
        let expects_response = request.expects_response();

        let permit = self.shared.sid_lock(sid).lock_owned().await;

        let (tx, rx) = mpsc::channel(COMPLETION_QUEUE_DEPTH);
        self.shared.active.insert(sid, tx);
        trace!(
            sid = format_args!("0x{sid:02X}"),
            component = %component.id,
            "transaction registered"
        );

        if let Err(e) = self.shared.transport.send(component.send_id, &bytes).await {
            // Never leave a dead entry behind: that would block this
            // service id forever.
            self.shared.active.remove(sid);
            warn!(sid = format_args!("0x{sid:02X}"), error = %e, "request write failed");
            return Err(e.into());
        }

        Ok(Transaction {
            sid,
            expects_response,
            rx,
            shared: self.shared.clone(),
            budget: self.shared.budget,
            _permit: permit,
        })
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        if let Some(handle) = self.dispatch.get_mut().take() {
            handle.abort();
        }
    }
}

/// One logical request/response exchange.
///
/// Consumed by exactly one waiter via [`Transaction::wait`]; dropping it
/// (waited or not) unregisters the transaction and releases the service
/// id for the next request.
pub struct Transaction {
    sid: u8,
    expects_response: bool,
    rx: mpsc::Receiver<Outcome>,
    shared: Arc<Shared>,
    budget: Duration,
    _permit: OwnedMutexGuard<()>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("sid", &self.sid)
            .field("expects_response", &self.expects_response)
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

impl Transaction {
    pub fn service_id(&self) -> u8 {
        self.sid
    }

    /// Wait up to the budget for the terminal outcome.
    ///
    /// Requests that suppress their response complete immediately with
    /// `Ok(None)`. A pending negative response never completes the
    /// transaction; only a terminal response or negative response does.
    pub async fn wait(mut self) -> Result<Option<Response>, UdsError> {
        if !self.expects_response {
            return Ok(None);
        }

        match tokio::time::timeout(self.budget, self.rx.recv()).await {
            Err(_) => Err(UdsError::Timeout),
            Ok(None) => Err(UdsError::SessionClosed),
            Ok(Some(Outcome::Response(response))) => Ok(Some(response)),
            Ok(Some(Outcome::Negative { sid, code })) => Err(UdsError::Negative { sid, code }),
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        // Unregister before the sid permit is released so the next
        // request never observes this transaction's slot.
        self.shared.active.remove(self.sid);
    }
}

async fn dispatch_loop(shared: Arc<Shared>) {
    debug!("dispatch loop started");
    loop {
        match shared.transport.recv().await {
            Ok(Some(frame)) => handle_frame(&shared, frame),
            Ok(None) => {
                debug!("transport closed, session over");
                break;
            }
            Err(e) => {
                error!(error = %e, "transport read failed, session over");
                break;
            }
        }
    }
    // Wake every blocked waiter with a closed channel instead of letting
    // them run out their timeout.
    shared.active.clear();
}

fn handle_frame(shared: &Shared, raw: TransportFrame) {
    if !shared.reply_addresses.is_empty() && !shared.reply_addresses.contains(&raw.address) {
        trace!(address = format_args!("0x{:X}", raw.address), "frame from unknown address dropped");
        return;
    }

    let decoded = frame::decode(&shared.registry, raw.address, Direction::Inbound, &raw.data);
    let frame = match decoded {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "undecodable frame skipped");
            return;
        }
    };

    match frame.body {
        FrameBody::Negative(negative) if negative.code.is_pending() => {
            // Non-terminal: the transaction stays open and keeps waiting.
            trace!(
                sid = format_args!("0x{:02X}", negative.rejected_sid),
                "response pending"
            );
        }
        FrameBody::Negative(negative) => match shared.active.get(negative.rejected_sid) {
            Some(tx) => supply(
                tx,
                Outcome::Negative {
                    sid: negative.rejected_sid,
                    code: negative.code,
                },
            ),
            None => trace!(
                sid = format_args!("0x{:02X}", negative.rejected_sid),
                "negative response with no open transaction dropped"
            ),
        },
        FrameBody::Response(response) => {
            // Resolve the originating request sid through the registry.
            let sid = match shared.registry.sid(response.kind()) {
                Ok(sid) => sid,
                Err(e) => {
                    warn!(error = %e, "response for unregistered service skipped");
                    return;
                }
            };
            match shared.active.get(sid) {
                Some(tx) => supply(tx, Outcome::Response(response)),
                None => trace!(
                    sid = format_args!("0x{sid:02X}"),
                    "late or unsolicited response dropped"
                ),
            }
        }
        FrameBody::Request(_) | FrameBody::Unknown(_) => {
            trace!("non-response frame dropped");
        }
    }
}

fn supply(tx: mpsc::Sender<Outcome>, outcome: Outcome) {
    if tx.try_send(outcome).is_err() {
        // Queue full or waiter already gone; either way the outcome has
        // nowhere to go.
        warn!("completion queue rejected outcome, dropping");
    }
}
