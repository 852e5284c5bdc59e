#[cfg(test)]
mod client_test;

use bytes::BytesMut;
use log::trace;
use shared::error::*;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::message::*;
use shared::{TaggedBytesMut, TransportContext, TransportMessage, TransportProtocol};

pub(crate) const DEFAULT_RTO: Duration = Duration::from_millis(300);
/// Rc, requests sent before a transaction gives up.
pub(crate) const DEFAULT_MAX_REQUESTS: u32 = 7;
/// Rm, the wait after the last request in multiples of the initial RTO.
pub(crate) const LAST_REQUEST_WAIT: u32 = 16;

/// Outcome of one transaction: the server's response, or why none came.
#[derive(Debug)]
pub struct Event {
    pub id: TransactionId,
    pub result: Result<Message>,
}

struct Transaction {
    raw: Vec<u8>,
    requests_sent: u32,
    rto: Duration,
    deadline: Instant,
}

pub struct ClientBuilder {
    rto: Duration,
    max_requests: u32,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            rto: DEFAULT_RTO,
            max_requests: DEFAULT_MAX_REQUESTS,
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// with_rto sets the first retransmission timeout, it doubles with every
    /// retransmission.
    pub fn with_rto(mut self, rto: Duration) -> Self {
        self.rto = rto;
        self
    }

    /// with_max_requests sets how many times a request goes out, the first
    /// one included. One means no retransmissions.
    pub fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests.max(1);
        self
    }

    pub fn build(
        self,
        local: SocketAddr,
        remote: SocketAddr,
        protocol: TransportProtocol,
        now: Instant,
    ) -> Result<Client> {
        if self.rto.is_zero() {
            return Err(Error::Other("stun client rto must not be zero".to_owned()));
        }
        Ok(Client {
            transport: TransportContext {
                local_addr: local,
                peer_addr: remote,
                transport_protocol: protocol,
            },
            rto: self.rto,
            max_requests: self.max_requests,
            transactions: HashMap::new(),
            transmits: VecDeque::new(),
            events: VecDeque::new(),
            now,
            closed: false,
        })
    }
}

/// Client runs request/response transactions with one STUN server over an
/// unreliable transport, retransmitting as RFC 5389 section 7.2.1 describes.
pub struct Client {
    transport: TransportContext,
    rto: Duration,
    max_requests: u32,
    transactions: HashMap<TransactionId, Transaction>,
    transmits: VecDeque<TaggedBytesMut>,
    events: VecDeque<Event>,
    now: Instant,
    closed: bool,
}

impl Client {
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.transport.peer_addr
    }

    /// Whether a transaction with this id is still outstanding.
    pub fn owns_transaction(&self, id: &TransactionId) -> bool {
        self.transactions.contains_key(id)
    }

    fn transmit(&mut self, raw: &[u8]) {
        self.transmits.push_back(TransportMessage {
            now: self.now,
            transport: self.transport,
            message: BytesMut::from(raw),
        });
    }

    /// The wait after the request that was just sent.
    fn wait_after(&self, transaction: &Transaction) -> Duration {
        if self.max_requests > 1 && transaction.requests_sent >= self.max_requests {
            self.rto * LAST_REQUEST_WAIT
        } else {
            transaction.rto
        }
    }
}

impl sansio::Protocol<TaggedBytesMut, Message, ()> for Client {
    type Rout = ();
    type Wout = TaggedBytesMut;
    type Eout = Event;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        self.now = msg.now;
        let mut response = Message::new();
        response.unmarshal_binary(&msg.message)?;
        if self.transactions.remove(&response.transaction_id).is_none() {
            trace!("stun client dropped response for unknown transaction");
            return Ok(());
        }
        self.events.push_back(Event {
            id: response.transaction_id,
            result: Ok(response),
        });
        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        None
    }

    fn handle_write(&mut self, m: Message) -> Result<()> {
        if self.closed {
            return Err(Error::ErrClientClosed);
        }
        if self.transactions.contains_key(&m.transaction_id) {
            return Err(Error::ErrTransactionExists);
        }

        self.transmit(&m.raw);
        let mut transaction = Transaction {
            raw: m.raw,
            requests_sent: 1,
            rto: self.rto,
            deadline: self.now,
        };
        transaction.deadline = self.now + self.wait_after(&transaction);
        self.transactions.insert(m.transaction_id, transaction);
        Ok(())
    }

    /// Returns packets to transmit
    ///
    /// It should be polled for transmit after:
    /// - a call was made to `handle_write`
    /// - a call was made to `handle_timeout`
    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.transmits.pop_front()
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.events.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        self.now = now;
        let expired: Vec<TransactionId> = self
            .transactions
            .iter()
            .filter(|(_, t)| t.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in expired {
            let Some(mut transaction) = self.transactions.remove(&id) else {
                continue;
            };
            if transaction.requests_sent >= self.max_requests {
                self.events.push_back(Event {
                    id,
                    result: Err(Error::ErrTransactionTimeOut),
                });
                continue;
            }

            transaction.requests_sent += 1;
            transaction.rto *= 2;
            transaction.deadline = now + self.wait_after(&transaction);
            trace!(
                "stun client retransmit {} of {} to {}",
                transaction.requests_sent,
                self.max_requests,
                self.transport.peer_addr
            );
            self.transmit(&transaction.raw);
            self.transactions.insert(id, transaction);
        }
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Self::Time> {
        self.transactions.values().map(|t| t.deadline).min()
    }

    /// Cancels every outstanding transaction with `ErrClientClosed`.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ErrClientClosed);
        }
        self.closed = true;
        for (id, _) in self.transactions.drain() {
            self.events.push_back(Event {
                id,
                result: Err(Error::ErrClientClosed),
            });
        }
        self.transmits.clear();
        Ok(())
    }
}
