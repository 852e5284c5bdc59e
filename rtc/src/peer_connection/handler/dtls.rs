use crate::peer_connection::event::RTCEventInternal;
use crate::peer_connection::message::internal::{Layer, PipelineMessage};
use crate::peer_connection::transport::dtls::RTCDtlsTransport;
use crate::peer_connection::transport::dtls::state::RTCDtlsTransportState;
use dtls::DtlsEvent;
use log::{debug, trace, warn};
use sansio::Protocol;
use shared::error::{Error, Result};
use shared::{TransportContext, TransportMessage};
use std::collections::VecDeque;
use std::time::Instant;

pub(crate) struct DtlsHandlerContext {
    pub(crate) dtls_transport: RTCDtlsTransport,

    pub(crate) read_outs: VecDeque<PipelineMessage>,
    pub(crate) write_outs: VecDeque<PipelineMessage>,
    pub(crate) event_outs: VecDeque<RTCEventInternal>,
}

impl DtlsHandlerContext {
    pub(crate) fn new(dtls_transport: RTCDtlsTransport) -> Self {
        Self {
            dtls_transport,
            read_outs: VecDeque::new(),
            write_outs: VecDeque::new(),
            event_outs: VecDeque::new(),
        }
    }
}

/// DtlsHandler implements DTLS Protocol handling
pub(crate) struct DtlsHandler<'a> {
    ctx: &'a mut DtlsHandlerContext,
}

impl<'a> DtlsHandler<'a> {
    pub(crate) fn new(ctx: &'a mut DtlsHandlerContext) -> Self {
        DtlsHandler { ctx }
    }

    pub(crate) fn name(&self) -> &'static str {
        "DtlsHandler"
    }

    fn handle_dtls_event(&mut self, evt: DtlsEvent) {
        let transport = &mut self.ctx.dtls_transport;
        match evt {
            DtlsEvent::HandshakeComplete => {
                debug!("dtls handshake complete as {}", transport.role());
                transport.state_change(RTCDtlsTransportState::Connected);
                self.ctx
                    .event_outs
                    .push_back(RTCEventInternal::DTLSHandshakeComplete);
            }
            DtlsEvent::HandshakeFailed(err) | DtlsEvent::Failed(err) => {
                warn!("dtls transport failed: {err}");
                transport.state_change(RTCDtlsTransportState::Failed);
                self.ctx
                    .event_outs
                    .push_back(RTCEventInternal::DTLSFailed(err));
            }
            DtlsEvent::Closed => {
                debug!("dtls transport closed by peer");
                transport.state_change(RTCDtlsTransportState::Closed);
                self.ctx.event_outs.push_back(RTCEventInternal::DTLSClosed);
            }
        }
    }
}

impl<'a> sansio::Protocol<PipelineMessage, PipelineMessage, RTCEventInternal>
    for DtlsHandler<'a>
{
    type Rout = PipelineMessage;
    type Wout = PipelineMessage;
    type Eout = RTCEventInternal;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: PipelineMessage) -> Result<()> {
        if let Layer::Dtls(dtls_message) = msg.message {
            trace!("recv dtls RAW {:?}", msg.transport.peer_addr);

            let conn = self
                .ctx
                .dtls_transport
                .conn
                .as_mut()
                .ok_or(Error::ErrDtlsTransportNotStarted)?;
            conn.handle_read(TransportMessage {
                now: msg.now,
                transport: msg.transport,
                message: dtls_message,
            })?;

            while let Some(message) = conn.poll_read() {
                self.ctx.read_outs.push_back(PipelineMessage {
                    now: msg.now,
                    transport: msg.transport,
                    message: Layer::Dtls(message),
                });
            }
        } else {
            // bypass
            debug!("bypass dtls read {:?}", msg.transport.peer_addr);
            self.ctx.read_outs.push_back(msg);
        }

        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.ctx.read_outs.pop_front()
    }

    fn handle_write(&mut self, msg: PipelineMessage) -> Result<()> {
        if let Layer::Dtls(message) = msg.message {
            let conn = self
                .ctx
                .dtls_transport
                .conn
                .as_mut()
                .ok_or(Error::ErrDtlsTransportNotStarted)?;
            conn.handle_write(message)
        } else {
            // bypass
            debug!("bypass dtls write {:?}", msg.transport.peer_addr);
            self.ctx.write_outs.push_back(msg);
            Ok(())
        }
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        if let Some(conn) = self.ctx.dtls_transport.conn.as_mut() {
            while let Some(transmit) = conn.poll_write() {
                self.ctx.write_outs.push_back(PipelineMessage {
                    now: transmit.now,
                    transport: transmit.transport,
                    message: Layer::Raw(transmit.message),
                });
            }
        }

        self.ctx.write_outs.pop_front()
    }

    fn handle_event(&mut self, evt: RTCEventInternal) -> Result<()> {
        if let RTCEventInternal::ICESelectedCandidatePairChange = &evt {
            let is_client = self.ctx.dtls_transport.is_client();
            if let Some(conn) = self.ctx.dtls_transport.conn.as_mut() {
                // A server waits for the ClientHello, and a client that already
                // started keeps its handshake across a path change.
                if is_client && !conn.is_handshake_completed() {
                    debug!("start dtls handshake as client");
                    conn.start(Instant::now(), TransportContext::default())?;
                }
            }
        }
        self.ctx.event_outs.push_back(evt);
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        let mut dtls_events = vec![];
        if let Some(conn) = self.ctx.dtls_transport.conn.as_mut() {
            while let Some(evt) = conn.poll_event() {
                dtls_events.push(evt);
            }
        }
        for evt in dtls_events {
            self.handle_dtls_event(evt);
        }

        self.ctx.event_outs.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        if let Some(conn) = self.ctx.dtls_transport.conn.as_mut() {
            conn.handle_timeout(now)?;
        }
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        self.ctx
            .dtls_transport
            .conn
            .as_mut()
            .and_then(|conn| conn.poll_timeout())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.ctx.dtls_transport.conn.as_mut() {
            conn.close()?;
        }
        self.ctx.dtls_transport.stop()
    }
}
