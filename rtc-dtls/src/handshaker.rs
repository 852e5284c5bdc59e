use crate::conn::*;
use shared::error::*;

use log::*;
use std::fmt;
use std::time::Instant;

// [RFC6347 Section-4.2.4]
//                      +-----------+
//                +---> | PREPARING |
//                |     +-----------+
//                |           |
//                |           | Buffer next flight
//                |           |
//                |          \|/
//                |     +-----------+
//                |     |  SENDING  |<------------------+
//                |     +-----------+                   |
//        Receive |           |                         |
//           next |           | Send flight             |
//         flight |  +--------+                         |
//                |  |        | Set retransmit timer    |
//                |  |       \|/                        |
//                |  |  +-----------+                   |
//                +--)--|  WAITING  |-------------------+
//                |  |  +-----------+   Timer expires   |
//                |  |         |                        |
//                |  |         +------------------------+
//        Receive |  | Send           Read retransmit
//           last |  | last
//         flight |  | flight
//                |  |
//               \|/\|/
//            +-----------+
//            | FINISHED  |
//            +-----------+
//                 |  /|\
//                 |   |
//                 +---+
//              Read retransmit
//           Retransmit last flight

#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum HandshakeState {
    Errored,
    Preparing,
    Sending,
    Waiting,
    Finished,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HandshakeState::Errored => write!(f, "Errored"),
            HandshakeState::Preparing => write!(f, "Preparing"),
            HandshakeState::Sending => write!(f, "Sending"),
            HandshakeState::Waiting => write!(f, "Waiting"),
            HandshakeState::Finished => write!(f, "Finished"),
        }
    }
}

pub(crate) fn srv_cli_str(is_client: bool) -> &'static str {
    if is_client { "client" } else { "server" }
}

impl DTLSConn {
    pub(crate) fn handshake(&mut self) -> Result<()> {
        loop {
            trace!(
                "[handshake:{}] {}: {}",
                srv_cli_str(self.state.is_client),
                self.current_flight,
                self.current_handshake_state
            );

            if self.current_handshake_state == HandshakeState::Finished
                && !self.is_handshake_completed()
            {
                self.set_handshake_completed();
                debug!(
                    "[handshake:{}] is completed",
                    srv_cli_str(self.state.is_client),
                );
                return Ok(());
            }

            let previous_handshake_state = self.current_handshake_state;
            self.current_handshake_state = match previous_handshake_state {
                HandshakeState::Preparing => self.prepare()?,
                HandshakeState::Sending => self.send()?,
                HandshakeState::Waiting => self.wait()?,
                HandshakeState::Finished => self.finish()?,
                HandshakeState::Errored => return Err(Error::ErrInvalidFsmTransition),
            };

            if previous_handshake_state == self.current_handshake_state
                && matches!(
                    previous_handshake_state,
                    HandshakeState::Waiting | HandshakeState::Finished
                )
            {
                // wait for timeout or incoming packet
                return Ok(());
            }
        }
    }

    fn prepare(&mut self) -> Result<HandshakeState> {
        self.flights = None;

        self.current_retransmit_count = 0;
        self.retransmit = self.current_flight.has_retransmit();

        let result = self
            .current_flight
            .generate(&mut self.state, &self.cache, &self.cfg);

        match result {
            Err((alert, err)) => {
                if let Some(alert) = alert {
                    self.notify(alert.alert_level, alert.alert_description);
                }
                if let Some(err) = err {
                    return Err(err);
                }
            }
            Ok(pkts) => self.flights = Some(pkts),
        };

        let epoch = self.get_local_epoch();
        let next_epoch = self
            .flights
            .iter()
            .flatten()
            .map(|p| p.record.record_layer_header.epoch)
            .fold(epoch, u16::max);
        if epoch != next_epoch {
            debug!(
                "[handshake:{}] -> changeCipherSpec (epoch: {})",
                srv_cli_str(self.state.is_client),
                next_epoch
            );
            self.set_local_epoch(next_epoch);
        }

        Ok(HandshakeState::Sending)
    }

    fn send(&mut self) -> Result<HandshakeState> {
        if let Some(pkts) = self.flights.clone() {
            self.write_packets(pkts);
        }

        if self.current_flight.is_last_send_flight() {
            self.current_retransmit_timer = None;
            Ok(HandshakeState::Finished)
        } else if !self.retransmit {
            self.current_retransmit_timer = None;
            Ok(HandshakeState::Waiting)
        } else {
            // exponential backoff
            let interval = self
                .cfg
                .retransmit_interval
                .saturating_mul(1 << self.current_retransmit_count.min(16));
            self.current_retransmit_timer = Some(self.now + interval);
            Ok(HandshakeState::Waiting)
        }
    }

    fn wait(&mut self) -> Result<HandshakeState> {
        if self.handshake_rx.take().is_some() {
            trace!(
                "[handshake:{}] {} received handshake packets",
                srv_cli_str(self.state.is_client),
                self.current_flight
            );
            let result = self
                .current_flight
                .parse(&mut self.state, &self.cache, &self.cfg);
            match result {
                Err((alert, err)) => {
                    if let Some(alert) = alert {
                        self.notify(alert.alert_level, alert.alert_description);
                    }
                    if let Some(err) = err {
                        return Err(err);
                    }
                }
                Ok(next_flight) => {
                    debug!(
                        "[handshake:{}] {} -> {}",
                        srv_cli_str(self.state.is_client),
                        self.current_flight,
                        next_flight
                    );
                    self.current_retransmit_timer = None;
                    if next_flight.is_last_recv_flight()
                        && self.current_flight.to_string() == next_flight.to_string()
                    {
                        return Ok(HandshakeState::Finished);
                    }
                    self.current_flight = next_flight;
                    return Ok(HandshakeState::Preparing);
                }
            }
        }

        Ok(HandshakeState::Waiting)
    }

    fn finish(&mut self) -> Result<HandshakeState> {
        if self.handshake_rx.take().is_some() {
            let result = self
                .current_flight
                .parse(&mut self.state, &self.cache, &self.cfg);
            if let Err((alert, err)) = result {
                if let Some(alert) = alert {
                    self.notify(alert.alert_level, alert.alert_description);
                }
                if let Some(err) = err {
                    return Err(err);
                }
            }
        }

        Ok(HandshakeState::Finished)
    }

    /// Resends the current flight after the peer retransmitted a flight we
    /// already answered.
    pub(crate) fn handshake_retransmit_requested(&mut self) {
        let can_resend = self.flights.as_ref().is_some_and(|f| !f.is_empty())
            && match self.current_handshake_state {
                HandshakeState::Waiting => self.retransmit,
                HandshakeState::Finished => self.current_flight.is_last_send_flight(),
                _ => false,
            };
        if !can_resend {
            return;
        }

        debug!(
            "[handshake:{}] {} peer retransmitted, resending",
            srv_cli_str(self.state.is_client),
            self.current_flight
        );
        if let Some(pkts) = self.flights.clone() {
            self.write_packets(pkts);
        }
    }

    pub(crate) fn handshake_timeout(&mut self, now: Instant) -> Result<()> {
        let Some(retransmit_timer) = self.current_retransmit_timer else {
            return Ok(());
        };
        if now < retransmit_timer || self.current_handshake_state != HandshakeState::Waiting {
            return Ok(());
        }

        trace!(
            "[handshake:{}] {} retransmit_timer, count {} vs maximum_retransmit_number {}",
            srv_cli_str(self.state.is_client),
            self.current_flight,
            self.current_retransmit_count,
            self.cfg.maximum_retransmit_number,
        );

        if self.retransmit {
            self.current_retransmit_count += 1;
            if self.current_retransmit_count > self.cfg.maximum_retransmit_number {
                self.current_handshake_state = HandshakeState::Errored;
                return Err(Error::ErrHandshakeTimeout);
            }
            self.current_handshake_state = HandshakeState::Sending;
            self.handshake()
        } else {
            self.current_retransmit_timer = None;
            Ok(())
        }
    }
}

