//! # RTC - Sans-I/O peer-to-peer data channels
//!
//! Negotiates a connection with a remote peer through an out-of-band
//! signaling channel, establishes a path with ICE, secures it with DTLS and
//! carries named data channels over SCTP.
//!
//! ## Getting started
//!
//! [`runtime::PeerConnection`] runs the connection on a tokio task with one
//! UDP socket per local interface. The application moves descriptions and
//! candidates over its signaling channel and talks on data channels:
//!
//! ```no_run
//! use rtc::peer_connection::configuration::RTCConfigurationBuilder;
//! use rtc::runtime::{PeerConnection, PeerConnectionEvent};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (pc, mut events) = PeerConnection::new(RTCConfigurationBuilder::new().build()).await?;
//!
//! let opening = tokio::spawn({
//!     let pc = pc.clone();
//!     async move { pc.create_data_channel("chat", None).await }
//! });
//! let offer = pc.create_offer().await?;
//! pc.set_local_description(offer).await?;
//! // send the offer, set_remote_description with the answer
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         PeerConnectionEvent::IceCandidate(candidate) => {
//!             // trickle to the remote peer, None ends the candidates
//!             let _ = candidate;
//!         }
//!         PeerConnectionEvent::ConnectionStateChange(state) => println!("{state}"),
//!         _ => {}
//!     }
//!     if opening.is_finished() {
//!         break;
//!     }
//! }
//!
//! let mut chat = opening.await??;
//! chat.send_text("hello").await?;
//! if let Some(reply) = chat.recv().await {
//!     println!("{:?}", reply.as_text());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Sans-I/O core
//!
//! Underneath, [`RTCPeerConnection`](peer_connection::RTCPeerConnection)
//! implements `sansio::Protocol`: it performs no I/O and reads no clock.
//! Datagrams enter through `handle_read` and deadlines through
//! `handle_timeout`. Outgoing datagrams, events and channel messages are
//! drained with `poll_write`, `poll_event` and `poll_read`, and
//! `poll_timeout` names the next deadline. The tokio driver in [`runtime`]
//! is one such loop.
//!
//! ## Modules
//!
//! [`peer_connection`] holds the coordinator with its configuration, states,
//! events and SDP types. [`data_channel`] has channel handles, options and
//! messages, [`signal`] the JSON lines exchanged over the signaling channel.
//!
//! ## Standards
//!
//! Offer/answer follows JSEP ([RFC 8829]) over SDP ([RFC 8866]). Paths are
//! found with ICE ([RFC 8445]) and secured with DTLS 1.2 ([RFC 6347]). Data
//! channels ([RFC 8831]) are opened with DCEP ([RFC 8832]).
//!
//! [RFC 8829]: https://datatracker.ietf.org/doc/html/rfc8829
//! [RFC 8866]: https://datatracker.ietf.org/doc/html/rfc8866
//! [RFC 8445]: https://datatracker.ietf.org/doc/html/rfc8445
//! [RFC 6347]: https://datatracker.ietf.org/doc/html/rfc6347
//! [RFC 8831]: https://datatracker.ietf.org/doc/html/rfc8831
//! [RFC 8832]: https://datatracker.ietf.org/doc/html/rfc8832

#![warn(rust_2018_idioms)]

pub use {datachannel, dtls, ice, sansio, sctp, sdp, shared, stun};

#[macro_use]
mod macros;

pub mod data_channel;
pub mod peer_connection;
pub mod runtime;
pub mod signal;
