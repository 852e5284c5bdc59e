//! Connection state types.
//!
//! A peer connection runs several state machines side by side:
//!
//! - **[`RTCIceConnectionState`]** - connectivity of the selected candidate pair
//! - **[`RTCIceGatheringState`]** - progress of local candidate gathering
//! - **[`RTCPeerConnectionState`]** - ICE and DTLS aggregated into one value
//! - **[`RTCSignalingState`]** - progress of the offer/answer exchange
//!
//! Nothing is pushed to callbacks. Every change is queued as an
//! [`RTCPeerConnectionEvent`](crate::peer_connection::event::RTCPeerConnectionEvent)
//! and drained with `poll_event`.
//!
//! ```no_run
//! use rtc::peer_connection::event::RTCPeerConnectionEvent;
//! use rtc::peer_connection::state::RTCPeerConnectionState;
//!
//! # fn example(event: RTCPeerConnectionEvent) {
//! if let RTCPeerConnectionEvent::OnConnectionStateChangeEvent(state) = event {
//!     match state {
//!         RTCPeerConnectionState::Connected => println!("ready"),
//!         RTCPeerConnectionState::Failed => println!("gave up"),
//!         _ => {}
//!     }
//! }
//! # }
//! ```

pub(crate) mod ice_connection_state;
pub(crate) mod ice_gathering_state;
pub(crate) mod peer_connection_state;
pub(crate) mod signaling_state;

pub use ice_connection_state::RTCIceConnectionState;
pub use ice_gathering_state::RTCIceGatheringState;
pub use peer_connection_state::RTCPeerConnectionState;
pub use signaling_state::RTCSignalingState;

pub(crate) const UNSPECIFIED_STR: &str = "Unspecified";
