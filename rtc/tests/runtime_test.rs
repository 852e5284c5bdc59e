use anyhow::Result;
use rtc::data_channel::RTCDataChannelInit;
use rtc::peer_connection::configuration::RTCConfigurationBuilder;
use rtc::peer_connection::configuration::setting_engine::SettingEngine;
use rtc::peer_connection::state::RTCPeerConnectionState;
use rtc::peer_connection::transport::RTCIceCandidateInit;
use rtc::runtime::{DataChannel, PeerConnection, PeerConnectionEvent};
use rtc::shared::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const TEST_TIMEOUT: Duration = Duration::from_secs(20);

fn init_log() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

fn setting_engine() -> SettingEngine {
    let mut setting_engine = SettingEngine::default();
    setting_engine.set_include_loopback_candidate(true);
    setting_engine
}

async fn new_peer(
    setting_engine: SettingEngine,
) -> Result<(PeerConnection, mpsc::UnboundedReceiver<PeerConnectionEvent>)> {
    let config = RTCConfigurationBuilder::new()
        .with_setting_engine(setting_engine)
        .build();
    Ok(PeerConnection::new(config).await?)
}

/// Splits the event stream of one peer into its candidates and the channels
/// the remote opened.
fn split_events(
    mut events: mpsc::UnboundedReceiver<PeerConnectionEvent>,
) -> (
    mpsc::UnboundedReceiver<Option<RTCIceCandidateInit>>,
    mpsc::UnboundedReceiver<DataChannel>,
) {
    let (candidate_tx, candidate_rx) = mpsc::unbounded_channel();
    let (channel_tx, channel_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                PeerConnectionEvent::IceCandidate(candidate) => {
                    let _ = candidate_tx.send(candidate);
                }
                PeerConnectionEvent::DataChannel(dc) => {
                    let _ = channel_tx.send(dc);
                }
                PeerConnectionEvent::ConnectionStateChange(state) => {
                    log::info!("connection state: {state}");
                }
                _ => {}
            }
        }
    });
    (candidate_rx, channel_rx)
}

/// Trickles candidates once the remote description is in place.
fn forward_candidates(
    mut candidates: mpsc::UnboundedReceiver<Option<RTCIceCandidateInit>>,
    remote: PeerConnection,
) {
    tokio::spawn(async move {
        while let Some(candidate) = candidates.recv().await {
            if let Err(err) = remote.add_ice_candidate(candidate).await {
                log::warn!("add_ice_candidate: {err}");
            }
        }
    });
}

struct Connected {
    offer_pc: PeerConnection,
    answer_pc: PeerConnection,
    offer_dc: DataChannel,
    answer_dc: DataChannel,
}

/// Negotiates two peers and opens one channel from the offerer.
async fn connect(
    offer_settings: SettingEngine,
    answer_settings: SettingEngine,
    label: &str,
    init: Option<RTCDataChannelInit>,
) -> Result<Connected> {
    let (offer_pc, offer_events) = new_peer(offer_settings).await?;
    let (answer_pc, answer_events) = new_peer(answer_settings).await?;
    let (offer_candidates, _offer_channels) = split_events(offer_events);
    let (answer_candidates, mut answer_channels) = split_events(answer_events);

    let opener = tokio::spawn({
        let offer_pc = offer_pc.clone();
        let label = label.to_owned();
        async move { offer_pc.create_data_channel(&label, init).await }
    });

    let offer = offer_pc.create_offer().await?;
    offer_pc.set_local_description(offer.clone()).await?;
    answer_pc.set_remote_description(offer).await?;
    let answer = answer_pc.create_answer().await?;
    answer_pc.set_local_description(answer.clone()).await?;
    offer_pc.set_remote_description(answer).await?;

    forward_candidates(offer_candidates, answer_pc.clone());
    forward_candidates(answer_candidates, offer_pc.clone());

    let offer_dc = timeout(TEST_TIMEOUT, opener).await???;
    log::info!("offerer opened {offer_dc:?}");
    let answer_dc = timeout(TEST_TIMEOUT, answer_channels.recv())
        .await?
        .ok_or(Error::ErrConnectionClosed)?;
    assert_eq!(answer_dc.label(), label);

    Ok(Connected {
        offer_pc,
        answer_pc,
        offer_dc,
        answer_dc,
    })
}

fn numbered(i: usize, size: usize) -> String {
    format!("{i:04}{}", "x".repeat(size - 4))
}

async fn recv_text(dc: &mut DataChannel) -> Result<String> {
    let message = timeout(TEST_TIMEOUT, dc.recv())
        .await?
        .ok_or(Error::ErrConnectionClosed)?;
    Ok(String::from_utf8(message.data.to_vec())?)
}

#[tokio::test]
async fn test_runtime_ping_pong() -> Result<()> {
    init_log();

    let Connected {
        offer_pc,
        answer_pc,
        mut offer_dc,
        mut answer_dc,
    } = connect(setting_engine(), setting_engine(), "chat", None).await?;

    offer_dc.send_text("ping").await?;
    assert_eq!(recv_text(&mut answer_dc).await?, "ping");

    answer_dc.send_text("pong").await?;
    assert_eq!(recv_text(&mut offer_dc).await?, "pong");

    assert_eq!(
        offer_pc.connection_state().await?,
        RTCPeerConnectionState::Connected
    );

    offer_pc.close().await?;
    assert_eq!(
        offer_dc.send_text("after close").await,
        Err(Error::ErrConnectionClosed)
    );
    assert_eq!(
        offer_pc.create_offer().await,
        Err(Error::ErrConnectionClosed)
    );
    answer_pc.close().await?;

    Ok(())
}

#[tokio::test]
async fn test_runtime_ordered_send_waits_for_buffer() -> Result<()> {
    init_log();

    let mut small_buffers = setting_engine();
    small_buffers.set_sctp_buffers(4096, 8192);
    let Connected {
        offer_pc,
        answer_pc,
        offer_dc,
        mut answer_dc,
    } = connect(small_buffers, setting_engine(), "ordered", None).await?;

    // the second and third send find the buffer full and wait their turn
    let (first, second, third) = tokio::join!(
        offer_dc.send_text(numbered(0, 3000)),
        offer_dc.send_text(numbered(1, 3000)),
        offer_dc.send_text(numbered(2, 3000)),
    );
    first?;
    second?;
    third?;
    for i in 0..3 {
        assert_eq!(recv_text(&mut answer_dc).await?, numbered(i, 3000));
    }

    let receiver = tokio::spawn(async move {
        let mut texts = vec![];
        for _ in 0..200 {
            texts.push(recv_text(&mut answer_dc).await?);
        }
        anyhow::Ok(texts)
    });
    for i in 0..200 {
        offer_dc.send_text(numbered(i, 1024)).await?;
    }
    let texts = timeout(TEST_TIMEOUT, receiver).await???;
    let expected: Vec<String> = (0..200).map(|i| numbered(i, 1024)).collect();
    assert_eq!(texts, expected);

    offer_pc.close().await?;
    answer_pc.close().await?;

    Ok(())
}

#[tokio::test]
async fn test_runtime_unreliable_send_fails_when_full() -> Result<()> {
    init_log();

    let unordered = RTCDataChannelInit {
        ordered: Some(false),
        ..Default::default()
    };
    let limited = RTCDataChannelInit {
        max_retransmits: Some(0),
        ..Default::default()
    };
    for init in [unordered, limited] {
        let mut small_buffers = setting_engine();
        small_buffers.set_sctp_buffers(4096, 8192);
        let Connected {
            offer_pc,
            answer_pc,
            offer_dc,
            mut answer_dc,
        } = connect(small_buffers, setting_engine(), "lossy", Some(init)).await?;

        let (first, second) = tokio::join!(
            offer_dc.send_text(numbered(0, 3000)),
            offer_dc.send_text(numbered(1, 3000)),
        );
        first?;
        assert_eq!(second, Err(Error::ErrBufferFull));
        assert_eq!(recv_text(&mut answer_dc).await?, numbered(0, 3000));

        offer_pc.close().await?;
        answer_pc.close().await?;
    }

    Ok(())
}

#[tokio::test]
async fn test_runtime_slow_reader_holds_back_sender() -> Result<()> {
    init_log();

    let mut sender_settings = setting_engine();
    sender_settings.set_sctp_buffers(4096, 8192);
    let mut receiver_settings = setting_engine();
    receiver_settings.set_sctp_receive_buffer_size(16384);
    let Connected {
        offer_pc,
        answer_pc,
        offer_dc,
        mut answer_dc,
    } = connect(sender_settings, receiver_settings, "bulk", None).await?;

    let sent = Arc::new(AtomicUsize::new(0));
    let sender = tokio::spawn({
        let sent = sent.clone();
        async move {
            for i in 0..200 {
                offer_dc.send_text(numbered(i, 1024)).await?;
                sent.fetch_add(1, Ordering::SeqCst);
            }
            anyhow::Ok(offer_dc)
        }
    });

    // nobody reads, the sender stalls once the receive window is used up
    tokio::time::sleep(Duration::from_secs(1)).await;
    let stalled_at = sent.load(Ordering::SeqCst);
    assert!(stalled_at > 0);
    assert!(stalled_at < 200, "sender was never held back");

    for i in 0..200 {
        assert_eq!(recv_text(&mut answer_dc).await?, numbered(i, 1024));
    }
    let _offer_dc = timeout(TEST_TIMEOUT, sender).await???;
    assert_eq!(sent.load(Ordering::SeqCst), 200);

    offer_pc.close().await?;
    answer_pc.close().await?;

    Ok(())
}
