use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use rtc::peer_connection::configuration::RTCConfigurationBuilder;
use rtc::peer_connection::configuration::setting_engine::SettingEngine;
use rtc::peer_connection::sdp::RTCSdpType;
use rtc::runtime::{DataChannel, PeerConnection, PeerConnectionEvent};
use rtc::signal::SignalMessage;
use std::collections::VecDeque;
use std::io::Write;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};

const FRAME_SIZE: i32 = 480;
const FRAME_COUNT: usize = 1000;
const FRAME_INTERVAL: Duration = Duration::from_millis(10);
const CONNECT_RETRIES: usize = 50;

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Role {
    Offer,
    Answer,
}

#[derive(Parser)]
#[command(name = "ball")]
#[command(version = "0.0.0")]
#[command(about = "Sends the positions of a bouncing ball over a data channel", long_about = None)]
struct Cli {
    #[arg(long, value_enum)]
    role: Role,
    #[arg(long, default_value_t = format!("127.0.0.1"))]
    signaling_host: String,
    #[arg(long, default_value_t = 1234)]
    signaling_port: u16,
    #[arg(long, default_value_t = format!("INFO"))]
    log_level: String,
}

/// A ball moving one pixel per frame, bouncing off the edges of the frame.
struct Ball {
    x: i32,
    y: i32,
    dx: i32,
    dy: i32,
}

impl Default for Ball {
    fn default() -> Self {
        Ball {
            x: 100,
            y: 100,
            dx: 1,
            dy: 1,
        }
    }
}

impl Ball {
    fn step(&mut self) -> (i32, i32) {
        self.x += self.dx;
        self.y += self.dy;
        let position = (self.x, self.y);
        if self.y >= FRAME_SIZE || self.y <= 0 {
            self.dy = -self.dy;
        }
        if self.x >= FRAME_SIZE || self.x <= 0 {
            self.dx = -self.dx;
        }
        position
    }
}

fn parse_position(text: &str) -> Option<(f64, f64)> {
    let (x, y) = text.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = log::LevelFilter::from_str(&cli.log_level)?;
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} [{}] - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .filter(None, log_level)
        .init();

    let address = format!("{}:{}", cli.signaling_host, cli.signaling_port);
    let stream = match cli.role {
        Role::Offer => {
            // The side that speaks first waits for its peer.
            let listener = TcpListener::bind(&address).await?;
            info!("waiting for the answerer on {address}");
            let (stream, peer) = listener.accept().await?;
            info!("answerer connected from {peer}");
            stream
        }
        Role::Answer => connect(&address).await?,
    };

    if let Err(err) = run(cli.role, stream).await {
        error!("run got error: {err}");
    }
    Ok(())
}

async fn connect(address: &str) -> Result<TcpStream> {
    let mut attempt = 0;
    loop {
        match TcpStream::connect(address).await {
            Ok(stream) => return Ok(stream),
            Err(err) if attempt < CONNECT_RETRIES => {
                attempt += 1;
                warn!("signaling connect to {address} failed ({err}), retrying");
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

async fn send_signal(writer: &mut OwnedWriteHalf, message: SignalMessage) -> Result<()> {
    let mut line = message.to_json()?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    Ok(())
}

async fn run(role: Role, stream: TcpStream) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let mut setting_engine = SettingEngine::default();
    setting_engine.set_include_loopback_candidate(true);
    let config = RTCConfigurationBuilder::new()
        .with_setting_engine(setting_engine)
        .build();
    let (pc, mut events) = PeerConnection::new(config).await?;

    let mut ball_task = None;
    if role == Role::Offer {
        ball_task = Some(tokio::spawn(run_ball(pc.clone())));

        let offer = pc.create_offer().await?;
        pc.set_local_description(offer.clone()).await?;
        info!("sending offer");
        send_signal(&mut writer, SignalMessage::Description(offer)).await?;
    }

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("signaling channel closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match SignalMessage::from_json(&line)? {
                    SignalMessage::Description(description) => {
                        let is_offer = description.sdp_type == RTCSdpType::Offer;
                        pc.set_remote_description(description).await?;
                        if is_offer {
                            let answer = pc.create_answer().await?;
                            pc.set_local_description(answer.clone()).await?;
                            info!("sending answer");
                            send_signal(&mut writer, SignalMessage::Description(answer)).await?;
                        }
                    }
                    SignalMessage::Candidate(candidate) => {
                        if let Err(err) = pc.add_ice_candidate(candidate).await {
                            warn!("add_ice_candidate error: {err}");
                        }
                    }
                    SignalMessage::Bye => {
                        info!("exiting");
                        break;
                    }
                }
            }
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                match event {
                    PeerConnectionEvent::IceCandidate(candidate) => {
                        send_signal(&mut writer, SignalMessage::Candidate(candidate)).await?;
                    }
                    PeerConnectionEvent::ConnectionStateChange(state) => {
                        info!("peer connection state: {state}");
                    }
                    PeerConnectionEvent::DataChannel(dc) => {
                        info!("channel({}) - created by remote party", dc.label());
                        tokio::spawn(echo_positions(dc));
                    }
                    _ => {}
                }
            }
            result = async {
                match ball_task.as_mut() {
                    Some(task) => task.await,
                    None => std::future::pending().await,
                }
            }, if ball_task.is_some() => {
                ball_task = None;
                match result {
                    Ok(Ok(())) => info!("ball finished"),
                    Ok(Err(err)) => error!("ball error: {err}"),
                    Err(err) => error!("ball task error: {err}"),
                }
                send_signal(&mut writer, SignalMessage::Bye).await?;
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                send_signal(&mut writer, SignalMessage::Bye).await?;
                break;
            }
        }
    }

    pc.close().await?;
    Ok(())
}

/// Offerer: sends the ball's positions and measures the echoed estimates.
async fn run_ball(pc: PeerConnection) -> Result<()> {
    let mut dc = pc.create_data_channel("datachannel", None).await?;
    info!("channel({}) - created by local party", dc.label());

    info!("channel({}) > pinging client", dc.label());
    dc.send_text("pinging client").await?;

    let mut ball = Ball::default();
    let mut sent = VecDeque::new();
    let mut interval = tokio::time::interval(FRAME_INTERVAL);
    let mut frames = 0;
    while frames < FRAME_COUNT || !sent.is_empty() {
        tokio::select! {
            _ = interval.tick(), if frames < FRAME_COUNT => {
                frames += 1;
                let (x, y) = ball.step();
                sent.push_back((f64::from(x), f64::from(y)));
                dc.send_text(format!("{x} , {y}")).await?;
            }
            message = dc.recv() => {
                let Some(message) = message else {
                    break;
                };
                let text = String::from_utf8_lossy(&message.data);
                let (Some((x, y)), Some((actual_x, actual_y))) = (parse_position(&text), sent.pop_front()) else {
                    warn!("channel({}) ignores {text}", dc.label());
                    continue;
                };
                let error = ((actual_x - x).powi(2) + (actual_y - y).powi(2)).sqrt();
                info!("channel({}) : received coordinates < {text}", dc.label());
                info!("channel({}) coordinates error: {error}", dc.label());
            }
        }
    }

    Ok(())
}

/// Answerer: estimates the ball position from each frame; without video the
/// estimate is the announced position.
async fn echo_positions(mut dc: DataChannel) {
    while let Some(message) = dc.recv().await {
        let text = String::from_utf8_lossy(&message.data).into_owned();
        let Some((x, y)) = parse_position(&text) else {
            info!("channel({}) < {text}", dc.label());
            continue;
        };
        let estimate = format!("{x} , {y}");
        if let Err(err) = dc.send_text(estimate).await {
            warn!("channel({}) echo error: {err}", dc.label());
            break;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ball_bounces_off_edges() {
        let mut ball = Ball::default();
        assert_eq!(ball.step(), (101, 101));

        let mut last = (0, 0);
        for _ in 0..379 {
            last = ball.step();
        }
        assert_eq!(last, (480, 480));
        assert_eq!(ball.step(), (479, 479));

        for _ in 0..2000 {
            let (x, y) = ball.step();
            assert!((0..=FRAME_SIZE).contains(&x));
            assert!((0..=FRAME_SIZE).contains(&y));
        }
    }

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("10 , 20"), Some((10.0, 20.0)));
        assert_eq!(parse_position("1.5,2"), Some((1.5, 2.0)));
        assert_eq!(parse_position("pinging client"), None);
        assert_eq!(parse_position("a , 2"), None);
    }
}
