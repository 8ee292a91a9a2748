//! Simulated robot endpoint.
//!
//! Authenticates as `ROBOT_ID`, streams telemetry at 10 Hz and answers
//! operator traffic:
//!
//! - `ping` → `pong` echoing the ping's `ts`
//! - fresh `cmd` → chat `ack <cmd> <args>`; stale ones are dropped
//! - `chat` → chat `echo: <msg>`

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use robot_relay::config::EndpointConfig;
use robot_relay::protocol::{is_stale, now_ms};
use robot_relay::{Endpoint, Message, Result, Role};
use serde_json::Value;
use tracing::{debug, info, warn};

// ============================================================================
// Constants
// ============================================================================

/// Telemetry period (10 Hz).
const TELEMETRY_PERIOD: Duration = Duration::from_millis(100);

/// Log one telemetry sample out of this many.
const TELEMETRY_LOG_EVERY: u64 = 10;

// ============================================================================
// Telemetry
// ============================================================================

/// Deterministic battery/temperature generator.
#[derive(Debug)]
struct TelemetrySource {
    id: String,
    samples: u64,
}

impl TelemetrySource {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            samples: 0,
        }
    }

    /// Battery wanders over 3.80..=4.09 V, temperature over 35.5..=37.4 °C.
    fn next_sample(&mut self, ts: i64) -> Message {
        let step = self.samples;
        self.samples += 1;

        Message::Telemetry {
            id: self.id.clone(),
            ts,
            bat: round_to(3.8 + (step % 30) as f64 * 0.01, 2),
            temp: round_to(35.5 + (step % 20) as f64 * 0.1, 1),
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10_f64.powi(decimals);
    (value * scale).round() / scale
}

// ============================================================================
// Responses
// ============================================================================

/// Decides the robot's reply to one inbound message.
fn respond(robot_id: &str, max_cmd_age_ms: u64, message: Message, now: i64) -> Option<Message> {
    match message {
        Message::Ping { ts, .. } => Some(Message::Pong {
            id: robot_id.to_string(),
            ts,
        }),

        Message::Cmd { ts, cmd, args, .. } => {
            if is_stale(ts, now, max_cmd_age_ms) {
                warn!(%cmd, age_ms = now - ts, "Stale command dropped");
                return None;
            }
            info!(%cmd, "Command received");
            Some(Message::chat_from(
                robot_id,
                format!("ack {cmd} {}", Value::Object(args)),
            ))
        }

        Message::Chat { msg, .. } => {
            info!(%msg, "Chat from operator");
            Some(Message::chat_from(robot_id, format!("echo: {msg}")))
        }

        other => {
            debug!(kind = other.kind(), "Ignoring message");
            None
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    common::init_logging("robot_relay=info,mock_robot=info");

    let config = EndpointConfig::from_env()?;
    let mut robot = Endpoint::from_config(&config, Role::Robot).await?;
    info!(id = %config.robot_id, url = %config.hub_url, "Robot connected");

    let mut telemetry = TelemetrySource::new(config.robot_id.as_str());
    let mut ticker = tokio::time::interval(TELEMETRY_PERIOD);
    let shutdown = common::shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let sample = telemetry.next_sample(now_ms());
                robot.send(&sample).await?;
                if telemetry.samples % TELEMETRY_LOG_EVERY == 0 {
                    info!(?sample, "Telemetry sent");
                }
            }

            incoming = robot.recv() => match incoming {
                Ok(Some(message)) => {
                    if let Some(reply) = respond(&config.robot_id, config.cmd_max_age_ms, message, now_ms()) {
                        robot.send(&reply).await?;
                    }
                }
                Ok(None) => {
                    warn!(code = ?robot.close_code(), reason = ?robot.close_reason(), "Hub closed connection");
                    return Ok(());
                }
                Err(e) if e.is_recoverable() => warn!(error = %e, "Dropping unreadable frame"),
                Err(e) => return Err(e),
            },

            () = &mut shutdown => break,
        }
    }

    info!("Robot stopping");
    robot.close().await
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_ping_answered_with_same_ts() {
        let reply = respond("R1", 2000, Message::Ping { to: "R1".into(), ts: 42 }, 1000);
        assert_eq!(
            reply,
            Some(Message::Pong {
                id: "R1".into(),
                ts: 42
            })
        );
    }

    #[test]
    fn test_fresh_cmd_acknowledged() {
        let args = json!({"v": 0.2}).as_object().cloned().unwrap();
        let cmd = Message::Cmd {
            to: "R1".into(),
            ts: 9_000,
            cmd: "drive".into(),
            args,
        };

        let reply = respond("R1", 2000, cmd, 10_000);
        assert_eq!(reply, Some(Message::chat_from("R1", r#"ack drive {"v":0.2}"#)));
    }

    #[test]
    fn test_stale_cmd_dropped() {
        let cmd = Message::Cmd {
            to: "R1".into(),
            ts: 1_000,
            cmd: "drive".into(),
            args: Default::default(),
        };
        assert_eq!(respond("R1", 2000, cmd, 5_000), None);
    }

    #[test]
    fn test_chat_echoed() {
        let reply = respond("R1", 2000, Message::chat_to("R1", "hi"), 0);
        assert_eq!(reply, Some(Message::chat_from("R1", "echo: hi")));
    }

    #[test]
    fn test_telemetry_in_range() {
        let mut source = TelemetrySource::new("R1");
        for ts in 0..100 {
            let Message::Telemetry { id, bat, temp, .. } = source.next_sample(ts) else {
                panic!("expected telemetry");
            };
            assert_eq!(id, "R1");
            assert!((3.8..=4.1).contains(&bat));
            assert!((35.5..=37.5).contains(&temp));
        }
    }
}
