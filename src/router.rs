//! Message routing and fanout.
//!
//! [`Router::resolve`] decides where a message goes from the sender's role,
//! the message type and the current registry contents. [`dispatch`] then
//! queues the original frame text to each destination.
//!
//! # Routing Table
//!
//! | Type | Sender | Destination |
//! |------|--------|-------------|
//! | `cmd` | operator | robot named in `to`, if registered |
//! | `ping` | operator | robot named in `to`, if registered |
//! | `pong` | robot | every operator |
//! | `telemetry` | robot | every operator |
//! | `chat` | operator | robot named in `to`, if registered |
//! | `chat` | robot | every operator |
//!
//! Anything else is dropped without telling the sender.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::identifiers::{Identity, Role};
use crate::protocol::{Frame, Message, is_stale};
use crate::registry::Registry;
use crate::transport::Peer;

// ============================================================================
// Route
// ============================================================================

/// Where a message goes.
#[derive(Debug)]
pub enum Route {
    /// A single robot.
    Robot(Peer),
    /// Every operator registered when the route was resolved.
    Operators(Vec<Peer>),
    /// Nowhere.
    Drop(DropReason),
}

impl Route {
    /// Returns the destination handles, empty for [`Route::Drop`].
    #[must_use]
    pub fn into_destinations(self) -> Vec<Peer> {
        match self {
            Self::Robot(peer) => vec![peer],
            Self::Operators(peers) => peers,
            Self::Drop(_) => Vec::new(),
        }
    }
}

// ============================================================================
// DropReason
// ============================================================================

/// Why a message was not routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The sender's role may not send this type.
    RoleMismatch,
    /// The addressed robot is not registered.
    UnknownRecipient,
    /// An operator chat without `to`.
    MissingRecipient,
    /// A `cmd` or `ping` older than the configured maximum age.
    Stale,
    /// An `auth` frame after the handshake.
    AlreadyAuthenticated,
    /// A `type` the hub does not know.
    UnknownType,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::RoleMismatch => "role may not send this type",
            Self::UnknownRecipient => "recipient not connected",
            Self::MissingRecipient => "no recipient",
            Self::Stale => "stale",
            Self::AlreadyAuthenticated => "already authenticated",
            Self::UnknownType => "unknown type",
        };
        f.write_str(reason)
    }
}

// ============================================================================
// Router
// ============================================================================

/// Resolves destinations against a shared [`Registry`].
#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<Registry>,
    /// Hub-side freshness limit for `cmd` and `ping`; `None` disables it.
    max_cmd_age_ms: Option<u64>,
}

impl Router {
    /// Creates a router without a freshness limit.
    #[inline]
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            max_cmd_age_ms: None,
        }
    }

    /// Drops `cmd` and `ping` frames older than `max_age_ms`.
    #[inline]
    #[must_use]
    pub fn with_max_cmd_age(mut self, max_age_ms: Option<u64>) -> Self {
        self.max_cmd_age_ms = max_age_ms;
        self
    }

    /// Returns the registry this router reads.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Resolves the destinations of `message` sent by `sender` at `now_ms`.
    #[must_use]
    pub fn resolve(&self, sender: &Identity, message: &Message, now_ms: i64) -> Route {
        match (sender.role, message) {
            (Role::Operator, Message::Cmd { to, ts, .. } | Message::Ping { to, ts }) => {
                if self
                    .max_cmd_age_ms
                    .is_some_and(|max_age| is_stale(*ts, now_ms, max_age))
                {
                    return Route::Drop(DropReason::Stale);
                }
                self.robot(to)
            }
            (Role::Operator, Message::Chat { to: Some(to), .. }) => self.robot(to),
            (Role::Operator, Message::Chat { to: None, .. }) => {
                Route::Drop(DropReason::MissingRecipient)
            }
            (Role::Robot, Message::Telemetry { .. } | Message::Pong { .. } | Message::Chat { .. }) => {
                Route::Operators(self.registry.operators())
            }
            (Role::Robot, Message::Cmd { .. } | Message::Ping { .. })
            | (Role::Operator, Message::Telemetry { .. } | Message::Pong { .. }) => {
                Route::Drop(DropReason::RoleMismatch)
            }
            (_, Message::Auth { .. }) => Route::Drop(DropReason::AlreadyAuthenticated),
            (_, Message::Unknown) => Route::Drop(DropReason::UnknownType),
        }
    }

    fn robot(&self, id: &str) -> Route {
        self.registry
            .robot(id)
            .map_or(Route::Drop(DropReason::UnknownRecipient), Route::Robot)
    }
}

// ============================================================================
// Fanout
// ============================================================================

/// Per-destination outcome of one [`dispatch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Destinations the frame was queued to.
    pub delivered: usize,
    /// Destinations whose queue was full or closed.
    pub failed: usize,
}

/// Queues `frame` to every destination of `route`.
///
/// Each destination is tried independently; a full or closed queue is
/// counted and logged, and the remaining destinations still receive the
/// frame.
pub fn dispatch(route: Route, frame: &Frame) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for peer in route.into_destinations() {
        match peer.deliver(frame.text().clone()) {
            Ok(()) => {
                trace!(connection = %peer.connection(), kind = frame.message().kind(), "Frame queued");
                report.delivered += 1;
            }
            Err(e) => {
                warn!(connection = %peer.connection(), error = %e, "Delivery failed");
                report.failed += 1;
            }
        }
    }

    report
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::{Message as WsMessage, Utf8Bytes};

    use crate::identifiers::ConnectionId;

    struct Fixture {
        router: Router,
        receivers: Vec<(Identity, mpsc::Receiver<WsMessage>)>,
    }

    impl Fixture {
        fn new(identities: &[Identity]) -> Self {
            let registry = Arc::new(Registry::default());
            let receivers = identities
                .iter()
                .map(|identity| {
                    let (peer, rx) = Peer::channel(ConnectionId::next(), 4);
                    registry.register(identity, peer).unwrap();
                    (identity.clone(), rx)
                })
                .collect();

            Self {
                router: Router::new(registry),
                receivers,
            }
        }

        fn received(&mut self, identity: &Identity) -> Vec<String> {
            let (_, rx) = self
                .receivers
                .iter_mut()
                .find(|(id, _)| id == identity)
                .expect("known identity");

            let mut texts = Vec::new();
            while let Ok(WsMessage::Text(text)) = rx.try_recv() {
                texts.push(text.to_string());
            }
            texts
        }
    }

    fn frame(raw: &str) -> Frame {
        Frame::parse(Utf8Bytes::from(raw.to_string())).unwrap()
    }

    fn send(fixture: &Fixture, sender: &Identity, raw: &str) -> DeliveryReport {
        let frame = frame(raw);
        let route = fixture.router.resolve(sender, frame.message(), 10_000);
        dispatch(route, &frame)
    }

    #[test]
    fn test_telemetry_reaches_every_operator_and_no_robot() {
        let robot = Identity::robot("R1");
        let other_robot = Identity::robot("R2");
        let ops = [Identity::operator("O1"), Identity::operator("O2")];
        let mut fixture = Fixture::new(&[
            robot.clone(),
            other_robot.clone(),
            ops[0].clone(),
            ops[1].clone(),
        ]);
        let raw = r#"{"type":"telemetry","id":"R1","ts":1,"bat":3.9,"temp":36.0}"#;

        let report = send(&fixture, &robot, raw);

        assert_eq!(report, DeliveryReport { delivered: 2, failed: 0 });
        for op in &ops {
            assert_eq!(fixture.received(op), vec![raw.to_string()]);
        }
        assert!(fixture.received(&other_robot).is_empty());
        assert!(fixture.received(&robot).is_empty());
    }

    #[test]
    fn test_cmd_reaches_addressed_robot_only() {
        let operator = Identity::operator("O1");
        let target = Identity::robot("R1");
        let bystander = Identity::robot("R2");
        let mut fixture = Fixture::new(&[operator.clone(), target.clone(), bystander.clone()]);
        let raw = r#"{"type":"cmd","to":"R1","ts":10000,"cmd":"drive","args":{"v":0.2,"w":0.1}}"#;

        send(&fixture, &operator, raw);

        assert_eq!(fixture.received(&target), vec![raw.to_string()]);
        assert!(fixture.received(&bystander).is_empty());
    }

    #[test]
    fn test_cmd_to_unknown_robot_is_dropped() {
        let operator = Identity::operator("O1");
        let fixture = Fixture::new(&[operator.clone()]);
        let message = frame(r#"{"type":"cmd","to":"ghost","ts":1,"cmd":"stop"}"#);

        let route = fixture.router.resolve(&operator, message.message(), 0);

        assert!(matches!(route, Route::Drop(DropReason::UnknownRecipient)));
        assert_eq!(dispatch(route, &message), DeliveryReport::default());
    }

    #[test]
    fn test_ping_from_operator_and_pong_from_robot() {
        let operator = Identity::operator("O1");
        let robot = Identity::robot("R1");
        let mut fixture = Fixture::new(&[operator.clone(), robot.clone()]);
        let ping = r#"{"type":"ping","to":"R1","ts":5}"#;
        let pong = r#"{"type":"pong","id":"R1","ts":5}"#;

        send(&fixture, &operator, ping);
        send(&fixture, &robot, pong);

        assert_eq!(fixture.received(&robot), vec![ping.to_string()]);
        assert_eq!(fixture.received(&operator), vec![pong.to_string()]);
    }

    #[test]
    fn test_robot_chat_without_to_broadcasts() {
        let robot = Identity::robot("R");
        let ops = [Identity::operator("O1"), Identity::operator("O2")];
        let mut fixture = Fixture::new(&[robot.clone(), ops[0].clone(), ops[1].clone()]);
        let raw = r#"{"type":"chat","id":"R","msg":"hello"}"#;

        send(&fixture, &robot, raw);

        for op in &ops {
            assert_eq!(fixture.received(op), vec![raw.to_string()]);
        }
    }

    #[test]
    fn test_operator_chat_routing() {
        let operator = Identity::operator("O1");
        let robot = Identity::robot("R1");
        let fixture = Fixture::new(&[operator.clone(), robot.clone()]);

        let addressed = fixture
            .router
            .resolve(&operator, &Message::chat_to("R1", "hi"), 0);
        let unaddressed = fixture.router.resolve(
            &operator,
            &Message::Chat {
                to: None,
                id: None,
                msg: "hi".into(),
            },
            0,
        );

        assert!(matches!(addressed, Route::Robot(_)));
        assert!(matches!(unaddressed, Route::Drop(DropReason::MissingRecipient)));
    }

    #[test]
    fn test_role_mismatch_is_dropped() {
        let operator = Identity::operator("O1");
        let robot = Identity::robot("R1");
        let fixture = Fixture::new(&[operator.clone(), robot.clone()]);

        let robot_cmd = Message::Cmd {
            to: "R1".into(),
            ts: 0,
            cmd: "drive".into(),
            args: Default::default(),
        };
        let operator_telemetry = Message::Telemetry {
            id: "O1".into(),
            ts: 0,
            bat: 0.0,
            temp: 0.0,
        };

        assert!(matches!(
            fixture.router.resolve(&robot, &robot_cmd, 0),
            Route::Drop(DropReason::RoleMismatch)
        ));
        assert!(matches!(
            fixture.router.resolve(&operator, &operator_telemetry, 0),
            Route::Drop(DropReason::RoleMismatch)
        ));
    }

    #[test]
    fn test_auth_and_unknown_are_dropped() {
        let robot = Identity::robot("R1");
        let fixture = Fixture::new(&[robot.clone()]);

        assert!(matches!(
            fixture
                .router
                .resolve(&robot, &Message::auth(Role::Robot, "R1", "x"), 0),
            Route::Drop(DropReason::AlreadyAuthenticated)
        ));
        assert!(matches!(
            fixture.router.resolve(&robot, &Message::Unknown, 0),
            Route::Drop(DropReason::UnknownType)
        ));
    }

    #[test]
    fn test_stale_cmd_dropped_when_limit_set() {
        let operator = Identity::operator("O1");
        let fixture = Fixture::new(&[operator.clone(), Identity::robot("R1")]);
        let router = fixture.router.clone().with_max_cmd_age(Some(2_000));
        let ping = Message::Ping {
            to: "R1".into(),
            ts: 1_000,
        };

        assert!(matches!(
            router.resolve(&operator, &ping, 5_000),
            Route::Drop(DropReason::Stale)
        ));
        assert!(matches!(router.resolve(&operator, &ping, 2_500), Route::Robot(_)));
        assert!(matches!(
            fixture.router.resolve(&operator, &ping, 5_000),
            Route::Robot(_)
        ));
    }

    #[test]
    fn test_failed_destination_does_not_block_others() {
        let registry = Arc::new(Registry::default());
        let (dead, dead_rx) = Peer::channel(ConnectionId::next(), 1);
        let (full, _full_rx) = Peer::channel(ConnectionId::next(), 1);
        let (live, mut live_rx) = Peer::channel(ConnectionId::next(), 4);
        drop(dead_rx);
        full.deliver(Utf8Bytes::from_static("backlog")).unwrap();

        registry.register(&Identity::operator("dead"), dead).unwrap();
        registry.register(&Identity::operator("full"), full).unwrap();
        registry.register(&Identity::operator("live"), live).unwrap();

        let router = Router::new(registry);
        let raw = r#"{"type":"pong","id":"R1","ts":1}"#;
        let pong = frame(raw);
        let report = dispatch(
            router.resolve(&Identity::robot("R1"), pong.message(), 0),
            &pong,
        );

        assert_eq!(report, DeliveryReport { delivered: 1, failed: 2 });
        assert_eq!(
            live_rx.try_recv().unwrap(),
            WsMessage::Text(Utf8Bytes::from(raw.to_string()))
        );
    }
}
