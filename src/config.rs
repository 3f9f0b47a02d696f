//! Runtime configuration, read from the environment

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Read an env var and parse it, falling back to `default` when unset or invalid
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

/// Per-room and per-connection tuning
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// How long a question stays open
    pub question_duration: Duration,
    /// Period of the countdown broadcast
    pub tick_interval: Duration,
    /// Bound of each connection's outbound queue
    pub outbound_capacity: usize,
    /// Bound of the coordinator's event intake
    pub event_capacity: usize,
    /// A connection with no inbound frame for this long is dropped
    pub idle_timeout: Duration,
    /// A single frame write taking longer than this drops the connection
    pub write_timeout: Duration,
    /// Largest inbound frame accepted by the transport
    pub max_frame_bytes: usize,
    /// A room without connections for this long shuts down
    pub room_idle_timeout: Duration,
    pub max_name_chars: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            question_duration: Duration::from_secs(30),
            tick_interval: Duration::from_secs(1),
            outbound_capacity: 256,
            event_capacity: 1024,
            idle_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            max_frame_bytes: 4096,
            room_idle_timeout: Duration::from_secs(600),
            max_name_chars: 32,
        }
    }
}

impl RoomConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            question_duration: Duration::from_secs(env_or(
                "QUIZHUB_QUESTION_SECONDS",
                defaults.question_duration.as_secs(),
            )),
            tick_interval: Duration::from_millis(env_or(
                "QUIZHUB_TICK_MILLIS",
                defaults.tick_interval.as_millis() as u64,
            )),
            outbound_capacity: env_or("QUIZHUB_OUTBOUND_CAPACITY", defaults.outbound_capacity)
                .max(1),
            event_capacity: env_or("QUIZHUB_EVENT_CAPACITY", defaults.event_capacity).max(1),
            idle_timeout: Duration::from_secs(env_or(
                "QUIZHUB_IDLE_SECONDS",
                defaults.idle_timeout.as_secs(),
            )),
            write_timeout: Duration::from_secs(env_or(
                "QUIZHUB_WRITE_SECONDS",
                defaults.write_timeout.as_secs(),
            )),
            max_frame_bytes: env_or("QUIZHUB_MAX_FRAME_BYTES", defaults.max_frame_bytes),
            room_idle_timeout: Duration::from_secs(env_or(
                "QUIZHUB_ROOM_IDLE_SECONDS",
                defaults.room_idle_timeout.as_secs(),
            )),
            max_name_chars: env_or("QUIZHUB_MAX_NAME_CHARS", defaults.max_name_chars),
        };

        // A zero period would make the ticker spin
        let config = if config.tick_interval.is_zero() {
            Self {
                tick_interval: defaults.tick_interval,
                ..config
            }
        } else {
            config
        };

        tracing::info!(
            question_secs = config.question_duration.as_secs(),
            tick_ms = config.tick_interval.as_millis() as u64,
            outbound_capacity = config.outbound_capacity,
            room_idle_secs = config.room_idle_timeout.as_secs(),
            "Room config loaded"
        );

        config
    }

    /// Keepalive period, comfortably inside the peer's idle window
    pub fn ping_interval(&self) -> Duration {
        (self.idle_timeout * 9 / 10).max(Duration::from_secs(1))
    }
}

/// Process-level settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Directory holding `<quiz id>.json` files
    pub quiz_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            quiz_dir: PathBuf::from("quizzes"),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            addr: env_or("QUIZHUB_ADDR", defaults.addr),
            quiz_dir: std::env::var("QUIZHUB_QUIZ_DIR")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.quiz_dir),
        }
    }
}
