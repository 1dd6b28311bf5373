//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Database engine a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[serde(alias = "mariadb")]
    Mysql,
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
}

impl Engine {
    /// Parse an engine name.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is not recognized.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Engine::Mysql),
            "postgres" | "postgresql" | "pg" => Ok(Engine::Postgres),
            other => Err(SyncError::Config(format!(
                "Unknown database engine: '{}'. Supported engines: mysql, postgres",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Engine::Mysql => "mysql",
            Engine::Postgres => "postgres",
        }
    }

    /// Port used when the configuration names none.
    pub fn default_port(&self) -> u16 {
        match self {
            Engine::Mysql => 3306,
            Engine::Postgres => 5432,
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where to reach the server: a TCP port or a local socket.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawPort", into = "RawPort")]
pub enum PortOrSocket {
    /// The engine's default TCP port.
    #[default]
    Default,
    /// A TCP port.
    Port(u16),
    /// A Unix socket path (MySQL) or socket directory (PostgreSQL).
    Socket(String),
}

impl PortOrSocket {
    /// Parse a port-or-socket string.
    ///
    /// A value starting with a digit is a port; anything else is a socket.
    pub fn parse(s: &str) -> Result<Self> {
        match s.chars().next() {
            None => Ok(PortOrSocket::Default),
            Some(c) if c.is_ascii_digit() => s
                .parse::<u16>()
                .map(PortOrSocket::Port)
                .map_err(|_| SyncError::Config(format!("Invalid port '{}'", s))),
            Some(_) => Ok(PortOrSocket::Socket(s.to_string())),
        }
    }

    /// The TCP port to use, if this is not a socket.
    pub fn tcp_port(&self, engine: Engine) -> Option<u16> {
        match self {
            PortOrSocket::Default => Some(engine.default_port()),
            PortOrSocket::Port(port) => Some(*port),
            PortOrSocket::Socket(_) => None,
        }
    }
}

impl fmt::Display for PortOrSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortOrSocket::Default => Ok(()),
            PortOrSocket::Port(port) => write!(f, "{}", port),
            PortOrSocket::Socket(path) => f.write_str(path),
        }
    }
}

/// YAML accepts either `port: 3306` or `port: /run/mysqld/mysqld.sock`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawPort {
    Number(u16),
    Text(String),
}

impl TryFrom<RawPort> for PortOrSocket {
    type Error = SyncError;

    fn try_from(raw: RawPort) -> Result<Self> {
        match raw {
            RawPort::Number(port) => Ok(PortOrSocket::Port(port)),
            RawPort::Text(s) => PortOrSocket::parse(&s),
        }
    }
}

impl From<PortOrSocket> for RawPort {
    fn from(value: PortOrSocket) -> Self {
        match value {
            PortOrSocket::Port(port) => RawPort::Number(port),
            other => RawPort::Text(other.to_string()),
        }
    }
}

/// Connection parameters for one client.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database engine.
    pub engine: Engine,

    /// Database host (default: "localhost").
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port or socket path (default: the engine's port).
    #[serde(default)]
    pub port: PortOrSocket,

    /// Database name.
    pub database: String,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Request a read-only transaction.
    #[serde(default)]
    pub readonly: bool,

    /// Request a consistent snapshot for the whole session.
    #[serde(default)]
    pub snapshot: bool,

    /// SSL mode (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("readonly", &self.readonly)
            .field("snapshot", &self.snapshot)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

impl ConnectionConfig {
    /// A config with defaults for everything but engine and database.
    pub fn new(engine: Engine, database: impl Into<String>) -> Self {
        Self {
            engine,
            host: default_host(),
            port: PortOrSocket::Default,
            database: database.into(),
            user: String::new(),
            password: String::new(),
            readonly: false,
            snapshot: false,
            ssl_mode: default_disable(),
        }
    }

    /// `host:port/database` for log lines.
    pub fn display_target(&self) -> String {
        match &self.port {
            PortOrSocket::Socket(path) => format!("{}/{}", path, self.database),
            port => format!(
                "{}:{}/{}",
                self.host,
                port.tcp_port(self.engine).unwrap_or_default(),
                self.database
            ),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}
