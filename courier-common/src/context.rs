use std::{
    fmt::{self, Display},
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// The network endpoint a message arrived from.
///
/// Stored as an explicit tagged representation so that queue state written
/// to disk round-trips without guessing the concrete address family on
/// read. Endpoints the type cannot express are carried as `None` on the
/// [`DeliveryContext`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceEndpoint {
    Tcp { ip: IpAddr, port: u16 },
    Unix { path: PathBuf },
}

impl From<SocketAddr> for SourceEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::Tcp {
            ip: addr.ip(),
            port: addr.port(),
        }
    }
}

impl Display for SourceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { ip, port } => write!(f, "{ip}:{port}"),
            Self::Unix { path } => write!(f, "unix:{}", path.display()),
        }
    }
}

/// Everything known about a message being handed from one delivery stage to
/// the next: the envelope, where the message came from, and per-delivery
/// options.
///
/// The recipient list shrinks as delivery stages eliminate recipients; the
/// rest of the context is immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryContext {
    /// Unique id of this delivery, also used as the on-disk filename stem
    /// when the message is queued.
    pub delivery_id: String,
    /// Endpoint of the connection the message arrived over, when known.
    #[serde(default)]
    pub src_addr: Option<SourceEndpoint>,
    /// HELO/EHLO hostname claimed by the source.
    #[serde(default)]
    pub src_hostname: String,
    /// Envelope sender (MAIL FROM).
    pub sender: String,
    /// Envelope recipients still eligible for delivery, as
    /// RFC 5321 `local@domain` strings.
    pub recipients: Vec<String>,
    /// The hostname this server answers for.
    #[serde(default)]
    pub our_hostname: String,
    /// Per-delivery options (e.g. `local_only`, `hostname`).
    #[serde(default)]
    pub options: AHashMap<String, String>,
    /// Free-form values passed through to downstream targets.
    #[serde(default)]
    pub aux: AHashMap<String, String>,
}

impl DeliveryContext {
    /// Create a context with a freshly generated delivery id.
    pub fn new(sender: impl Into<String>, recipients: Vec<String>) -> Self {
        Self {
            delivery_id: ulid::Ulid::new().to_string(),
            src_addr: None,
            src_hostname: String::new(),
            sender: sender.into(),
            recipients,
            our_hostname: String::new(),
            options: AHashMap::new(),
            aux: AHashMap::new(),
        }
    }
}
