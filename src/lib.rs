pub mod analysis;
pub mod codec;
pub mod error;
pub mod header;
pub mod packet;
pub mod packet_log;
pub mod protocol;
pub mod state;

pub use analysis::{AnalysisConfig, ShotAnalysis, analyze};
pub use error::{ErrorKind, ProtocolError};
pub use header::{Header, HeaderSet};
pub use packet::Packet;
pub use packet_log::PacketLog;
pub use protocol::estimate::{EstReason, MarkerSource};
pub use protocol::profile::{ProfilePoint, ShotProfile};
pub use state::{ParserConfig, ParserStatus, ProtocolState, ShotSnapshot};
