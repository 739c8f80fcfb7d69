// hearth-api: Async socket client for a smart-home registry.
//
// Connection lifecycle with challenge auth and reconnect backoff, request
// correlation by id, credential refresh, and typed registry commands.

pub mod connection;
pub mod correlator;
pub mod credential;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use connection::{Connection, ConnectionOptions, ConnectionState, ReconnectConfig};
pub use correlator::{PendingResponse, RequestCorrelator, Settlement};
pub use credential::{CredentialProvider, OAuthRefresher, StaticToken};
pub use error::Error;
pub use protocol::{EventFrame, EventPayload, InboundMessage, RemoteError};
pub use registry::{
    AreaEntry, EntityRegistryEntry, FloorEntry, LabelEntry, StateChangedData, StateObject,
};
