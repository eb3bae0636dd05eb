//! Event transport between the orchestrator and the HTTP body, plus the
//! client-side reassembly of the byte stream back into events.

pub mod framing;
pub mod session;
pub mod transport;

pub use framing::{encode_frame, EventStreamParser, Frame, StreamProtocolError};
pub use session::ClientSession;
pub use transport::{EventReceiver, StreamTransport};
