//! HTTP/1.1 message handling.
//!
//! # Data Flow
//! ```text
//! socket bytes
//!     → framing.rs (find header end, reassemble body, carry leftovers)
//!     → message.rs (start line, headers, body)
//!     → relay session edits headers
//!     → message.rs (encode)
//!     → framing.rs (write)
//! ```

pub mod framing;
pub mod message;

pub use framing::{FramingOptions, FramingReader};
pub use message::Message;
