//! # SSDP Codec Module
//!
//! Parses and composes the text messages exchanged by producers and consumers.
//!
//! ## Key Types
//!
//! - [`Message`] - status line, ordered header map and optional body
//! - [`Headers`] - insertion-ordered, case-sensitive header map
//! - [`NotificationKind`] - `ssdp:alive` / `ssdp:byebye`
//!
//! ## Example
//!
//! ```ignore
//! use ssdp_discovery::codec::{compose_response, Headers, Message};
//!
//! let mut params = Headers::new();
//! params.insert("LOCATION", "http://10.0.0.2/desc.xml");
//! let bytes = compose_response("roku:ecp", "1234", &params);
//! let message = Message::parse(&bytes);
//! assert_eq!(message.header("USN"), Some("uuid:1234"));
//! ```

pub mod compose;
pub mod message;

pub use compose::*;
pub use message::*;

mod tests;
