//! Async STOMP 1.0 client.
//!
//! One background reader task per [`Connection`] drains the socket, recovers
//! frame boundaries ([`framer::ByteFramer`]), decodes frames
//! ([`codec::decode`]) and dispatches them either to a [`FrameHandler`]
//! (callback delivery) or to a queue drained by [`Connection::receive`]
//! (queue delivery).

pub mod codec;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod framer;
pub mod locator;
pub mod options;
pub mod session;
pub mod transport;

pub use codec::StompCodec;
pub use connection::Connection;
pub use dispatcher::{DeliveryMode, FrameHandler, Message};
pub use error::{ConnError, ServerError};
pub use frame::{Command, Frame};
pub use framer::ByteFramer;
pub use locator::{Credentials, Locator, Scheme};
pub use options::ConnectOptions;
pub use session::{AckMode, Phase};
