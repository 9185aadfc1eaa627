// src/server/mod.rs

//! Request handling and transport.
//!
//! The pure request -> response mapping lives in [`dispatch`]; the async IO
//! shell reading and writing JSON lines is [`stdio`].

pub mod dispatch;
pub mod protocol;
pub mod stdio;

pub use dispatch::Dispatcher;
pub use protocol::{
    parse_request_line, MalformedRequest, Outgoing, Push, Reply, Request, RequestEnvelope,
    Response,
};
pub use stdio::serve;
