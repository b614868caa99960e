//! An AMF (Action Message Format) remoting gateway.
//!
//! The crate has three layers:
//!
//! * The wire codecs: [`amf0`] and [`amf3`] translate between raw bytes and
//!   the [`types::Value`] graph, [`packet`] frames request/response
//!   envelopes around them.
//! * The dispatch layer: [`service`] holds the table of callable methods,
//!   [`messaging`] models the RPC message envelopes carried inside AMF3
//!   bodies.
//! * The policy layer: [`auth`] is the seam to an identity backend and
//!   [`acl`] answers allow/deny questions about a call.
//!
//! [`gateway::Gateway`] ties the layers together: it consumes a raw request
//! buffer, dispatches every body it contains, and produces a raw response
//! buffer.
//!
//! ```
//! use amf_gateway::gateway::Gateway;
//! use amf_gateway::service::{Invocable, Param};
//! use amf_gateway::types::Value;
//! use std::rc::Rc;
//!
//! let mut gateway = Gateway::new();
//! gateway
//!     .register_function(
//!         None,
//!         Invocable::new("echo", vec![vec![Param::untyped("value")]], |args| {
//!             Ok(args.first().cloned().unwrap_or_else(|| Rc::new(Value::Null)))
//!         }),
//!     )
//!     .unwrap();
//! ```

pub mod acl;
pub mod amf0;
pub mod amf3;
pub mod auth;
pub mod errors;
pub mod gateway;
pub mod messaging;
pub mod nom_utils;
pub mod packet;
pub mod registry;
pub mod service;
pub mod types;
