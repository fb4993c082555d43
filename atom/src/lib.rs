//! # waypoint-atom
//!
//! Atom/OData wire codec for the Waypoint hypermedia engine.

pub mod codec;
pub mod interceptor;
pub mod media;
pub mod parser;
pub mod probe;
pub mod writer;

pub use codec::{AtomCodec, EncodedDocument};
pub use interceptor::ODataLinkInterceptor;
pub use probe::Pushback;
