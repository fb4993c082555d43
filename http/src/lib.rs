//! # waypoint-http
//!
//! Hyper 1.0 native HTTP ingress for the Waypoint hypermedia engine.
//!
//! ```rust,ignore
//! let doc = GraphDocument::load("graph.toml")?;
//! NavigationIngress::from_document(&doc)?
//!     .bind("127.0.0.1:3000")
//!     .handler("customer", |req| async move { Ok(Reply::entity(load(&req.ctx)?)) })
//!     .run()
//!     .await?;
//! ```

pub mod ingress;
pub mod response;
pub mod service;

pub use ingress::{NavigationIngress, Reply, StateRequest};
pub use response::HttpResponse;
pub use service::NavigationService;
