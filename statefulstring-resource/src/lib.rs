//! The resource provider interface: wire schema, provider trait, and the
//! JSON-RPC plumbing that connects a provider process to its host.

pub mod framework;
pub mod logging;
pub mod rpc;
pub mod schema;
