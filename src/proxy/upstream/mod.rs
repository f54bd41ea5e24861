// Upstream module - outbound HTTP to the external API and the registry

pub mod client;

pub use client::{Outbound, Payload, UpstreamClient, UpstreamResponse};
