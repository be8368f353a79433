//! HTTP adapters

pub mod charge_gateway;
pub mod client;

pub use charge_gateway::HttpChargeGateway;
pub use client::{HttpClient, HttpClientBuilder};
