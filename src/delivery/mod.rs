//! Delivery layer: HTTP transport to the remote collector

pub mod backoff;
pub mod client;
pub mod connection;

pub use backoff::Backoff;
pub use client::{
    shipper_factory, DeliveryClient, DeliveryClientBuilder, DEFAULT_HEALTHCHECK_INTERVAL,
    DEFAULT_HEALTHCHECK_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
};
pub use connection::Connection;
