//! tollgate user service.
//!
//! This crate provides the HTTP service behind the gateway: public health and
//! identity provider configuration endpoints, and profile and administrative
//! endpoints gated on the identity the gateway authorizer forwards.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod parameters;
pub mod routes;
