//! Escrowd - escrow payment and dispute resolution engine
//!
//! This library provides the core functionality for the escrowd service:
//! the payment state machine, tiered fee evaluation, ledger accounting,
//! dispute workflow, withdrawal lifecycle, gateway webhook ingestion, and
//! the HTTP API handlers.

pub mod auth;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod fees;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod notify;
