//! CoinLedger - a single-node ledger with a linear chain of minted blocks
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`ledger`] - The engine: every read and mutation goes through [`ledger::Ledger`]
//! - [`transaction`] - Transaction records and the transfer processor
//! - [`blockchain`] - Block types, proposal validation and reward minting
//!
//! ## Identity
//! - [`crypto`] - Address derivation and block content hashing (SHA-256)
//! - [`wallet`] - Password-derived secrets for the wallet tool
//!
//! ## State Management
//! - [`persistence`] - Store adapter traits, SQLite and in-memory backends
//!
//! ## Integration
//! - [`api`] - REST API server (axum)
//! - [`client`] - HTTP client for a running node
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod ledger;
pub mod transaction;

// ============================================================================
// Identity
// ============================================================================
pub mod crypto;
pub mod wallet;

// ============================================================================
// State Management
// ============================================================================
pub mod persistence;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;
pub mod client;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
