// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport session management for Atendente.
//!
//! [`SessionRegistry`] owns one socket per tenant session and runs its
//! connection state machine. [`MessageRouter`] turns the raw payloads those
//! sockets deliver into routed domain events on the bus.

pub mod ledger;
pub mod registry;
pub mod router;

pub use ledger::SentLedger;
pub use registry::{RegistryConfig, SessionInfo, SessionRegistry, is_ephemeral_credential};
pub use router::{DropReason, MessageRouter, Route};
