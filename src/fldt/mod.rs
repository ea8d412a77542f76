//! File-delivery state machines
//!
//! FLDT streams versioned artifacts from a gateway to its clients in four
//! request/response pairs (INFV, GNFH, GNFD, GNFF). The [`FldtClient`] tracks
//! one transfer per registered file type and survives lost messages through
//! tick-driven retries; the [`FldtServer`] answers requests from whatever
//! update interfaces it was given and announces new versions.
//!
//! Neither side owns a socket: both sit behind the [`Transport`] seam and are
//! driven by `handle_message` plus, on the client, a periodic tick.
//!
//! [`Transport`]: crate::transport::Transport

mod client;
mod server;

pub use client::FldtClient;
pub use server::FldtServer;

/// Fixed capacity of the file-type mapping table
pub const MAX_FILE_TYPES: usize = 10;

/// Ticks without a response before a request is retried
pub const WAIT_MAX_TICKS: u32 = 10;

/// Retries per request before the transfer is abandoned
pub const RETRY_MAX: u32 = 5;
