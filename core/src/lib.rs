//! Synchronous client core for PPMS / PUMAPI.
//!
//! # Overview
//! PUMAPI is a form-POST API answering every action with HTTP 200 and a
//! quasi-CSV body. This crate wraps it in four layers:
//! - `codec` turns response text into ordered records.
//! - `cache` mirrors responses on disk so sessions can be replayed off-line.
//! - `auth` tracks whether the API key is (still) accepted.
//! - `gateway` is the single choke point tying cache, session and transport.
//!
//! `PpmsClient` sits on top and offers one method per PUMAPI action,
//! building `PpmsUser`, `PpmsSystem` and `PpmsBooking` values.
//!
//! # Design
//! - The network sits behind the `Transport` trait; `UreqTransport` is the
//!   default, tests plug in scripted or mock-server backed transports.
//! - Bodies leave the gateway unparsed. The caller chooses strict or
//!   graceful decoding per action.
//! - Nothing is global: each gateway owns its session and cache root.

pub mod auth;
pub mod booking;
pub mod cache;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod system;
pub mod user;

pub use auth::{AuthSession, AuthState};
pub use booking::{BookingKind, PpmsBooking};
pub use cache::{signature_for, ResponseCache, Signature};
pub use client::{NewUser, Permission, PpmsClient};
pub use codec::{decode_single, decode_table, ParsedTable, Record, Scalar};
pub use config::ConnectionConfig;
pub use error::{PpmsError, Result};
pub use gateway::RequestGateway;
pub use http::{params, HttpRequest, HttpResponse, Params, Transport, UreqTransport};
pub use system::PpmsSystem;
pub use user::PpmsUser;
