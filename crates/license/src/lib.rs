//! `keygate-license` — license issuance, validation, and lifecycle.
//!
//! A license is an opaque, tamper-evident string bound to one organization.
//! The [`codec`] module seals and opens the encrypted payload; the
//! [`manager`] module drives the status state machine against a persistent
//! [`store::LicenseStore`]. This crate is intentionally decoupled from HTTP
//! and from any concrete storage backend.

pub mod codec;
pub mod error;
pub mod manager;
pub mod payload;
pub mod record;
pub mod status;
pub mod store;

pub use codec::{CodecError, LicenseCodec};
pub use error::LicenseError;
pub use manager::{LicenseManager, LicenseValidation};
pub use payload::{FeatureSet, LicensePayload};
pub use record::License;
pub use status::LicenseStatus;
pub use store::LicenseStore;
