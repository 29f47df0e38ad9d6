//! License key management for Licensor.
//!
//! This crate handles:
//! - Generating signed and encrypted license keys on the vendor side
//! - Installing, viewing, loading, verifying and uninstalling them on the
//!   consumer side
//! - Free trial keys and chaining of consumer managers
//!
//! # License Key Format
//!
//! A license key is `encrypt(compress(encode(repository)))`, where the
//! repository record binds the encoded [`License`] to a signature and the
//! name of the signature algorithm:
//!
//! ```json
//! {"algorithm": "Ed25519", "artifact": "{\"consumerAmount\":1,...}", "signature": "..."}
//! ```
//!
//! The artifact is stored as text when the codec declares a text charset and
//! base64 armored otherwise.
//!
//! # Errors
//!
//! Internals return [`LicenseError`], which [`LicenseError::kind`] sorts into
//! integrity, configuration, policy, not-found and I/O failures. Managers wrap
//! every failure into a [`LicenseManagementError`] carrying an end-user
//! message.

mod auth;
mod charset;
mod clock;
mod codec;
mod consumer;
mod context;
mod error;
mod license;
pub mod messages;
mod policy;
mod repository;
mod store;
mod vendor;

pub use auth::{Authentication, Notary, NotaryBuilder};
pub use charset::{Charset, content_transfer_charset};
pub use clock::{Clock, SystemClock};
pub use codec::{Codec, Decoder, JsonCodec, decode, duplicate, encode};
pub use consumer::{
    BasicConsumerLicenseManager, ConsumerLicenseManager, ConsumerManagerBuilder, DelegatePredicate,
};
pub use context::{
    DEFAULT_CACHE_PERIOD, Format, LicenseManagementContext, LicenseManagementContextBuilder,
};
pub use error::{ErrorKind, LicenseError, LicenseManagementError, LicenseResult, ManagementResult};
pub use license::License;
pub use policy::{
    AllowAll, DEFAULT_CONSUMER_TYPE, DefaultInitialization, DefaultValidation, DenyAll,
    LicenseFunctionComposition, LicenseInitialization, LicenseManagementAuthorization,
    LicenseValidation, UNKNOWN_HOLDER, ValidationError,
};
pub use repository::{Repository, RepositoryController};
pub use store::{FileStore, MemoryStore, Source, Store};
pub use vendor::{LicenseKeyGenerator, VendorLicenseManager, VendorManagerBuilder};
