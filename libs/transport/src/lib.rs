//! Transport boundary for the management console.
//!
//! The console exposes two interfaces and this crate covers both:
//!
//! - **Command interface**: line-oriented commands executed over an ssh
//!   session ([`CommandTransport`]).
//! - **REST interface**: JSON quick-property and PCM endpoints
//!   ([`ManagementRest`]).
//!
//! Both interfaces are traits so operations receive explicit handles and
//! tests substitute scripted fakes. Console failures surface as
//! [`TransportError`] with the console's error code parsed into a typed
//! [`ConsoleErrorCode`] exactly once, at this boundary.

pub mod command;
pub mod error;
pub mod parse;
pub mod rest;

pub use command::{CommandTransport, ScriptedTransport, SshTransport};
pub use error::{ConsoleErrorCode, TransportError};
pub use rest::{HmcRestClient, ManagementRest, ScriptedRest};
