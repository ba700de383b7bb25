//! Display formatting for plans, deployments, and operation results.
//!
//! Domain models implement [`std::fmt::Display`] directly (see [`models`]);
//! this module adds newtype wrappers for collections and for the outcome of
//! commands. Everything renders as markdown so the CLI can pass it straight
//! to its terminal renderer.
//!
//! - [`collections`]: list wrappers ([`Plans`], [`Deployments`])
//! - [`results`]: command outcomes ([`Registered`], [`Revised`], [`Accepted`],
//!   [`Recovered`])
//! - [`status`]: one-line [`Notice`]s
//! - [`datetime`]: local time and duration formatting
//!
//! ```rust
//! use stratum_core::display::{Notice, Plans};
//!
//! assert_eq!(Plans(vec![]).to_string(), "No plans found.\n");
//! assert!(Notice::warning("stale").to_string().contains("stale"));
//! ```

pub mod collections;
pub mod datetime;
pub mod models;
pub mod results;
pub mod status;

pub use collections::{Deployments, Plans};
pub use datetime::{Elapsed, LocalDateTime};
pub use results::{Accepted, Recovered, Registered, Revised};
pub use status::{Notice, NoticeLevel};
