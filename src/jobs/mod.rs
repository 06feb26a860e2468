//! Background jobs for the deletion worker.
//!
//! - **Scheduled Deletion**: triggers a deletion run on a fixed interval, for
//!   deployments without an external scheduler calling the HTTP endpoint.
//!
//! # Example
//!
//! ```toml
//! [schedule]
//! enabled = true
//! interval_secs = 900
//! ```

mod scheduled_deletion;

pub use scheduled_deletion::start_deletion_worker;
