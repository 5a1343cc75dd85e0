//! Request and response types for the cluster entry points.
//!
//! - Requests: create, apply, delete, list filter, scale, restart
//! - Views: the aggregated logical cluster returned by list

mod request;
mod view;

pub use request::*;
pub use view::*;
