//! Core library for the salesheet command line application.
//!
//! The library pushes sale orders and invoices from a records export into a
//! positional spreadsheet, replacing the rows of records already present and
//! appending the rest. Domain types live in [`salesheet::tools::model`], the
//! derived-field rules in [`salesheet::tools::derive`], row layouts in
//! [`salesheet::tools::project`], worksheet routing in
//! [`salesheet::tools::route`], the keyed replace-or-append logic in
//! [`salesheet::tools::reconcile`] and the orchestration in
//! [`salesheet::tools::sync`]. Store adapters sit under [`salesheet::tools::io`].

pub mod salesheet;

pub use salesheet::tools::{
    Result, ToolError, config, derive, error, io, model, project, reconcile, route, sync,
};
