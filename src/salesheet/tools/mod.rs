pub mod config;
pub mod derive;
pub mod error;
pub mod io;
pub mod model;
pub mod project;
pub mod reconcile;
pub mod route;
pub mod sync;

pub use error::{Result, ToolError};
