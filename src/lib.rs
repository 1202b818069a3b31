#![warn(clippy::all, rust_2018_idioms)]

pub mod allocation;
mod app;
pub mod core_types;
pub mod date;
pub mod format;
#[cfg(feature = "gateway")]
pub mod gateway;
pub mod io;
pub mod model;
pub use app::AssetFlowApp;
