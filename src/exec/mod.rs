// src/exec/mod.rs

//! Handler execution layer.
//!
//! - [`handler`] defines the `CommandHandler` trait and the `handler_fn`
//!   closure adapter.
//! - [`governor`] runs one handler on its own task under a deadline and
//!   turns whatever happens into a `CommandResponse`.
//! - [`active`] tracks executions between spawn and resolution for
//!   diagnostics and shutdown sweeps.

pub mod active;
pub(crate) mod governor;
pub mod handler;

pub use active::HandlerSnapshot;
pub use handler::{CommandHandler, FnHandler, HandlerFuture, HandlerResult, handler_fn};
