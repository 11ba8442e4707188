//! Identity and ownership core of the Hy IR.
//!
//! The crate exposes the pieces every pass or consumer of the IR builds on:
//!
//! - [`context::Context`]: the interning authority shared by modules of a compilation.
//! - [`module::Module`]: a compilation unit owning its named metadata, global values
//!   and target [`layout::DataLayout`].
//! - [`module::materializer::Materializer`]: the one-shot capability that fills in
//!   deferred global bodies from an external source (typically a serialized stream).
//! - [`utils::error`] and [`utils::fatal`]: the recoverable and fatal reporting channels.
//!
//! ```rust
//! use hyir::{context::Context, module::Module};
//!
//! let ctx = Context::new();
//! let mut module = Module::new("demo", ctx.clone());
//! module.get_or_insert_named_metadata("llvm.ident");
//! assert_eq!(module.md_kind_id("dbg"), 0);
//! ```

pub mod context;
pub mod layout;
pub mod magic;
pub mod module;
pub mod utils;

pub use context::{Context, MdKindId};
pub use layout::DataLayout;
pub use module::Module;
pub use utils::error::{Error, HyResult};
