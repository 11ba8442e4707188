//! Lazy materialization of global bodies.
//!
//! A [`Materializer`] is supplied by an external reader of a serialized module
//! (for instance a bitcode decoder). It owns whatever resource it reads from; the
//! module only calls into it. The module guarantees that
//! [`Materializer::materialize_module`] is invoked at most once.
use crate::{
    module::{Module, global::GlobalValue},
    utils::error::{Error, HyResult},
};

pub trait Materializer: Send {
    /// Fill in the body of every deferred global of `module`.
    ///
    /// On success the module must be fully defined. On failure the error must
    /// describe what went wrong; whatever was already applied stays in place.
    fn materialize_module(&mut self, module: &mut Module) -> HyResult<()>;

    /// Fill in the body of a single deferred global.
    ///
    /// Materializers that can only read a module as a whole keep the default,
    /// which reports the global as not individually materializable.
    fn materialize_global(&mut self, global: &mut GlobalValue) -> HyResult<()> {
        Err(Error::NotMaterializable(global.name().to_string()))
    }
}

impl<F> Materializer for F
where
    F: FnMut(&mut Module) -> HyResult<()> + Send,
{
    fn materialize_module(&mut self, module: &mut Module) -> HyResult<()> {
        self(module)
    }
}
