//! Global values owned by a module.
//!
//! A [`GlobalValue`] is a named function or variable. It is either a plain
//! declaration (defined elsewhere), a deferred definition whose body an installed
//! [`Materializer`](crate::module::materializer::Materializer) can provide on
//! demand, or a definition with its body in memory.
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumDiscriminants, EnumIs};
use uuid::Uuid;

use crate::module::symbol::Symbol;

/// All Global Variables and Functions have one of the following types of linkage:
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum Linkage {
    /// Only directly accessible by objects in the current module. Linking may
    /// rename the value to avoid collisions.
    Private,

    /// Like `Private`, but the value shows as a local symbol in the object file.
    Internal,

    /// May be referenced by, and defined in, other modules.
    #[default]
    External,
}

/// Note: A symbol with internal or private linkage must have default visibility.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
    #[default]
    Default,

    /// Not placed in the dynamic symbol table.
    Hidden,

    /// Placed in the dynamic symbol table, but references within the defining
    /// module bind to the local symbol.
    Protected,
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GlobalFlags: u8 {
        /// The variable is never written to.
        const CONSTANT = 1 << 0;
        /// Each thread has its own copy.
        const THREAD_LOCAL = 1 << 1;
        /// The address is not significant, only the content.
        const UNNAMED_ADDR = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum GlobalKind {
    Function,
    Variable,
}

/// Materialized body of a global: the encoded instructions of a function or the
/// initializer of a variable. The core does not interpret it.
#[derive(Debug, Clone, Default, Hash, PartialEq, Eq)]
pub struct Body(pub Vec<u8>);

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body(bytes)
    }
}

impl From<&[u8]> for Body {
    fn from(bytes: &[u8]) -> Self {
        Body(bytes.to_vec())
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EnumIs, EnumDiscriminants)]
#[strum_discriminants(name(GlobalStateKind), derive(Display))]
pub enum GlobalState {
    /// Defined outside the module, never has a body.
    Declaration,

    /// Defined in the module, body pending materialization.
    Deferred,

    /// Defined in the module with its body in memory.
    Defined(Body),
}

/// A named function or variable owned by a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalValue {
    /// Identity of this global, independent of its name and of the owning module.
    pub uuid: Uuid,
    name: String,
    pub kind: GlobalKind,
    pub linkage: Linkage,
    pub visibility: Visibility,
    pub flags: GlobalFlags,
    pub state: GlobalState,
}

impl GlobalValue {
    pub fn new(name: impl Into<String>, kind: GlobalKind) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            kind,
            linkage: Linkage::default(),
            visibility: Visibility::default(),
            flags: GlobalFlags::empty(),
            state: GlobalState::Declaration,
        }
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self::new(name, GlobalKind::Function)
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self::new(name, GlobalKind::Variable)
    }

    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_flags(mut self, flags: GlobalFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Mark the body as available from the module's materializer.
    pub fn deferred(mut self) -> Self {
        self.state = GlobalState::Deferred;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_declaration(&self) -> bool {
        self.state.is_declaration()
    }

    /// Whether the body still has to be provided by a materializer.
    pub fn is_materializable(&self) -> bool {
        self.state.is_deferred()
    }

    pub fn body(&self) -> Option<&Body> {
        match &self.state {
            GlobalState::Defined(body) => Some(body),
            GlobalState::Declaration | GlobalState::Deferred => None,
        }
    }

    /// Install the body, turning the global into a definition.
    pub fn define(&mut self, body: impl Into<Body>) {
        self.state = GlobalState::Defined(body.into());
    }

    /// Drop the body and mark the global as available from the materializer again.
    pub fn defer(&mut self) {
        self.state = GlobalState::Deferred;
    }
}

impl Symbol for GlobalValue {
    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for GlobalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @{} ({})",
            self.linkage,
            self.visibility,
            self.kind,
            self.name,
            GlobalStateKind::from(&self.state)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_globals_are_external_declarations() {
        let f = GlobalValue::function("puts");
        assert_eq!(f.kind, GlobalKind::Function);
        assert_eq!(f.linkage, Linkage::External);
        assert!(f.is_declaration());
        assert!(!f.is_materializable());
        assert!(f.body().is_none());
    }

    #[test]
    fn deferred_then_defined() {
        let mut g = GlobalValue::variable("counter")
            .with_linkage(Linkage::Internal)
            .with_flags(GlobalFlags::THREAD_LOCAL)
            .deferred();
        assert!(g.is_materializable());

        g.define(vec![0u8, 0, 0, 0]);
        assert!(!g.is_materializable());
        assert_eq!(g.body(), Some(&Body(vec![0, 0, 0, 0])));
        assert!(g.flags.contains(GlobalFlags::THREAD_LOCAL));

        g.defer();
        assert!(g.body().is_none());
    }

    #[test]
    fn uuid_is_per_global() {
        let mut a = GlobalValue::function("f");
        let b = GlobalValue::function("f");
        assert_ne!(a.uuid, b.uuid);

        let before = a.uuid;
        a.define(vec![0xc3]);
        a.defer();
        assert_eq!(a.uuid, before);
    }

    #[test]
    fn display_summarizes() {
        let g = GlobalValue::function("main")
            .with_visibility(Visibility::Hidden)
            .deferred();
        assert_eq!(g.to_string(), "external hidden function @main (Deferred)");
    }
}
