//! Module-level metadata.
//!
//! Metadata values live in a pool owned by their module and are referenced by
//! [`MetadataRef`] keys. A [`NamedMDNode`] is a named, ordered list of such
//! references, uniqued by name within its module.
use smallvec::SmallVec;
use uuid::Uuid;

use crate::{hy_fatal, hy_unreachable, module::symbol::Symbol};

slotmap::new_key_type! {
    /// Reference to a metadata value in the pool of one module.
    pub struct MetadataRef;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Metadata {
    /// An arbitrary string.
    String(String),

    /// An ordered tuple of other metadata values of the same module.
    Tuple(Vec<MetadataRef>),

    /// A reference to a global value of the module, by name.
    Global(String),
}

impl Metadata {
    /// Metadata values this one refers to.
    pub fn references(&self) -> &[MetadataRef] {
        match self {
            Metadata::Tuple(elements) => elements,
            Metadata::String(_) | Metadata::Global(_) => &[],
        }
    }
}

/// A named, ordered collection of metadata references owned by a module.
///
/// Nodes are only ever created through
/// [`Module::get_or_insert_named_metadata`](crate::module::Module::get_or_insert_named_metadata).
#[derive(Debug)]
pub struct NamedMDNode {
    name: String,
    operands: SmallVec<MetadataRef, 4>,
    parent: Option<Uuid>,
}

impl NamedMDNode {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            operands: SmallVec::new(),
            parent: None,
        }
    }

    /// Bind the node to its owning module. May only happen once.
    pub(crate) fn set_parent(&mut self, parent: Uuid) {
        if let Some(current) = self.parent {
            hy_fatal!(
                "named metadata `{}` already belongs to module {} and cannot move to {}",
                self.name,
                current,
                parent
            );
        }
        self.parent = Some(parent);
    }

    pub(crate) fn push_operand(&mut self, operand: MetadataRef) {
        self.operands.push(operand);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity of the owning module.
    pub fn parent(&self) -> Uuid {
        match self.parent {
            Some(parent) => parent,
            None => hy_unreachable!("named metadata `{}` has no parent module", self.name),
        }
    }

    pub fn operands(&self) -> &[MetadataRef] {
        &self.operands
    }

    pub fn operand(&self, index: usize) -> Option<MetadataRef> {
        self.operands.get(index).copied()
    }

    pub fn num_operands(&self) -> usize {
        self.operands.len()
    }

    pub fn clear_operands(&mut self) {
        self.operands.clear();
    }
}

impl Symbol for NamedMDNode {
    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use std::panic;

    use slotmap::SlotMap;

    use super::*;
    use crate::utils::fatal::install_fatal_error_handler;

    #[test]
    fn operands_keep_insertion_order() {
        let mut pool: SlotMap<MetadataRef, Metadata> = SlotMap::with_key();
        let a = pool.insert(Metadata::String("a".into()));
        let b = pool.insert(Metadata::String("b".into()));

        let mut node = NamedMDNode::new("llvm.ident");
        node.set_parent(Uuid::nil());
        node.push_operand(b);
        node.push_operand(a);
        node.push_operand(b);

        assert_eq!(node.operands(), &[b, a, b]);
        assert_eq!(node.operand(1), Some(a));
        assert_eq!(node.operand(3), None);
        assert_eq!(node.parent(), Uuid::nil());

        node.clear_operands();
        assert_eq!(node.num_operands(), 0);
    }

    #[test]
    fn tuple_references() {
        let mut pool: SlotMap<MetadataRef, Metadata> = SlotMap::with_key();
        let s = pool.insert(Metadata::String("clang".into()));
        let tuple = Metadata::Tuple(vec![s, s]);
        assert_eq!(tuple.references(), &[s, s]);
        assert!(Metadata::Global("main".into()).references().is_empty());
    }

    #[test]
    fn reparenting_is_fatal() {
        let _guard = install_fatal_error_handler(|report| panic!("{}", report));

        let result = panic::catch_unwind(|| {
            let mut node = NamedMDNode::new("dbg");
            node.set_parent(Uuid::nil());
            node.set_parent(Uuid::from_u128(1));
        });

        let payload = result.unwrap_err();
        let message = payload
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_default();
        assert!(message.contains("already belongs to module"), "{message}");
    }
}
