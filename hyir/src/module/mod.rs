//! The top-level IR container.
//!
//! A [`Module`] owns everything defined in one compilation unit: its data
//! layout, its named metadata, its metadata pool, its global values and at most
//! one pending [`Materializer`]. It borrows the [`Context`] it was created in,
//! which must outlive it and is shared with every other module of that context.
use std::{fmt, sync::Arc};

use log::{debug, info, warn};
use slotmap::SlotMap;
use uuid::Uuid;

use crate::{
    context::{Context, MdKindId},
    layout::DataLayout,
    module::{
        global::GlobalValue,
        materializer::Materializer,
        metadata::{Metadata, MetadataRef, NamedMDNode},
        symbol::{SymbolId, SymbolTable},
    },
    utils::{
        conf::ModuleConfig,
        error::{Error, HyResult},
    },
};

pub mod global;
pub mod materializer;
pub mod metadata;
pub mod symbol;

/// Handle of a global value within its module.
pub type GlobalId = SymbolId;

pub struct Module {
    uuid: Uuid,
    name: String,
    context: Arc<Context>,
    data_layout: DataLayout,
    metadata: SlotMap<MetadataRef, Metadata>,
    named_metadata: SymbolTable<NamedMDNode>,
    globals: SymbolTable<GlobalValue>,
    materializer: Option<Box<dyn Materializer>>,
}

impl Module {
    /// Create an empty module with the default data layout and no materializer.
    pub fn new(name: impl Into<String>, context: Arc<Context>) -> Self {
        let module = Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            context,
            data_layout: DataLayout::default(),
            metadata: SlotMap::with_key(),
            named_metadata: SymbolTable::new(),
            globals: SymbolTable::new(),
            materializer: None,
        };
        debug!("Created module `{}` ({}).", module.name, module.uuid);
        module
    }

    /// Create a module and apply the defaults of `config`.
    pub fn with_config(
        name: impl Into<String>,
        context: Arc<Context>,
        config: &ModuleConfig,
    ) -> HyResult<Self> {
        let mut module = Self::new(name, context);
        if let Some(descriptor) = &config.data_layout {
            module.set_data_layout_str(descriptor)?;
        }
        Ok(module)
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn data_layout(&self) -> &DataLayout {
        &self.data_layout
    }

    /// Replace the data layout with an already parsed one.
    pub fn set_data_layout(&mut self, layout: DataLayout) {
        info!("Data layout of module `{}` set to `{}`.", self.name, layout);
        self.data_layout = layout;
    }

    /// Parse `descriptor` and install the result. On error the current layout
    /// is left untouched.
    pub fn set_data_layout_str(&mut self, descriptor: &str) -> HyResult<()> {
        let layout = DataLayout::parse(descriptor)?;
        self.set_data_layout(layout);
        Ok(())
    }

    /// Id of the metadata kind `name` in the owning context.
    pub fn md_kind_id(&self, name: &str) -> MdKindId {
        self.context.md_kind_id(name)
    }

    /// Return the named metadata node `name`, creating an empty one on first use.
    ///
    /// Repeated calls with the same name return the same node. New nodes are
    /// appended to the enumeration order.
    pub fn get_or_insert_named_metadata(&mut self, name: &str) -> &mut NamedMDNode {
        let parent = self.uuid;
        let (_, node) = self.named_metadata.get_or_insert_with(name, || {
            debug!("Inserting named metadata `{}`.", name);
            let mut node = NamedMDNode::new(name);
            node.set_parent(parent);
            node
        });
        node
    }

    pub fn get_named_metadata(&self, name: &str) -> Option<&NamedMDNode> {
        self.named_metadata.get(name)
    }

    pub fn get_named_metadata_mut(&mut self, name: &str) -> Option<&mut NamedMDNode> {
        self.named_metadata.get_mut(name)
    }

    /// Named metadata nodes in first-insertion order.
    pub fn named_metadata(&self) -> impl Iterator<Item = &NamedMDNode> {
        self.named_metadata.iter()
    }

    pub fn named_metadata_names(&self) -> impl Iterator<Item = &str> {
        self.named_metadata.names()
    }

    /// Move `metadata` into the pool of the module.
    ///
    /// Tuples may only refer to values already owned by this module.
    pub fn add_metadata(&mut self, metadata: Metadata) -> HyResult<MetadataRef> {
        if let Some(foreign) = metadata
            .references()
            .iter()
            .find(|reference| !self.metadata.contains_key(**reference))
        {
            return Err(Error::UnknownMetadata {
                owner: format!("tuple element {:?}", foreign),
            });
        }
        Ok(self.metadata.insert(metadata))
    }

    pub fn metadata(&self, reference: MetadataRef) -> Option<&Metadata> {
        self.metadata.get(reference)
    }

    /// Append `operand` to the named metadata node `name`, creating the node if
    /// needed. The node is not created when `operand` is foreign to the module.
    pub fn add_named_metadata_operand(
        &mut self,
        name: &str,
        operand: MetadataRef,
    ) -> HyResult<()> {
        if !self.metadata.contains_key(operand) {
            return Err(Error::UnknownMetadata {
                owner: name.to_string(),
            });
        }
        self.get_or_insert_named_metadata(name).push_operand(operand);
        Ok(())
    }

    /// Add a global value. Names are unique: a second global with the same name
    /// is rejected and the existing one is left as is.
    pub fn add_global(&mut self, global: GlobalValue) -> HyResult<GlobalId> {
        match self.globals.try_insert(global) {
            Ok(id) => {
                if let Some(global) = self.globals.by_id(id) {
                    debug!("Added `{}` to module `{}` as {}.", global, self.name, id);
                }
                Ok(id)
            }
            Err(existing) => Err(Error::DuplicateGlobal(existing.name().to_string())),
        }
    }

    /// Declare an external function named `name`.
    pub fn declare_function(&mut self, name: &str) -> HyResult<GlobalId> {
        self.add_global(GlobalValue::function(name))
    }

    /// Declare an external variable named `name`.
    pub fn declare_variable(&mut self, name: &str) -> HyResult<GlobalId> {
        self.add_global(GlobalValue::variable(name))
    }

    pub fn get_global(&self, name: &str) -> Option<&GlobalValue> {
        self.globals.get(name)
    }

    pub fn get_global_mut(&mut self, name: &str) -> Option<&mut GlobalValue> {
        self.globals.get_mut(name)
    }

    pub fn global_by_id(&self, id: GlobalId) -> Option<&GlobalValue> {
        self.globals.by_id(id)
    }

    /// Global values in first-insertion order.
    pub fn globals(&self) -> impl Iterator<Item = &GlobalValue> {
        self.globals.iter()
    }

    /// Drop the body of global `name` so the materializer provides it again.
    pub fn defer_global(&mut self, name: &str) -> HyResult<()> {
        let global = self
            .globals
            .get_mut(name)
            .ok_or_else(|| Error::UnknownGlobal(name.to_string()))?;
        global.defer();
        Ok(())
    }

    /// Whether global `name` exists and its body is pending materialization.
    pub fn is_materializable(&self, name: &str) -> bool {
        self.globals
            .get(name)
            .is_some_and(GlobalValue::is_materializable)
    }

    /// Names of the globals whose body is still pending, in insertion order.
    pub fn deferred_globals(&self) -> Vec<String> {
        self.globals
            .iter()
            .filter(|global| global.is_materializable())
            .map(|global| global.name().to_string())
            .collect()
    }

    /// Install `materializer`, dropping any previous one without invoking it.
    pub fn set_materializer(&mut self, materializer: Box<dyn Materializer>) {
        debug!("Attaching a materializer to module `{}`.", self.name);
        if self.materializer.replace(materializer).is_some() {
            warn!(
                "Module `{}` dropped a pending materializer that was never run.",
                self.name
            );
        }
    }

    pub fn has_materializer(&self) -> bool {
        self.materializer.is_some()
    }

    /// Run the installed materializer over the whole module, once.
    ///
    /// Without a materializer this is a no-op. Otherwise the materializer is
    /// detached before it runs and dropped afterwards, whatever it returns. A
    /// failure is propagated as is and nothing already applied is rolled back.
    pub fn materialize_all(&mut self) -> HyResult<()> {
        let Some(mut materializer) = self.materializer.take() else {
            return Ok(());
        };

        debug!("Materializing module `{}`.", self.name);
        if let Err(err) = materializer.materialize_module(self) {
            debug!("Materialization of module `{}` failed: {}", self.name, err);
            return Err(err);
        }

        let remaining = self.deferred_globals();
        if !remaining.is_empty() {
            return Err(Error::IncompleteMaterialization {
                module: self.name.clone(),
                remaining,
            });
        }
        Ok(())
    }

    /// Ask the installed materializer for the body of global `name` alone.
    ///
    /// Globals that are not deferred are left as they are. The materializer
    /// stays installed for later requests.
    pub fn materialize_global(&mut self, name: &str) -> HyResult<()> {
        let global = self
            .globals
            .get_mut(name)
            .ok_or_else(|| Error::UnknownGlobal(name.to_string()))?;
        if !global.is_materializable() {
            return Ok(());
        }

        let Some(materializer) = self.materializer.as_mut() else {
            return Err(Error::NoMaterializer(name.to_string()));
        };

        debug!("Materializing global `{}` of module `{}`.", name, self.name);
        materializer.materialize_global(global)?;

        if global.is_materializable() {
            return Err(Error::IncompleteMaterialization {
                module: self.name.clone(),
                remaining: vec![name.to_string()],
            });
        }
        Ok(())
    }

    /// Verify the cross references of the module:
    /// 1) Every tuple element lives in the metadata pool.
    /// 2) Every global referenced from metadata is owned by the module.
    /// 3) Every named metadata operand lives in the metadata pool.
    pub fn verify(&self) -> HyResult<()> {
        for (reference, metadata) in &self.metadata {
            match metadata {
                Metadata::Tuple(elements) => {
                    if elements.iter().any(|e| !self.metadata.contains_key(*e)) {
                        return Err(Error::UnknownMetadata {
                            owner: format!("{:?}", reference),
                        });
                    }
                }
                Metadata::Global(name) => {
                    if !self.globals.contains(name) {
                        return Err(Error::UnknownGlobal(name.clone()));
                    }
                }
                Metadata::String(_) => {}
            }
        }

        for node in self.named_metadata.iter() {
            if node
                .operands()
                .iter()
                .any(|operand| !self.metadata.contains_key(*operand))
            {
                return Err(Error::UnknownMetadata {
                    owner: node.name().to_string(),
                });
            }
        }

        Ok(())
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("uuid", &self.uuid)
            .field("name", &self.name)
            .field("data_layout", &self.data_layout.to_string())
            .field("named_metadata", &self.named_metadata)
            .field("globals", &self.globals)
            .field("metadata", &self.metadata.len())
            .field("has_materializer", &self.materializer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> Module {
        Module::new("test", Context::new())
    }

    #[test]
    fn named_metadata_is_uniqued() {
        let mut m = module();
        let first = m.get_or_insert_named_metadata("llvm.ident") as *const NamedMDNode;
        let second = m.get_or_insert_named_metadata("llvm.ident") as *const NamedMDNode;
        assert!(std::ptr::eq(first, second));
        assert_eq!(m.named_metadata().count(), 1);
        assert_eq!(m.get_named_metadata("llvm.ident").map(|n| n.parent()), Some(m.uuid()));
        assert!(m.get_named_metadata("llvm.module.flags").is_none());
    }

    #[test]
    fn named_metadata_enumerates_in_insertion_order() {
        let mut m = module();
        for name in ["b", "a", "c", "a"] {
            m.get_or_insert_named_metadata(name);
        }
        assert_eq!(m.named_metadata_names().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn md_kind_ids_come_from_the_context() {
        let ctx = Context::new();
        let a = Module::new("a", ctx.clone());
        let b = Module::new("b", ctx.clone());
        assert_eq!(a.md_kind_id("dbg"), 0);
        assert_eq!(b.md_kind_id("tbaa"), 1);
        assert_eq!(b.md_kind_id("dbg"), 0);
        assert_eq!(ctx.num_md_kinds(), 2);
    }

    #[test]
    fn failed_layout_update_keeps_previous() {
        let mut m = module();
        m.set_data_layout_str("e-p:64:64-i64:64").unwrap();
        let before = m.data_layout().clone();

        let err = m.set_data_layout_str("e-p:64:63").unwrap_err();
        assert!(err.is_layout_parse());
        assert_eq!(m.data_layout(), &before);
    }

    #[test]
    fn materialize_all_without_materializer_is_noop() {
        let mut m = module();
        m.set_data_layout_str("E-p:32:32-n32").unwrap();
        m.add_global(GlobalValue::function("f").deferred()).unwrap();
        let ident = m.add_metadata(Metadata::String("clang".into())).unwrap();
        m.add_named_metadata_operand("llvm.ident", ident).unwrap();

        let layout = m.data_layout().clone();
        let globals: Vec<GlobalValue> = m.globals().cloned().collect();
        let node = m.get_named_metadata("llvm.ident").unwrap() as *const NamedMDNode;

        assert!(!m.has_materializer());
        m.materialize_all().unwrap();
        m.materialize_all().unwrap();

        assert_eq!(m.data_layout(), &layout);
        assert_eq!(m.globals().cloned().collect::<Vec<_>>(), globals);
        assert!(m.is_materializable("f"));
        assert_eq!(m.named_metadata_names().collect::<Vec<_>>(), vec!["llvm.ident"]);
        let after = m.get_named_metadata("llvm.ident").unwrap();
        assert!(std::ptr::eq(node, after));
        assert_eq!(after.operands(), &[ident]);
    }

    #[test]
    fn materialize_all_runs_once_and_detaches() {
        let mut m = module();
        m.add_global(GlobalValue::function("f").deferred()).unwrap();
        m.set_materializer(Box::new(|module: &mut Module| -> HyResult<()> {
            if let Some(f) = module.get_global_mut("f") {
                f.define(vec![0xc3]);
            }
            Ok(())
        }));

        m.materialize_all().unwrap();
        assert!(!m.has_materializer());
        assert!(!m.is_materializable("f"));
        m.materialize_all().unwrap();
    }

    #[test]
    fn materialize_all_failure_clears_materializer() {
        let mut m = module();
        m.set_materializer(Box::new(|module: &mut Module| -> HyResult<()> {
            module.get_or_insert_named_metadata("partial");
            Err(Error::Materialization {
                module: module.name().to_string(),
                reason: "truncated stream".to_string(),
            })
        }));

        let err = m.materialize_all().unwrap_err();
        assert!(err.is_materialization());
        assert!(!m.has_materializer());
        assert!(m.get_named_metadata("partial").is_some());
    }

    #[test]
    fn leftover_deferred_globals_are_reported() {
        let mut m = module();
        m.add_global(GlobalValue::function("g").deferred()).unwrap();
        m.set_materializer(Box::new(|_: &mut Module| -> HyResult<()> { Ok(()) }));

        match m.materialize_all() {
            Err(Error::IncompleteMaterialization { remaining, .. }) => {
                assert_eq!(remaining, vec!["g".to_string()]);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn duplicate_globals_are_rejected() {
        let mut m = module();
        let id = m.declare_function("puts").unwrap();
        assert_eq!(m.global_by_id(id).map(|g| g.name()), Some("puts"));

        let err = m.declare_variable("puts").unwrap_err();
        assert!(err.is_duplicate_global());
        assert!(m.get_global("puts").is_some_and(|g| g.kind == global::GlobalKind::Function));
    }

    #[test]
    fn metadata_operands_must_belong_to_the_module() {
        let mut m = module();
        let local = m.add_metadata(Metadata::String("clang".into())).unwrap();

        m.add_named_metadata_operand("llvm.ident", local).unwrap();
        assert_eq!(m.get_named_metadata("llvm.ident").unwrap().operands(), &[local]);

        let stale = MetadataRef::default();
        let err = m.add_named_metadata_operand("llvm.other", stale).unwrap_err();
        assert!(err.is_unknown_metadata());
        assert!(m.get_named_metadata("llvm.other").is_none());
    }

    #[test]
    fn verify_checks_global_references() {
        let mut m = module();
        let main = m.add_metadata(Metadata::Global("main".into())).unwrap();
        m.add_named_metadata_operand("llvm.used", main).unwrap();
        assert!(m.verify().unwrap_err().is_unknown_global());

        m.declare_function("main").unwrap();
        m.verify().unwrap();
    }
}
