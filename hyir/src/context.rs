//! Compilation-wide interning authority.
//!
//! A [`Context`] hands out stable small integer identifiers for metadata kind
//! names. It is shared between every [`Module`](crate::module::Module) of a
//! compilation through an [`Arc`], which also guarantees the context outlives the
//! modules referencing it.
use std::{collections::HashMap, fmt, sync::Arc};

use log::debug;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use crate::{hy_fatal, magic::FIRST_MD_KIND_ID, utils::conf::ContextConfig};

/// Identifier of an interned metadata kind, unique within one [`Context`].
pub type MdKindId = u32;

#[derive(Default)]
struct MdKindTable {
    by_name: HashMap<String, MdKindId>,
    names: Vec<String>,
}

/// Interning authority shared by all modules of a compilation.
///
/// Ids are assigned sequentially in first-use order starting at
/// [`FIRST_MD_KIND_ID`] and are never reused or reassigned.
///
/// ```rust
/// # use hyir::context::Context;
/// let ctx = Context::new();
/// let dbg = ctx.md_kind_id("dbg");
/// assert_eq!(ctx.md_kind_id("tbaa"), dbg + 1);
/// assert_eq!(ctx.md_kind_id("dbg"), dbg);
/// ```
pub struct Context {
    md_kinds: RwLock<MdKindTable>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            md_kinds: RwLock::new(MdKindTable::default()),
        })
    }

    /// Create a context with the kinds listed in `config` registered in order.
    pub fn with_config(config: &ContextConfig) -> Arc<Self> {
        let ctx = Self::new();
        for name in &config.md_kinds {
            ctx.md_kind_id(name);
        }
        ctx
    }

    /// Return the id of the metadata kind `name`, interning it on first use.
    ///
    /// # A note on concurrency
    /// Lookups of already interned names only take a shared lock. Registering a new
    /// name goes through an upgradable lock and checks again before upgrading to an
    /// exclusive one, so concurrent callers always agree on the id of a name.
    pub fn md_kind_id(&self, name: &str) -> MdKindId {
        if let Some(id) = self.lookup_md_kind(name) {
            return id;
        }

        let table = self.md_kinds.upgradable_read();
        if let Some(id) = table.by_name.get(name) {
            return *id;
        }

        let mut table = RwLockUpgradableReadGuard::upgrade(table);
        let Some(id) = u32::try_from(table.names.len())
            .ok()
            .and_then(|len| len.checked_add(FIRST_MD_KIND_ID))
        else {
            hy_fatal!("metadata kind id space exhausted while interning `{}`", name);
        };

        table.names.push(name.to_string());
        table.by_name.insert(name.to_string(), id);
        debug!("New metadata kind `{}` registered with id {}.", name, id);
        id
    }

    /// Return the id of `name` if it was interned before. Never interns.
    pub fn lookup_md_kind(&self, name: &str) -> Option<MdKindId> {
        self.md_kinds.read().by_name.get(name).copied()
    }

    /// Return the name interned under `id`.
    pub fn md_kind_name(&self, id: MdKindId) -> Option<String> {
        let index = id.checked_sub(FIRST_MD_KIND_ID)? as usize;
        self.md_kinds.read().names.get(index).cloned()
    }

    /// All interned kind names, ordered by id.
    pub fn md_kind_names(&self) -> Vec<String> {
        self.md_kinds.read().names.clone()
    }

    pub fn num_md_kinds(&self) -> usize {
        self.md_kinds.read().names.len()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("md_kinds", &self.md_kinds.read().names)
            .finish()
    }
}
