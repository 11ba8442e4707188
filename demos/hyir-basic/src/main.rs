use std::collections::HashMap;

use hyir::{
    Context, Error, HyResult, Module,
    module::{
        global::{GlobalFlags, GlobalValue, Linkage},
        materializer::Materializer,
        metadata::Metadata,
    },
};
use uuid::Uuid;

/// Serves global bodies from an in-memory table, standing in for a bitcode reader.
struct TableReader {
    source: Uuid,
    bodies: HashMap<String, Vec<u8>>,
}

impl Materializer for TableReader {
    fn materialize_module(&mut self, module: &mut Module) -> HyResult<()> {
        for name in module.deferred_globals() {
            let Some(global) = module.get_global_mut(&name) else {
                continue;
            };
            self.materialize_global(global)?;
        }
        Ok(())
    }

    fn materialize_global(&mut self, global: &mut GlobalValue) -> HyResult<()> {
        match self.bodies.remove(global.name()) {
            Some(body) => {
                global.define(body);
                Ok(())
            }
            None => Err(Error::Materialization {
                module: self.source.to_string(),
                reason: format!("no record for `{}`", global.name()),
            }),
        }
    }
}

fn main() {
    let ctx = Context::new();
    let mut module = Module::new("factorial", ctx.clone());

    // Target description
    if let Err(err) = module.set_data_layout_str("e-m:e-p:64:64-i64:64-i128:128-n32:64-S128") {
        eprintln!("{}", err);
        return;
    }
    println!("target datalayout = \"{}\"", module.data_layout());

    // Metadata kinds are shared by every module of the context
    let dbg = module.md_kind_id("dbg");
    let tbaa = module.md_kind_id("tbaa");
    println!("!{} = dbg, !{} = tbaa", dbg, tbaa);

    // Globals, two of them loaded lazily
    let globals = [
        GlobalValue::function("factorial").deferred(),
        GlobalValue::function("main").deferred(),
        GlobalValue::function("printf"),
        GlobalValue::variable("calls")
            .with_linkage(Linkage::Internal)
            .with_flags(GlobalFlags::THREAD_LOCAL),
    ];
    for global in globals {
        if let Err(err) = module.add_global(global) {
            eprintln!("{}", err);
        }
    }

    let producer = module.add_metadata(Metadata::String("hyir-basic".into()));
    match producer {
        Ok(producer) => {
            if let Err(err) = module.add_named_metadata_operand("llvm.ident", producer) {
                eprintln!("{}", err);
            }
        }
        Err(err) => eprintln!("{}", err),
    }

    module.set_materializer(Box::new(TableReader {
        source: Uuid::new_v4(),
        bodies: HashMap::from([
            ("factorial".to_string(), vec![0x55, 0x48, 0x89, 0xe5]),
            ("main".to_string(), vec![0x31, 0xc0, 0xc3]),
        ]),
    }));

    // Pull a single body first, then the rest of the module
    if let Err(err) = module.materialize_global("factorial") {
        eprintln!("{}", err);
    }
    println!("after materializing `factorial`:");
    for global in module.globals() {
        println!("  {}", global);
    }

    match module.materialize_all() {
        Ok(()) => println!("module fully materialized"),
        Err(err) => eprintln!("materialization failed: {}", err),
    }
    for global in module.globals() {
        println!("  {}", global);
    }

    for node in module.named_metadata() {
        println!("!{} = {} operand(s)", node.name(), node.num_operands());
    }

    match module.verify() {
        Ok(()) => println!("module `{}` is well formed", module.name()),
        Err(err) => eprintln!("module verification failed: {}", err),
    }
}
