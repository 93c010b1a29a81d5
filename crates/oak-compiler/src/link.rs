//! Whole-program linking.
//!
//! Modules are visited leaves first along their dependency edges. Each
//! definition gets a function pointer before any body is emitted, so
//! references between modules and within a module resolve regardless of
//! order.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use oak_core::{Diagnostics, FullIdentifier, OakError, QualifiedIdentifier, Result};

use crate::bytecode::{Binary, BinaryFlags, Func, verify};
use crate::emit::emit_definition;
use crate::normalized::Module;
use crate::types::Type;

/// Lays out typed modules into one [`Binary`].
pub struct Linker {
    binary: Binary,
    pointers: FxHashMap<FullIdentifier, u32>,
    compiled_paths: FxHashSet<QualifiedIdentifier>,
}

impl Linker {
    pub fn new(debug: bool) -> Self {
        let flags = if debug {
            BinaryFlags::DEBUG
        } else {
            BinaryFlags::empty()
        };
        Self {
            binary: Binary::new(flags),
            pointers: FxHashMap::default(),
            compiled_paths: FxHashSet::default(),
        }
    }

    /// Modules in dependency order, leaves first, skipping ones already
    /// linked.
    fn order<'m>(&self, modules: &'m [Module<Type>]) -> Vec<&'m Module<Type>> {
        let mut graph = DiGraph::<usize, ()>::new();
        let nodes: FxHashMap<&QualifiedIdentifier, NodeIndex> = modules
            .iter()
            .enumerate()
            .map(|(i, m)| (&m.name, graph.add_node(i)))
            .collect();
        for module in modules {
            for dependency in &module.dependencies {
                if let Some(&to) = nodes.get(dependency) {
                    graph.update_edge(nodes[&module.name], to, ());
                }
            }
        }

        let mut order = Vec::with_capacity(modules.len());
        let mut dfs = DfsPostOrder::empty(&graph);
        for module in modules {
            dfs.move_to(nodes[&module.name]);
            while let Some(node) = dfs.next(&graph) {
                let module = &modules[graph[node]];
                if !self.compiled_paths.contains(&module.name) {
                    order.push(module);
                }
            }
        }
        order
    }

    /// Link `modules` into the binary. Located emission errors go to
    /// `diagnostics`; the binary is only meaningful when none were added.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn link(&mut self, modules: &[Module<Type>], diagnostics: &mut Diagnostics) -> Result<()> {
        let order = self.order(modules);

        for module in &order {
            for definition in &module.definitions {
                let pointer = self.binary.funcs.len() as u32;
                self.binary.funcs.push(Func::default());
                self.pointers.insert(definition.name.clone(), pointer);
            }
        }

        let debug = self.binary.is_debug();
        for module in order {
            for definition in &module.definitions {
                let pointer = self.pointers[&definition.name];
                match emit_definition(definition, &mut self.binary, &self.pointers) {
                    Ok(func) => self.binary.funcs[pointer as usize] = func,
                    Err(OakError::User(diagnostic)) => diagnostics.push(diagnostic),
                    Err(err) => return Err(err),
                }
                if debug || !definition.is_hidden() {
                    self.binary
                        .exports
                        .insert(definition.name.to_string(), pointer);
                }
            }
            debug!(module = %module.name, "emitted module");
            self.compiled_paths.insert(module.name.clone());
        }
        Ok(())
    }

    /// Verify and return the linked binary.
    pub fn finish(self) -> Result<Binary> {
        verify(&self.binary)?;
        debug!(
            functions = self.binary.funcs.len(),
            strings = self.binary.strings().len(),
            constants = self.binary.constants().len(),
            "linked binary"
        );
        Ok(self.binary)
    }
}

/// Link a whole program in one go.
pub fn link_program(
    modules: &[Module<Type>],
    debug: bool,
    diagnostics: &mut Diagnostics,
) -> Result<Binary> {
    let mut linker = Linker::new(debug);
    linker.link(modules, diagnostics)?;
    linker.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Op;
    use crate::compiler::front_end_for_tests;
    use crate::solve::solve_program;

    fn typed(source: &str) -> Vec<Module<Type>> {
        let (modules, data_types, mut diagnostics) = front_end_for_tests(source);
        let typed = solve_program(modules, &data_types, &mut diagnostics);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics.into_vec());
        typed
    }

    #[test]
    fn dependencies_are_laid_out_first() {
        let modules = typed("module M\ndef r = add(2, 3)\ndef hidden h = 1\n");
        let mut diagnostics = Diagnostics::new();
        let binary = link_program(&modules, false, &mut diagnostics).unwrap();
        assert!(diagnostics.is_empty());

        let base_add = binary.export("Oak.Base.add").unwrap();
        let r = binary.export("M.r").unwrap();
        assert!(base_add < r);
        assert_eq!(binary.export("M.h"), None);
        assert!(binary.funcs[r as usize].ops.contains(&Op::LoadGlobal(base_add)));
    }

    #[test]
    fn debug_exports_hidden_definitions_and_locations() {
        let modules = typed("module M\ndef hidden h = 1\n");
        let mut diagnostics = Diagnostics::new();
        let binary = link_program(&modules, true, &mut diagnostics).unwrap();
        let h = binary.export("M.h").unwrap() as usize;
        assert_eq!(binary.funcs[h].locations.len(), binary.funcs[h].ops.len());
    }

    #[test]
    fn linking_is_deterministic() {
        let source = "module M\ndef f(x) = x * 2\ndef r = f(21)\n";
        let first = link_program(&typed(source), false, &mut Diagnostics::new())
            .unwrap()
            .write()
            .unwrap();
        let second = link_program(&typed(source), false, &mut Diagnostics::new())
            .unwrap()
            .write()
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn relinking_skips_compiled_modules() {
        let modules = typed("module M\ndef x = 1\n");
        let mut linker = Linker::new(false);
        let mut diagnostics = Diagnostics::new();
        linker.link(&modules, &mut diagnostics).unwrap();
        let count = linker.binary.funcs.len();
        linker.link(&modules, &mut diagnostics).unwrap();
        assert_eq!(linker.binary.funcs.len(), count);
    }
}
