//! Type inference.
//!
//! Definitions are solved one strongly connected component of the reference
//! graph at a time, leaves first. Inside a component references are
//! monomorphic; references to already solved definitions instantiate a
//! fresh copy of their type. Each component gets its own [`Substitution`],
//! which is applied to every node once its equations are solved.

mod equations;
mod unify;

pub use equations::Equation;
pub use unify::{Substitution, UnifyError};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{Graph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};

use oak_core::{Diagnostic, Diagnostics, FullIdentifier};

use crate::annotate::annotate_module;
use crate::normalized::*;
use crate::types::{Constraint, DataTypeTable, Type, TypeId, TypeVarGen};

use equations::{EquationBuilder, GlobalTypes};

/// Annotate and solve every definition of the program.
///
/// A definition group that fails to unify is reported once, at the first
/// failing equation; references to it from later groups are left
/// unconstrained.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn solve_program(
    modules: Vec<Module>,
    data_types: &DataTypeTable,
    diagnostics: &mut Diagnostics,
) -> Vec<Module<Type>> {
    let mut vars = TypeVarGen::new();
    let mut modules: Vec<Module<Type>> = modules
        .into_iter()
        .map(|module| annotate_module(module, &mut vars))
        .collect();

    let mut graph: Graph<(usize, usize), ()> = Graph::new();
    let mut nodes: FxHashMap<FullIdentifier, NodeIndex> = FxHashMap::default();
    for (m, module) in modules.iter().enumerate() {
        for (d, definition) in module.definitions.iter().enumerate() {
            nodes.insert(definition.name.clone(), graph.add_node((m, d)));
        }
    }
    let mut edges = Vec::new();
    for node in graph.node_indices() {
        let (m, d) = graph[node];
        for reference in modules[m].definitions[d].references() {
            if let Some(&target) = nodes.get(reference) {
                edges.push((node, target));
            }
        }
    }
    for (from, to) in edges {
        graph.update_edge(from, to, ());
    }

    let mut solver = Solver {
        vars,
        data_types,
        solved: FxHashMap::default(),
    };
    // Tarjan yields components in reverse topological order of the
    // reference edges, so referenced definitions come first.
    for component in tarjan_scc(&graph) {
        let mut group: Vec<(usize, usize)> = component.iter().map(|n| graph[*n]).collect();
        group.sort_by_key(|&(m, d)| modules[m].definitions[d].id);
        if let Err(diagnostic) = solver.solve_group(&mut modules, &group) {
            diagnostics.push(diagnostic);
        }
    }
    modules
}

struct Solver<'a> {
    vars: TypeVarGen,
    data_types: &'a DataTypeTable,
    /// Principal types of successfully solved definitions.
    solved: FxHashMap<FullIdentifier, Type>,
}

struct Environment<'a> {
    solved: &'a FxHashMap<FullIdentifier, Type>,
    group: &'a FxHashMap<FullIdentifier, Type>,
}

impl GlobalTypes for Environment<'_> {
    fn instantiate(&self, name: &FullIdentifier, vars: &mut TypeVarGen) -> Option<Type> {
        if let Some(ty) = self.group.get(name) {
            return Some(ty.clone());
        }
        self.solved.get(name).map(|ty| vars.unique(ty))
    }
}

impl Solver<'_> {
    fn solve_group(
        &mut self,
        modules: &mut [Module<Type>],
        group: &[(usize, usize)],
    ) -> Result<(), Diagnostic> {
        let in_group: FxHashMap<FullIdentifier, Type> = group
            .iter()
            .map(|&(m, d)| {
                let definition = &modules[m].definitions[d];
                (definition.name.clone(), definition.ty.clone())
            })
            .collect();

        let mut substitution = Substitution::new();
        let result = self.unify_group(modules, group, &in_group, &mut substitution);

        for &(m, d) in group {
            let definition = &mut modules[m].definitions[d];
            visit_types(definition, &mut |ty| *ty = substitution.apply(ty));
            default_numbers(definition);
        }

        if result.is_ok() {
            for &(m, d) in group {
                let definition = &modules[m].definitions[d];
                self.solved
                    .insert(definition.name.clone(), definition.ty.clone());
            }
        }
        tracing::debug!(
            definitions = group.len(),
            bindings = substitution.len(),
            ok = result.is_ok(),
            "solved definition group"
        );
        result
    }

    fn unify_group(
        &mut self,
        modules: &[Module<Type>],
        group: &[(usize, usize)],
        in_group: &FxHashMap<FullIdentifier, Type>,
        substitution: &mut Substitution,
    ) -> Result<(), Diagnostic> {
        let environment = Environment {
            solved: &self.solved,
            group: in_group,
        };
        for &(m, d) in group {
            let definition = &modules[m].definitions[d];
            let mut builder = EquationBuilder::new(&mut self.vars, self.data_types, &environment);
            builder.definition(definition)?;
            for equation in builder.finish() {
                substitution
                    .unify(&equation.left, &equation.right, &mut self.vars)
                    .map_err(|error| Diagnostic::error(equation.location, error.to_string()))?;
            }
        }
        Ok(())
    }
}

/// Default `number` variables to `Int` where nothing else can fix them:
/// everywhere in a value definition, and outside the definition's own
/// type in a function.
fn default_numbers(definition: &mut Definition<Type>) {
    let own: FxHashSet<TypeId> = if definition.params.is_empty() {
        FxHashSet::default()
    } else {
        definition
            .ty
            .free_vars()
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    };

    let mut defaults: FxHashMap<TypeId, Type> = FxHashMap::default();
    visit_types(definition, &mut |ty| {
        for (id, constraint) in ty.free_vars() {
            if constraint == Constraint::Number && !own.contains(&id) {
                defaults.insert(id, Type::int());
            }
        }
    });
    if !defaults.is_empty() {
        visit_types(definition, &mut |ty| *ty = ty.rename_vars(&defaults));
    }
}

/// Call `f` on every type slot of a definition.
fn visit_types(definition: &mut Definition<Type>, f: &mut impl FnMut(&mut Type)) {
    f(&mut definition.ty);
    if let Some(ty) = &mut definition.return_type {
        f(ty);
    }
    for param in &mut definition.params {
        visit_pattern_types(param, f);
    }
    visit_expr_types(&mut definition.body, f);
}

fn visit_pattern_types(pattern: &mut Pattern<Type>, f: &mut impl FnMut(&mut Type)) {
    f(&mut pattern.ty);
    if let Some(ty) = &mut pattern.declared {
        f(ty);
    }
    match &mut pattern.kind {
        PatternKind::Alias { nested, .. } => visit_pattern_types(nested, f),
        PatternKind::Cons { head, tail } => {
            visit_pattern_types(head, f);
            visit_pattern_types(tail, f);
        }
        PatternKind::Option { values: items, .. }
        | PatternKind::List(items)
        | PatternKind::Tuple(items) => items.iter_mut().for_each(|p| visit_pattern_types(p, f)),
        PatternKind::Any
        | PatternKind::Const(_)
        | PatternKind::Named { .. }
        | PatternKind::Record(_) => {}
    }
}

fn visit_expr_types(expr: &mut Expr<Type>, f: &mut impl FnMut(&mut Type)) {
    f(&mut expr.ty);
    match &mut expr.kind {
        ExprKind::Access { record, .. } => visit_expr_types(record, f),
        ExprKind::Apply { func, args } => {
            visit_expr_types(func, f);
            args.iter_mut().for_each(|a| visit_expr_types(a, f));
        }
        ExprKind::Call { args, .. }
        | ExprKind::Constructor { args, .. }
        | ExprKind::List(args)
        | ExprKind::Tuple(args) => args.iter_mut().for_each(|a| visit_expr_types(a, f)),
        ExprKind::Function(function) => {
            function
                .params
                .iter_mut()
                .for_each(|p| visit_pattern_types(p, f));
            if let Some(ty) = &mut function.return_type {
                f(ty);
            }
            visit_expr_types(&mut function.body, f);
            visit_expr_types(&mut function.nested, f);
        }
        ExprKind::Lambda {
            params,
            return_type,
            body,
        } => {
            params.iter_mut().for_each(|p| visit_pattern_types(p, f));
            if let Some(ty) = return_type {
                f(ty);
            }
            visit_expr_types(body, f);
        }
        ExprKind::Let {
            pattern,
            value,
            nested,
        } => {
            visit_pattern_types(pattern, f);
            visit_expr_types(value, f);
            visit_expr_types(nested, f);
        }
        ExprKind::Record(fields)
        | ExprKind::UpdateLocal { fields, .. }
        | ExprKind::UpdateGlobal { fields, .. } => fields
            .iter_mut()
            .for_each(|field| visit_expr_types(&mut field.value, f)),
        ExprKind::Select { condition, cases } => {
            visit_expr_types(condition, f);
            for case in cases {
                visit_pattern_types(&mut case.pattern, f);
                visit_expr_types(&mut case.body, f);
            }
        }
        ExprKind::Const(_) | ExprKind::Local { .. } | ExprKind::Global(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::front_end_for_tests as front_end;

    fn solve(source: &str) -> (Vec<Module<Type>>, Diagnostics) {
        let (modules, data_types, mut diagnostics) = front_end(source);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let typed = solve_program(modules, &data_types, &mut diagnostics);
        (typed, diagnostics)
    }

    fn type_of(modules: &[Module<Type>], name: &str) -> String {
        modules
            .iter()
            .find_map(|m| m.definition(name))
            .map(|d| d.ty.to_string())
            .unwrap_or_else(|| panic!("no definition {name}"))
    }

    #[test]
    fn arithmetic_defaults_to_int() {
        let (modules, diagnostics) =
            solve("module M\ndef add(a, b) = a + b\ndef r = add(2, 3)\n");
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(type_of(&modules, "M.add"), "(number, number): number");
        assert_eq!(type_of(&modules, "M.r"), "Int");
    }

    #[test]
    fn use_sites_instantiate_independently() {
        let (modules, diagnostics) =
            solve("module M\ndef id(x) = x\ndef a = id(1)\ndef b = id(\"x\")\n");
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(type_of(&modules, "M.id"), "(a): a");
        assert_eq!(type_of(&modules, "M.a"), "Int");
        assert_eq!(type_of(&modules, "M.b"), "String");
    }

    #[test]
    fn self_application_is_ambiguous() {
        let (_, diagnostics) = solve("module M\ndef loop(f) = f(f)\n");
        let errors: Vec<_> = diagnostics.iter().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "ambiguous type");
        assert_eq!(errors[0].location.text(), "f");
        assert_eq!(errors[0].location.line_col(), (2, 17));
    }

    #[test]
    fn mutual_recursion_is_solved_together() {
        let (modules, diagnostics) = solve(
            "module M\n\
             def even(n) = if n == 0 then True else odd(n - 1)\n\
             def odd(n) = if n == 0 then False else even(n - 1)\n",
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(type_of(&modules, "M.even"), "(number): Bool");
    }

    #[test]
    fn records_and_access() {
        let (modules, diagnostics) = solve(
            "module M\n\
             def origin = { x = 0, y = 0 }\n\
             def getX(r) = r.x\n\
             def moved = { origin | x = 1 }\n\
             def x0 = getX(origin)\n",
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(type_of(&modules, "M.origin"), "{ x: Int, y: Int }");
        assert_eq!(type_of(&modules, "M.getX"), "({ x: a | b }): a");
        assert_eq!(type_of(&modules, "M.moved"), "{ x: Int, y: Int }");
        assert_eq!(type_of(&modules, "M.x0"), "Int");
    }

    #[test]
    fn data_types_and_patterns() {
        let (modules, diagnostics) = solve(
            "module M\n\
             def first(l) = select l case h | _ -> Just(h) case [] -> Nothing end\n\
             def n = withDefault(0, first([1, 2]))\n",
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(type_of(&modules, "M.first"), "(List[a]): Maybe[a]");
        assert_eq!(type_of(&modules, "M.n"), "Int");
    }

    #[test]
    fn mismatches_are_located() {
        let (modules, diagnostics) = solve("module M\ndef bad = 1 ++ \"s\"\ndef ok = 1.5\n");
        let errors: Vec<_> = diagnostics.iter().collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("cannot be matched with"), "{}", errors[0].message);
        assert_eq!(type_of(&modules, "M.ok"), "Float");
    }

    #[test]
    fn declared_types_are_enforced() {
        let (_, diagnostics) = solve("module M\ndef f(x: Int): String = x\n");
        assert_eq!(
            diagnostics.iter().next().map(|d| d.message.as_str()),
            Some("String cannot be matched with Int")
        );
    }

    #[test]
    fn lifted_lambdas_are_typed() {
        let (modules, diagnostics) = solve(
            "module M\n\
             def mkAdder(n) = \\(x) -> x + n\n\
             def plus3 = mkAdder(3)\n\
             def r = plus3(4)\n",
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(type_of(&modules, "M._lmbd_mkAdder_1"), "(number, number): number");
        assert_eq!(type_of(&modules, "M.mkAdder"), "(number): (number): number");
        assert_eq!(type_of(&modules, "M.r"), "Int");
    }
}
