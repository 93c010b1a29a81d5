//! Bytecode emission for one typed definition.
//!
//! Expressions are lowered onto the object stack, patterns onto the pattern
//! stack. Every op records the location of the node that produced it, kept
//! only when the binary carries debug locations.

use rustc_hash::FxHashMap;

use oak_core::{Constant, ConstantKind, Diagnostic, FullIdentifier, Location, OakError, Result};

use crate::bytecode::{
    Binary, Func, NumericConstant, ObjectKind, Op, PatternKind as PatternOp, StackKind,
    SwapPopMode,
};
use crate::normalized::*;
use crate::types::{Type, names};

const MAX_COUNT: usize = u8::MAX as usize;

/// Emit the function body of `definition`.
///
/// `pointers` maps every definition of the program to its function pointer.
pub fn emit_definition(
    definition: &Definition<Type>,
    binary: &mut Binary,
    pointers: &FxHashMap<FullIdentifier, u32>,
) -> Result<Func> {
    let debug = binary.is_debug();
    let file_path = if debug {
        Some(binary.intern_string(definition.location.path())?)
    } else {
        None
    };
    let mut emitter = Emitter {
        binary,
        pointers,
        ops: Vec::new(),
        locations: Vec::new(),
        debug,
    };

    if let ExprKind::Call { name, args } = &definition.body.kind
        && *name == definition.name
    {
        let num_args = emitter.count(args.len(), "arguments", &definition.location)?;
        let name = emitter.binary.intern_string(name)?;
        emitter.push(Op::Call { name, num_args }, &definition.location);
    } else {
        for param in definition.params.iter().rev() {
            emitter.pattern(param)?;
            emitter.push(Op::Match(0), &param.location);
            emitter.push(Op::SwapPop(SwapPopMode::Pop), &param.location);
        }
        emitter.expr(&definition.body)?;
    }

    let num_args = emitter.count(definition.params.len(), "parameters", &definition.location)?;
    Ok(Func {
        num_args: u32::from(num_args),
        ops: emitter.ops,
        file_path,
        locations: emitter.locations,
    })
}

struct Emitter<'a> {
    binary: &'a mut Binary,
    pointers: &'a FxHashMap<FullIdentifier, u32>,
    ops: Vec<Op>,
    locations: Vec<(u32, u32)>,
    debug: bool,
}

impl Emitter<'_> {
    fn push(&mut self, op: Op, location: &Location) -> usize {
        self.ops.push(op);
        if self.debug {
            self.locations.push((location.start(), location.end()));
        }
        self.ops.len() - 1
    }

    /// Point the `Match`/`Jump` at `at` to the next op to be emitted.
    fn patch(&mut self, at: usize) {
        let delta = (self.ops.len() - at - 1) as u32;
        match &mut self.ops[at] {
            Op::Match(d) | Op::Jump(d) => *d = delta,
            _ => {}
        }
    }

    fn count(&self, n: usize, what: &str, location: &Location) -> Result<u8> {
        if n > MAX_COUNT {
            return Err(Diagnostic::error(
                location.clone(),
                format!("too many {what} ({n}), at most {MAX_COUNT} are allowed"),
            )
            .into());
        }
        Ok(n as u8)
    }

    fn pointer(&self, name: &FullIdentifier) -> Result<u32> {
        self.pointers
            .get(name)
            .copied()
            .ok_or_else(|| OakError::internal(format!("no function pointer for '{name}'")))
    }

    fn string_const(&mut self, stack: StackKind, value: &str, location: &Location) -> Result<()> {
        let hash = self.binary.intern_string(value)?;
        self.push(
            Op::LoadConst {
                stack,
                kind: ConstantKind::String,
                value: hash.to_u32(),
            },
            location,
        );
        Ok(())
    }

    /// Integer literals typed as `Float` are emitted as floats. A literal
    /// whose type is still a `number` variable stays `Int`; the numeric
    /// natives widen it at runtime.
    fn constant(
        &mut self,
        value: &Constant,
        ty: &Type,
        stack: StackKind,
        location: &Location,
    ) -> Result<()> {
        let (kind, value) = match value {
            Constant::Unit => (ConstantKind::Unit, 0),
            Constant::Char(c) => (ConstantKind::Char, *c as u32),
            Constant::Int(v) if ty.is_native(names::FLOAT) => {
                let hash = self.binary.intern_constant(NumericConstant::Float(*v as f64))?;
                (ConstantKind::Float, hash.to_u32())
            }
            Constant::Int(v) => {
                let hash = self.binary.intern_constant(NumericConstant::Int(*v))?;
                (ConstantKind::Int, hash.to_u32())
            }
            Constant::Float(v) => {
                let hash = self.binary.intern_constant(NumericConstant::Float(*v))?;
                (ConstantKind::Float, hash.to_u32())
            }
            Constant::String(s) => return self.string_const(stack, s, location),
        };
        self.push(Op::LoadConst { stack, kind, value }, location);
        Ok(())
    }

    fn exprs(&mut self, exprs: &[Expr<Type>]) -> Result<()> {
        exprs.iter().try_for_each(|e| self.expr(e))
    }

    fn object(&mut self, kind: ObjectKind, n: usize, location: &Location) -> Result<()> {
        let count = self.count(n, "elements", location)?;
        self.push(Op::MakeObject { kind, count }, location);
        Ok(())
    }

    fn expr(&mut self, expr: &Expr<Type>) -> Result<()> {
        let location = &expr.location;
        match &expr.kind {
            ExprKind::Access { record, field } => {
                self.expr(record)?;
                let field = self.binary.intern_string(field)?;
                self.push(Op::Access(field), location);
            }
            ExprKind::Apply { func, args } => {
                let num_args = self.count(args.len(), "arguments", location)?;
                self.exprs(args)?;
                self.expr(func)?;
                self.push(Op::Apply(num_args), location);
            }
            ExprKind::Call { name, args } => {
                let num_args = self.count(args.len(), "arguments", location)?;
                self.exprs(args)?;
                let name = self.binary.intern_string(name)?;
                self.push(Op::Call { name, num_args }, location);
            }
            ExprKind::Const(value) => {
                self.constant(value, &expr.ty, StackKind::Object, location)?;
            }
            ExprKind::Constructor { option, args } => {
                self.exprs(args)?;
                self.string_const(StackKind::Object, option, location)?;
                self.object(ObjectKind::Data, args.len(), location)?;
            }
            ExprKind::Function(_) | ExprKind::Lambda { .. } => {
                return Err(OakError::internal(format!(
                    "closure at {location} survived lambda lifting"
                )));
            }
            ExprKind::Let {
                pattern,
                value,
                nested,
            } => {
                self.expr(value)?;
                self.pattern(pattern)?;
                self.push(Op::Match(0), location);
                self.push(Op::SwapPop(SwapPopMode::Pop), location);
                self.expr(nested)?;
            }
            ExprKind::List(items) => {
                self.exprs(items)?;
                self.object(ObjectKind::List, items.len(), location)?;
            }
            ExprKind::Record(fields) => {
                for field in fields {
                    self.expr(&field.value)?;
                    self.string_const(StackKind::Object, &field.name, &field.location)?;
                }
                self.object(ObjectKind::Record, fields.len(), location)?;
            }
            ExprKind::Select { condition, cases } => {
                self.expr(condition)?;
                let mut jumps = Vec::with_capacity(cases.len());
                for case in cases {
                    self.pattern(&case.pattern)?;
                    let matcher = self.push(Op::Match(0), &case.location);
                    self.expr(&case.body)?;
                    jumps.push(self.push(Op::Jump(0), &case.location));
                    self.patch(matcher);
                }
                for jump in jumps {
                    self.patch(jump);
                }
                self.push(Op::SwapPop(SwapPopMode::Both), location);
            }
            ExprKind::Tuple(items) => {
                self.exprs(items)?;
                self.object(ObjectKind::Tuple, items.len(), location)?;
            }
            ExprKind::UpdateLocal { name, fields, .. } => {
                let name = self.binary.intern_string(name)?;
                self.push(Op::LoadLocal(name), location);
                self.updates(fields)?;
            }
            ExprKind::UpdateGlobal { name, fields } => {
                let pointer = self.pointer(name)?;
                self.push(Op::LoadGlobal(pointer), location);
                self.updates(fields)?;
            }
            ExprKind::Local { name, .. } => {
                let name = self.binary.intern_string(name)?;
                self.push(Op::LoadLocal(name), location);
            }
            ExprKind::Global(name) => {
                let pointer = self.pointer(name)?;
                self.push(Op::LoadGlobal(pointer), location);
            }
        }
        Ok(())
    }

    fn updates(&mut self, fields: &[Field<Type>]) -> Result<()> {
        for field in fields {
            self.expr(&field.value)?;
            let name = self.binary.intern_string(&field.name)?;
            self.push(Op::Update(name), &field.location);
        }
        Ok(())
    }

    fn make_pattern(
        &mut self,
        kind: PatternOp,
        name: Option<&str>,
        nested: usize,
        location: &Location,
    ) -> Result<()> {
        let nested = self.count(nested, "nested patterns", location)?;
        let name = match name {
            Some(name) => self.binary.intern_string(name)?,
            None => oak_core::StringHash(0),
        };
        self.push(Op::MakePattern { kind, name, nested }, location);
        Ok(())
    }

    fn patterns(&mut self, patterns: &[Pattern<Type>]) -> Result<()> {
        patterns.iter().try_for_each(|p| self.pattern(p))
    }

    fn pattern(&mut self, pattern: &Pattern<Type>) -> Result<()> {
        let location = &pattern.location;
        match &pattern.kind {
            PatternKind::Alias { name, nested, .. } => {
                self.pattern(nested)?;
                self.make_pattern(PatternOp::Alias, Some(name.as_str()), 1, location)
            }
            PatternKind::Any => self.make_pattern(PatternOp::Any, None, 0, location),
            PatternKind::Cons { head, tail } => {
                self.pattern(head)?;
                self.pattern(tail)?;
                self.make_pattern(PatternOp::Cons, None, 2, location)
            }
            PatternKind::Const(value) => {
                self.constant(value, &pattern.ty, StackKind::Pattern, location)
            }
            PatternKind::Option { option, values } => {
                self.patterns(values)?;
                self.make_pattern(PatternOp::Data, Some(option.as_str()), values.len(), location)
            }
            PatternKind::List(items) => {
                self.patterns(items)?;
                self.make_pattern(PatternOp::List, None, items.len(), location)
            }
            PatternKind::Named { name, .. } => {
                self.make_pattern(PatternOp::Named, Some(name.as_str()), 0, location)
            }
            PatternKind::Record(fields) => {
                for field in fields {
                    self.string_const(StackKind::Pattern, &field.name, &field.location)?;
                }
                self.make_pattern(PatternOp::Record, None, fields.len(), location)
            }
            PatternKind::Tuple(items) => {
                self.patterns(items)?;
                self.make_pattern(PatternOp::Tuple, None, items.len(), location)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::BinaryFlags;
    use oak_core::{Identifier, SourceFile, StringHash};
    use oak_parser::DefinitionFlags;

    fn loc() -> Location {
        Location::file_start(SourceFile::new("src/M.oak", "module M"))
    }

    fn expr(kind: ExprKind<Type>, ty: Type) -> Expr<Type> {
        Expr {
            kind,
            location: loc(),
            ty,
        }
    }

    fn named(name: &str) -> Pattern<Type> {
        Pattern {
            kind: PatternKind::Named {
                name: Identifier::new(name),
                binding: 1,
            },
            declared: None,
            location: loc(),
            ty: Type::int(),
        }
    }

    fn definition(params: Vec<Pattern<Type>>, body: Expr<Type>) -> Definition<Type> {
        Definition {
            id: 1,
            name: FullIdentifier::new("M.f"),
            params,
            return_type: None,
            body,
            flags: DefinitionFlags::empty(),
            location: loc(),
            ty: Type::int(),
        }
    }

    fn local(name: &str) -> Expr<Type> {
        expr(
            ExprKind::Local {
                name: Identifier::new(name),
                target: 1,
            },
            Type::int(),
        )
    }

    #[test]
    fn parameters_are_matched_in_reverse() {
        let def = definition(vec![named("a"), named("b")], local("a"));
        let mut binary = Binary::new(BinaryFlags::empty());
        let func = emit_definition(&def, &mut binary, &FxHashMap::default()).unwrap();
        let a = StringHash::of("a");
        let b = StringHash::of("b");
        assert_eq!(func.num_args, 2);
        assert_eq!(
            func.ops,
            vec![
                Op::MakePattern {
                    kind: PatternOp::Named,
                    name: b,
                    nested: 0
                },
                Op::Match(0),
                Op::SwapPop(SwapPopMode::Pop),
                Op::MakePattern {
                    kind: PatternOp::Named,
                    name: a,
                    nested: 0
                },
                Op::Match(0),
                Op::SwapPop(SwapPopMode::Pop),
                Op::LoadLocal(a),
            ]
        );
        assert!(func.locations.is_empty());
    }

    #[test]
    fn native_body_is_a_single_call() {
        let body = expr(
            ExprKind::Call {
                name: FullIdentifier::new("M.f"),
                args: vec![local("a")],
            },
            Type::int(),
        );
        let def = definition(vec![named("a")], body);
        let mut binary = Binary::new(BinaryFlags::DEBUG);
        let func = emit_definition(&def, &mut binary, &FxHashMap::default()).unwrap();
        assert_eq!(
            func.ops,
            vec![Op::Call {
                name: StringHash::of("M.f"),
                num_args: 1
            }]
        );
        assert_eq!(func.locations.len(), 1);
        assert_eq!(func.file_path, Some(StringHash::of("src/M.oak")));
    }

    #[test]
    fn select_patches_jumps() {
        let case = |value: i64| Case {
            pattern: Pattern {
                kind: PatternKind::Const(Constant::Int(value)),
                declared: None,
                location: loc(),
                ty: Type::int(),
            },
            body: expr(ExprKind::Const(Constant::Int(value)), Type::int()),
            location: loc(),
        };
        let body = expr(
            ExprKind::Select {
                condition: Box::new(local("x")),
                cases: vec![case(1), case(2)],
            },
            Type::int(),
        );
        let mut binary = Binary::new(BinaryFlags::empty());
        let func = emit_definition(&definition(Vec::new(), body), &mut binary, &FxHashMap::default())
            .unwrap();
        let shape: Vec<_> = func
            .ops
            .iter()
            .map(|op| match op {
                Op::Match(d) => format!("Match {d}"),
                Op::Jump(d) => format!("Jump {d}"),
                other => format!("{:?}", other.kind()),
            })
            .collect();
        assert_eq!(
            shape,
            vec![
                "LoadLocal",
                "LoadConst",
                "Match 2",
                "LoadConst",
                "Jump 4",
                "LoadConst",
                "Match 2",
                "LoadConst",
                "Jump 0",
                "SwapPop",
            ]
        );
    }

    #[test]
    fn int_literals_typed_float_are_coerced() {
        let body = expr(ExprKind::Const(Constant::Int(2)), Type::float());
        let mut binary = Binary::new(BinaryFlags::empty());
        let func = emit_definition(&definition(Vec::new(), body), &mut binary, &FxHashMap::default())
            .unwrap();
        assert_eq!(
            func.ops,
            vec![Op::LoadConst {
                stack: StackKind::Object,
                kind: ConstantKind::Float,
                value: oak_core::ConstHash::float(2.0).to_u32(),
            }]
        );
        assert_eq!(binary.constants(), &[NumericConstant::Float(2.0)]);
    }

    #[test]
    fn records_push_value_then_name() {
        let body = expr(
            ExprKind::Record(vec![Field {
                name: Identifier::new("x"),
                value: expr(ExprKind::Const(Constant::Char('c')), Type::char()),
                location: loc(),
            }]),
            Type::unit(),
        );
        let mut binary = Binary::new(BinaryFlags::empty());
        let func = emit_definition(&definition(Vec::new(), body), &mut binary, &FxHashMap::default())
            .unwrap();
        assert_eq!(
            func.ops,
            vec![
                Op::LoadConst {
                    stack: StackKind::Object,
                    kind: ConstantKind::Char,
                    value: 'c' as u32,
                },
                Op::LoadConst {
                    stack: StackKind::Object,
                    kind: ConstantKind::String,
                    value: StringHash::of("x").to_u32(),
                },
                Op::MakeObject {
                    kind: ObjectKind::Record,
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn oversized_argument_lists_are_located() {
        let args = (0..256)
            .map(|i| expr(ExprKind::Const(Constant::Int(i)), Type::int()))
            .collect();
        let body = expr(ExprKind::Tuple(args), Type::unit());
        let mut binary = Binary::new(BinaryFlags::empty());
        let err = emit_definition(&definition(Vec::new(), body), &mut binary, &FxHashMap::default())
            .unwrap_err();
        let OakError::User(diagnostic) = err else {
            panic!("expected a user error");
        };
        assert_eq!(
            diagnostic.message,
            "too many elements (256), at most 255 are allowed"
        );
    }

    #[test]
    fn oversized_parameter_lists_are_located() {
        let params = (0..256).map(|i| named(&format!("p{i}"))).collect();
        let def = definition(params, local("p0"));
        let mut binary = Binary::new(BinaryFlags::empty());
        let err = emit_definition(&def, &mut binary, &FxHashMap::default()).unwrap_err();
        let OakError::User(diagnostic) = err else {
            panic!("expected a user error");
        };
        assert_eq!(
            diagnostic.message,
            "too many parameters (256), at most 255 are allowed"
        );
        assert_eq!(diagnostic.location, def.location);

        let params = (0..255).map(|i| named(&format!("p{i}"))).collect();
        let def = definition(params, local("p0"));
        let func = emit_definition(&def, &mut binary, &FxHashMap::default()).unwrap();
        assert_eq!(func.num_args, 255);
    }

    #[test]
    fn leftover_lambdas_are_compiler_bugs() {
        let body = expr(
            ExprKind::Lambda {
                params: Vec::new(),
                return_type: None,
                body: Box::new(local("x")),
            },
            Type::int(),
        );
        let mut binary = Binary::new(BinaryFlags::empty());
        let err = emit_definition(&definition(Vec::new(), body), &mut binary, &FxHashMap::default())
            .unwrap_err();
        assert!(matches!(err, OakError::Internal(_)));
    }
}
