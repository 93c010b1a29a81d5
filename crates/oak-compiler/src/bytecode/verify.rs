//! Structural checks over a linked [`Binary`].

use oak_core::{ConstHash, ConstantKind, StringHash};

use super::{Binary, NumericConstant, Op, VerifyError};

/// Check that every function is well formed:
///
/// - debug builds carry exactly one location per op, release builds none
/// - every jump lands on an op of the same function
/// - every `LoadGlobal` names an existing function
/// - every string and constant hash is interned
/// - every export names an existing function
pub fn verify(binary: &Binary) -> Result<(), VerifyError> {
    for (index, func) in binary.funcs.iter().enumerate() {
        let function = index as u32;
        let fail = |op: Option<usize>, message: String| VerifyError {
            function,
            op,
            message,
        };

        if binary.is_debug() {
            if func.locations.len() != func.ops.len() {
                return Err(fail(
                    None,
                    format!(
                        "{} locations for {} ops",
                        func.locations.len(),
                        func.ops.len()
                    ),
                ));
            }
            if let Some(path) = func.file_path
                && binary.string(path).is_none()
            {
                return Err(fail(None, "file path is not interned".into()));
            }
        } else if !func.locations.is_empty() {
            return Err(fail(None, "locations present without debug flag".into()));
        }

        for (at, op) in func.ops.iter().enumerate() {
            let string = |hash: StringHash| {
                if binary.string(hash).is_some() {
                    Ok(())
                } else {
                    Err(fail(Some(at), format!("string {:#010x} is not interned", hash.0)))
                }
            };
            match *op {
                Op::LoadLocal(name) | Op::Access(name) | Op::Update(name) => string(name)?,
                Op::Call { name, .. } => string(name)?,
                Op::MakePattern { kind, name, .. } if kind.is_named() => string(name)?,
                Op::LoadGlobal(pointer) if pointer as usize >= binary.funcs.len() => {
                    return Err(fail(Some(at), format!("function pointer {pointer} out of range")));
                }
                Op::LoadConst { kind, value, .. } => match kind {
                    ConstantKind::String => string(StringHash(value))?,
                    ConstantKind::Int | ConstantKind::Float => {
                        let interned = binary.constant(ConstHash(value));
                        let matches = matches!(
                            (kind, interned),
                            (ConstantKind::Int, Some(NumericConstant::Int(_)))
                                | (ConstantKind::Float, Some(NumericConstant::Float(_)))
                        );
                        if !matches {
                            return Err(fail(
                                Some(at),
                                format!("{kind:?} constant {value:#010x} is not interned"),
                            ));
                        }
                    }
                    ConstantKind::Char if char::from_u32(value).is_none() => {
                        return Err(fail(Some(at), format!("invalid char {value:#x}")));
                    }
                    ConstantKind::Unit | ConstantKind::Char => {}
                },
                Op::Match(delta) | Op::Jump(delta) => {
                    let target = at as u64 + 1 + delta as u64;
                    if target >= func.ops.len() as u64 {
                        return Err(fail(Some(at), format!("jump target {target} out of range")));
                    }
                }
                _ => {}
            }
        }
    }

    for (name, &pointer) in &binary.exports {
        if pointer as usize >= binary.funcs.len() {
            return Err(VerifyError {
                function: pointer,
                op: None,
                message: format!("export '{name}' is out of range"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{BinaryFlags, Func, SwapPopMode};

    fn with_ops(ops: Vec<Op>) -> Binary {
        let mut binary = Binary::new(BinaryFlags::empty());
        binary.funcs.push(Func {
            num_args: 0,
            ops,
            ..Func::default()
        });
        binary
    }

    #[test]
    fn accepts_well_formed_functions() {
        let mut binary = with_ops(Vec::new());
        let x = binary.intern_string("x").unwrap();
        let one = binary.intern_constant(NumericConstant::Int(1)).unwrap();
        binary.funcs[0].ops = vec![
            Op::LoadConst {
                stack: crate::bytecode::StackKind::Object,
                kind: ConstantKind::Int,
                value: one.0,
            },
            Op::Jump(1),
            Op::LoadLocal(x),
            Op::SwapPop(SwapPopMode::Both),
        ];
        assert!(verify(&binary).is_ok());
    }

    #[test]
    fn rejects_jumps_past_the_end() {
        let binary = with_ops(vec![Op::Jump(0)]);
        let err = verify(&binary).unwrap_err();
        assert_eq!(err.op, Some(0));
        assert_eq!(err.message, "jump target 1 out of range");
    }

    #[test]
    fn rejects_unknown_hashes_and_pointers() {
        assert!(verify(&with_ops(vec![Op::LoadLocal(StringHash(7))])).is_err());
        assert!(verify(&with_ops(vec![Op::LoadGlobal(1)])).is_err());
        let float_as_int = with_ops(vec![Op::LoadConst {
            stack: crate::bytecode::StackKind::Object,
            kind: ConstantKind::Int,
            value: ConstHash::float(1.0).0,
        }]);
        assert!(verify(&float_as_int).is_err());
    }

    #[test]
    fn debug_locations_must_match_ops() {
        let mut binary = with_ops(vec![Op::Apply(0)]);
        binary.flags = BinaryFlags::DEBUG;
        assert!(verify(&binary).is_err());
        binary.funcs[0].locations.push((0, 0));
        assert!(verify(&binary).is_ok());
    }

    #[test]
    fn exports_must_point_at_functions() {
        let mut binary = with_ops(Vec::new());
        binary.exports.insert("M.x".into(), 3);
        assert_eq!(
            verify(&binary).unwrap_err().message,
            "export 'M.x' is out of range"
        );
    }
}
