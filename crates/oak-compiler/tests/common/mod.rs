//! A small reference evaluator for linked binaries.
//!
//! Follows the op semantics the runtime implements closely enough to check
//! the values programs compute. Natives cover the `Oak.Base` prelude.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};

use oak_compiler::bytecode::{Binary, NumericConstant, ObjectKind, Op, PatternKind, StackKind, SwapPopMode};
use oak_compiler::{Compilation, CompileOptions, Compiler, PackageSource};
use oak_core::{ConstHash, ConstantKind, StringHash};

pub const TRUE: &str = "Oak.Base.Bool#True";
pub const FALSE: &str = "Oak.Base.Bool#False";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Char(char),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Record(BTreeMap<String, Value>),
    Data { option: String, args: Vec<Value> },
    Closure { func: u32, args: Vec<Value> },
}

impl Value {
    pub fn bool(value: bool) -> Value {
        Value::Data {
            option: if value { TRUE } else { FALSE }.to_string(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
enum Pat {
    Any,
    Named(StringHash),
    Alias(StringHash, Box<Pat>),
    Const(Value),
    Cons(Box<Pat>, Box<Pat>),
    Data(StringHash, Vec<Pat>),
    List(Vec<Pat>),
    Record(Vec<String>),
    Tuple(Vec<Pat>),
}

/// Compile a single `main` package module `M` in debug mode.
pub fn compile(source: &str) -> Compilation {
    let package = PackageSource::new("main").with_module("M", "main/src/M.oak", source);
    Compiler::new(CompileOptions::default())
        .compile(&[package])
        .expect("compilation should not fail with a system error")
}

/// Compile and evaluate the exported definition `name`.
pub fn run(source: &str, name: &str) -> Value {
    let compilation = compile(source);
    let binary = compilation
        .binary
        .unwrap_or_else(|| panic!("{:?}", compilation.diagnostics));
    Machine::new(&binary).global(name).unwrap()
}

pub struct Machine<'a> {
    binary: &'a Binary,
    depth: usize,
}

impl<'a> Machine<'a> {
    pub fn new(binary: &'a Binary) -> Self {
        Self { binary, depth: 0 }
    }

    /// Evaluate an exported definition.
    pub fn global(&mut self, name: &str) -> Result<Value, String> {
        let pointer = self
            .binary
            .export(name)
            .ok_or_else(|| format!("no export '{name}'"))?;
        self.load_global(pointer)
    }

    fn load_global(&mut self, pointer: u32) -> Result<Value, String> {
        if self.binary.funcs[pointer as usize].num_args == 0 {
            self.call(pointer, Vec::new())
        } else {
            Ok(Value::Closure {
                func: pointer,
                args: Vec::new(),
            })
        }
    }

    fn apply(&mut self, callee: Value, mut args: Vec<Value>) -> Result<Value, String> {
        let (func, mut bound) = match callee {
            Value::Closure { func, args } => (func, args),
            other => return Err(format!("cannot apply {other:?}")),
        };
        let arity = self.binary.funcs[func as usize].num_args as usize;
        bound.append(&mut args);
        if bound.len() < arity {
            return Ok(Value::Closure { func, args: bound });
        }
        let rest = bound.split_off(arity);
        let result = self.call(func, bound)?;
        if rest.is_empty() {
            Ok(result)
        } else {
            self.apply(result, rest)
        }
    }

    fn string(&self, hash: u32) -> Result<String, String> {
        self.binary
            .string(StringHash(hash))
            .map(str::to_string)
            .ok_or_else(|| format!("string {hash:#x} not interned"))
    }

    fn constant(&self, kind: ConstantKind, value: u32) -> Result<Value, String> {
        Ok(match kind {
            ConstantKind::Unit => Value::Unit,
            ConstantKind::Char => Value::Char(char::from_u32(value).ok_or("bad char")?),
            ConstantKind::Int | ConstantKind::Float => {
                match self.binary.constant(ConstHash(value)).ok_or("constant not interned")? {
                    NumericConstant::Int(v) => Value::Int(v),
                    NumericConstant::Float(v) => Value::Float(v),
                }
            }
            ConstantKind::String => Value::String(self.string(value)?),
        })
    }

    fn call(&mut self, pointer: u32, args: Vec<Value>) -> Result<Value, String> {
        self.depth += 1;
        if self.depth > 10_000 {
            return Err("stack overflow".into());
        }
        let binary = self.binary;
        let func = &binary.funcs[pointer as usize];
        let mut objects = args;
        let mut patterns: Vec<Pat> = Vec::new();
        let mut locals: HashMap<StringHash, Value> = HashMap::new();
        let mut pc = 0;

        while pc < func.ops.len() {
            let op = func.ops[pc];
            pc += 1;
            match op {
                Op::LoadLocal(name) => {
                    let value = locals.get(&name).cloned().ok_or("unbound local")?;
                    objects.push(value);
                }
                Op::LoadGlobal(pointer) => {
                    let value = self.load_global(pointer)?;
                    objects.push(value);
                }
                Op::LoadConst { stack, kind, value } => {
                    let value = self.constant(kind, value)?;
                    match stack {
                        StackKind::Object => objects.push(value),
                        StackKind::Pattern => patterns.push(Pat::Const(value)),
                    }
                }
                Op::Apply(n) => {
                    let callee = objects.pop().ok_or("empty stack")?;
                    let args = objects.split_off(objects.len() - n as usize);
                    let result = self.apply(callee, args)?;
                    objects.push(result);
                }
                Op::Call { name, num_args } => {
                    let args = objects.split_off(objects.len() - num_args as usize);
                    let name = self.string(name.0)?;
                    objects.push(native(&name, args)?);
                }
                Op::Match(delta) => {
                    let pattern = patterns.pop().ok_or("empty pattern stack")?;
                    let value = objects.last().ok_or("empty stack")?;
                    let mut bindings = Vec::new();
                    if matches(&pattern, value, &mut bindings) {
                        locals.extend(bindings);
                    } else {
                        pc += delta as usize;
                    }
                }
                Op::Jump(delta) => pc += delta as usize,
                Op::MakeObject { kind, count } => {
                    let value = match kind {
                        ObjectKind::List => {
                            Value::List(objects.split_off(objects.len() - count as usize))
                        }
                        ObjectKind::Tuple => {
                            Value::Tuple(objects.split_off(objects.len() - count as usize))
                        }
                        ObjectKind::Record => {
                            let mut fields = BTreeMap::new();
                            for _ in 0..count {
                                let Some(Value::String(name)) = objects.pop() else {
                                    return Err("record field name expected".into());
                                };
                                let value = objects.pop().ok_or("empty stack")?;
                                fields.insert(name, value);
                            }
                            Value::Record(fields)
                        }
                        ObjectKind::Data => {
                            let Some(Value::String(option)) = objects.pop() else {
                                return Err("option name expected".into());
                            };
                            let args = objects.split_off(objects.len() - count as usize);
                            Value::Data { option, args }
                        }
                    };
                    objects.push(value);
                }
                Op::MakePattern { kind, name, nested } => {
                    let nested = patterns.split_off(patterns.len() - nested as usize);
                    let mut nested = nested.into_iter();
                    let pattern = match kind {
                        PatternKind::Alias => {
                            Pat::Alias(name, Box::new(nested.next().ok_or("alias body")?))
                        }
                        PatternKind::Any => Pat::Any,
                        PatternKind::Cons => {
                            let head = nested.next().ok_or("cons head")?;
                            let tail = nested.next().ok_or("cons tail")?;
                            Pat::Cons(Box::new(head), Box::new(tail))
                        }
                        PatternKind::Const => return Err("const patterns use LoadConst".into()),
                        PatternKind::Data => Pat::Data(name, nested.collect()),
                        PatternKind::List => Pat::List(nested.collect()),
                        PatternKind::Named => Pat::Named(name),
                        PatternKind::Record => Pat::Record(
                            nested
                                .map(|p| match p {
                                    Pat::Const(Value::String(s)) => Ok(s),
                                    other => Err(format!("field name expected, got {other:?}")),
                                })
                                .collect::<Result<_, _>>()?,
                        ),
                        PatternKind::Tuple => Pat::Tuple(nested.collect()),
                    };
                    patterns.push(pattern);
                }
                Op::Access(field) => {
                    let Some(Value::Record(fields)) = objects.pop() else {
                        return Err("record expected".into());
                    };
                    let value = fields
                        .into_iter()
                        .find(|(name, _)| StringHash::of(name) == field)
                        .map(|(_, v)| v)
                        .ok_or("missing field")?;
                    objects.push(value);
                }
                Op::Update(field) => {
                    let value = objects.pop().ok_or("empty stack")?;
                    let Some(Value::Record(mut fields)) = objects.pop() else {
                        return Err("record expected".into());
                    };
                    let slot = fields
                        .iter_mut()
                        .find(|(name, _)| StringHash::of(name) == field)
                        .ok_or("missing field")?;
                    *slot.1 = value;
                    objects.push(Value::Record(fields));
                }
                Op::SwapPop(SwapPopMode::Pop) => {
                    objects.pop().ok_or("empty stack")?;
                }
                Op::SwapPop(SwapPopMode::Both) => {
                    let top = objects.pop().ok_or("empty stack")?;
                    objects.pop().ok_or("empty stack")?;
                    objects.push(top);
                }
            }
        }
        self.depth -= 1;
        objects.pop().ok_or_else(|| "function left no value".to_string())
    }
}

fn matches(pattern: &Pat, value: &Value, bindings: &mut Vec<(StringHash, Value)>) -> bool {
    match (pattern, value) {
        (Pat::Any, _) => true,
        (Pat::Named(name), _) => {
            bindings.push((*name, value.clone()));
            true
        }
        (Pat::Alias(name, nested), _) => {
            bindings.push((*name, value.clone()));
            matches(nested, value, bindings)
        }
        (Pat::Const(expected), _) => numeric_eq(expected, value),
        (Pat::Cons(head, tail), Value::List(items)) => match items.split_first() {
            Some((first, rest)) => {
                matches(head, first, bindings) && matches(tail, &Value::List(rest.to_vec()), bindings)
            }
            None => false,
        },
        (Pat::Data(name, nested), Value::Data { option, args }) => {
            StringHash::of(option) == *name
                && nested.len() == args.len()
                && nested.iter().zip(args).all(|(p, v)| matches(p, v, bindings))
        }
        (Pat::List(nested), Value::List(items)) | (Pat::Tuple(nested), Value::Tuple(items)) => {
            nested.len() == items.len()
                && nested.iter().zip(items).all(|(p, v)| matches(p, v, bindings))
        }
        (Pat::Record(names), Value::Record(fields)) => names.iter().all(|name| match fields.get(name) {
            Some(v) => {
                bindings.push((StringHash::of(name), v.clone()));
                true
            }
            None => false,
        }),
        _ => false,
    }
}

/// An `Int` operand next to a `Float` one is widened, as a literal in a
/// `number`-polymorphic body is emitted as `Int`.
fn promote(mut args: Vec<Value>) -> Vec<Value> {
    if args.iter().any(|v| matches!(v, Value::Float(_))) {
        for arg in &mut args {
            if let Value::Int(v) = *arg {
                *arg = Value::Float(v as f64);
            }
        }
    }
    args
}

fn numeric_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => *i as f64 == *f,
        _ => a == b,
    }
}

fn native(name: &str, args: Vec<Value>) -> Result<Value, String> {
    use Value::*;
    let short = name.strip_prefix("Oak.Base.").ok_or_else(|| format!("unknown native {name}"))?;
    let args = match short {
        "add" | "sub" | "mul" | "div" | "eq" | "neq" | "lt" | "le" | "gt" | "ge" => promote(args),
        _ => args,
    };
    Ok(match (short, args.as_slice()) {
        ("add", [Int(a), Int(b)]) => Int(a + b),
        ("add", [Float(a), Float(b)]) => Float(a + b),
        ("sub", [Int(a), Int(b)]) => Int(a - b),
        ("sub", [Float(a), Float(b)]) => Float(a - b),
        ("mul", [Int(a), Int(b)]) => Int(a * b),
        ("mul", [Float(a), Float(b)]) => Float(a * b),
        ("div", [Int(a), Int(b)]) => Int(a.checked_div(*b).ok_or("division by zero")?),
        ("div", [Float(a), Float(b)]) => Float(a / b),
        ("mod", [Int(a), Int(b)]) => Int(a.checked_rem(*b).ok_or("division by zero")?),
        ("neg", [Int(a)]) => Int(-a),
        ("neg", [Float(a)]) => Float(-a),
        ("eq", [a, b]) => Value::bool(a == b),
        ("neq", [a, b]) => Value::bool(a != b),
        ("lt", [a, b]) => Value::bool(compare(a, b)?.is_lt()),
        ("le", [a, b]) => Value::bool(compare(a, b)?.is_le()),
        ("gt", [a, b]) => Value::bool(compare(a, b)?.is_gt()),
        ("ge", [a, b]) => Value::bool(compare(a, b)?.is_ge()),
        ("concat", [String(a), String(b)]) => String(format!("{a}{b}")),
        ("toFloat", [Int(a)]) => Float(*a as f64),
        ("truncate", [Float(a)]) => Int(*a as i64),
        ("toString", [Int(a)]) => String(a.to_string()),
        ("toString", [Float(a)]) => String(a.to_string()),
        ("toString", [String(a)]) => String(a.clone()),
        ("toString", [Char(a)]) => String(a.to_string()),
        ("cons", [head, List(tail)]) => {
            let mut items = vec![head.clone()];
            items.extend(tail.iter().cloned());
            List(items)
        }
        _ => return Err(format!("bad native call {name}({args:?})")),
    })
}

fn compare(a: &Value, b: &Value) -> Result<std::cmp::Ordering, String> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b).ok_or_else(|| "NaN".to_string()),
        (Value::Char(a), Value::Char(b)) => Ok(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(format!("cannot compare {a:?} and {b:?}")),
    }
}
