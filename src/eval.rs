//! Compiled-expression evaluator used by the server-side renderer.
//!
//! Pure with respect to everything except the supplied context. Data-level
//! problems (missing keys, wrong types, methods off the whitelist) never
//! raise; they evaluate to `undefined` so one bad expression can't take
//! down a whole render.

use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;

use crate::ast::StylePreset;
use crate::ir::{CompiledExpression, CompiledProgram};
use crate::value::{fmt_number, Value};

const FORBIDDEN_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Evaluation context for one render. `locals` is copy-on-write: each loop
/// iteration and each local-state scope clones the context, so sibling
/// subtrees never observe each other's bindings. `state` is read-only for
/// the duration of a render.
#[derive(Debug, Clone, Default)]
pub struct SsrContext {
    pub state: IndexMap<String, Value>,
    pub locals: IndexMap<String, Value>,
    pub route_params: IndexMap<String, String>,
    /// Carries declared imports and resolved data sources alike; the
    /// transform stage already unified their representation.
    pub imports: IndexMap<String, Value>,
    pub styles: IndexMap<String, StylePreset>,
}

impl SsrContext {
    /// Seed state from the compiled program's initial values, and imports
    /// from its build-time data if present.
    pub fn from_compiled(program: &CompiledProgram) -> SsrContext {
        let mut ctx = SsrContext::default();
        for (name, field) in &program.state {
            ctx.state.insert(name.clone(), Value::from_json(&field.initial));
        }
        if let Some(data) = &program.import_data {
            for (name, value) in data {
                ctx.imports.insert(name.clone(), Value::from_json(value));
            }
        }
        ctx
    }

    pub fn with_local(&self, name: &str, value: Value) -> SsrContext {
        let mut child = self.clone();
        child.locals.insert(name.to_string(), value);
        child
    }
}

pub fn evaluate(expr: &CompiledExpression, ctx: &SsrContext) -> Value {
    match expr {
        CompiledExpression::Lit { value } => Value::from_json(value),

        CompiledExpression::State { name } => {
            ctx.state.get(name).cloned().unwrap_or(Value::Undefined)
        }

        CompiledExpression::Var { name, path } => {
            // Locals first, then state: param substitution can turn a
            // state-bound param into a var ref, which must still resolve.
            let base = ctx
                .locals
                .get(name)
                .or_else(|| ctx.state.get(name))
                .cloned()
                .unwrap_or(Value::Undefined);
            match path {
                Some(p) => traverse(&base, p),
                None => base,
            }
        }

        CompiledExpression::Bin { op, left, right } => eval_bin(*op, left, right, ctx),

        CompiledExpression::Not { operand } => Value::Bool(!evaluate(operand, ctx).truthy()),

        CompiledExpression::Cond {
            cond,
            then,
            otherwise,
        } => {
            if evaluate(cond, ctx).truthy() {
                evaluate(then, ctx)
            } else {
                evaluate(otherwise, ctx)
            }
        }

        CompiledExpression::Get { base, path } => traverse(&evaluate(base, ctx), path),

        CompiledExpression::Route { param } => ctx
            .route_params
            .get(param)
            .map(|v| Value::String(v.clone()))
            .unwrap_or(Value::Undefined),

        CompiledExpression::Import { name, path } => {
            let base = ctx.imports.get(name).cloned().unwrap_or(Value::Undefined);
            match path {
                Some(p) => traverse(&base, p),
                None => base,
            }
        }

        // No DOM on the server.
        CompiledExpression::Ref { .. } => Value::Null,

        // Server-rendered forms have not been touched yet.
        CompiledExpression::Validity { .. } => Value::Bool(true),

        // A surviving param means lowering missed a substitution; degrade,
        // don't panic.
        CompiledExpression::Param { .. } => Value::Undefined,

        CompiledExpression::Index { base, index } => {
            index_into(&evaluate(base, ctx), &evaluate(index, ctx))
        }

        CompiledExpression::Style { name, variants } => resolve_style(name, variants, ctx),

        CompiledExpression::Concat { parts } => Value::String(
            parts
                .iter()
                .map(|p| evaluate(p, ctx).render_string())
                .collect(),
        ),

        CompiledExpression::Call {
            target,
            method,
            args,
        } => eval_call(target, method, args, ctx),

        // A lambda is only meaningful as an iteration-method argument.
        CompiledExpression::Lambda { .. } => Value::Undefined,

        CompiledExpression::Array { items } => {
            Value::Array(items.iter().map(|i| evaluate(i, ctx)).collect())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BINARY OPERATORS
// ═══════════════════════════════════════════════════════════════════════════════

fn eval_bin(
    op: crate::ast::BinOp,
    left: &CompiledExpression,
    right: &CompiledExpression,
    ctx: &SsrContext,
) -> Value {
    use crate::ast::BinOp;

    // && and || short-circuit and yield the deciding operand itself.
    match op {
        BinOp::And => {
            let lhs = evaluate(left, ctx);
            return if lhs.truthy() { evaluate(right, ctx) } else { lhs };
        }
        BinOp::Or => {
            let lhs = evaluate(left, ctx);
            return if lhs.truthy() { lhs } else { evaluate(right, ctx) };
        }
        _ => {}
    }

    let lhs = evaluate(left, ctx);
    let rhs = evaluate(right, ctx);

    match op {
        // + concatenates when either side is a string; numeric-looking
        // strings are never parsed.
        BinOp::Add => match (&lhs, &rhs) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Value::String(format!("{}{}", lhs.js_string(), rhs.js_string()))
            }
            _ => Value::Number(lhs.as_number() + rhs.as_number()),
        },
        BinOp::Sub => Value::Number(lhs.as_number() - rhs.as_number()),
        BinOp::Mul => Value::Number(lhs.as_number() * rhs.as_number()),
        // IEEE semantics: 0/0 is NaN, n/0 is signed infinity.
        BinOp::Div => Value::Number(lhs.as_number() / rhs.as_number()),
        BinOp::Mod => Value::Number(lhs.as_number() % rhs.as_number()),
        BinOp::Eq => Value::Bool(lhs.loose_eq(&rhs)),
        BinOp::Ne => Value::Bool(!lhs.loose_eq(&rhs)),
        BinOp::Lt => compare(&lhs, &rhs, |o| o == std::cmp::Ordering::Less),
        BinOp::Le => compare(&lhs, &rhs, |o| o != std::cmp::Ordering::Greater),
        BinOp::Gt => compare(&lhs, &rhs, |o| o == std::cmp::Ordering::Greater),
        BinOp::Ge => compare(&lhs, &rhs, |o| o != std::cmp::Ordering::Less),
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn compare(lhs: &Value, rhs: &Value, pick: fn(std::cmp::Ordering) -> bool) -> Value {
    let result = match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => lhs.as_number().partial_cmp(&rhs.as_number()),
    };
    // NaN comparisons are always false.
    Value::Bool(result.map(pick).unwrap_or(false))
}

// ═══════════════════════════════════════════════════════════════════════════════
// PATH TRAVERSAL
// ═══════════════════════════════════════════════════════════════════════════════

/// Walk a dotted path into a value. Prototype-pollution keys are refused
/// outright; any missing step yields undefined.
pub fn traverse(base: &Value, path: &str) -> Value {
    let mut current = base.clone();
    for segment in path.split('.') {
        if FORBIDDEN_KEYS.contains(&segment) {
            return Value::Undefined;
        }
        current = match &current {
            Value::Object(map) => map.get(segment).cloned().unwrap_or(Value::Undefined),
            Value::Array(items) => {
                if segment == "length" {
                    Value::Number(items.len() as f64)
                } else if let Ok(i) = segment.parse::<usize>() {
                    items.get(i).cloned().unwrap_or(Value::Undefined)
                } else {
                    Value::Undefined
                }
            }
            Value::String(s) => {
                if segment == "length" {
                    Value::Number(s.chars().count() as f64)
                } else {
                    Value::Undefined
                }
            }
            _ => Value::Undefined,
        };
    }
    current
}

fn index_into(base: &Value, index: &Value) -> Value {
    match (base, index) {
        (_, Value::String(key)) if FORBIDDEN_KEYS.contains(&key.as_str()) => Value::Undefined,
        (Value::Array(items), Value::Number(n)) => {
            if *n >= 0.0 && n.fract() == 0.0 {
                items.get(*n as usize).cloned().unwrap_or(Value::Undefined)
            } else {
                Value::Undefined
            }
        }
        (Value::Object(map), Value::String(key)) => {
            map.get(key).cloned().unwrap_or(Value::Undefined)
        }
        (Value::String(s), Value::Number(n)) => {
            if *n >= 0.0 && n.fract() == 0.0 {
                s.chars()
                    .nth(*n as usize)
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or(Value::Undefined)
            } else {
                Value::Undefined
            }
        }
        _ => Value::Undefined,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STYLE RESOLUTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Base class plus one class per declared variant, in preset declaration
/// order. A variant whose expression fails to produce a usable key falls
/// back to the preset default; if that also misses, the variant is skipped
/// without failing the rest.
fn resolve_style(
    name: &str,
    supplied: &IndexMap<String, CompiledExpression>,
    ctx: &SsrContext,
) -> Value {
    let Some(preset) = ctx.styles.get(name) else {
        return Value::String(String::new());
    };

    let mut classes: Vec<String> = Vec::new();
    if !preset.base.is_empty() {
        classes.push(preset.base.clone());
    }

    for (variant, def) in &preset.variants {
        let key = match supplied.get(variant) {
            Some(expr) => match evaluate(expr, ctx) {
                Value::String(s) => Some(s),
                _ => def.default.clone(),
            },
            None => def.default.clone(),
        };
        if let Some(key) = key {
            if let Some(class) = def.options.get(&key) {
                classes.push(class.clone());
            }
        }
    }

    Value::String(classes.join(" "))
}

// ═══════════════════════════════════════════════════════════════════════════════
// METHOD DISPATCH
// ═══════════════════════════════════════════════════════════════════════════════

fn eval_call(
    target: &CompiledExpression,
    method: &str,
    args: &[CompiledExpression],
    ctx: &SsrContext,
) -> Value {
    // Math.* and Date.* are static dispatch, recognized syntactically: the
    // target must be a bare var reference to the global name, before any
    // value lookup happens.
    if let CompiledExpression::Var { name, path: None } = target {
        match name.as_str() {
            "Math" => return math_method(method, args, ctx),
            "Date" => return date_static(method),
            _ => {}
        }
    }

    let receiver = evaluate(target, ctx);
    match receiver {
        Value::Array(items) => array_method(&items, method, args, ctx),
        Value::String(s) => string_method(&s, method, args, ctx),
        Value::Number(n) => number_method(n, method, args, ctx),
        _ => Value::Undefined,
    }
}

fn math_method(method: &str, args: &[CompiledExpression], ctx: &SsrContext) -> Value {
    let nums: Vec<f64> = args.iter().map(|a| evaluate(a, ctx).as_number()).collect();
    let first = nums.first().copied().unwrap_or(f64::NAN);
    let n = match method {
        "abs" => first.abs(),
        "floor" => first.floor(),
        "ceil" => first.ceil(),
        // JS rounds halves toward +Infinity; f64::round rounds away from
        // zero, which differs for negative halves.
        "round" => (first + 0.5).floor(),
        "sqrt" => first.sqrt(),
        "trunc" => first.trunc(),
        "sign" => {
            if first.is_nan() || first == 0.0 {
                first
            } else {
                first.signum()
            }
        }
        "log" => first.ln(),
        "exp" => first.exp(),
        "pow" => first.powf(nums.get(1).copied().unwrap_or(f64::NAN)),
        "min" => nums.iter().copied().fold(f64::INFINITY, f64::min),
        "max" => nums.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        _ => return Value::Undefined,
    };
    Value::Number(n)
}

fn date_static(method: &str) -> Value {
    match method {
        "now" => {
            let ms = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as f64)
                .unwrap_or(0.0);
            Value::Number(ms)
        }
        _ => Value::Undefined,
    }
}

const LAMBDA_METHODS: [&str; 6] = ["map", "filter", "find", "findIndex", "some", "every"];

fn array_method(
    items: &[Value],
    method: &str,
    args: &[CompiledExpression],
    ctx: &SsrContext,
) -> Value {
    if LAMBDA_METHODS.contains(&method) {
        // Iteration methods demand a lambda argument; any other shape
        // silently yields undefined.
        let Some(CompiledExpression::Lambda { param, index, body }) = args.first() else {
            return Value::Undefined;
        };
        let apply = |item: &Value, i: usize| -> Value {
            let mut child = ctx.with_local(param, item.clone());
            if let Some(idx) = index {
                child.locals.insert(idx.clone(), Value::Number(i as f64));
            }
            evaluate(body, &child)
        };
        return match method {
            "map" => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| apply(item, i))
                    .collect(),
            ),
            "filter" => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .filter(|(i, item)| apply(item, *i).truthy())
                    .map(|(_, item)| item.clone())
                    .collect(),
            ),
            "find" => items
                .iter()
                .enumerate()
                .find(|(i, item)| apply(item, *i).truthy())
                .map(|(_, item)| item.clone())
                .unwrap_or(Value::Undefined),
            "findIndex" => Value::Number(
                items
                    .iter()
                    .enumerate()
                    .position(|(i, item)| apply(item, i).truthy())
                    .map(|i| i as f64)
                    .unwrap_or(-1.0),
            ),
            "some" => Value::Bool(
                items
                    .iter()
                    .enumerate()
                    .any(|(i, item)| apply(item, i).truthy()),
            ),
            "every" => Value::Bool(
                items
                    .iter()
                    .enumerate()
                    .all(|(i, item)| apply(item, i).truthy()),
            ),
            _ => unreachable!(),
        };
    }

    let arg = |i: usize| args.get(i).map(|a| evaluate(a, ctx));
    match method {
        "includes" => {
            let needle = arg(0).unwrap_or(Value::Undefined);
            Value::Bool(items.iter().any(|v| v.loose_eq(&needle)))
        }
        "indexOf" => {
            let needle = arg(0).unwrap_or(Value::Undefined);
            Value::Number(
                items
                    .iter()
                    .position(|v| v.loose_eq(&needle))
                    .map(|i| i as f64)
                    .unwrap_or(-1.0),
            )
        }
        "join" => {
            let sep = match arg(0) {
                Some(Value::String(s)) => s,
                Some(v) => v.js_string(),
                None => ",".to_string(),
            };
            Value::String(
                items
                    .iter()
                    .map(|v| match v {
                        Value::Undefined | Value::Null => String::new(),
                        other => other.js_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(&sep),
            )
        }
        "slice" => {
            let len = items.len();
            let start = slice_bound(arg(0), len, 0);
            let end = slice_bound(arg(1), len, len);
            Value::Array(items[start.min(len)..end.max(start).min(len)].to_vec())
        }
        "concat" => {
            let mut out = items.to_vec();
            match arg(0) {
                Some(Value::Array(more)) => out.extend(more),
                Some(v) => out.push(v),
                None => {}
            }
            Value::Array(out)
        }
        "reverse" => Value::Array(items.iter().rev().cloned().collect()),
        "flat" => {
            let mut out = Vec::new();
            for v in items {
                match v {
                    Value::Array(inner) => out.extend(inner.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Value::Array(out)
        }
        "at" => {
            let i = arg(0).map(|v| v.as_number()).unwrap_or(0.0);
            let len = items.len() as f64;
            let i = if i < 0.0 { len + i } else { i };
            if i >= 0.0 && i < len {
                items[i as usize].clone()
            } else {
                Value::Undefined
            }
        }
        _ => Value::Undefined,
    }
}

/// Normalize a JS slice bound: negative counts from the end, clamped.
fn slice_bound(v: Option<Value>, len: usize, default: usize) -> usize {
    match v {
        Some(Value::Number(n)) => {
            if n < 0.0 {
                (len as f64 + n).max(0.0) as usize
            } else {
                (n as usize).min(len)
            }
        }
        _ => default,
    }
}

fn string_method(s: &str, method: &str, args: &[CompiledExpression], ctx: &SsrContext) -> Value {
    let arg = |i: usize| args.get(i).map(|a| evaluate(a, ctx));
    let str_arg = |i: usize| -> String {
        arg(i).map(|v| v.js_string()).unwrap_or_default()
    };
    match method {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::String(s.trim().to_string()),
        "includes" => Value::Bool(s.contains(&str_arg(0))),
        "startsWith" => Value::Bool(s.starts_with(&str_arg(0))),
        "endsWith" => Value::Bool(s.ends_with(&str_arg(0))),
        "slice" | "substring" => {
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len();
            let start = slice_bound(arg(0), len, 0);
            let end = slice_bound(arg(1), len, len);
            Value::String(chars[start.min(len)..end.max(start).min(len)].iter().collect())
        }
        "split" => {
            let sep = str_arg(0);
            let parts: Vec<Value> = if sep.is_empty() {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                s.split(&sep)
                    .map(|p| Value::String(p.to_string()))
                    .collect()
            };
            Value::Array(parts)
        }
        // Like JS, replaces the first occurrence only.
        "replace" => Value::String(s.replacen(&str_arg(0), &str_arg(1), 1)),
        "charAt" => {
            let i = arg(0).map(|v| v.as_number()).unwrap_or(0.0);
            if i >= 0.0 && i.fract() == 0.0 {
                Value::String(
                    s.chars()
                        .nth(i as usize)
                        .map(|c| c.to_string())
                        .unwrap_or_default(),
                )
            } else {
                Value::String(String::new())
            }
        }
        "indexOf" => {
            let needle = str_arg(0);
            // Char-based index to stay consistent with slice/charAt.
            match s.find(&needle) {
                Some(byte_idx) => Value::Number(s[..byte_idx].chars().count() as f64),
                None => Value::Number(-1.0),
            }
        }
        "padStart" | "padEnd" => {
            let width = arg(0).map(|v| v.as_number()).unwrap_or(0.0).max(0.0) as usize;
            let pad = match arg(1) {
                Some(Value::String(p)) if !p.is_empty() => p,
                Some(Value::Undefined) | None => " ".to_string(),
                Some(v) => v.js_string(),
            };
            let current = s.chars().count();
            if current >= width || pad.is_empty() {
                return Value::String(s.to_string());
            }
            let fill: String = pad.chars().cycle().take(width - current).collect();
            if method == "padStart" {
                Value::String(format!("{}{}", fill, s))
            } else {
                Value::String(format!("{}{}", s, fill))
            }
        }
        "repeat" => {
            let n = arg(0).map(|v| v.as_number()).unwrap_or(0.0);
            if n >= 0.0 && n.is_finite() {
                Value::String(s.repeat(n as usize))
            } else {
                Value::Undefined
            }
        }
        "concat" => Value::String(format!("{}{}", s, str_arg(0))),
        "toString" => Value::String(s.to_string()),
        _ => Value::Undefined,
    }
}

fn number_method(n: f64, method: &str, args: &[CompiledExpression], ctx: &SsrContext) -> Value {
    match method {
        "toFixed" => {
            let digits = args
                .first()
                .map(|a| evaluate(a, ctx).as_number())
                .unwrap_or(0.0);
            if digits.is_finite() && (0.0..=100.0).contains(&digits) {
                Value::String(format!("{:.*}", digits as usize, n))
            } else {
                Value::Undefined
            }
        }
        "toString" => Value::String(fmt_number(n)),
        // Numbers double as epoch-millisecond timestamps; the Date instance
        // whitelist operates on them directly.
        "getTime" => Value::Number(n),
        "getFullYear" => Value::Number(civil_from_millis(n).0 as f64),
        "getMonth" => Value::Number((civil_from_millis(n).1 - 1) as f64),
        "getDate" => Value::Number(civil_from_millis(n).2 as f64),
        "toISOString" => {
            if !n.is_finite() {
                return Value::Undefined;
            }
            let (y, m, d) = civil_from_millis(n);
            let ms_of_day = n.rem_euclid(86_400_000.0) as i64;
            Value::String(format!(
                "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
                y,
                m,
                d,
                ms_of_day / 3_600_000,
                ms_of_day % 3_600_000 / 60_000,
                ms_of_day % 60_000 / 1000,
                ms_of_day % 1000
            ))
        }
        _ => Value::Undefined,
    }
}

/// Epoch milliseconds → (year, month 1-12, day) in UTC, via the standard
/// civil-calendar conversion.
fn civil_from_millis(ms: f64) -> (i64, u32, u32) {
    let days = (ms / 86_400_000.0).floor() as i64;
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}
