// SPDX-FileCopyrightText: Copyright (c) 2026 modsim contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sandboxed arithmetic expression evaluator for derived ("expression")
//! registers.
//!
//! Expressions are parsed into an AST exactly once, at config load time, via
//! `evalexpr::build_operator_tree`. Each tick re-evaluates the cached AST
//! against a fresh context built from that tick's register/global snapshot.
//! The only names exposed to expressions are: register/global identifiers,
//! the function whitelist `{min, max, sin, cos, sqrt, exp, log, pow, abs}`,
//! and the constant `pi`. No other host capability is reachable from an
//! expression.

use std::collections::HashMap;

use evalexpr::{
    build_operator_tree, Context, ContextWithMutableFunctions, ContextWithMutableVariables,
    Function, HashMapContext, Node, Value,
};
use log::error;

/// An expression, parsed once and ready to be evaluated repeatedly against
/// different variable snapshots.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    source: String,
    node: Node,
}

impl CompiledExpression {
    /// Parse `source` into an AST. Fails only on syntax errors; identifier
    /// resolution against the known register/global namespace is the
    /// caller's responsibility (see [`CompiledExpression::identifiers`]).
    pub fn compile(source: &str) -> Result<Self, String> {
        let node = build_operator_tree(source).map_err(|e| e.to_string())?;
        Ok(Self {
            source: source.to_string(),
            node,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every variable identifier referenced by this expression, for
    /// load-time validation against known register and global variable
    /// names.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.node.iter_variable_identifiers()
    }

    /// Evaluate against a combined register-value/global-variable namespace.
    /// Any runtime failure (division by zero, NaN propagation, an identifier
    /// absent from `values` despite load-time validation) is logged and
    /// yields `0.0` rather than aborting the tick.
    pub fn evaluate(&self, values: &HashMap<String, f64>) -> f64 {
        let context = build_context(values);
        match self.node.eval_with_context(&context) {
            Ok(value) => value_to_f64(&value),
            Err(err) => {
                error!(
                    "expression '{}' failed to evaluate: {}; defaulting to 0",
                    self.source, err
                );
                0.0
            }
        }
    }
}

fn value_to_f64(value: &Value) -> f64 {
    match value {
        Value::Float(f) => *f,
        Value::Int(i) => *i as f64,
        Value::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

fn tuple_args(value: &Value) -> Vec<f64> {
    match value {
        Value::Tuple(values) => values.iter().map(value_to_f64).collect(),
        other => vec![value_to_f64(other)],
    }
}

/// Build a fresh evaluation context: register values and global variables
/// (caller has already merged them) plus the whitelisted math functions and
/// the `pi` constant.
fn build_context(values: &HashMap<String, f64>) -> HashMapContext {
    let mut context = HashMapContext::new();
    // evalexpr ships builtin functions (floor, round, math::*, ...) beyond
    // the documented whitelist; disable them so only the explicit
    // `set_function` bindings below are callable.
    let _ = context.set_builtin_functions_disabled(true);

    for (name, value) in values {
        // Identifiers that aren't valid evalexpr variable names (shouldn't
        // happen for config-validated register/variable names) are skipped
        // rather than failing the whole tick.
        let _ = context.set_value(name.clone(), Value::Float(*value));
    }
    let _ = context.set_value("pi".to_string(), Value::Float(std::f64::consts::PI));

    let _ = context.set_function(
        "min".to_string(),
        Function::new(|argument| {
            let args = tuple_args(argument);
            Ok(Value::Float(args.into_iter().fold(f64::INFINITY, f64::min)))
        }),
    );
    let _ = context.set_function(
        "max".to_string(),
        Function::new(|argument| {
            let args = tuple_args(argument);
            Ok(Value::Float(
                args.into_iter().fold(f64::NEG_INFINITY, f64::max),
            ))
        }),
    );
    let _ = context.set_function(
        "sin".to_string(),
        Function::new(|argument| Ok(Value::Float(value_to_f64(argument).sin()))),
    );
    let _ = context.set_function(
        "cos".to_string(),
        Function::new(|argument| Ok(Value::Float(value_to_f64(argument).cos()))),
    );
    let _ = context.set_function(
        "sqrt".to_string(),
        Function::new(|argument| Ok(Value::Float(value_to_f64(argument).sqrt()))),
    );
    let _ = context.set_function(
        "exp".to_string(),
        Function::new(|argument| Ok(Value::Float(value_to_f64(argument).exp()))),
    );
    let _ = context.set_function(
        "log".to_string(),
        Function::new(|argument| Ok(Value::Float(value_to_f64(argument).ln()))),
    );
    let _ = context.set_function(
        "abs".to_string(),
        Function::new(|argument| Ok(Value::Float(value_to_f64(argument).abs()))),
    );
    let _ = context.set_function(
        "pow".to_string(),
        Function::new(|argument| {
            let args = tuple_args(argument);
            let base = args.first().copied().unwrap_or(0.0);
            let exponent = args.get(1).copied().unwrap_or(0.0);
            Ok(Value::Float(base.powf(exponent)))
        }),
    );

    context
}

/// The names this module reserves for itself; used by register validation to
/// reject an identifier that shadows a whitelisted function instead of
/// resolving to a register or global variable.
pub const RESERVED_NAMES: &[&str] = &["pi", "min", "max", "sin", "cos", "sqrt", "exp", "log", "abs", "pow"];

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn evaluates_simple_arithmetic() {
        let expr = CompiledExpression::compile("2 + 3 * 4").unwrap();
        assert_eq!(expr.evaluate(&values(&[])), 14.0);
    }

    #[test]
    fn resolves_identifiers_from_values() {
        // S5: power = voltage * setpoint
        let expr = CompiledExpression::compile("voltage * setpoint").unwrap();
        let vals = values(&[("voltage", 230.0), ("setpoint", 100.0)]);
        assert_eq!(expr.evaluate(&vals), 23000.0);
    }

    #[test]
    fn division_by_zero_yields_zero() {
        let expr = CompiledExpression::compile("1 / x").unwrap();
        let vals = values(&[("x", 0.0)]);
        assert_eq!(expr.evaluate(&vals), 0.0);
    }

    #[test]
    fn whitelisted_functions_are_available() {
        let expr = CompiledExpression::compile("max(min(10, 5), 2)").unwrap();
        assert_eq!(expr.evaluate(&values(&[])), 5.0);
    }

    #[test]
    fn identifiers_lists_referenced_names() {
        let expr = CompiledExpression::compile("a + b * c").unwrap();
        let mut names: Vec<&str> = expr.identifiers().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn pi_constant_and_trig_functions_resolve() {
        let expr = CompiledExpression::compile("sin(pi / 2)").unwrap();
        assert!((expr.evaluate(&values(&[])) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn builtin_function_outside_whitelist_is_unreachable() {
        // `floor` is an evalexpr builtin, not in the documented whitelist;
        // with builtins disabled it fails at evaluation and defaults to 0.
        let expr = CompiledExpression::compile("floor(1.5)").unwrap();
        assert_eq!(expr.evaluate(&values(&[])), 0.0);
    }
}
