//! Expression validation.
//!
//! One recursive walk serves all three historical validator variants. The
//! difference between them was only how much a `var` reference can be
//! trusted at that syntactic position, so that is the parameter:
//!
//! - `VarTrust::Lexical` — `var` refs must name a loop-bound variable that is
//!   statically in scope (view positions).
//! - `VarTrust::RuntimeOpaque` — `var` refs are runtime-injected values
//!   (event payloads, fetch results, loop context inside action steps) and
//!   are skipped; everything else is still validated.

use std::collections::{HashMap, HashSet};

use crate::ast::{Expression, StateType};
use crate::context::AnalysisContext;
use crate::error::{self, suggest_name, ConstelaError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarTrust {
    Lexical,
    RuntimeOpaque,
}

/// Names visible at one point of the tree: loop-bound variables plus, inside
/// a component definition, that component's params, local state, and local
/// actions. Cloned (not mutated) at every extension point so sibling
/// subtrees never see each other's bindings.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub vars: HashSet<String>,
    /// `Some` only inside a component definition body.
    pub params: Option<HashSet<String>>,
    pub local_state: HashMap<String, StateType>,
    pub local_actions: HashSet<String>,
}

impl Scope {
    pub fn with_var(&self, name: &str) -> Scope {
        let mut child = self.clone();
        child.vars.insert(name.to_string());
        child
    }

    pub fn knows_state(&self, name: &str) -> bool {
        self.local_state.contains_key(name)
    }

    pub fn knows_action(&self, name: &str) -> bool {
        self.local_actions.contains(name)
    }
}

pub fn check_expr(
    expr: &Expression,
    path: &str,
    ctx: &AnalysisContext,
    trust: VarTrust,
    scope: &Scope,
    errors: &mut Vec<ConstelaError>,
) {
    match expr {
        Expression::Lit { .. } => {}

        Expression::State { name } => {
            if !ctx.state_names.contains(name) && !scope.knows_state(name) {
                let candidates = ctx
                    .state_names
                    .iter()
                    .map(String::as_str)
                    .chain(scope.local_state.keys().map(String::as_str));
                errors.push(
                    ConstelaError::new(
                        error::UNDEFINED_STATE,
                        format!("Unknown state '{}'.", name),
                        path,
                    )
                    .with_suggestion(suggest_name(name, candidates)),
                );
            }
        }

        Expression::Var { name, .. } => {
            if trust == VarTrust::Lexical && !scope.vars.contains(name) {
                errors.push(
                    ConstelaError::new(
                        error::UNDEFINED_VAR,
                        format!("Unknown variable '{}'.", name),
                        path,
                    )
                    .with_suggestion(suggest_name(name, scope.vars.iter().map(String::as_str))),
                );
            }
        }

        Expression::Param { name, .. } => match &scope.params {
            Some(params) => {
                if !params.contains(name) {
                    errors.push(
                        ConstelaError::new(
                            error::UNDEFINED_PARAM,
                            format!("Unknown parameter '{}'.", name),
                            path,
                        )
                        .with_suggestion(suggest_name(name, params.iter().map(String::as_str))),
                    );
                }
            }
            None => {
                errors.push(ConstelaError::new(
                    error::UNDEFINED_PARAM,
                    format!(
                        "Parameter '{}' referenced outside a component definition.",
                        name
                    ),
                    path,
                ));
            }
        },

        Expression::Route { param } => {
            if !ctx.has_route {
                errors.push(ConstelaError::new(
                    error::ROUTE_NOT_DEFINED,
                    format!("Route parameter '{}' used but no route is defined.", param),
                    path,
                ));
            } else if !ctx.route_params.contains(param) {
                errors.push(
                    ConstelaError::new(
                        error::UNDEFINED_ROUTE_PARAM,
                        format!("Unknown route parameter '{}'.", param),
                        path,
                    )
                    .with_suggestion(suggest_name(
                        param,
                        ctx.route_params.iter().map(String::as_str),
                    )),
                );
            }
        }

        Expression::Import { name, .. } => {
            if !ctx.has_imports {
                errors.push(ConstelaError::new(
                    error::IMPORTS_NOT_DEFINED,
                    format!("Import '{}' used but no imports are declared.", name),
                    path,
                ));
            } else if !ctx.import_names.contains(name) {
                errors.push(
                    ConstelaError::new(
                        error::UNDEFINED_IMPORT,
                        format!("Unknown import '{}'.", name),
                        path,
                    )
                    .with_suggestion(suggest_name(
                        name,
                        ctx.import_names.iter().map(String::as_str),
                    )),
                );
            }
        }

        Expression::Data { name, .. } => {
            if !ctx.has_data {
                errors.push(ConstelaError::new(
                    error::DATA_NOT_DEFINED,
                    format!("Data source '{}' used but no data sources are declared.", name),
                    path,
                ));
            } else if !ctx.data_names.contains(name) {
                errors.push(
                    ConstelaError::new(
                        error::UNDEFINED_DATA,
                        format!("Unknown data source '{}'.", name),
                        path,
                    )
                    .with_suggestion(suggest_name(name, ctx.data_names.iter().map(String::as_str))),
                );
            }
        }

        Expression::Ref { name } => check_ref(name, path, ctx, errors),
        Expression::Validity { ref_name } => check_ref(ref_name, path, ctx, errors),

        Expression::Style { name, variants } => {
            if !ctx.style_names.contains(name) {
                errors.push(
                    ConstelaError::new(
                        error::UNDEFINED_STYLE,
                        format!("Unknown style preset '{}'.", name),
                        path,
                    )
                    .with_suggestion(suggest_name(
                        name,
                        ctx.style_names.iter().map(String::as_str),
                    )),
                );
            } else if let Some(declared) = ctx.style_variants.get(name) {
                for variant in variants.keys() {
                    if !declared.contains(variant) {
                        errors.push(
                            ConstelaError::new(
                                error::UNDEFINED_VARIANT,
                                format!(
                                    "Style preset '{}' has no variant '{}'.",
                                    name, variant
                                ),
                                format!("{}/variants/{}", path, variant),
                            )
                            .with_suggestion(suggest_name(
                                variant,
                                declared.iter().map(String::as_str),
                            )),
                        );
                    }
                }
            }
            for (variant, value) in variants {
                check_expr(
                    value,
                    &format!("{}/variants/{}", path, variant),
                    ctx,
                    trust,
                    scope,
                    errors,
                );
            }
        }

        Expression::Bin { left, right, .. } => {
            check_expr(left, &format!("{}/left", path), ctx, trust, scope, errors);
            check_expr(right, &format!("{}/right", path), ctx, trust, scope, errors);
        }

        Expression::Not { operand } => {
            check_expr(operand, &format!("{}/operand", path), ctx, trust, scope, errors);
        }

        Expression::Cond {
            cond,
            then,
            otherwise,
        } => {
            check_expr(cond, &format!("{}/if", path), ctx, trust, scope, errors);
            check_expr(then, &format!("{}/then", path), ctx, trust, scope, errors);
            check_expr(otherwise, &format!("{}/else", path), ctx, trust, scope, errors);
        }

        Expression::Get { base, .. } => {
            check_expr(base, &format!("{}/base", path), ctx, trust, scope, errors);
        }

        Expression::Index { base, index } => {
            check_expr(base, &format!("{}/base", path), ctx, trust, scope, errors);
            check_expr(index, &format!("{}/index", path), ctx, trust, scope, errors);
        }

        Expression::Concat { parts } => {
            for (i, part) in parts.iter().enumerate() {
                check_expr(part, &format!("{}/parts/{}", path, i), ctx, trust, scope, errors);
            }
        }

        Expression::Call { target, args, .. } => {
            check_expr(target, &format!("{}/target", path), ctx, trust, scope, errors);
            for (i, arg) in args.iter().enumerate() {
                check_expr(arg, &format!("{}/args/{}", path, i), ctx, trust, scope, errors);
            }
        }

        Expression::Lambda { param, index, body } => {
            let mut inner = scope.with_var(param);
            if let Some(idx) = index {
                inner.vars.insert(idx.clone());
            }
            check_expr(body, &format!("{}/body", path), ctx, trust, &inner, errors);
        }

        Expression::Array { items } => {
            for (i, item) in items.iter().enumerate() {
                check_expr(item, &format!("{}/items/{}", path, i), ctx, trust, scope, errors);
            }
        }
    }
}

fn check_ref(name: &str, path: &str, ctx: &AnalysisContext, errors: &mut Vec<ConstelaError>) {
    if !ctx.ref_names.contains(name) {
        errors.push(
            ConstelaError::new(
                error::UNDEFINED_REF,
                format!("Unknown ref '{}'.", name),
                path,
            )
            .with_suggestion(suggest_name(name, ctx.ref_names.iter().map(String::as_str))),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expr(value: serde_json::Value) -> Expression {
        serde_json::from_value(value).unwrap()
    }

    fn ctx_with_state(names: &[&str]) -> AnalysisContext {
        let mut ctx = AnalysisContext::default();
        for n in names {
            ctx.state_names.insert(n.to_string());
        }
        ctx
    }

    fn run(e: &Expression, ctx: &AnalysisContext, trust: VarTrust, scope: &Scope) -> Vec<ConstelaError> {
        let mut errors = Vec::new();
        check_expr(e, "/view/value", ctx, trust, scope, &mut errors);
        errors
    }

    #[test]
    fn literal_always_passes() {
        let ctx = AnalysisContext::default();
        let e = expr(json!({"expr": "lit", "value": [1, 2, 3]}));
        assert!(run(&e, &ctx, VarTrust::Lexical, &Scope::default()).is_empty());
    }

    #[test]
    fn undefined_state_carries_suggestion() {
        let ctx = ctx_with_state(&["count", "title"]);
        let e = expr(json!({"expr": "state", "name": "cuont"}));
        let errors = run(&e, &ctx, VarTrust::Lexical, &Scope::default());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, crate::error::UNDEFINED_STATE);
        assert_eq!(errors[0].suggestion.as_deref(), Some("count"));
    }

    #[test]
    fn var_checked_only_under_lexical_trust() {
        let ctx = AnalysisContext::default();
        let e = expr(json!({"expr": "var", "name": "event"}));

        let lexical = run(&e, &ctx, VarTrust::Lexical, &Scope::default());
        assert_eq!(lexical.len(), 1);
        assert_eq!(lexical[0].code, crate::error::UNDEFINED_VAR);

        let opaque = run(&e, &ctx, VarTrust::RuntimeOpaque, &Scope::default());
        assert!(opaque.is_empty());
    }

    #[test]
    fn scoped_var_accepted() {
        let ctx = AnalysisContext::default();
        let e = expr(json!({"expr": "var", "name": "item", "path": "user.name"}));
        let scope = Scope::default().with_var("item");
        assert!(run(&e, &ctx, VarTrust::Lexical, &scope).is_empty());
    }

    #[test]
    fn route_ref_without_route_declaration() {
        let ctx = AnalysisContext::default();
        let e = expr(json!({"expr": "route", "param": "id"}));
        let errors = run(&e, &ctx, VarTrust::Lexical, &Scope::default());
        assert_eq!(errors[0].code, crate::error::ROUTE_NOT_DEFINED);
    }

    #[test]
    fn route_ref_with_wrong_param() {
        let mut ctx = AnalysisContext::default();
        ctx.has_route = true;
        ctx.route_params.insert("id".to_string());
        let e = expr(json!({"expr": "route", "param": "slug"}));
        let errors = run(&e, &ctx, VarTrust::Lexical, &Scope::default());
        assert_eq!(errors[0].code, crate::error::UNDEFINED_ROUTE_PARAM);
    }

    #[test]
    fn nested_errors_accumulate_with_paths() {
        let ctx = ctx_with_state(&["a"]);
        let e = expr(json!({
            "expr": "bin", "op": "+",
            "left": {"expr": "state", "name": "missing1"},
            "right": {"expr": "state", "name": "missing2"}
        }));
        let errors = run(&e, &ctx, VarTrust::Lexical, &Scope::default());
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].path, "/view/value/left");
        assert_eq!(errors[1].path, "/view/value/right");
    }

    #[test]
    fn style_variant_keys_validated() {
        let mut ctx = AnalysisContext::default();
        ctx.style_names.insert("button".to_string());
        ctx.style_variants.insert(
            "button".to_string(),
            ["size".to_string()].into_iter().collect(),
        );
        let e = expr(json!({
            "expr": "style", "name": "button",
            "variants": {"colour": {"expr": "lit", "value": "red"}}
        }));
        let errors = run(&e, &ctx, VarTrust::Lexical, &Scope::default());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, crate::error::UNDEFINED_VARIANT);
        assert_eq!(errors[0].path, "/view/value/variants/colour");
    }

    #[test]
    fn lambda_binds_param_and_index() {
        let ctx = AnalysisContext::default();
        let e = expr(json!({
            "expr": "call",
            "target": {"expr": "lit", "value": []},
            "method": "map",
            "args": [{"expr": "lambda", "param": "x", "index": "i",
                      "body": {"expr": "bin", "op": "+",
                               "left": {"expr": "var", "name": "x"},
                               "right": {"expr": "var", "name": "i"}}}]
        }));
        assert!(run(&e, &ctx, VarTrust::Lexical, &Scope::default()).is_empty());
    }
}
