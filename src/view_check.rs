//! View-tree validation.
//!
//! Walks the view recursively, threading the lexical scope (loop bindings)
//! and the placement flags that decide where a `slot` node is legal.
//! Expression props are checked under `VarTrust::Lexical`; handler payloads
//! under `VarTrust::RuntimeOpaque`, since payloads see the event object.

use crate::ast::{PropValue, ViewNode};
use crate::context::AnalysisContext;
use crate::error::{self, suggest_name, ConstelaError};
use crate::expr_check::{check_expr, Scope, VarTrust};

/// Placement context for the current subtree.
#[derive(Debug, Clone, Copy, Default)]
pub struct Placement {
    pub inside_component: bool,
    pub inside_layout: bool,
}

impl Placement {
    pub fn allows_slot(&self) -> bool {
        self.inside_component || self.inside_layout
    }
}

pub fn check_node(
    node: &ViewNode,
    path: &str,
    ctx: &AnalysisContext,
    scope: &Scope,
    placement: Placement,
    errors: &mut Vec<ConstelaError>,
) {
    match node {
        ViewNode::Element {
            props, children, ..
        } => {
            check_props(props, path, ctx, scope, errors);
            check_children(children, path, ctx, scope, placement, errors);
        }

        ViewNode::Text { value } => {
            check_expr(
                value,
                &format!("{}/value", path),
                ctx,
                VarTrust::Lexical,
                scope,
                errors,
            );
        }

        ViewNode::If {
            condition,
            then,
            otherwise,
        } => {
            check_expr(
                condition,
                &format!("{}/condition", path),
                ctx,
                VarTrust::Lexical,
                scope,
                errors,
            );
            check_node(then, &format!("{}/then", path), ctx, scope, placement, errors);
            if let Some(alt) = otherwise {
                check_node(alt, &format!("{}/else", path), ctx, scope, placement, errors);
            }
        }

        ViewNode::Each {
            items,
            binding,
            index,
            key,
            body,
        } => {
            // Items resolve in the surrounding scope; the binding (and index)
            // exist only for key and body.
            check_expr(
                items,
                &format!("{}/items", path),
                ctx,
                VarTrust::Lexical,
                scope,
                errors,
            );
            let mut inner = scope.with_var(binding);
            if let Some(idx) = index {
                inner.vars.insert(idx.clone());
            }
            if let Some(k) = key {
                check_expr(
                    k,
                    &format!("{}/key", path),
                    ctx,
                    VarTrust::Lexical,
                    &inner,
                    errors,
                );
            }
            check_node(body, &format!("{}/body", path), ctx, &inner, placement, errors);
        }

        ViewNode::Component {
            name,
            props,
            children,
        } => {
            if !ctx.component_names.contains(name) {
                errors.push(
                    ConstelaError::new(
                        error::COMPONENT_NOT_FOUND,
                        format!("Unknown component '{}'.", name),
                        path,
                    )
                    .with_suggestion(suggest_name(
                        name,
                        ctx.component_names.iter().map(String::as_str),
                    )),
                );
            } else if let Some(params) = ctx.component_params.get(name) {
                // Every missing required param is reported, not just the first.
                for (pname, info) in params {
                    if info.required && !info.has_default && !props.contains_key(pname) {
                        errors.push(
                            ConstelaError::new(
                                error::COMPONENT_PROP_MISSING,
                                format!(
                                    "Component '{}' requires prop '{}'.",
                                    name, pname
                                ),
                                path,
                            )
                            .with_context(pname.clone()),
                        );
                    }
                }
            }
            // Invocation props and slot children belong to the caller's
            // scope, not the component's.
            check_props(props, path, ctx, scope, errors);
            check_children(children, path, ctx, scope, placement, errors);
        }

        ViewNode::Slot => {
            if !placement.allows_slot() {
                errors.push(ConstelaError::new(
                    error::SCHEMA_ERROR,
                    "'slot' is only allowed inside a component or layout body.",
                    path,
                ));
            }
        }

        ViewNode::Markdown { content } | ViewNode::Code { content, .. } => {
            check_expr(
                content,
                &format!("{}/content", path),
                ctx,
                VarTrust::Lexical,
                scope,
                errors,
            );
        }

        ViewNode::Portal { children, .. } | ViewNode::Island { children } => {
            check_children(children, path, ctx, scope, placement, errors);
        }

        ViewNode::Suspense { children, fallback }
        | ViewNode::ErrorBoundary { children, fallback } => {
            check_children(children, path, ctx, scope, placement, errors);
            if let Some(fb) = fallback {
                check_node(fb, &format!("{}/fallback", path), ctx, scope, placement, errors);
            }
        }
    }
}

fn check_children(
    children: &[ViewNode],
    path: &str,
    ctx: &AnalysisContext,
    scope: &Scope,
    placement: Placement,
    errors: &mut Vec<ConstelaError>,
) {
    for (i, child) in children.iter().enumerate() {
        check_node(
            child,
            &format!("{}/children/{}", path, i),
            ctx,
            scope,
            placement,
            errors,
        );
    }
}

fn check_props(
    props: &indexmap::IndexMap<String, PropValue>,
    path: &str,
    ctx: &AnalysisContext,
    scope: &Scope,
    errors: &mut Vec<ConstelaError>,
) {
    for (name, value) in props {
        let prop_path = format!("{}/props/{}", path, name);
        match value {
            PropValue::Expr(expr) => {
                check_expr(expr, &prop_path, ctx, VarTrust::Lexical, scope, errors);
            }
            PropValue::Handler(handler) => {
                if !ctx.has_action(&handler.action) && !scope.knows_action(&handler.action) {
                    let candidates = ctx
                        .action_names
                        .iter()
                        .map(String::as_str)
                        .chain(scope.local_actions.iter().map(String::as_str));
                    errors.push(
                        ConstelaError::new(
                            error::UNDEFINED_ACTION,
                            format!("Unknown action '{}'.", handler.action),
                            format!("{}/action", prop_path),
                        )
                        .with_suggestion(suggest_name(&handler.action, candidates)),
                    );
                }
                if let Some(payload) = &handler.payload {
                    check_expr(
                        payload,
                        &format!("{}/payload", prop_path),
                        ctx,
                        VarTrust::RuntimeOpaque,
                        scope,
                        errors,
                    );
                }
            }
        }
    }
}
