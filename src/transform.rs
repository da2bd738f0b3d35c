//! AST → IR lowering.
//!
//! Runs only after analysis succeeds and performs no semantic checking of
//! its own. The interesting work is component inlining: every invocation is
//! expanded in place, with the supplied props (transformed in the caller's
//! context) carried into a fresh `TransformContext` that the component body
//! is lowered under. `param` references are spliced away against that
//! context; `slot` placeholders collapse to the invocation's children.

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::ast::{
    ActionDefinition, ActionStep, Expression, Program, PropValue, StateField, ViewNode,
};
use crate::context::extract_route_params;
use crate::ir::{
    CompiledAction, CompiledExpression, CompiledHandler, CompiledLifecycle, CompiledNode,
    CompiledProgram, CompiledPropValue, CompiledRoute, CompiledStateField, CompiledStep,
};

/// Bindings for the component instantiation currently being expanded.
/// Empty at the top level: no params to splice, no slot content.
#[derive(Debug, Clone, Default)]
struct TransformContext {
    params: IndexMap<String, CompiledPropValue>,
    children: Vec<CompiledNode>,
}

pub fn transform_program(
    program: &Program,
    import_data: Option<IndexMap<String, Json>>,
) -> CompiledProgram {
    let lowerer = Lowerer { program };
    let top = TransformContext::default();

    let state = program
        .state
        .iter()
        .map(|(name, field)| (name.clone(), lower_state_field(field)))
        .collect();

    let actions = program
        .actions
        .iter()
        .map(|action| (action.name.clone(), lowerer.lower_action(action, &top)))
        .collect();

    let view = lowerer.lower_node(&program.view, &top);

    let route = program.route.as_ref().map(|route| CompiledRoute {
        path: route.path.clone(),
        params: extract_route_params(&route.path),
        title: route.title.as_ref().map(|t| lowerer.lower_expr(t, &top)),
        meta: route
            .meta
            .iter()
            .map(|(k, v)| (k.clone(), lowerer.lower_expr(v, &top)))
            .collect(),
        canonical: route
            .canonical
            .as_ref()
            .map(|c| lowerer.lower_expr(c, &top)),
        json_ld: route
            .json_ld
            .as_ref()
            .map(|j| lowerer.lower_expr(j, &top)),
    });

    let lifecycle = program.lifecycle.as_ref().map(|lc| CompiledLifecycle {
        on_load: lowerer.lower_steps(&lc.on_load, &top),
        on_unload: lowerer.lower_steps(&lc.on_unload, &top),
    });

    // Absence and emptiness both normalize to "field omitted": presence
    // implies non-trivial data downstream.
    let import_data = import_data.filter(|d| !d.is_empty());

    CompiledProgram {
        version: program.version.clone(),
        state,
        actions,
        view,
        route,
        lifecycle,
        import_data,
    }
}

fn lower_state_field(field: &StateField) -> CompiledStateField {
    CompiledStateField {
        field_type: field.field_type,
        initial: field.initial.clone(),
    }
}

struct Lowerer<'a> {
    program: &'a Program,
}

impl<'a> Lowerer<'a> {
    fn lower_action(&self, action: &ActionDefinition, tcx: &TransformContext) -> CompiledAction {
        CompiledAction {
            name: action.name.clone(),
            steps: self.lower_steps(&action.steps, tcx),
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Expressions
    // ───────────────────────────────────────────────────────────────────────

    fn lower_expr(&self, expr: &Expression, tcx: &TransformContext) -> CompiledExpression {
        match expr {
            Expression::Lit { value } => CompiledExpression::Lit {
                value: value.clone(),
            },
            Expression::State { name } => CompiledExpression::State { name: name.clone() },
            Expression::Var { name, path } => CompiledExpression::Var {
                name: name.clone(),
                path: path.clone(),
            },
            Expression::Bin { op, left, right } => CompiledExpression::Bin {
                op: *op,
                left: Box::new(self.lower_expr(left, tcx)),
                right: Box::new(self.lower_expr(right, tcx)),
            },
            Expression::Not { operand } => CompiledExpression::Not {
                operand: Box::new(self.lower_expr(operand, tcx)),
            },
            Expression::Cond {
                cond,
                then,
                otherwise,
            } => CompiledExpression::Cond {
                cond: Box::new(self.lower_expr(cond, tcx)),
                then: Box::new(self.lower_expr(then, tcx)),
                otherwise: Box::new(self.lower_expr(otherwise, tcx)),
            },
            Expression::Get { base, path } => CompiledExpression::Get {
                base: Box::new(self.lower_expr(base, tcx)),
                path: path.clone(),
            },
            Expression::Route { param } => CompiledExpression::Route {
                param: param.clone(),
            },
            Expression::Import { name, path } => CompiledExpression::Import {
                name: name.clone(),
                path: path.clone(),
            },
            // Data sources are build-time imports by the time the runtime
            // sees them.
            Expression::Data { name, path } => CompiledExpression::Import {
                name: name.clone(),
                path: path.clone(),
            },
            Expression::Ref { name } => CompiledExpression::Ref { name: name.clone() },
            Expression::Index { base, index } => CompiledExpression::Index {
                base: Box::new(self.lower_expr(base, tcx)),
                index: Box::new(self.lower_expr(index, tcx)),
            },
            Expression::Param { name, path } => self.splice_param(name, path.as_deref(), tcx),
            Expression::Style { name, variants } => CompiledExpression::Style {
                name: name.clone(),
                variants: variants
                    .iter()
                    .map(|(k, v)| (k.clone(), self.lower_expr(v, tcx)))
                    .collect(),
            },
            Expression::Concat { parts } => CompiledExpression::Concat {
                parts: parts.iter().map(|p| self.lower_expr(p, tcx)).collect(),
            },
            Expression::Validity { ref_name } => CompiledExpression::Validity {
                ref_name: ref_name.clone(),
            },
            Expression::Call {
                target,
                method,
                args,
            } => CompiledExpression::Call {
                target: Box::new(self.lower_expr(target, tcx)),
                method: method.clone(),
                args: args.iter().map(|a| self.lower_expr(a, tcx)).collect(),
            },
            Expression::Lambda { param, index, body } => CompiledExpression::Lambda {
                param: param.clone(),
                index: index.clone(),
                body: Box::new(self.lower_expr(body, tcx)),
            },
            Expression::Array { items } => CompiledExpression::Array {
                items: items.iter().map(|i| self.lower_expr(i, tcx)).collect(),
            },
        }
    }

    /// Substitute a `param` reference with the value bound at the current
    /// instantiation. Bound values arrive already lowered (in the caller's
    /// context), so this is a splice, not a recursive transform.
    fn splice_param(
        &self,
        name: &str,
        path: Option<&str>,
        tcx: &TransformContext,
    ) -> CompiledExpression {
        let Some(bound) = tcx.params.get(name) else {
            // No binding: keep the sentinel so the evaluator can map it to
            // undefined instead of the compiler panicking.
            return CompiledExpression::Param {
                name: name.to_string(),
                path: path.map(str::to_string),
            };
        };

        let value = match bound {
            CompiledPropValue::Expr(expr) => expr,
            // A handler is not an expression; a param reference to one in
            // expression position lowers to null.
            CompiledPropValue::Handler(_) => {
                return CompiledExpression::Lit { value: Json::Null }
            }
        };

        let Some(path) = path else {
            return value.clone();
        };

        match value {
            CompiledExpression::Var {
                name,
                path: Some(existing),
            } => CompiledExpression::Var {
                name: name.clone(),
                path: Some(format!("{}.{}", existing, path)),
            },
            CompiledExpression::Var { name, path: None } => CompiledExpression::Var {
                name: name.clone(),
                path: Some(path.to_string()),
            },
            // Compiled state refs carry no path field; re-express as a var
            // ref with the path. The evaluator's var lookup falls back to
            // state, so the reference still resolves.
            CompiledExpression::State { name } => CompiledExpression::Var {
                name: name.clone(),
                path: Some(path.to_string()),
            },
            CompiledExpression::Get {
                base,
                path: existing,
            } => CompiledExpression::Get {
                base: base.clone(),
                path: format!("{}.{}", existing, path),
            },
            other => CompiledExpression::Get {
                base: Box::new(other.clone()),
                path: path.to_string(),
            },
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // View nodes
    // ───────────────────────────────────────────────────────────────────────

    fn lower_node(&self, node: &ViewNode, tcx: &TransformContext) -> CompiledNode {
        match node {
            ViewNode::Element {
                tag,
                ref_name,
                props,
                children,
            } => CompiledNode::Element {
                tag: tag.clone(),
                ref_name: ref_name.clone(),
                props: self.lower_props(props, tcx),
                children: self.lower_children(children, tcx),
            },
            ViewNode::Text { value } => CompiledNode::Text {
                value: self.lower_expr(value, tcx),
            },
            ViewNode::If {
                condition,
                then,
                otherwise,
            } => CompiledNode::If {
                condition: self.lower_expr(condition, tcx),
                then: Box::new(self.lower_node(then, tcx)),
                otherwise: otherwise
                    .as_ref()
                    .map(|alt| Box::new(self.lower_node(alt, tcx))),
            },
            ViewNode::Each {
                items,
                binding,
                index,
                key,
                body,
            } => CompiledNode::Each {
                items: self.lower_expr(items, tcx),
                binding: binding.clone(),
                index: index.clone(),
                key: key.as_ref().map(|k| self.lower_expr(k, tcx)),
                body: Box::new(self.lower_node(body, tcx)),
            },
            ViewNode::Component {
                name,
                props,
                children,
            } => self.inline_component(name, props, children, tcx),
            ViewNode::Slot => slot_replacement(tcx),
            ViewNode::Markdown { content } => CompiledNode::Markdown {
                content: self.lower_expr(content, tcx),
            },
            ViewNode::Code { content, language } => CompiledNode::Code {
                content: self.lower_expr(content, tcx),
                language: language.clone(),
            },
            ViewNode::Portal { target, children } => CompiledNode::Portal {
                target: target.clone(),
                children: self.lower_children(children, tcx),
            },
            ViewNode::Island { children } => CompiledNode::Island {
                children: self.lower_children(children, tcx),
            },
            ViewNode::Suspense { children, fallback } => CompiledNode::Suspense {
                children: self.lower_children(children, tcx),
                fallback: fallback
                    .as_ref()
                    .map(|fb| Box::new(self.lower_node(fb, tcx))),
            },
            ViewNode::ErrorBoundary { children, fallback } => CompiledNode::ErrorBoundary {
                children: self.lower_children(children, tcx),
                fallback: fallback
                    .as_ref()
                    .map(|fb| Box::new(self.lower_node(fb, tcx))),
            },
        }
    }

    fn lower_children(&self, children: &[ViewNode], tcx: &TransformContext) -> Vec<CompiledNode> {
        children
            .iter()
            .map(|child| self.lower_node(child, tcx))
            .collect()
    }

    fn lower_props(
        &self,
        props: &IndexMap<String, PropValue>,
        tcx: &TransformContext,
    ) -> IndexMap<String, CompiledPropValue> {
        props
            .iter()
            .map(|(name, value)| (name.clone(), self.lower_prop(value, tcx)))
            .collect()
    }

    fn lower_prop(&self, value: &PropValue, tcx: &TransformContext) -> CompiledPropValue {
        match value {
            PropValue::Expr(expr) => CompiledPropValue::Expr(self.lower_expr(expr, tcx)),
            PropValue::Handler(handler) => CompiledPropValue::Handler(CompiledHandler {
                event: handler.event.clone(),
                action: handler.action.clone(),
                payload: handler
                    .payload
                    .as_ref()
                    .map(|p| self.lower_expr(p, tcx)),
            }),
        }
    }

    /// Expand a component invocation in place. Props and slot children are
    /// lowered in the caller's context; the body is lowered in a fresh
    /// context carrying those bindings. A component with local state or
    /// local actions gets a `localState` wrapper so each instantiation owns
    /// an independent scope.
    fn inline_component(
        &self,
        name: &str,
        props: &IndexMap<String, PropValue>,
        children: &[ViewNode],
        tcx: &TransformContext,
    ) -> CompiledNode {
        let Some(def) = self.program.components.get(name) else {
            // Analysis rejects unknown components; lowering one anyway
            // degrades to nothing rather than panicking.
            return CompiledNode::Text {
                value: CompiledExpression::Lit {
                    value: Json::String(String::new()),
                },
            };
        };

        let mut params: IndexMap<String, CompiledPropValue> = IndexMap::new();
        let empty = TransformContext::default();
        for (pname, pdef) in &def.params {
            if let Some(default) = &pdef.default {
                params.insert(pname.clone(), self.lower_prop(default, &empty));
            }
        }
        for (pname, value) in props {
            params.insert(pname.clone(), self.lower_prop(value, tcx));
        }

        let inner = TransformContext {
            params,
            children: self.lower_children(children, tcx),
        };

        let body = self.lower_node(&def.view, &inner);

        if def.local_state.is_empty() && def.local_actions.is_empty() {
            return body;
        }

        CompiledNode::LocalState {
            state: def
                .local_state
                .iter()
                .map(|(sname, field)| (sname.clone(), lower_state_field(field)))
                .collect(),
            actions: def
                .local_actions
                .iter()
                .map(|action| (action.name.clone(), self.lower_action(action, &inner)))
                .collect(),
            child: Box::new(body),
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Action steps
    // ───────────────────────────────────────────────────────────────────────

    fn lower_steps(&self, steps: &[ActionStep], tcx: &TransformContext) -> Vec<CompiledStep> {
        steps.iter().map(|s| self.lower_step(s, tcx)).collect()
    }

    fn lower_step(&self, step: &ActionStep, tcx: &TransformContext) -> CompiledStep {
        match step {
            ActionStep::Set { target, value } => CompiledStep::Set {
                target: target.clone(),
                value: self.lower_expr(value, tcx),
            },
            ActionStep::Update {
                target,
                operation,
                value,
                index,
                delete_count,
            } => CompiledStep::Update {
                target: target.clone(),
                operation: operation.clone(),
                value: value.as_ref().map(|v| self.lower_expr(v, tcx)),
                index: index.as_ref().map(|i| self.lower_expr(i, tcx)),
                delete_count: delete_count.as_ref().map(|d| self.lower_expr(d, tcx)),
            },
            ActionStep::SetPath {
                target,
                path,
                value,
            } => CompiledStep::SetPath {
                target: target.clone(),
                path: path.clone(),
                value: self.lower_expr(value, tcx),
            },
            ActionStep::Fetch {
                url,
                method,
                body,
                headers,
                target,
                on_success,
                on_error,
            } => CompiledStep::Fetch {
                url: self.lower_expr(url, tcx),
                method: method.clone(),
                body: body.as_ref().map(|b| self.lower_expr(b, tcx)),
                headers: headers
                    .iter()
                    .map(|(k, v)| (k.clone(), self.lower_expr(v, tcx)))
                    .collect(),
                target: target.clone(),
                on_success: self.lower_steps(on_success, tcx),
                on_error: self.lower_steps(on_error, tcx),
            },
            ActionStep::Storage {
                operation,
                storage,
                key,
                value,
                target,
            } => CompiledStep::Storage {
                operation: operation.clone(),
                storage: storage.clone(),
                key: self.lower_expr(key, tcx),
                value: value.as_ref().map(|v| self.lower_expr(v, tcx)),
                target: target.clone(),
            },
            ActionStep::Clipboard {
                operation,
                value,
                target,
            } => CompiledStep::Clipboard {
                operation: operation.clone(),
                value: value.as_ref().map(|v| self.lower_expr(v, tcx)),
                target: target.clone(),
            },
            ActionStep::Navigate { to, target } => CompiledStep::Navigate {
                to: self.lower_expr(to, tcx),
                target: target.clone(),
            },
            ActionStep::Import {
                name,
                on_success,
                on_error,
            } => CompiledStep::Import {
                name: name.clone(),
                on_success: self.lower_steps(on_success, tcx),
                on_error: self.lower_steps(on_error, tcx),
            },
            ActionStep::Call { action, payload } => CompiledStep::Call {
                action: action.clone(),
                payload: payload.as_ref().map(|p| self.lower_expr(p, tcx)),
            },
            ActionStep::Subscribe { action, topic } => CompiledStep::Subscribe {
                action: action.clone(),
                topic: topic.as_ref().map(|t| self.lower_expr(t, tcx)),
            },
            ActionStep::Dispose { target } => CompiledStep::Dispose {
                target: target.clone(),
            },
            ActionStep::Dom {
                ref_name,
                method,
                args,
            } => CompiledStep::Dom {
                ref_name: ref_name.clone(),
                method: method.clone(),
                args: args.iter().map(|a| self.lower_expr(a, tcx)).collect(),
            },
            ActionStep::If {
                condition,
                then,
                otherwise,
            } => CompiledStep::If {
                condition: self.lower_expr(condition, tcx),
                then: self.lower_steps(then, tcx),
                otherwise: self.lower_steps(otherwise, tcx),
            },
            ActionStep::Send { value, channel } => CompiledStep::Send {
                value: self.lower_expr(value, tcx),
                channel: channel.clone(),
            },
            ActionStep::Close { channel } => CompiledStep::Close {
                channel: channel.clone(),
            },
            ActionStep::Delay { ms, id, then } => CompiledStep::Delay {
                ms: self.lower_expr(ms, tcx),
                id: id.clone(),
                then: self.lower_steps(then, tcx),
            },
            ActionStep::Interval { ms, id, then } => CompiledStep::Interval {
                ms: self.lower_expr(ms, tcx),
                id: id.clone(),
                then: self.lower_steps(then, tcx),
            },
            ActionStep::ClearTimer { id } => CompiledStep::ClearTimer { id: id.clone() },
            ActionStep::Focus { ref_name } => CompiledStep::Focus {
                ref_name: ref_name.clone(),
            },
            ActionStep::Generate {
                target,
                prompt,
                on_success,
                on_error,
            } => CompiledStep::Generate {
                target: target.clone(),
                prompt: prompt.as_ref().map(|p| self.lower_expr(p, tcx)),
                on_success: self.lower_steps(on_success, tcx),
                on_error: self.lower_steps(on_error, tcx),
            },
            ActionStep::SseConnect { url, id, action } => CompiledStep::SseConnect {
                url: self.lower_expr(url, tcx),
                id: id.clone(),
                action: action.clone(),
            },
            ActionStep::SseClose { id } => CompiledStep::SseClose { id: id.clone() },
            ActionStep::Optimistic {
                target,
                value,
                on_error,
            } => CompiledStep::Optimistic {
                target: target.clone(),
                value: self.lower_expr(value, tcx),
                on_error: self.lower_steps(on_error, tcx),
            },
            ActionStep::Confirm {
                message,
                then,
                otherwise,
            } => CompiledStep::Confirm {
                message: self.lower_expr(message, tcx),
                then: self.lower_steps(then, tcx),
                otherwise: self.lower_steps(otherwise, tcx),
            },
            ActionStep::Reject { message } => CompiledStep::Reject {
                message: message.as_ref().map(|m| self.lower_expr(m, tcx)),
            },
            ActionStep::Bind { target, ref_name } => CompiledStep::Bind {
                target: target.clone(),
                ref_name: ref_name.clone(),
            },
            ActionStep::Unbind { target } => CompiledStep::Unbind {
                target: target.clone(),
            },
        }
    }
}

/// Collapse a slot against the current invocation's children: nothing
/// supplied becomes an empty text node, exactly one child passes through
/// untouched, several get a synthetic span wrapper.
fn slot_replacement(tcx: &TransformContext) -> CompiledNode {
    match tcx.children.len() {
        0 => CompiledNode::Text {
            value: CompiledExpression::Lit {
                value: Json::String(String::new()),
            },
        },
        1 => tcx.children[0].clone(),
        _ => CompiledNode::Element {
            tag: "span".to_string(),
            ref_name: None,
            props: IndexMap::new(),
            children: tcx.children.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn program(value: serde_json::Value) -> Program {
        serde_json::from_value(value).unwrap()
    }

    fn empty_program() -> Program {
        program(json!({
            "version": "1.0",
            "view": {"kind": "element", "tag": "div"}
        }))
    }

    #[test]
    fn data_lowers_to_import() {
        let p = empty_program();
        let lowerer = Lowerer { program: &p };
        let expr: Expression =
            serde_json::from_value(json!({"expr": "data", "name": "posts", "path": "items"}))
                .unwrap();
        let lowered = lowerer.lower_expr(&expr, &TransformContext::default());
        assert_eq!(
            serde_json::to_value(&lowered).unwrap(),
            json!({"expr": "import", "name": "posts", "path": "items"})
        );
    }

    #[test]
    fn param_path_splices_onto_var() {
        let p = empty_program();
        let lowerer = Lowerer { program: &p };
        let mut tcx = TransformContext::default();
        tcx.params.insert(
            "user".to_string(),
            CompiledPropValue::Expr(CompiledExpression::Var {
                name: "row".to_string(),
                path: Some("author".to_string()),
            }),
        );
        let expr: Expression =
            serde_json::from_value(json!({"expr": "param", "name": "user", "path": "name"}))
                .unwrap();
        let lowered = lowerer.lower_expr(&expr, &tcx);
        assert_eq!(
            lowered,
            CompiledExpression::Var {
                name: "row".to_string(),
                path: Some("author.name".to_string()),
            }
        );
    }

    #[test]
    fn param_path_converts_state_ref_to_var() {
        let p = empty_program();
        let lowerer = Lowerer { program: &p };
        let mut tcx = TransformContext::default();
        tcx.params.insert(
            "item".to_string(),
            CompiledPropValue::Expr(CompiledExpression::State {
                name: "selected".to_string(),
            }),
        );
        let expr: Expression =
            serde_json::from_value(json!({"expr": "param", "name": "item", "path": "title"}))
                .unwrap();
        let lowered = lowerer.lower_expr(&expr, &tcx);
        assert_eq!(
            lowered,
            CompiledExpression::Var {
                name: "selected".to_string(),
                path: Some("title".to_string()),
            }
        );
    }

    #[test]
    fn unbound_param_survives_as_sentinel() {
        let p = empty_program();
        let lowerer = Lowerer { program: &p };
        let expr: Expression =
            serde_json::from_value(json!({"expr": "param", "name": "ghost"})).unwrap();
        let lowered = lowerer.lower_expr(&expr, &TransformContext::default());
        assert!(matches!(lowered, CompiledExpression::Param { .. }));
    }

    #[test]
    fn slot_collapse_rules() {
        let none = TransformContext::default();
        assert!(matches!(
            slot_replacement(&none),
            CompiledNode::Text { .. }
        ));

        let one = TransformContext {
            children: vec![CompiledNode::Text {
                value: CompiledExpression::Lit { value: json!("x") },
            }],
            ..TransformContext::default()
        };
        assert!(matches!(slot_replacement(&one), CompiledNode::Text { .. }));

        let many = TransformContext {
            children: vec![
                CompiledNode::Text {
                    value: CompiledExpression::Lit { value: json!("a") },
                },
                CompiledNode::Text {
                    value: CompiledExpression::Lit { value: json!("b") },
                },
            ],
            ..TransformContext::default()
        };
        match slot_replacement(&many) {
            CompiledNode::Element { tag, children, .. } => {
                assert_eq!(tag, "span");
                assert_eq!(children.len(), 2);
            }
            other => panic!("expected span wrapper, got {:?}", other),
        }
    }

    #[test]
    fn component_with_local_state_gets_wrapper() {
        let p = program(json!({
            "version": "1.0",
            "view": {"kind": "component", "name": "Counter"},
            "components": {
                "Counter": {
                    "localState": {"n": {"type": "number", "initial": 0}},
                    "localActions": [{"name": "bump", "steps": [
                        {"do": "update", "target": "n", "operation": "increment"}
                    ]}],
                    "view": {"kind": "text", "value": {"expr": "state", "name": "n"}}
                }
            }
        }));
        let compiled = transform_program(&p, None);
        match compiled.view {
            CompiledNode::LocalState {
                state,
                actions,
                child,
            } => {
                assert!(state.contains_key("n"));
                assert!(actions.contains_key("bump"));
                assert!(matches!(*child, CompiledNode::Text { .. }));
            }
            other => panic!("expected localState wrapper, got {:?}", other),
        }
    }

    #[test]
    fn empty_import_data_is_normalized_away() {
        let p = empty_program();
        let compiled = transform_program(&p, Some(IndexMap::new()));
        assert!(compiled.import_data.is_none());

        let mut data = IndexMap::new();
        data.insert("posts".to_string(), json!([1, 2]));
        let compiled = transform_program(&p, Some(data));
        assert!(compiled.import_data.is_some());
    }
}
