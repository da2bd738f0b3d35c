//! Program analysis: the validation stage of the pipeline.
//!
//! Runs every validator over a structurally-sound `Program` and returns
//! either the analysis context (for the lowering stage) or the complete
//! list of violations. Nothing in this stage mutates the program.

use std::collections::HashSet;

use crate::ast::{Program, PropValue};
use crate::context::{collect_context, AnalysisContext};
use crate::error::{self, suggest_name, ConstelaError};
use crate::expr_check::{check_expr, Scope, VarTrust};
use crate::graph::check_component_cycles;
use crate::step_check::check_steps;
use crate::view_check::{check_node, Placement};

pub fn analyze_program(program: &Program) -> Result<AnalysisContext, Vec<ConstelaError>> {
    let ctx = collect_context(program);
    let mut errors = Vec::new();

    check_duplicate_actions(program, &mut errors);

    let top = Scope::default();
    for (i, action) in program.actions.iter().enumerate() {
        check_steps(
            &action.steps,
            &format!("/actions/{}/steps", i),
            &ctx,
            &top,
            &mut errors,
        );
    }

    check_node(
        &program.view,
        "/view",
        &ctx,
        &top,
        Placement::default(),
        &mut errors,
    );

    for (name, def) in &program.components {
        let mut scope = Scope {
            params: Some(def.params.keys().cloned().collect()),
            ..Scope::default()
        };
        for (sname, field) in &def.local_state {
            scope.local_state.insert(sname.clone(), field.field_type);
        }
        for action in &def.local_actions {
            scope.local_actions.insert(action.name.clone());
        }

        // Param defaults belong to the defining component: a default event
        // handler resolves its action against this component's localActions,
        // not against whichever caller later instantiates it.
        for (pname, pdef) in &def.params {
            if let Some(default) = &pdef.default {
                let path = format!("/components/{}/params/{}/default", name, pname);
                match default {
                    PropValue::Expr(expr) => {
                        check_expr(expr, &path, &ctx, VarTrust::Lexical, &scope, &mut errors);
                    }
                    PropValue::Handler(handler) => {
                        if !ctx.has_action(&handler.action) && !scope.knows_action(&handler.action)
                        {
                            errors.push(
                                ConstelaError::new(
                                    error::UNDEFINED_ACTION,
                                    format!("Unknown action '{}'.", handler.action),
                                    format!("{}/action", path),
                                )
                                .with_suggestion(suggest_name(
                                    &handler.action,
                                    ctx.action_names
                                        .iter()
                                        .map(String::as_str)
                                        .chain(scope.local_actions.iter().map(String::as_str)),
                                )),
                            );
                        }
                        if let Some(payload) = &handler.payload {
                            check_expr(
                                payload,
                                &format!("{}/payload", path),
                                &ctx,
                                VarTrust::RuntimeOpaque,
                                &scope,
                                &mut errors,
                            );
                        }
                    }
                }
            }
        }

        check_node(
            &def.view,
            &format!("/components/{}/view", name),
            &ctx,
            &scope,
            Placement {
                inside_component: true,
                inside_layout: false,
            },
            &mut errors,
        );

        for (i, action) in def.local_actions.iter().enumerate() {
            check_steps(
                &action.steps,
                &format!("/components/{}/localActions/{}/steps", name, i),
                &ctx,
                &scope,
                &mut errors,
            );
        }
    }

    if let Some(route) = &program.route {
        if let Some(title) = &route.title {
            check_expr(title, "/route/title", &ctx, VarTrust::Lexical, &top, &mut errors);
        }
        for (key, value) in &route.meta {
            check_expr(
                value,
                &format!("/route/meta/{}", key),
                &ctx,
                VarTrust::Lexical,
                &top,
                &mut errors,
            );
        }
        if let Some(canonical) = &route.canonical {
            check_expr(
                canonical,
                "/route/canonical",
                &ctx,
                VarTrust::Lexical,
                &top,
                &mut errors,
            );
        }
        if let Some(json_ld) = &route.json_ld {
            check_expr(
                json_ld,
                "/route/jsonLd",
                &ctx,
                VarTrust::Lexical,
                &top,
                &mut errors,
            );
        }
    }

    if let Some(lifecycle) = &program.lifecycle {
        check_steps(&lifecycle.on_load, "/lifecycle/onLoad", &ctx, &top, &mut errors);
        check_steps(&lifecycle.on_unload, "/lifecycle/onUnload", &ctx, &top, &mut errors);
    }

    check_component_cycles(program, &mut errors);

    if errors.is_empty() {
        Ok(ctx)
    } else {
        Err(errors)
    }
}

fn check_duplicate_actions(program: &Program, errors: &mut Vec<ConstelaError>) {
    let mut seen: HashSet<&str> = HashSet::new();
    for (i, action) in program.actions.iter().enumerate() {
        if !seen.insert(action.name.as_str()) {
            errors.push(
                ConstelaError::new(
                    error::DUPLICATE_ACTION,
                    format!("Action '{}' is defined more than once.", action.name),
                    format!("/actions/{}/name", i),
                )
                .with_context(action.name.clone()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn program(value: serde_json::Value) -> Program {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn duplicate_action_flags_later_occurrence() {
        let p = program(json!({
            "version": "1.0",
            "actions": [
                {"name": "inc", "steps": []},
                {"name": "dec", "steps": []},
                {"name": "inc", "steps": []}
            ],
            "view": {"kind": "element", "tag": "div"}
        }));
        let errors = analyze_program(&p).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, crate::error::DUPLICATE_ACTION);
        assert_eq!(errors[0].path, "/actions/2/name");
    }

    #[test]
    fn component_body_sees_its_locals_and_globals() {
        let p = program(json!({
            "version": "1.0",
            "actions": [{"name": "globalSave", "steps": []}],
            "view": {"kind": "component", "name": "Counter"},
            "components": {
                "Counter": {
                    "params": {"label": {"type": "string"}},
                    "localState": {"n": {"type": "number", "initial": 0}},
                    "localActions": [{"name": "bump", "steps": [
                        {"do": "update", "target": "n", "operation": "increment"}
                    ]}],
                    "view": {"kind": "element", "tag": "div", "children": [
                        {"kind": "text", "value": {"expr": "param", "name": "label"}},
                        {"kind": "text", "value": {"expr": "state", "name": "n"}},
                        {"kind": "element", "tag": "button", "props": {
                            "onClick": {"event": "click", "action": "bump"},
                            "onDblClick": {"event": "dblclick", "action": "globalSave"}
                        }}
                    ]}
                }
            }
        }));
        // Missing required prop 'label' on the invocation is the only issue.
        let errors = analyze_program(&p).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, crate::error::COMPONENT_PROP_MISSING);
    }

    #[test]
    fn param_outside_component_rejected() {
        let p = program(json!({
            "version": "1.0",
            "view": {"kind": "text", "value": {"expr": "param", "name": "x"}}
        }));
        let errors = analyze_program(&p).unwrap_err();
        assert_eq!(errors[0].code, crate::error::UNDEFINED_PARAM);
        assert_eq!(errors[0].path, "/view/value");
    }

    #[test]
    fn errors_accumulate_across_sections() {
        let p = program(json!({
            "version": "1.0",
            "state": {"count": {"type": "number", "initial": 0}},
            "actions": [{"name": "bad", "steps": [
                {"do": "set", "target": "missing", "value": {"expr": "lit", "value": 1}}
            ]}],
            "view": {"kind": "text", "value": {"expr": "state", "name": "absent"}},
            "route": {"path": "/p/:id", "title": {"expr": "route", "param": "slug"}},
            "lifecycle": {"onLoad": [
                {"do": "call", "action": "nonexistent"}
            ]}
        }));
        let errors = analyze_program(&p).unwrap_err();
        let codes: Vec<&str> = errors.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(errors.len(), 4);
        assert!(codes.contains(&crate::error::UNDEFINED_STATE));
        assert!(codes.contains(&crate::error::UNDEFINED_ROUTE_PARAM));
        assert!(codes.contains(&crate::error::UNDEFINED_ACTION));
    }

    #[test]
    fn valid_program_returns_context() {
        let p = program(json!({
            "version": "1.0",
            "state": {"todos": {"type": "list", "initial": []}},
            "actions": [{"name": "clear", "steps": [
                {"do": "set", "target": "todos", "value": {"expr": "lit", "value": []}}
            ]}],
            "view": {"kind": "each",
                     "items": {"expr": "state", "name": "todos"},
                     "as": "todo",
                     "body": {"kind": "text", "value": {"expr": "var", "name": "todo"}}}
        }));
        let ctx = analyze_program(&p).unwrap();
        assert!(ctx.state_names.contains("todos"));
    }

    #[test]
    fn cycle_surfaces_through_analysis() {
        let p = program(json!({
            "version": "1.0",
            "view": {"kind": "element", "tag": "div"},
            "components": {
                "A": {"view": {"kind": "component", "name": "B"}},
                "B": {"view": {"kind": "component", "name": "A"}}
            }
        }));
        let errors = analyze_program(&p).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.code == crate::error::COMPONENT_CYCLE));
    }
}
