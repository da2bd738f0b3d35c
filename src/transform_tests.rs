#[cfg(test)]
mod tests {
    use crate::ast::Program;
    use crate::ir::{CompiledExpression, CompiledNode, CompiledPropValue};
    use crate::transform::transform_program;
    use serde_json::json;

    fn program(value: serde_json::Value) -> Program {
        serde_json::from_value(value).unwrap()
    }

    fn compile(value: serde_json::Value) -> serde_json::Value {
        serde_json::to_value(transform_program(&program(value), None)).unwrap()
    }

    #[test]
    fn pure_subtrees_lower_isomorphically() {
        // No param or component references: the lowered tree serializes to
        // exactly the input shape.
        let expr = json!({
            "expr": "cond",
            "if": {"expr": "bin", "op": ">",
                   "left": {"expr": "state", "name": "count"},
                   "right": {"expr": "lit", "value": 10}},
            "then": {"expr": "lit", "value": "many"},
            "else": {"expr": "concat", "parts": [
                {"expr": "lit", "value": "only "},
                {"expr": "state", "name": "count"}
            ]}
        });
        let compiled = compile(json!({
            "version": "1.0",
            "state": {"count": {"type": "number", "initial": 0}},
            "view": {"kind": "text", "value": expr}
        }));
        assert_eq!(compiled["view"]["value"], expr);
    }

    #[test]
    fn state_initials_round_trip() {
        let compiled = compile(json!({
            "version": "1.0",
            "state": {
                "title": {"type": "string", "initial": "hello"},
                "tags": {"type": "list", "initial": ["a", "b"]},
                "meta": {"type": "object", "initial": {"nested": {"deep": true}}}
            },
            "view": {"kind": "element", "tag": "div"}
        }));
        assert_eq!(compiled["state"]["title"]["initial"], json!("hello"));
        assert_eq!(compiled["state"]["tags"]["initial"], json!(["a", "b"]));
        assert_eq!(
            compiled["state"]["meta"]["initial"],
            json!({"nested": {"deep": true}})
        );
    }

    #[test]
    fn invocation_is_inlined_with_caller_context_props() {
        // The param is bound to the caller's loop variable; the inlined body
        // must reference that variable, and no component node may survive.
        let compiled = compile(json!({
            "version": "1.0",
            "state": {"users": {"type": "list", "initial": []}},
            "view": {"kind": "each",
                     "items": {"expr": "state", "name": "users"},
                     "as": "user",
                     "body": {"kind": "component", "name": "Badge", "props": {
                         "who": {"expr": "var", "name": "user", "path": "name"}
                     }}},
            "components": {
                "Badge": {
                    "params": {"who": {"type": "string"}},
                    "view": {"kind": "element", "tag": "b", "children": [
                        {"kind": "text", "value": {"expr": "param", "name": "who"}}
                    ]}
                }
            }
        }));
        let body = &compiled["view"]["body"];
        assert_eq!(body["kind"], "element");
        assert_eq!(body["tag"], "b");
        assert_eq!(
            body["children"][0]["value"],
            json!({"expr": "var", "name": "user", "path": "name"})
        );
    }

    #[test]
    fn param_with_path_splices_through_inlining() {
        let compiled = compile(json!({
            "version": "1.0",
            "state": {"rows": {"type": "list", "initial": []}},
            "view": {"kind": "each",
                     "items": {"expr": "state", "name": "rows"},
                     "as": "row",
                     "body": {"kind": "component", "name": "Cell", "props": {
                         "item": {"expr": "var", "name": "row", "path": "data"}
                     }}},
            "components": {
                "Cell": {
                    "params": {"item": {"type": "object"}},
                    "view": {"kind": "text",
                             "value": {"expr": "param", "name": "item", "path": "label"}}
                }
            }
        }));
        assert_eq!(
            compiled["view"]["body"]["value"],
            json!({"expr": "var", "name": "row", "path": "data.label"})
        );
    }

    #[test]
    fn defaults_apply_when_prop_omitted_and_caller_overrides_when_present() {
        let source = |props: serde_json::Value| {
            json!({
                "version": "1.0",
                "view": {"kind": "component", "name": "Tag", "props": props},
                "components": {
                    "Tag": {
                        "params": {"text": {"type": "string", "required": false,
                                            "default": {"expr": "lit", "value": "fallback"}}},
                        "view": {"kind": "text", "value": {"expr": "param", "name": "text"}}
                    }
                }
            })
        };
        let compiled = compile(source(json!({})));
        assert_eq!(compiled["view"]["value"], json!({"expr": "lit", "value": "fallback"}));

        let compiled = compile(source(json!({"text": {"expr": "lit", "value": "given"}})));
        assert_eq!(compiled["view"]["value"], json!({"expr": "lit", "value": "given"}));
    }

    #[test]
    fn slot_collapse_through_invocations() {
        let source = |children: serde_json::Value| {
            json!({
                "version": "1.0",
                "view": {"kind": "component", "name": "Box", "children": children},
                "components": {
                    "Box": {"view": {"kind": "element", "tag": "div",
                                     "children": [{"kind": "slot"}]}}
                }
            })
        };

        let compiled = compile(source(json!([])));
        assert_eq!(
            compiled["view"]["children"][0],
            json!({"kind": "text", "value": {"expr": "lit", "value": ""}})
        );

        let compiled = compile(source(json!([
            {"kind": "text", "value": {"expr": "lit", "value": "only"}}
        ])));
        assert_eq!(compiled["view"]["children"][0]["kind"], "text");

        let compiled = compile(source(json!([
            {"kind": "text", "value": {"expr": "lit", "value": "a"}},
            {"kind": "text", "value": {"expr": "lit", "value": "b"}}
        ])));
        assert_eq!(compiled["view"]["children"][0]["kind"], "element");
        assert_eq!(compiled["view"]["children"][0]["tag"], "span");
        assert_eq!(
            compiled["view"]["children"][0]["children"].as_array().unwrap().len(),
            2
        );
    }

    #[test]
    fn data_expressions_become_imports_everywhere() {
        let compiled = compile(json!({
            "version": "1.0",
            "data": {"posts": {"source": "content/posts"}},
            "view": {"kind": "text",
                     "value": {"expr": "data", "name": "posts", "path": "0.title"}}
        }));
        assert_eq!(compiled["view"]["value"]["expr"], "import");
    }

    #[test]
    fn route_lowering_reextracts_params() {
        let compiled = compile(json!({
            "version": "1.0",
            "route": {"path": "/posts/:id/:slug",
                      "title": {"expr": "route", "param": "slug"}},
            "view": {"kind": "element", "tag": "article"}
        }));
        assert_eq!(compiled["route"]["params"], json!(["id", "slug"]));
        assert_eq!(compiled["route"]["title"]["expr"], "route");
    }

    #[test]
    fn nested_components_inline_recursively() {
        let p = program(json!({
            "version": "1.0",
            "view": {"kind": "component", "name": "Outer"},
            "components": {
                "Outer": {"view": {"kind": "component", "name": "Inner", "children": [
                    {"kind": "element", "tag": "p"}
                ]}},
                "Inner": {
                    "localState": {"open": {"type": "boolean", "initial": true}},
                    "view": {"kind": "element", "tag": "section",
                             "children": [{"kind": "slot"}]}
                }
            }
        }));
        let compiled = transform_program(&p, None);
        // Outer collapses to Inner's expansion, wrapped for Inner's state.
        let CompiledNode::LocalState { child, .. } = compiled.view else {
            panic!("expected localState wrapper");
        };
        let CompiledNode::Element { tag, children, .. } = *child else {
            panic!("expected section element");
        };
        assert_eq!(tag, "section");
        assert!(matches!(
            children[0],
            CompiledNode::Element { ref tag, .. } if tag == "p"
        ));
    }

    #[test]
    fn handler_bound_param_in_expression_position_is_null() {
        let compiled = compile(json!({
            "version": "1.0",
            "actions": [{"name": "go", "steps": []}],
            "view": {"kind": "component", "name": "Widget", "props": {
                "onGo": {"event": "click", "action": "go"}
            }},
            "components": {
                "Widget": {
                    "params": {"onGo": {"type": "handler"}},
                    "view": {"kind": "text", "value": {"expr": "param", "name": "onGo"}}
                }
            }
        }));
        assert_eq!(compiled["view"]["value"], json!({"expr": "lit", "value": null}));
    }

    #[test]
    fn handler_props_lower_with_payloads() {
        let p = program(json!({
            "version": "1.0",
            "state": {"q": {"type": "string", "initial": ""}},
            "actions": [{"name": "search", "steps": []}],
            "view": {"kind": "element", "tag": "input", "props": {
                "onInput": {"event": "input", "action": "search",
                            "payload": {"expr": "var", "name": "event", "path": "target.value"}}
            }}
        }));
        let compiled = transform_program(&p, None);
        let CompiledNode::Element { props, .. } = compiled.view else {
            panic!("expected element");
        };
        match &props["onInput"] {
            CompiledPropValue::Handler(h) => {
                assert_eq!(h.action, "search");
                assert!(matches!(
                    h.payload,
                    Some(CompiledExpression::Var { .. })
                ));
            }
            other => panic!("expected handler, got {:?}", other),
        }
    }
}
