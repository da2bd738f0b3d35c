#[cfg(test)]
mod tests {
    use crate::eval::{evaluate, SsrContext};
    use crate::ir::CompiledExpression;
    use crate::value::Value;
    use serde_json::json;

    fn expr(value: serde_json::Value) -> CompiledExpression {
        serde_json::from_value(value).unwrap()
    }

    fn ctx_with(state: &[(&str, serde_json::Value)]) -> SsrContext {
        let mut ctx = SsrContext::default();
        for (name, value) in state {
            ctx.state.insert(name.to_string(), Value::from_json(value));
        }
        ctx
    }

    #[test]
    fn deep_pollution_path_is_inert() {
        let ctx = ctx_with(&[("obj", json!({"a": 1}))]);
        let e = expr(json!({
            "expr": "get", "path": "__proto__.polluted",
            "base": {"expr": "state", "name": "obj"}
        }));
        assert_eq!(evaluate(&e, &ctx), Value::Undefined);
        // Context is untouched: the original key still resolves.
        let e = expr(json!({
            "expr": "get", "path": "a",
            "base": {"expr": "state", "name": "obj"}
        }));
        assert_eq!(evaluate(&e, &ctx), Value::Number(1.0));
    }

    #[test]
    fn missing_keys_degrade_instead_of_throwing() {
        let ctx = ctx_with(&[("user", json!({"name": "ada"}))]);
        let e = expr(json!({
            "expr": "get", "path": "address.city.zip",
            "base": {"expr": "state", "name": "user"}
        }));
        assert_eq!(evaluate(&e, &ctx), Value::Undefined);
    }

    #[test]
    fn filter_then_map_chains_through_lambdas() {
        let ctx = ctx_with(&[(
            "todos",
            json!([
                {"text": "a", "done": true},
                {"text": "b", "done": false},
                {"text": "c", "done": true}
            ]),
        )]);
        let e = expr(json!({
            "expr": "call", "method": "map",
            "target": {
                "expr": "call", "method": "filter",
                "target": {"expr": "state", "name": "todos"},
                "args": [{"expr": "lambda", "param": "t",
                          "body": {"expr": "var", "name": "t", "path": "done"}}]
            },
            "args": [{"expr": "lambda", "param": "t",
                      "body": {"expr": "var", "name": "t", "path": "text"}}]
        }));
        assert_eq!(
            evaluate(&e, &ctx),
            Value::Array(vec![
                Value::String("a".to_string()),
                Value::String("c".to_string())
            ])
        );
    }

    #[test]
    fn find_and_find_index() {
        let ctx = ctx_with(&[("nums", json!([5, 10, 15]))]);
        let gt_seven = json!({"expr": "lambda", "param": "n",
                              "body": {"expr": "bin", "op": ">",
                                       "left": {"expr": "var", "name": "n"},
                                       "right": {"expr": "lit", "value": 7}}});
        let e = expr(json!({
            "expr": "call", "method": "find",
            "target": {"expr": "state", "name": "nums"},
            "args": [gt_seven.clone()]
        }));
        assert_eq!(evaluate(&e, &ctx), Value::Number(10.0));

        let e = expr(json!({
            "expr": "call", "method": "findIndex",
            "target": {"expr": "state", "name": "nums"},
            "args": [gt_seven]
        }));
        assert_eq!(evaluate(&e, &ctx), Value::Number(1.0));
    }

    #[test]
    fn array_length_via_path() {
        let ctx = ctx_with(&[("items", json!(["x", "y"]))]);
        let e = expr(json!({
            "expr": "get", "path": "length",
            "base": {"expr": "state", "name": "items"}
        }));
        assert_eq!(evaluate(&e, &ctx), Value::Number(2.0));
    }

    #[test]
    fn index_expression_on_arrays_objects_and_strings() {
        let ctx = ctx_with(&[
            ("arr", json!([10, 20])),
            ("obj", json!({"k": "v"})),
            ("s", json!("abc")),
        ]);
        let index = |base: &str, idx: serde_json::Value| {
            expr(json!({
                "expr": "index",
                "base": {"expr": "state", "name": base},
                "index": {"expr": "lit", "value": idx}
            }))
        };
        assert_eq!(evaluate(&index("arr", json!(1)), &ctx), Value::Number(20.0));
        assert_eq!(
            evaluate(&index("obj", json!("k")), &ctx),
            Value::String("v".to_string())
        );
        assert_eq!(
            evaluate(&index("s", json!(1)), &ctx),
            Value::String("b".to_string())
        );
        assert_eq!(evaluate(&index("arr", json!(9)), &ctx), Value::Undefined);
    }

    #[test]
    fn concat_blanks_nullish_parts() {
        let ctx = ctx_with(&[("name", json!("world"))]);
        let e = expr(json!({
            "expr": "concat", "parts": [
                {"expr": "lit", "value": "hello "},
                {"expr": "state", "name": "name"},
                {"expr": "state", "name": "missing"}
            ]
        }));
        assert_eq!(evaluate(&e, &ctx), Value::String("hello world".to_string()));
    }

    #[test]
    fn route_and_import_lookups() {
        let mut ctx = SsrContext::default();
        ctx.route_params.insert("id".to_string(), "42".to_string());
        ctx.imports.insert(
            "site".to_string(),
            Value::from_json(&json!({"title": "Docs"})),
        );

        let e = expr(json!({"expr": "route", "param": "id"}));
        assert_eq!(evaluate(&e, &ctx), Value::String("42".to_string()));

        let e = expr(json!({"expr": "import", "name": "site", "path": "title"}));
        assert_eq!(evaluate(&e, &ctx), Value::String("Docs".to_string()));

        let e = expr(json!({"expr": "route", "param": "other"}));
        assert_eq!(evaluate(&e, &ctx), Value::Undefined);
    }

    #[test]
    fn comparison_chain_on_numbers_and_strings() {
        let ctx = SsrContext::default();
        let bin = |op: &str, l: serde_json::Value, r: serde_json::Value| {
            expr(json!({
                "expr": "bin", "op": op,
                "left": {"expr": "lit", "value": l},
                "right": {"expr": "lit", "value": r}
            }))
        };
        assert_eq!(evaluate(&bin("<", json!(1), json!(2)), &ctx), Value::Bool(true));
        assert_eq!(
            evaluate(&bin("<", json!("apple"), json!("banana")), &ctx),
            Value::Bool(true)
        );
        assert_eq!(
            evaluate(&bin(">=", json!(3), json!(3)), &ctx),
            Value::Bool(true)
        );
        // NaN comparisons are always false.
        let nan_cmp = expr(json!({
            "expr": "bin", "op": "<",
            "left": {"expr": "bin", "op": "/",
                     "left": {"expr": "lit", "value": 0},
                     "right": {"expr": "lit", "value": 0}},
            "right": {"expr": "lit", "value": 1}
        }));
        assert_eq!(evaluate(&nan_cmp, &ctx), Value::Bool(false));
    }

    #[test]
    fn loose_equality_between_null_and_missing() {
        let ctx = SsrContext::default();
        let e = expr(json!({
            "expr": "bin", "op": "==",
            "left": {"expr": "lit", "value": null},
            "right": {"expr": "state", "name": "missing"}
        }));
        assert_eq!(evaluate(&e, &ctx), Value::Bool(true));
    }

    #[test]
    fn to_fixed_formats_numbers() {
        let ctx = SsrContext::default();
        let e = expr(json!({
            "expr": "call", "method": "toFixed",
            "target": {"expr": "lit", "value": 3.14159},
            "args": [{"expr": "lit", "value": 2}]
        }));
        assert_eq!(evaluate(&e, &ctx), Value::String("3.14".to_string()));
    }

    #[test]
    fn date_instance_methods_on_epoch_millis() {
        let ctx = SsrContext::default();
        // 2024-03-01T00:00:00Z
        let ms = json!(1709251200000i64);
        let call = |method: &str| {
            expr(json!({
                "expr": "call", "method": method,
                "target": {"expr": "lit", "value": ms},
                "args": []
            }))
        };
        assert_eq!(evaluate(&call("getFullYear"), &ctx), Value::Number(2024.0));
        // Months are zero-based.
        assert_eq!(evaluate(&call("getMonth"), &ctx), Value::Number(2.0));
        assert_eq!(evaluate(&call("getDate"), &ctx), Value::Number(1.0));
        assert_eq!(
            evaluate(&call("toISOString"), &ctx),
            Value::String("2024-03-01T00:00:00.000Z".to_string())
        );
    }

    #[test]
    fn array_utility_methods() {
        let ctx = ctx_with(&[("nums", json!([3, 1, 2]))]);
        let call = |method: &str, args: serde_json::Value| {
            expr(json!({
                "expr": "call", "method": method,
                "target": {"expr": "state", "name": "nums"},
                "args": args
            }))
        };
        assert_eq!(
            evaluate(&call("join", json!([{"expr": "lit", "value": "-"}])), &ctx),
            Value::String("3-1-2".to_string())
        );
        assert_eq!(
            evaluate(&call("includes", json!([{"expr": "lit", "value": 2}])), &ctx),
            Value::Bool(true)
        );
        assert_eq!(
            evaluate(&call("indexOf", json!([{"expr": "lit", "value": 1}])), &ctx),
            Value::Number(1.0)
        );
        assert_eq!(
            evaluate(
                &call("slice", json!([{"expr": "lit", "value": -2}])),
                &ctx
            ),
            Value::Array(vec![Value::Number(1.0), Value::Number(2.0)])
        );
        assert_eq!(
            evaluate(&call("at", json!([{"expr": "lit", "value": -1}])), &ctx),
            Value::Number(2.0)
        );
    }
}
