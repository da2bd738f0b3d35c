//! Action-step validation.
//!
//! Every step validates its own typed fields, then recurses into nested
//! callback lists (`onSuccess`/`onError`/`then`/`else`). Violations are
//! accumulated across the whole tree; validation never stops early.
//!
//! Expressions inside steps run under `VarTrust::RuntimeOpaque`: variable
//! references there are runtime-injected (event payloads, fetch responses,
//! loop context) and cannot be checked statically.

use crate::ast::{ActionStep, Expression, StateType};
use crate::context::AnalysisContext;
use crate::error::{self, suggest_name, ConstelaError};
use crate::expr_check::{check_expr, Scope, VarTrust};

const STORAGE_OPERATIONS: [&str; 3] = ["get", "set", "remove"];
const STORAGE_KINDS: [&str; 2] = ["local", "session"];
const CLIPBOARD_OPERATIONS: [&str; 2] = ["read", "write"];
const NAVIGATE_TARGETS: [&str; 2] = ["_self", "_blank"];

pub fn check_step(
    step: &ActionStep,
    path: &str,
    ctx: &AnalysisContext,
    scope: &Scope,
    errors: &mut Vec<ConstelaError>,
) {
    match step {
        ActionStep::Set { target, value } => {
            check_state_target(target, path, ctx, scope, errors);
            check_value(value, &format!("{}/value", path), ctx, scope, errors);
        }

        ActionStep::Update {
            target,
            operation,
            value,
            index,
            delete_count,
        } => {
            check_state_target(target, path, ctx, scope, errors);
            check_update_operation(target, operation, path, ctx, scope, errors);
            check_update_fields(operation, value, index, delete_count, path, errors);
            if let Some(v) = value {
                check_value(v, &format!("{}/value", path), ctx, scope, errors);
            }
            if let Some(i) = index {
                check_value(i, &format!("{}/index", path), ctx, scope, errors);
            }
            if let Some(d) = delete_count {
                check_value(d, &format!("{}/deleteCount", path), ctx, scope, errors);
            }
        }

        ActionStep::SetPath { target, value, .. } => {
            check_state_target(target, path, ctx, scope, errors);
            check_value(value, &format!("{}/value", path), ctx, scope, errors);
        }

        ActionStep::Fetch {
            url,
            body,
            headers,
            target,
            on_success,
            on_error,
            ..
        } => {
            check_value(url, &format!("{}/url", path), ctx, scope, errors);
            if let Some(b) = body {
                check_value(b, &format!("{}/body", path), ctx, scope, errors);
            }
            for (name, header) in headers {
                check_value(header, &format!("{}/headers/{}", path, name), ctx, scope, errors);
            }
            if let Some(t) = target {
                check_state_target(t, path, ctx, scope, errors);
            }
            check_steps(on_success, &format!("{}/onSuccess", path), ctx, scope, errors);
            check_steps(on_error, &format!("{}/onError", path), ctx, scope, errors);
        }

        ActionStep::Storage {
            operation,
            storage,
            key,
            value,
            target,
        } => {
            if !STORAGE_OPERATIONS.contains(&operation.as_str()) {
                errors.push(ConstelaError::new(
                    error::INVALID_STORAGE_OPERATION,
                    format!("Invalid storage operation '{}'.", operation),
                    format!("{}/operation", path),
                ));
            }
            if !STORAGE_KINDS.contains(&storage.as_str()) {
                errors.push(ConstelaError::new(
                    error::INVALID_STORAGE_TYPE,
                    format!("Invalid storage type '{}'.", storage),
                    format!("{}/storage", path),
                ));
            }
            if operation == "set" && value.is_none() {
                errors.push(ConstelaError::new(
                    error::STORAGE_SET_MISSING_VALUE,
                    "Storage 'set' requires a value.",
                    path,
                ));
            }
            check_value(key, &format!("{}/key", path), ctx, scope, errors);
            if let Some(v) = value {
                check_value(v, &format!("{}/value", path), ctx, scope, errors);
            }
            if let Some(t) = target {
                check_state_target(t, path, ctx, scope, errors);
            }
        }

        ActionStep::Clipboard {
            operation,
            value,
            target,
        } => {
            if !CLIPBOARD_OPERATIONS.contains(&operation.as_str()) {
                errors.push(ConstelaError::new(
                    error::INVALID_CLIPBOARD_OPERATION,
                    format!("Invalid clipboard operation '{}'.", operation),
                    format!("{}/operation", path),
                ));
            }
            if operation == "write" && value.is_none() {
                errors.push(ConstelaError::new(
                    error::CLIPBOARD_WRITE_MISSING_VALUE,
                    "Clipboard 'write' requires a value.",
                    path,
                ));
            }
            if let Some(v) = value {
                check_value(v, &format!("{}/value", path), ctx, scope, errors);
            }
            if let Some(t) = target {
                check_state_target(t, path, ctx, scope, errors);
            }
        }

        ActionStep::Navigate { to, target } => {
            check_value(to, &format!("{}/to", path), ctx, scope, errors);
            if let Some(t) = target {
                if !NAVIGATE_TARGETS.contains(&t.as_str()) {
                    errors.push(ConstelaError::new(
                        error::INVALID_NAVIGATE_TARGET,
                        format!("Invalid navigate target '{}'.", t),
                        format!("{}/target", path),
                    ));
                }
            }
        }

        ActionStep::Import {
            on_success,
            on_error,
            ..
        } => {
            check_steps(on_success, &format!("{}/onSuccess", path), ctx, scope, errors);
            check_steps(on_error, &format!("{}/onError", path), ctx, scope, errors);
        }

        ActionStep::Call { action, payload } => {
            check_action_ref(action, &format!("{}/action", path), ctx, scope, errors);
            if let Some(p) = payload {
                check_value(p, &format!("{}/payload", path), ctx, scope, errors);
            }
        }

        ActionStep::Subscribe { action, topic } => {
            check_action_ref(action, &format!("{}/action", path), ctx, scope, errors);
            if let Some(t) = topic {
                check_value(t, &format!("{}/topic", path), ctx, scope, errors);
            }
        }

        ActionStep::Dispose { .. } => {}

        ActionStep::Dom { ref_name, args, .. } => {
            if !ctx.ref_names.contains(ref_name) {
                errors.push(
                    ConstelaError::new(
                        error::UNDEFINED_REF,
                        format!("Unknown ref '{}'.", ref_name),
                        format!("{}/ref", path),
                    )
                    .with_suggestion(suggest_name(
                        ref_name,
                        ctx.ref_names.iter().map(String::as_str),
                    )),
                );
            }
            for (i, arg) in args.iter().enumerate() {
                check_value(arg, &format!("{}/args/{}", path, i), ctx, scope, errors);
            }
        }

        ActionStep::If {
            condition,
            then,
            otherwise,
        } => {
            check_value(condition, &format!("{}/condition", path), ctx, scope, errors);
            check_steps(then, &format!("{}/then", path), ctx, scope, errors);
            check_steps(otherwise, &format!("{}/else", path), ctx, scope, errors);
        }

        ActionStep::Send { value, .. } => {
            check_value(value, &format!("{}/value", path), ctx, scope, errors);
        }

        ActionStep::Close { .. } => {}

        ActionStep::Delay { ms, then, .. } | ActionStep::Interval { ms, then, .. } => {
            check_value(ms, &format!("{}/ms", path), ctx, scope, errors);
            check_steps(then, &format!("{}/then", path), ctx, scope, errors);
        }

        ActionStep::ClearTimer { .. } => {}

        ActionStep::Focus { ref_name } => {
            if !ctx.ref_names.contains(ref_name) {
                errors.push(
                    ConstelaError::new(
                        error::UNDEFINED_REF,
                        format!("Unknown ref '{}'.", ref_name),
                        format!("{}/ref", path),
                    )
                    .with_suggestion(suggest_name(
                        ref_name,
                        ctx.ref_names.iter().map(String::as_str),
                    )),
                );
            }
        }

        ActionStep::Generate {
            target,
            prompt,
            on_success,
            on_error,
        } => {
            check_state_target(target, path, ctx, scope, errors);
            if let Some(p) = prompt {
                check_value(p, &format!("{}/prompt", path), ctx, scope, errors);
            }
            check_steps(on_success, &format!("{}/onSuccess", path), ctx, scope, errors);
            check_steps(on_error, &format!("{}/onError", path), ctx, scope, errors);
        }

        ActionStep::SseConnect { url, action, .. } => {
            check_value(url, &format!("{}/url", path), ctx, scope, errors);
            if let Some(a) = action {
                check_action_ref(a, &format!("{}/action", path), ctx, scope, errors);
            }
        }

        ActionStep::SseClose { .. } => {}

        ActionStep::Optimistic {
            target,
            value,
            on_error,
        } => {
            check_state_target(target, path, ctx, scope, errors);
            check_value(value, &format!("{}/value", path), ctx, scope, errors);
            check_steps(on_error, &format!("{}/onError", path), ctx, scope, errors);
        }

        ActionStep::Confirm {
            message,
            then,
            otherwise,
        } => {
            check_value(message, &format!("{}/message", path), ctx, scope, errors);
            check_steps(then, &format!("{}/then", path), ctx, scope, errors);
            check_steps(otherwise, &format!("{}/else", path), ctx, scope, errors);
        }

        ActionStep::Reject { message } => {
            if let Some(m) = message {
                check_value(m, &format!("{}/message", path), ctx, scope, errors);
            }
        }

        ActionStep::Bind { target, ref_name } => {
            check_state_target(target, path, ctx, scope, errors);
            if !ctx.ref_names.contains(ref_name) {
                errors.push(
                    ConstelaError::new(
                        error::UNDEFINED_REF,
                        format!("Unknown ref '{}'.", ref_name),
                        format!("{}/ref", path),
                    )
                    .with_suggestion(suggest_name(
                        ref_name,
                        ctx.ref_names.iter().map(String::as_str),
                    )),
                );
            }
        }

        ActionStep::Unbind { .. } => {}
    }
}

pub fn check_steps(
    steps: &[ActionStep],
    path: &str,
    ctx: &AnalysisContext,
    scope: &Scope,
    errors: &mut Vec<ConstelaError>,
) {
    for (i, step) in steps.iter().enumerate() {
        check_step(step, &format!("{}/{}", path, i), ctx, scope, errors);
    }
}

fn check_value(
    expr: &Expression,
    path: &str,
    ctx: &AnalysisContext,
    scope: &Scope,
    errors: &mut Vec<ConstelaError>,
) {
    check_expr(expr, path, ctx, VarTrust::RuntimeOpaque, scope, errors);
}

fn check_state_target(
    target: &str,
    path: &str,
    ctx: &AnalysisContext,
    scope: &Scope,
    errors: &mut Vec<ConstelaError>,
) {
    if !ctx.state_names.contains(target) && !scope.knows_state(target) {
        let candidates = ctx
            .state_names
            .iter()
            .map(String::as_str)
            .chain(scope.local_state.keys().map(String::as_str));
        errors.push(
            ConstelaError::new(
                error::UNDEFINED_STATE,
                format!("Unknown state '{}'.", target),
                format!("{}/target", path),
            )
            .with_suggestion(suggest_name(target, candidates)),
        );
    }
}

fn check_action_ref(
    action: &str,
    path: &str,
    ctx: &AnalysisContext,
    scope: &Scope,
    errors: &mut Vec<ConstelaError>,
) {
    if !ctx.has_action(action) && !scope.knows_action(action) {
        let candidates = ctx
            .action_names
            .iter()
            .map(String::as_str)
            .chain(scope.local_actions.iter().map(String::as_str));
        errors.push(
            ConstelaError::new(
                error::UNDEFINED_ACTION,
                format!("Unknown action '{}'.", action),
                path,
            )
            .with_suggestion(suggest_name(action, candidates)),
        );
    }
}

fn check_update_operation(
    target: &str,
    operation: &str,
    path: &str,
    ctx: &AnalysisContext,
    scope: &Scope,
    errors: &mut Vec<ConstelaError>,
) {
    let required = match operation {
        "toggle" => Some(StateType::Boolean),
        "merge" => Some(StateType::Object),
        "increment" | "decrement" => Some(StateType::Number),
        "push" | "pop" | "remove" | "replaceAt" | "insertAt" | "splice" => Some(StateType::List),
        _ => None,
    };
    let Some(required) = required else { return };

    let actual = ctx
        .state_types
        .get(target)
        .or_else(|| scope.local_state.get(target));
    if let Some(actual) = actual {
        if *actual != required {
            errors.push(
                ConstelaError::new(
                    error::OPERATION_INVALID_FOR_TYPE,
                    format!(
                        "Operation '{}' requires {} state, but '{}' is {}.",
                        operation,
                        required.label(),
                        target,
                        actual.label()
                    ),
                    format!("{}/operation", path),
                )
                .with_context(target.to_string()),
            );
        }
    }
}

fn check_update_fields(
    operation: &str,
    value: &Option<Expression>,
    index: &Option<Expression>,
    delete_count: &Option<Expression>,
    path: &str,
    errors: &mut Vec<ConstelaError>,
) {
    let required: &[(&str, bool)] = match operation {
        "merge" => &[("value", true)],
        "replaceAt" | "insertAt" => &[("index", true), ("value", true)],
        "splice" => &[("index", true), ("deleteCount", true)],
        _ => &[],
    };
    for (field, _) in required {
        let present = match *field {
            "value" => value.is_some(),
            "index" => index.is_some(),
            "deleteCount" => delete_count.is_some(),
            _ => true,
        };
        if !present {
            errors.push(
                ConstelaError::new(
                    error::OPERATION_MISSING_FIELD,
                    format!("Operation '{}' requires field '{}'.", operation, field),
                    path,
                )
                .with_context(field.to_string()),
            );
        }
    }
}
