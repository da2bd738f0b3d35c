//! Server-side HTML rendering of a compiled program.
//!
//! Consumes the IR and the shared expression evaluator; never mutates
//! state during a render. Interactive behavior (handlers, portals,
//! islands, suspense) degrades to static markup; the client runtime
//! hydrates it later.

use std::collections::HashSet;

use lazy_static::lazy_static;

use crate::eval::{evaluate, SsrContext};
use crate::ir::{CompiledNode, CompiledProgram, CompiledPropValue};
use crate::value::Value;

lazy_static! {
    /// Elements that never take a closing tag.
    static ref VOID_ELEMENTS: HashSet<&'static str> = [
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link",
        "meta", "param", "source", "track", "wbr",
    ]
    .into_iter()
    .collect();
}

/// Render a compiled program with a context seeded from its state initials.
pub fn render_program(program: &CompiledProgram) -> String {
    let ctx = SsrContext::from_compiled(program);
    render_node(&program.view, &ctx)
}

pub fn render_node(node: &CompiledNode, ctx: &SsrContext) -> String {
    match node {
        CompiledNode::Element {
            tag,
            props,
            children,
            ..
        } => {
            let mut html = String::new();
            html.push('<');
            html.push_str(tag);
            for (name, value) in props {
                render_attr(&mut html, name, value, ctx);
            }
            if VOID_ELEMENTS.contains(tag.as_str()) {
                html.push_str(" />");
                return html;
            }
            html.push('>');
            for child in children {
                html.push_str(&render_node(child, ctx));
            }
            html.push_str("</");
            html.push_str(tag);
            html.push('>');
            html
        }

        CompiledNode::Text { value } => escape_html(&evaluate(value, ctx).render_string()),

        CompiledNode::If {
            condition,
            then,
            otherwise,
        } => {
            if evaluate(condition, ctx).truthy() {
                render_node(then, ctx)
            } else if let Some(alt) = otherwise {
                render_node(alt, ctx)
            } else {
                // Placeholder so the client runtime can find the branch
                // point when hydrating.
                "<!--if:none-->".to_string()
            }
        }

        CompiledNode::Each {
            items,
            binding,
            index,
            body,
            ..
        } => {
            let Value::Array(values) = evaluate(items, ctx) else {
                return String::new();
            };
            let mut html = String::new();
            for (i, item) in values.into_iter().enumerate() {
                let mut scope = ctx.with_local(binding, item);
                if let Some(idx) = index {
                    scope.locals.insert(idx.clone(), Value::Number(i as f64));
                }
                html.push_str(&render_node(body, &scope));
            }
            html
        }

        CompiledNode::LocalState { state, child, .. } => {
            // Local state renders at its initial values; actions only run
            // client-side. Seeded into the state map so `state` references
            // inside the subtree resolve, shadowing any outer name.
            let mut scope = ctx.clone();
            for (name, field) in state {
                scope
                    .state
                    .insert(name.clone(), Value::from_json(&field.initial));
            }
            render_node(child, &scope)
        }

        CompiledNode::Markdown { content } => {
            escape_html(&evaluate(content, ctx).render_string())
        }

        CompiledNode::Code { content, language } => {
            let class = language
                .as_ref()
                .map(|l| format!(" class=\"language-{}\"", escape_html(l)))
                .unwrap_or_default();
            format!(
                "<pre><code{}>{}</code></pre>",
                class,
                escape_html(&evaluate(content, ctx).render_string())
            )
        }

        CompiledNode::Portal { children, .. }
        | CompiledNode::Island { children }
        | CompiledNode::Suspense { children, .. }
        | CompiledNode::ErrorBoundary { children, .. } => children
            .iter()
            .map(|child| render_node(child, ctx))
            .collect(),
    }
}

fn render_attr(html: &mut String, name: &str, value: &CompiledPropValue, ctx: &SsrContext) {
    let expr = match value {
        // Handlers are client-side only.
        CompiledPropValue::Handler(_) => return,
        CompiledPropValue::Expr(expr) => expr,
    };
    match evaluate(expr, ctx) {
        // false/null/undefined omit the attribute, true renders it bare.
        Value::Bool(false) | Value::Null | Value::Undefined => {}
        Value::Bool(true) => {
            html.push(' ');
            html.push_str(name);
        }
        other => {
            html.push(' ');
            html.push_str(name);
            html.push_str("=\"");
            html.push_str(&escape_html(&other.js_string()));
            html.push('"');
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
