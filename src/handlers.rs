//! Prebuilt handlers and conditions.
//!
//! Handlers that only pass data along return the previous result unchanged,
//! so they can sit anywhere in a handler chain. The mutating ones need a
//! [`TreeNodeMut`] tree.
//!
//! ```
//! use trellis::{Element, Transformation, Value};
//! use trellis::handlers::{append, get_text};
//!
//! let names: Transformation = Transformation::builder()
//!     .rule(["name"], [get_text(), append("names")])
//!     .result_object("context.names")
//!     .build()
//!     .unwrap();
//!
//! let root = Element::parse("<people><name>Ada</name><name>Grace</name></people>").unwrap();
//! assert_eq!(names.invoke(&root).unwrap(), Value::List(vec!["Ada".into(), "Grace".into()]));
//! ```

use crate::engine::{Condition, Flow, Handler};
use crate::error::Error;
use crate::node::{TreeNode, TreeNodeMut};
use crate::value::Value;
use regex::Regex;

fn mismatch<N: TreeNode>(symbol: &str, expected: &'static str, found: &Value<N>) -> Flow {
    Error::TypeMismatch { symbol: symbol.to_string(), expected, found: found.kind() }.into()
}

fn previous<N: TreeNode>(args: &mut crate::engine::Arguments<'_, N>) -> Value<N> {
    args.take("previous_result")
}

// --- Context -----------------------------------------------------------------

/// Appends the previous result to the list `name` in the context.
pub fn append<N: TreeNode>(name: &str) -> Handler<N> {
    let name = name.to_string();
    Handler::<N>::new("append", &["context", "previous_result"], move |args| {
        let value = previous(args);
        args.context().append(&name, value.clone())?;
        Ok(value)
    })
}

/// Stores the previous result as `name` in the context.
pub fn put_variable<N: TreeNode>(name: &str) -> Handler<N> {
    let name = name.to_string();
    Handler::<N>::new("put_variable", &["context", "previous_result"], move |args| {
        let value = previous(args);
        args.context().insert(name.as_str(), value.clone());
        Ok(value)
    })
}

/// Returns the symbol `name`, resolved like any handler parameter.
///
/// `"context"` and `"config"` yield maps of their attributes and
/// `"transformation"` yields the transformation's name.
pub fn get_variable<N: TreeNode>(name: &str) -> Handler<N> {
    let symbol = name.to_string();
    Handler::<N>::new("get_variable", &[name], move |args| match symbol.as_str() {
        "context" => Ok(args.context().clone().into()),
        "config" => Ok(Value::Map(args.config().to_map())),
        "transformation" => Ok(args.transformation().name().map(str::to_string).into()),
        _ => Ok(args.value(0).cloned().unwrap_or_default()),
    })
}

/// Returns the list resolved as `name`, sorted by `key`. The stored list is
/// left untouched. `"previous_result"` sorts the previous result.
pub fn sorter<N, K, F>(name: &str, key: F) -> Handler<N>
where
    N: TreeNode,
    K: Ord,
    F: Fn(&Value<N>) -> K + Send + Sync + 'static,
{
    let symbol = name.to_string();
    Handler::<N>::new("sorter", &[name], move |args| {
        let value = args.value(0).cloned().unwrap_or_default();
        match value {
            Value::List(mut items) => {
                items.sort_by_cached_key(|item| key(item));
                Ok(Value::List(items))
            }
            other => Err(mismatch(&symbol, "a list", &other)),
        }
    })
}

/// Moves every node of the list `name` out of the document and empties the
/// list. Rules collect, this step mutates.
pub fn remove_nodes<N: TreeNodeMut>(name: &str) -> Handler<N> {
    let name = name.to_string();
    Handler::<N>::new("remove_nodes", &["context", "previous_result"], move |args| {
        let value = previous(args);
        let nodes = args.context().get_mut(&name).ok_or_else(|| Flow::error(format!("`{name}` is not set")))?;
        let Some(items) = nodes.as_list_mut() else {
            return Err(mismatch(&name, "a list", nodes));
        };
        for item in items.drain(..) {
            if let Value::Node(node) = item {
                node.detach();
            }
        }
        Ok(value)
    })
}

// --- Reading nodes -----------------------------------------------------------

pub fn get_text<N: TreeNode>() -> Handler<N> {
    Handler::<N>::new("get_text", &["node"], |args| Ok(args.node()?.text().into()))
}

pub fn get_attribute<N: TreeNode>(name: &str) -> Handler<N> {
    let name = name.to_string();
    Handler::<N>::new("get_attribute", &["node"], move |args| Ok(args.node()?.attribute(&name).into()))
}

pub fn get_localname<N: TreeNode>() -> Handler<N> {
    Handler::<N>::new("get_localname", &["node"], |args| Ok(args.node()?.local_name().into()))
}

// --- Transforming values -----------------------------------------------------

pub fn lowercase<N: TreeNode>() -> Handler<N> {
    Handler::<N>::new("lowercase", &["previous_result"], |args| match previous(args) {
        Value::Str(s) => Ok(Value::Str(s.to_lowercase())),
        other => Err(mismatch("previous_result", "a string", &other)),
    })
}

/// Joins the text of the items of the previous result with `separator`.
pub fn join_to_string<N: TreeNode>(separator: &str) -> Handler<N> {
    let separator = separator.to_string();
    Handler::<N>::new("join_to_string", &["previous_result"], move |args| match previous(args) {
        Value::List(items) => Ok(items.iter().map(Value::to_text).collect::<Vec<_>>().join(&separator).into()),
        other => Err(mismatch("previous_result", "a list", &other)),
    })
}

// --- Logging -----------------------------------------------------------------

pub fn debug_message<N: TreeNode>(message: &str) -> Handler<N> {
    let message = message.to_string();
    Handler::<N>::new("debug_message", &["previous_result"], move |args| {
        log::info!("{message}");
        Ok(previous(args))
    })
}

/// Logs the values of `names` as a handler would receive them.
pub fn debug_symbols<N: TreeNode>(names: &[&str]) -> Handler<N> {
    let mut parameters = names.to_vec();
    if !parameters.contains(&"previous_result") {
        parameters.push("previous_result");
    }
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    Handler::<N>::new("debug_symbols", &parameters, move |args| {
        for name in &names {
            match name.as_str() {
                "context" => log::info!("context = {:?}", args.context()),
                "config" => log::info!("config = {:?}", args.config()),
                "transformation" => log::info!("transformation = {:?}", args.transformation().name()),
                _ => log::info!("{name} = {:?}", args.get(name)),
            }
        }
        Ok(args.previous_result().cloned().unwrap_or_default())
    })
}

// --- Mutating nodes ----------------------------------------------------------

pub fn set_text<N: TreeNodeMut>(text: Option<&str>) -> Handler<N> {
    let text = text.map(str::to_string);
    Handler::<N>::new("set_text", &["node", "previous_result"], move |args| {
        args.node()?.set_text(text.as_deref());
        Ok(previous(args))
    })
}

/// Renames the node, keeping its namespace.
pub fn set_localname<N: TreeNodeMut>(name: &str) -> Handler<N> {
    let name = name.to_string();
    Handler::<N>::new("set_localname", &["node", "previous_result"], move |args| {
        args.node()?.set_local_name(&name);
        Ok(previous(args))
    })
}

pub fn set_attribute<N: TreeNodeMut>(name: &str, value: &str) -> Handler<N> {
    let (name, value) = (name.to_string(), value.to_string());
    Handler::<N>::new("set_attribute", &["node", "previous_result"], move |args| {
        args.node()?.set_attribute(&name, &value);
        Ok(previous(args))
    })
}

/// Removes the named attributes; missing ones are ignored.
pub fn strip_attributes<N: TreeNodeMut>(names: &[&str]) -> Handler<N> {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    Handler::<N>::new("strip_attributes", &["node", "previous_result"], move |args| {
        let node = args.node()?;
        for name in &names {
            node.remove_attribute(name);
        }
        Ok(previous(args))
    })
}

pub fn clear_attributes<N: TreeNodeMut>() -> Handler<N> {
    Handler::<N>::new("clear_attributes", &["node", "previous_result"], |args| {
        args.node()?.clear_attributes();
        Ok(previous(args))
    })
}

/// Removes the attribute `name` and returns its value. Fails if it is
/// missing.
pub fn pop_attribute<N: TreeNodeMut>(name: &str) -> Handler<N> {
    let name = name.to_string();
    Handler::<N>::new("pop_attribute", &["node"], move |args| {
        let node = args.node()?;
        node.remove_attribute(&name)
            .map(Value::Str)
            .ok_or_else(|| Flow::error(format!("{node:?} has no attribute `{name}`")))
    })
}

/// Detaches the node from its parent. Its tail text stays in place.
pub fn remove_node<N: TreeNodeMut>() -> Handler<N> {
    Handler::<N>::new("remove_node", &["node", "previous_result"], |args| {
        args.node()?.detach();
        Ok(previous(args))
    })
}

// --- Flow --------------------------------------------------------------------

pub fn skip_to_next_node<N: TreeNode>() -> Handler<N> {
    Handler::<N>::new("skip_to_next_node", &[], |_| Err(Flow::SkipToNextNode))
}

pub fn abort_rule<N: TreeNode>() -> Handler<N> {
    Handler::<N>::new("abort_rule", &[], |_| Err(Flow::AbortRule))
}

pub fn abort_transformation<N: TreeNode>() -> Handler<N> {
    Handler::<N>::new("abort_transformation", &[], |_| Err(Flow::AbortTransformation))
}

// --- Conditions --------------------------------------------------------------

pub fn has_text<N: TreeNode>() -> Condition<N> {
    Condition::predicate(|node: &N, _| node.text().is_some_and(|t| !t.is_empty()))
}

pub fn has_tail<N: TreeNode>() -> Condition<N> {
    Condition::predicate(|node: &N, _| node.tail().is_some_and(|t| !t.is_empty()))
}

pub fn has_children<N: TreeNode>() -> Condition<N> {
    Condition::predicate(|node: &N, _| !node.children().is_empty())
}

pub fn has_attributes<N: TreeNode>() -> Condition<N> {
    Condition::predicate(|node: &N, _| !node.attributes().is_empty())
}

/// The node's own text equals `text`.
pub fn text_is<N: TreeNode>(text: &str) -> Condition<N> {
    let text = text.to_string();
    Condition::predicate(move |node: &N, _| node.text().as_deref() == Some(text.as_str()))
}

/// The node's full text contains a match of `pattern`.
pub fn has_matching_text<N: TreeNode>(pattern: Regex) -> Condition<N> {
    Condition::predicate(move |node: &N, _| pattern.is_match(&node.full_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Transformation;
    use crate::tree::Element;
    use pretty_assertions::assert_eq;

    fn run(transformation: Transformation, xml: &str) -> Value {
        let root = Element::parse(xml).unwrap();
        transformation.invoke(&root).unwrap()
    }

    fn xml(value: Value) -> String {
        value.into_node().unwrap().to_xml()
    }

    #[test]
    fn get_attribute_and_put_variable() {
        let t = Transformation::builder()
            .rule(["a"], [get_attribute("href"), put_variable("last")])
            .result_object("context.last")
            .build()
            .unwrap();

        assert_eq!(run(t, r#"<p><a href="x"/><a href="y"/></p>"#), Value::from("y"));
    }

    #[test]
    fn sorter_sorts_a_copy() {
        let t = Transformation::builder()
            .context("words", vec![Value::from("b"), Value::from("a"), Value::from("c")])
            .step(sorter("words", |v: &Value| v.to_text()))
            .step(join_to_string(","))
            .step(put_variable("joined"))
            .result_object("context.joined")
            .build()
            .unwrap();

        assert_eq!(run(t, "<x/>"), Value::from("a,b,c"));
    }

    #[test]
    fn sorter_rejects_non_lists() {
        let t: Transformation =
            Transformation::builder().context("n", 3i64).step(sorter("n", |v: &Value| v.to_text())).build().unwrap();

        let err = t.invoke(&Element::new("x")).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { found: "an int", .. }));
    }

    #[test]
    fn lowercase_previous_result() {
        let t = Transformation::builder()
            .rule(["b"], [get_text(), lowercase(), append("texts")])
            .result_object("context.texts")
            .build()
            .unwrap();

        assert_eq!(run(t, "<a><b>LOUD</b><b>Mixed</b></a>"), Value::List(vec!["loud".into(), "mixed".into()]));
    }

    #[test]
    fn mutating_handlers() {
        let t = Transformation::builder()
            .rule(["b"], [set_localname("strong"), set_attribute("class", "x"), strip_attributes(&["style"])])
            .rule(["i"], [set_text(Some("it"))])
            .rule(["s"], [clear_attributes()])
            .build()
            .unwrap();

        assert_eq!(
            xml(run(t, r#"<p><b style="s">b</b><i>x</i><s a="1" b="2"/></p>"#)),
            r#"<p><strong class="x">b</strong><i>it</i><s/></p>"#
        );
    }

    #[test]
    fn pop_attribute_returns_value_and_fails_when_missing() {
        let ok = Transformation::builder()
            .rule(["a"], [pop_attribute("id"), append("ids")])
            .result_object("context.ids")
            .build()
            .unwrap();
        assert_eq!(run(ok, r#"<r><a id="1"/></r>"#), Value::List(vec!["1".into()]));

        let failing: Transformation = Transformation::builder().rule(["a"], [pop_attribute("id")]).build().unwrap();
        let err = failing.invoke(&Element::parse("<r><a/></r>").unwrap()).unwrap_err();
        assert!(matches!(err, Error::Handler { ref handler, .. } if handler == "pop_attribute"));
    }

    #[test]
    fn collect_then_remove() {
        let t = Transformation::builder()
            .context("doomed", Value::List(vec![]))
            .rule(["x"], [Handler::new("node", &["node"], |args| Ok(Value::Node(args.node()?))), append("doomed")])
            .step(remove_nodes("doomed"))
            .build()
            .unwrap();

        assert_eq!(xml(run(t, "<r><x/>a<y/><x/>b</r>")), "<r>a<y/>b</r>");
    }

    #[test]
    fn get_variable_returns_object_symbols_as_values() {
        let t = Transformation::builder()
            .name("vars")
            .context("seen", 1)
            .step(get_variable("context"))
            .step(put_variable("ctx"))
            .step(get_variable("config"))
            .step(put_variable("cfg"))
            .step(get_variable("transformation"))
            .step(put_variable("own_name"))
            .result_object("context")
            .build()
            .unwrap();

        let Value::Map(context) = run(t, "<r/>") else { panic!("expected the context as a map") };
        let Some(Value::Map(ctx)) = context.get("ctx") else { panic!("context was not captured") };
        assert_eq!(ctx.get("seen"), Some(&Value::from(1)));
        let Some(Value::Map(cfg)) = context.get("cfg") else { panic!("config was not captured") };
        assert_eq!(cfg.get("name"), Some(&Value::from("vars")));
        assert_eq!(context.get("own_name"), Some(&Value::from("vars")));
    }

    #[test]
    fn text_conditions() {
        let t = Transformation::builder()
            .rule([text_is("b")], [get_localname(), append("exact")])
            .rule([has_matching_text(Regex::new("^a").unwrap())], [get_localname(), append("prefix")])
            .rule([has_children()], [get_localname(), append("parents")])
            .discard_result()
            .step(get_variable("exact"))
            .step(put_variable("result"))
            .build()
            .unwrap();

        let root = Element::parse("<r><p>ab</p><q>b</q></r>").unwrap();
        let run = t.invoke_with_metrics(&root, Default::default()).unwrap();
        assert!(run.result.is_none());
        assert_eq!(run.metrics.steps.len(), 5);
        assert_eq!(run.metrics.steps[0].matched, 1);
        assert_eq!(run.metrics.steps[1].matched, 2);
        assert_eq!(run.metrics.steps[2].matched, 1);
    }
}
