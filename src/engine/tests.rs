use super::*;
use crate::api::Overrides;
use crate::error::Error;
use crate::handlers::{
    abort_rule, abort_transformation, append, get_attribute, get_localname, get_text, put_variable, set_localname,
    sorter,
};
use crate::node::{TreeNode, TreeNodeMut};
use crate::tree::Element;
use crate::value::Value;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::num::NonZeroUsize;
use std::sync::Arc;

const PERSONS: &str = "<persons>\
    <person><name>Dorothea</name><family-name>Lange</family-name></person>\
    <person><name>Ada</name><family-name>Lovelace</family-name></person>\
    <person><name>Grace</name><family-name>Hopper</family-name></person>\
</persons>";

const TABLE: &str = r#"<doc><table><head>H</head><row n="1">r1</row><row n="2">r2</row></table><head>X</head></doc>"#;

fn doc(xml: &str) -> Element {
    Element::parse(xml).unwrap()
}

fn strings(values: &[&str]) -> Value {
    Value::List(values.iter().map(|v| Value::from(*v)).collect())
}

fn extract_person() -> Handler {
    Handler::new("extract_person", &["node"], |args| {
        let person: Element = args.node()?;
        let text = |selector: &str| person.first(selector).map(|e| e.full_text()).unwrap_or_default();
        Ok(Value::List(vec![text("name").into(), text("family-name").into()]))
    })
}

fn list_into(target: &'static str) -> Handler {
    Handler::new("list_into", &["previous_result", "context"], move |args| {
        let Some(Value::List(persons)) = args.previous_result().cloned() else {
            return Err(Flow::error("expected a list of persons"));
        };
        for person in persons {
            let fields: Vec<String> = person.as_list().unwrap_or_default().iter().map(Value::to_text).collect();
            args.context().append(target, format!("{}, {}", fields[1], fields[0]))?;
        }
        Ok(Value::None)
    })
}

fn log_entry(entry: &'static str) -> Handler {
    Handler::new(entry, &["context"], move |args| {
        args.context().append("log", entry)?;
        Ok(Value::None)
    })
}

// --- End-to-end scenarios ----------------------------------------------------

#[test]
fn persons_sorted_by_family_name() {
    let transformation: Transformation = Transformation::builder()
        .rule(["person"], [extract_person(), append("persons")])
        .step(sorter("persons", |person: &Value| person.as_list().and_then(|p| p.get(1)).map(Value::to_text)))
        .step(list_into("sorted"))
        .result_object("context.sorted")
        .build()
        .unwrap();

    let result = transformation.invoke(&doc(PERSONS)).unwrap();
    assert_eq!(result, strings(&["Hopper, Grace", "Lange, Dorothea", "Lovelace, Ada"]));
}

#[test]
fn unset_result_object_is_an_invalid_selector() {
    let transformation: Transformation =
        Transformation::builder().rule(["person"], [get_text()]).result_object("context.persons").build().unwrap();

    let err = transformation.invoke(&doc(PERSONS)).unwrap_err();
    assert!(matches!(err, Error::InvalidResultSelector { ref selector, .. } if selector == "context.persons"));
}

#[test]
fn malformed_result_object_fails_the_build() {
    let built = Transformation::<Element>::builder().result_object("persons").build();
    assert!(matches!(built, Err(Error::InvalidResultSelector { .. })));
}

#[test]
fn unknown_parameter_is_an_unresolved_symbol() {
    let transformation: Transformation = Transformation::builder()
        .context("known", 1i64)
        .step(handler!("needs_ghost", [known, ghost], |args| Ok(args.take("ghost"))))
        .build()
        .unwrap();

    match transformation.invoke(&Element::new("x")) {
        Err(Error::UnresolvedSymbol { symbol, handler, step }) => {
            assert_eq!((symbol.as_str(), handler.as_str(), step), ("ghost", "needs_ghost", 0));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn root_condition_matches_exactly_once() {
    let root = Element::new("root");
    for i in 0..50 {
        root.append_child(Element::new("child").with_attribute("i", &i.to_string()).with_child(Element::new("leaf")));
    }

    let transformation: Transformation = Transformation::builder()
        .rule(["/"], [get_localname(), append("hits")])
        .result_object("context.hits")
        .build()
        .unwrap();

    let run = transformation.invoke_with_metrics(&root, Overrides::new()).unwrap();
    assert_eq!(run.result, strings(&["root"]));
    assert_eq!((run.metrics.steps[0].visited, run.metrics.steps[0].matched), (1, 1));
}

#[test]
fn copy_keeps_the_input_unchanged() {
    let rename: Transformation = Transformation::builder().rule(["*"], [set_localname("x")]).build().unwrap();
    let input = doc("<a><b/></a>");

    let copied = rename.invoke(&input).unwrap().into_node().unwrap();
    assert_eq!(input.to_xml(), "<a><b/></a>");
    assert_eq!(copied.to_xml(), "<x><x/></x>");
    assert_ne!(copied, input);

    let shared = rename.invoke_with(&input, Overrides::new().copy(false)).unwrap().into_node().unwrap();
    assert_eq!(shared, input);
    assert_eq!(input.to_xml(), "<x><x/></x>");
}

#[test]
fn repeated_invocations_are_structurally_identical() {
    let transformation: Transformation = Transformation::builder()
        .context("seen", Value::List(vec![]))
        .rule(["name"], [get_text(), append("seen")])
        .rule(["family-name"], [set_localname("surname")])
        .build()
        .unwrap();
    let input = doc(PERSONS);

    let first = transformation.invoke(&input).unwrap().into_node().unwrap();
    let second = transformation.invoke(&input).unwrap().into_node().unwrap();

    assert_eq!(first.to_xml(), second.to_xml());
    assert_ne!(first, second);
    assert_eq!(transformation.config().context().get("seen"), Some(&Value::List(vec![])));
}

#[rstest]
#[case::all(false, &["2"])]
#[case::any(true, &["1", "2", "3"])]
fn conditions_are_and_combined_unless_wrapped(#[case] any: bool, #[case] expected: &[&str]) {
    let xml = r#"<r><item id="1"/><item id="2" x="y"/><other id="3" x="y"/></r>"#;
    let conditions: Vec<Condition> = vec!["item".into(), AttributeMatcher::new().has("x").into()];
    let conditions = if any { vec![Condition::any(conditions)] } else { conditions };

    let transformation: Transformation = Transformation::builder()
        .rule(conditions, [get_attribute("id"), append("ids")])
        .result_object("context.ids")
        .build()
        .unwrap();

    assert_eq!(transformation.invoke(&doc(xml)).unwrap(), strings(expected));
}

#[rstest]
#[case::exactly_one(
    Condition::one_of([Condition::from("item"), AttributeMatcher::new().has("x").into()]),
    &["1", "3"]
)]
#[case::not(Condition::not("item"), &["r", "3", "4"])]
#[case::not_attribute(Condition::not(AttributeMatcher::new().has("x")), &["r", "1", "4"])]
fn one_of_and_not(#[case] condition: Condition, #[case] expected: &[&str]) {
    let xml = r#"<r id="r"><item id="1"/><item id="2" x="y"/><other id="3" x="y"/><other id="4"/></r>"#;
    let transformation: Transformation = Transformation::builder()
        .rule([condition], [get_attribute("id"), append("ids")])
        .result_object("context.ids")
        .build()
        .unwrap();

    assert_eq!(transformation.invoke(&doc(xml)).unwrap(), strings(expected));
}

// --- Symbol resolution -------------------------------------------------------

#[test]
fn equal_signatures_share_a_plan_but_not_values() {
    let cache = Arc::new(PlanCache::unbounded());
    let transformation: Transformation = Transformation::builder()
        .plan_cache(Arc::clone(&cache))
        .context("a", 1i64)
        .context("b", 2i64)
        .step(handler!("first", [a], |args| Ok(args.take("a"))))
        .step(handler!("second", [a], |args| Ok(Value::Int(args.get("a").and_then(Value::as_int).unwrap_or(0) * 10))))
        .step(handler!("sum", [a, b, previous_result], |args| {
            let total: i64 = ["a", "b", "previous_result"].iter().filter_map(|n| args.get(n)?.as_int()).sum();
            Ok(total.into())
        }))
        .step(put_variable("total"))
        .result_object("context.total")
        .build()
        .unwrap();

    assert_eq!(transformation.invoke(&Element::new("x")).unwrap(), Value::Int(13));
    let stats = cache.stats();
    assert_eq!((stats.len, stats.hits, stats.misses), (3, 1, 3));

    assert_eq!(transformation.invoke(&Element::new("y")).unwrap(), Value::Int(13));
    assert_eq!(cache.stats().hits, 5);
}

#[test]
fn evicted_plans_are_recomputed() {
    let cache = Arc::new(PlanCache::bounded(NonZeroUsize::new(1).unwrap()));
    let transformation: Transformation = Transformation::builder()
        .plan_cache(Arc::clone(&cache))
        .context("a", "x")
        .context("b", "y")
        .step(handler!("read_a", [a], |args| Ok(args.take("a"))))
        .step(handler!("read_b", [b], |args| Ok(args.take("b"))))
        .step(put_variable("last"))
        .result_object("context.last")
        .build()
        .unwrap();

    for _ in 0..2 {
        assert_eq!(transformation.invoke(&Element::new("r")).unwrap(), Value::from("y"));
    }
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats().misses, 6);
}

#[test]
fn reserved_names_win_over_context() {
    let transformation: Transformation = Transformation::builder()
        .context("node", "shadowed")
        .rule(["item"], [handler!("own_node", [node], |args| {
            let node: Element = args.node()?;
            Ok(node.local_name().into())
        })])
        .rule(["item"], [handler!("raw", [node], |args| Ok(args.take("node"))), append("nodes")])
        .result_object("context.nodes")
        .build()
        .unwrap();

    let result = transformation.invoke(&doc("<r><item/></r>")).unwrap();
    let nodes = result.as_list().unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].as_node().map(|n| n.local_name()).as_deref(), Some("item"));
}

#[test]
fn configuration_attributes_are_resolvable() {
    let transformation: Transformation = Transformation::builder()
        .name("configured")
        .set("limit", 3i64)
        .step(handler!("read", [limit, name, copy], |args| {
            Ok(Value::List(vec![args.take("limit"), args.take("name"), args.take("copy")]))
        }))
        .step(put_variable("read"))
        .result_object("context.read")
        .build()
        .unwrap();

    let result = transformation.invoke(&Element::new("r")).unwrap();
    assert_eq!(result, Value::List(vec![Value::Int(3), "configured".into(), Value::Bool(true)]));
}

#[test]
fn context_is_fresh_for_every_invocation() {
    let transformation: Transformation = Transformation::builder()
        .context("items", Value::List(vec![]))
        .rule(["item"], [get_text(), append("items")])
        .result_object("context.items")
        .build()
        .unwrap();

    let input = doc("<r><item>a</item></r>");
    assert_eq!(transformation.invoke(&input).unwrap(), strings(&["a"]));
    assert_eq!(transformation.invoke(&input).unwrap(), strings(&["a"]));
}

#[test]
fn previous_result_threads_through_steps_and_handlers() {
    let transformation: Transformation = Transformation::builder()
        .step(handler!("start", [], |_args| Ok(Value::Int(1))))
        .step(handler!("double", [previous_result], |args| {
            Ok(Value::Int(args.previous_result().and_then(Value::as_int).unwrap_or(0) * 2))
        }))
        .step(put_variable("doubled"))
        .rule(["item"], [get_text(), append("texts")])
        .step(handler!("summary", [doubled, previous_result], |args| {
            Ok(Value::List(vec![args.take("doubled"), Value::Bool(args.take("previous_result").is_none())]))
        }))
        .step(put_variable("summary"))
        .result_object("context.summary")
        .build()
        .unwrap();

    let run = transformation.invoke_with_metrics(&doc("<r><item>a</item></r>"), Overrides::new()).unwrap();
    assert_eq!(run.result, Value::List(vec![Value::Int(2), Value::Bool(true)]));
    assert_eq!(run.metrics.steps.len(), 6);
    assert_eq!(run.metrics.matched(), 1);
}

#[test]
fn discarded_result_is_none() {
    let transformation: Transformation =
        Transformation::builder().rule(["*"], [get_text()]).discard_result().build().unwrap();
    assert!(transformation.invoke(&doc("<r>t</r>")).unwrap().is_none());
}

// --- Flow control ------------------------------------------------------------

fn skip_odd_indexes() -> Handler {
    Handler::new("skip_odd_indexes", &["node", "previous_result"], |args| {
        let node: Element = args.node()?;
        if node.index().is_some_and(|i| i % 2 == 1) {
            return Err(Flow::SkipToNextNode);
        }
        Ok(args.take("previous_result"))
    })
}

const ITEMS: &str = "<r><item>1</item><item>2</item><item>3</item><item>4</item><item>5</item><item>6</item></r>";

#[test]
fn skip_to_next_node_drops_the_remaining_handlers() {
    let transformation: Transformation = Transformation::builder()
        .rule(["item"], [skip_odd_indexes(), get_text(), append("kept")])
        .result_object("context.kept")
        .build()
        .unwrap();

    assert_eq!(transformation.invoke(&doc(ITEMS)).unwrap(), strings(&["1", "3", "5"]));
}

#[test]
fn once_stops_after_the_first_match() {
    let transformation: Transformation = Transformation::builder()
        .step(Rule::once(["item"], [get_text(), append("first")]))
        .result_object("context.first")
        .build()
        .unwrap();

    let run = transformation.invoke_with_metrics(&doc(ITEMS), Overrides::new()).unwrap();
    assert_eq!(run.result, strings(&["1"]));
    assert_eq!(run.metrics.steps[0].matched, 1);
}

#[test]
fn abort_transformation_skips_remaining_steps_but_computes_the_result() {
    let transformation: Transformation = Transformation::builder()
        .context("log", Value::List(vec![]))
        .step(log_entry("one"))
        .rule(["item"], [get_text(), append("log"), abort_transformation()])
        .step(log_entry("never"))
        .result_object("context.log")
        .build()
        .unwrap();

    let run = transformation.invoke_with_metrics(&doc(ITEMS), Overrides::new()).unwrap();
    assert_eq!(run.result, strings(&["one", "1"]));
    assert!(run.metrics.aborted);
    assert_eq!(run.metrics.steps.len(), 2);
}

#[test]
fn aborted_transformation_returns_the_context_untouched_by_later_steps() {
    let transformation: Transformation = Transformation::builder()
        .step(abort_transformation())
        .step(log_entry("foo"))
        .result_object("context")
        .build()
        .unwrap();

    let Value::Map(context) = transformation.invoke(&Element::new("root")).unwrap() else {
        panic!("expected the context as a map");
    };
    assert!(!context.contains_key("log"));
}

#[test]
fn abort_rule_in_a_plain_step_ends_that_step_only() {
    let transformation: Transformation = Transformation::builder()
        .context("log", Value::List(vec![]))
        .step(abort_rule())
        .step(log_entry("after"))
        .result_object("context.log")
        .build()
        .unwrap();

    assert_eq!(transformation.invoke(&Element::new("r")).unwrap(), strings(&["after"]));
}

// --- Composition -------------------------------------------------------------

#[test]
fn nested_transformation_works_on_the_current_node() {
    let rename: Transformation = Transformation::builder().rule(["/"], [set_localname("pablo")]).build().unwrap();
    let rename = Arc::new(rename);

    let shared: Transformation =
        Transformation::builder().rule(["person"], [Step::from(Arc::clone(&rename))]).build().unwrap();
    let out = shared.invoke(&doc(PERSONS)).unwrap().into_node().unwrap();
    assert_eq!(out.select("pablo").unwrap().len(), 3);
    assert!(out.select("person").unwrap().is_empty());

    let copying: Transformation =
        Transformation::builder().rule(["person"], [Step::copying(rename), append("copies").into()]).build().unwrap();
    let out = copying.invoke(&doc(PERSONS)).unwrap().into_node().unwrap();
    assert_eq!(out.select("person").unwrap().len(), 3);
}

#[test]
fn nested_transformation_as_a_step_runs_on_the_root() {
    let count: Transformation = Transformation::builder()
        .rule(["name"], [get_text(), append("names")])
        .result_object("context.names")
        .build()
        .unwrap();

    let outer: Transformation = Transformation::builder()
        .step(count)
        .step(put_variable("names"))
        .result_object("context.names")
        .build()
        .unwrap();

    assert_eq!(outer.invoke(&doc(PERSONS)).unwrap(), strings(&["Dorothea", "Ada", "Grace"]));
}

#[test]
fn nested_errors_surface_unchanged() {
    let failing: Transformation = Transformation::builder().result_object("context.nothing").build().unwrap();
    let outer: Transformation = Transformation::builder().step(failing).build().unwrap();

    let err = outer.invoke(&Element::new("r")).unwrap_err();
    assert!(matches!(err, Error::InvalidResultSelector { .. }));
}

#[test]
fn common_conditions_apply_to_every_rule() {
    let transformation: Transformation = Transformation::builder()
        .context("references", Value::List(vec![]))
        .common_condition(AttributeMatcher::new().has("href"))
        .rule(["*"], [get_attribute("href"), append("references")])
        .result_object("context.references")
        .build()
        .unwrap();

    let input = doc(r#"<root><a href="foo"/><a id="bar"/><a href="peng"/></root>"#);
    assert_eq!(transformation.invoke(&input).unwrap(), strings(&["foo", "peng"]));
}

#[rstest]
#[case::local_name("head", &["H", "X"])]
#[case::child_selector("table > head", &["H"])]
#[case::selector_group("table head, row", &["H", "r1", "r2"])]
#[case::attribute_selector("row[n='1']", &["r1"])]
#[case::raw_query("//row[@n='2']", &["r2"])]
fn string_conditions(#[case] condition: &str, #[case] expected: &[&str]) {
    let transformation: Transformation = Transformation::builder()
        .rule([condition], [get_text(), append("texts")])
        .result_object("context.texts")
        .build()
        .unwrap();

    assert_eq!(transformation.invoke(&doc(TABLE)).unwrap(), strings(expected));
}

#[test]
fn namespace_condition() {
    let transformation: Transformation = Transformation::builder()
        .rule(["http://example.org/x"], [get_text(), append("texts")])
        .result_object("context.texts")
        .build()
        .unwrap();

    let input = doc(r#"<r xmlns:x="http://example.org/x"><x:a>1</x:a><a>2</a></r>"#);
    assert_eq!(transformation.invoke(&input).unwrap(), strings(&["1"]));
}

#[test]
fn predicates_see_the_invocation() {
    let transformation: Transformation = Transformation::builder()
        .rule(
            [Condition::predicate(|node: &Element, invocation: &Invocation<'_, Element>| {
                invocation.symbol("wanted").is_some_and(|wanted| Some(wanted.to_text()) == node.attribute("id"))
            })],
            [get_attribute("id"), append("found")],
        )
        .rule(
            [Condition::dynamic_query(|invocation: &Invocation<'_, Element>| {
                format!("//item[@id='{}']", invocation.symbol("also").map(|v| v.to_text()).unwrap_or_default())
            })],
            [get_attribute("id"), append("found")],
        )
        .result_object("context.found")
        .build()
        .unwrap();

    let input = doc(r#"<r><item id="a"/><item id="b"/><item id="c"/></r>"#);
    let overrides = Overrides::new().set("wanted", "b").set("also", "c");
    assert_eq!(transformation.invoke_with(&input, overrides).unwrap(), strings(&["b", "c"]));
}

#[test]
fn dynamic_attribute_constraints_see_the_invocation() {
    let transformation: Transformation = Transformation::builder()
        .rule(
            [Condition::dynamic_attributes(|invocation: &Invocation<'_, Element>| {
                let wanted = invocation.symbol("kind").map(|v| v.to_text()).unwrap_or_default();
                AttributeMatcher::new().with("kind", wanted.as_str())
            })],
            [get_attribute("id"), append("found")],
        )
        .result_object("context.found")
        .build()
        .unwrap();

    let input = doc(r#"<r><item id="a" kind="x"/><item id="b" kind="y"/><item id="c" kind="x"/></r>"#);
    let found = transformation.invoke_with(&input, Overrides::new().set("kind", "x")).unwrap();
    assert_eq!(found, strings(&["a", "c"]));
}

#[test]
fn rule_traversal_order_override() {
    let width_first = TraversalOrder::new(Breadth::WidthFirst, Horizontal::RightToLeft, Vertical::TopToBottom);
    let transformation: Transformation = Transformation::builder()
        .step(Rule::new(["*"], [get_localname(), append("order")]).with_traversal_order(width_first))
        .result_object("context.order")
        .build()
        .unwrap();

    let input = doc("<a><b><d/><e/></b><c><f/><g/></c></a>");
    assert_eq!(transformation.invoke(&input).unwrap(), strings(&["a", "c", "b", "g", "f", "e", "d"]));
}

#[test]
fn contradicting_default_traversal_fails_the_build() {
    let built = Transformation::<Element>::builder().traverse(Traverse::DEPTH_FIRST | Traverse::WIDTH_FIRST).build();
    assert!(matches!(built, Err(Error::InvalidTraversalOrder(..))));
}

// --- Errors ------------------------------------------------------------------

#[test]
fn condition_evaluation_errors_carry_the_condition_and_step() {
    let transformation: Transformation = Transformation::builder()
        .step(handler!("noop", [], |_args| Ok(Value::None)))
        .rule(["//["], [get_text()])
        .build()
        .unwrap();

    match transformation.invoke(&Element::new("r")) {
        Err(Error::ConditionEvaluation { condition, step, .. }) => assert_eq!((condition.as_str(), step), ("//[", 1)),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[derive(Debug, thiserror::Error)]
#[error("boom")]
struct Boom;

#[test]
fn handler_errors_keep_their_source() {
    let transformation: Transformation = Transformation::builder()
        .rule(["b"], [handler!("explode", [node], |args| {
            args.node()?;
            Err(Boom.into())
        })])
        .build()
        .unwrap();

    let err = transformation.invoke(&doc(r#"<a><b k="v"/></a>"#)).unwrap_err();
    match &err {
        Error::Handler { handler, step, node, .. } => {
            assert_eq!((handler.as_str(), *step, node.as_deref()), ("explode", 0, Some(r#"<b k="v">"#)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.handler_source().is_some_and(|source| source.downcast_ref::<Boom>().is_some()));
    assert_eq!(err.to_string(), r#"handler `explode` failed (step 0, at <b k="v">)"#);
}

#[test]
fn rules_cannot_be_handlers() {
    let inner: Rule = Rule::new(["a"], [get_text()]);
    let built = Transformation::builder().rule(["b"], [Step::from(inner)]).build();
    assert!(matches!(built, Err(Error::InvalidStep(_))));

    let empty = Transformation::<Element>::builder().rule(["b"], Vec::<Step>::new()).build();
    assert!(matches!(empty, Err(Error::InvalidStep(_))));
}

// --- Concurrency -------------------------------------------------------------

#[test]
fn one_transformation_serves_concurrent_invocations() {
    let transformation: Transformation = Transformation::builder()
        .rule(["item"], [
            get_text(),
            handler!("suffix", [previous_result, suffix], |args| {
                let text = args.get("previous_result").map(Value::to_text).unwrap_or_default();
                let suffix = args.get("suffix").map(Value::to_text).unwrap_or_default();
                Ok(Value::Str(format!("{text}{suffix}")))
            }),
            append("out"),
        ])
        .result_object("context.out")
        .build()
        .unwrap();
    let root = doc("<r><item>a</item><item>b</item></r>");

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let (transformation, root) = (&transformation, &root);
                scope.spawn(move || transformation.invoke_with(root, Overrides::new().set("suffix", i.to_string())))
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.join().unwrap().unwrap();
            assert_eq!(result, Value::List(vec![format!("a{i}").into(), format!("b{i}").into()]));
        }
    });
    assert_eq!(root.to_xml(), "<r><item>a</item><item>b</item></r>");
}
