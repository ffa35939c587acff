//! Ready-made transformations.

use crate::engine::{Condition, Handler, Rule, Transformation, TraversalOrder, Traverse};
use crate::error::Result;
use crate::handlers::{has_attributes, has_children, has_text, remove_node};
use crate::node::{TreeNode, TreeNodeMut};

/// Removes elements without children, text and attributes, bottom-up, so
/// parents emptied by the removal go as well. The root is kept.
pub fn remove_empty_nodes<N: TreeNodeMut>() -> Result<Transformation<N>> {
    let empty = Condition::none_of([has_children(), has_text(), has_attributes(), Condition::RootOnly]);
    Transformation::builder()
        .name("remove_empty_nodes")
        .traverse(Traverse::DEPTH_FIRST | Traverse::LEFT_TO_RIGHT | Traverse::BOTTOM_TO_TOP)
        .rule([empty], [remove_node()])
        .build()
}

/// Replaces each whitespace run in text and tails with a single space.
/// Leading and trailing whitespace is reduced, not stripped.
pub fn reduce_whitespaces<N: TreeNodeMut>() -> Result<Transformation<N>> {
    let reduce = Handler::new("reduce_whitespaces", &["root"], |args| {
        let root: N = args.root()?;
        for node in TraversalOrder::default().traverse(&root) {
            if let Some(text) = node.text() {
                node.set_text(Some(&reduce_whitespace(&text)));
            }
            if node != root {
                if let Some(tail) = node.tail() {
                    node.set_tail(Some(&reduce_whitespace(&tail)));
                }
            }
        }
        Ok(args.previous_result().cloned().unwrap_or_default())
    });

    Transformation::builder().name("reduce_whitespaces").step(Rule::new(["/"], [reduce])).build()
}

fn reduce_whitespace(text: &str) -> String {
    regex!(r"\s+").replace_all(text, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Element;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn apply(transformation: Transformation, xml: &str) -> String {
        let root = Element::parse(xml).unwrap();
        transformation.invoke(&root).unwrap().into_node().unwrap().to_xml()
    }

    #[rstest]
    #[case("<r><a/><b x=\"1\"/></r>", "<r><b x=\"1\"/></r>")]
    #[case("<r><a><b><c/></b></a>t</r>", "<r>t</r>")]
    #[case("<r><a>keep</a><b><c/></b></r>", "<r><a>keep</a></r>")]
    #[case("<r/>", "<r/>")]
    fn removes_empty_nodes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(apply(remove_empty_nodes().unwrap(), input), expected);
    }

    #[test]
    fn reduces_whitespace_runs() {
        let input = "<r>  a \n\t b <x>c\n\nd</x>  tail\t</r>";
        assert_eq!(apply(reduce_whitespaces().unwrap(), input), "<r> a b <x>c d</x> tail </r>");
    }

    #[test]
    fn input_is_untouched() {
        let root = Element::parse("<r><a/></r>").unwrap();
        let transformation: Transformation = remove_empty_nodes().unwrap();
        transformation.invoke(&root).unwrap();
        assert_eq!(root.to_xml(), "<r><a/></r>");
    }
}
