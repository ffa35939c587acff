//! Shared, mutable element handles.
//!
//! The data model follows the lxml convention for mixed content: an element
//! owns the `text` before its first child and the `tail` that follows its own
//! end tag. Only elements are nodes; text lives on them.
//!
//! ```text
//! <a>t1<b/>t2<c/>t3</a>
//!
//! a.text = "t1"   b.tail = "t2"   c.tail = "t3"
//! ```
//!
//! Namespaced attributes are keyed as `{uri}local`. Serialization declares a
//! prefix for each such namespace on the element that needs it, reusing the
//! prefix the document was parsed with when it is still free.
//!
//! Locks are taken per element and never held while another element's lock is
//! acquired, so concurrent readers of distinct copies never contend.

use super::parse::{ParseError, XML_NAMESPACE, parse_document};
use super::query::Query;
use crate::node::{QueryError, TreeNode, TreeNodeMut};
use indexmap::IndexMap;
use parking_lot::RwLock;
use quick_xml::escape::escape;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

type Link = Arc<RwLock<Data>>;

#[derive(Debug, Default)]
struct Data {
    local_name: String,
    namespace: Option<String>,
    attributes: IndexMap<String, String>,
    text: Option<String>,
    tail: Option<String>,
    children: Vec<Element>,
    parent: Weak<RwLock<Data>>,
    /// Preferred `(prefix, uri)` pairs for namespaced attributes.
    prefixes: Vec<(String, String)>,
}

/// An element node. Cloning yields another handle to the same element.
#[derive(Clone)]
pub struct Element(Link);

impl Element {
    /// Create a detached element without namespace.
    pub fn new(local_name: impl Into<String>) -> Self {
        Element(Arc::new(RwLock::new(Data { local_name: local_name.into(), ..Data::default() })))
    }

    /// Create a detached element in `namespace`.
    pub fn new_in(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        let element = Self::new(local_name);
        element.0.write().namespace = Some(namespace.into());
        element
    }

    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> Result<Self, ParseError> {
        parse_document(xml)
    }

    pub fn with_attribute(self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_text(self, text: &str) -> Self {
        self.set_text(Some(text));
        self
    }

    pub fn with_child(self, child: Element) -> Self {
        self.append_child(child);
        self
    }

    pub(crate) fn set_namespace(&self, namespace: Option<String>) {
        self.0.write().namespace = namespace;
    }

    pub(crate) fn prefer_prefix(&self, prefix: &str, uri: &str) {
        let mut data = self.0.write();
        if !data.prefixes.iter().any(|(p, u)| p == prefix && u == uri) {
            data.prefixes.push((prefix.to_string(), uri.to_string()));
        }
    }

    pub(crate) fn push_text(&self, text: &str) {
        let last = self.0.read().children.last().cloned();
        match last {
            Some(last) => last.0.write().tail.get_or_insert_with(String::new).push_str(text),
            None => self.0.write().text.get_or_insert_with(String::new).push_str(text),
        }
    }

    /// All descendants in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<Element> {
        let mut out = Vec::new();
        let mut stack: Vec<Element> = self.children().into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            stack.extend(node.children().into_iter().rev());
            out.push(node);
        }
        out
    }

    /// The outermost ancestor (or `self` when detached).
    pub fn top(&self) -> Element {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Position among the parent's children.
    pub fn index(&self) -> Option<usize> {
        self.parent()?.children().iter().position(|c| c == self)
    }

    /// First result of a selector, if it parses and matches anything.
    pub fn first(&self, selector: &str) -> Option<Element> {
        self.select(selector).ok()?.into_iter().next()
    }

    /// Serialize the element and its subtree. The element's own tail is not
    /// part of the output.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out, None, &mut Vec::new());
        out
    }

    /// `bound` holds the `(prefix, uri)` declarations in scope; prefixes in it
    /// are unique, so none shadows another.
    fn write_into(&self, out: &mut String, inherited: Option<&str>, bound: &mut Vec<(String, String)>) {
        let (local_name, namespace, attributes, text, children, preferred) = {
            let data = self.0.read();
            (
                data.local_name.clone(),
                data.namespace.clone(),
                data.attributes.clone(),
                data.text.clone(),
                data.children.clone(),
                data.prefixes.clone(),
            )
        };
        let outer = bound.len();

        out.push('<');
        out.push_str(&local_name);
        if namespace.as_deref() != inherited {
            out.push_str(" xmlns=\"");
            out.push_str(&escape(namespace.as_deref().unwrap_or("")));
            out.push('"');
        }
        let mut rendered = String::new();
        for (name, value) in &attributes {
            rendered.push(' ');
            match split_qualified(name) {
                None => rendered.push_str(name),
                Some((XML_NAMESPACE, local)) => {
                    rendered.push_str("xml:");
                    rendered.push_str(local);
                }
                Some((uri, local)) => {
                    let prefix = bind_prefix(uri, &preferred, bound, out);
                    rendered.push_str(&prefix);
                    rendered.push(':');
                    rendered.push_str(local);
                }
            }
            rendered.push_str("=\"");
            rendered.push_str(&escape(value.as_str()));
            rendered.push('"');
        }
        out.push_str(&rendered);
        if text.is_none() && children.is_empty() {
            out.push_str("/>");
            bound.truncate(outer);
            return;
        }
        out.push('>');
        if let Some(text) = &text {
            out.push_str(&escape(text.as_str()));
        }
        for child in &children {
            child.write_into(out, namespace.as_deref(), bound);
            if let Some(tail) = child.tail() {
                out.push_str(&escape(tail.as_str()));
            }
        }
        out.push_str("</");
        out.push_str(&local_name);
        out.push('>');
        bound.truncate(outer);
    }

    fn copy_detached(&self) -> Element {
        let (local_name, namespace, attributes, text, tail, children, prefixes) = {
            let data = self.0.read();
            (
                data.local_name.clone(),
                data.namespace.clone(),
                data.attributes.clone(),
                data.text.clone(),
                data.tail.clone(),
                data.children.clone(),
                data.prefixes.clone(),
            )
        };
        let copy = Element(Arc::new(RwLock::new(Data {
            local_name,
            namespace,
            attributes,
            text,
            tail,
            children: Vec::with_capacity(children.len()),
            parent: Weak::new(),
            prefixes,
        })));
        for child in children {
            let child_copy = child.copy_detached();
            child_copy.0.write().parent = Arc::downgrade(&copy.0);
            copy.0.write().children.push(child_copy);
        }
        copy
    }

    fn sibling(&self, offset: isize) -> Option<Element> {
        let siblings = self.parent()?.children();
        let index = siblings.iter().position(|c| c == self)?;
        let target = index.checked_add_signed(offset)?;
        siblings.get(target).cloned()
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.read();
        write!(f, "<{}", data.local_name)?;
        for (name, value) in &data.attributes {
            write!(f, " {name}=\"{value}\"")?;
        }
        write!(f, ">")
    }
}

impl TreeNode for Element {
    fn local_name(&self) -> String {
        self.0.read().local_name.clone()
    }

    fn namespace(&self) -> Option<String> {
        self.0.read().namespace.clone()
    }

    fn attributes(&self) -> IndexMap<String, String> {
        self.0.read().attributes.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.read().attributes.get(name).cloned()
    }

    fn children(&self) -> Vec<Self> {
        self.0.read().children.clone()
    }

    fn parent(&self) -> Option<Self> {
        self.0.read().parent.upgrade().map(Element)
    }

    fn previous_sibling(&self) -> Option<Self> {
        self.sibling(-1)
    }

    fn next_sibling(&self) -> Option<Self> {
        self.sibling(1)
    }

    fn text(&self) -> Option<String> {
        self.0.read().text.clone()
    }

    fn tail(&self) -> Option<String> {
        self.0.read().tail.clone()
    }

    fn full_text(&self) -> String {
        let mut out = self.text().unwrap_or_default();
        for child in self.children() {
            out.push_str(&child.full_text());
            if let Some(tail) = child.tail() {
                out.push_str(&tail);
            }
        }
        out
    }

    fn query(&self, expression: &str) -> Result<Vec<Self>, QueryError> {
        Ok(Query::xpath(expression)?.evaluate(self))
    }

    fn select(&self, selector: &str) -> Result<Vec<Self>, QueryError> {
        Ok(Query::css(selector)?.evaluate(self))
    }

    fn is_selector(expression: &str) -> bool {
        Query::css(expression).is_ok()
    }

    fn deep_copy(&self) -> Self {
        self.copy_detached()
    }
}

impl TreeNodeMut for Element {
    fn set_local_name(&self, name: &str) {
        self.0.write().local_name = name.to_string();
    }

    fn set_text(&self, text: Option<&str>) {
        self.0.write().text = text.map(str::to_string);
    }

    fn set_tail(&self, tail: Option<&str>) {
        self.0.write().tail = tail.map(str::to_string);
    }

    fn set_attribute(&self, name: &str, value: &str) {
        self.0.write().attributes.insert(name.to_string(), value.to_string());
    }

    fn remove_attribute(&self, name: &str) -> Option<String> {
        self.0.write().attributes.shift_remove(name)
    }

    fn clear_attributes(&self) {
        self.0.write().attributes.clear();
    }

    fn append_child(&self, child: Self) {
        child.detach();
        child.0.write().parent = Arc::downgrade(&self.0);
        self.0.write().children.push(child);
    }

    fn detach(&self) {
        let Some(parent) = self.parent() else {
            return;
        };
        let previous = self.previous_sibling();
        let tail = self.0.write().tail.take();

        if let Some(tail) = tail {
            match previous {
                Some(previous) => previous.0.write().tail.get_or_insert_with(String::new).push_str(&tail),
                None => parent.0.write().text.get_or_insert_with(String::new).push_str(&tail),
            }
        }

        parent.0.write().children.retain(|c| c != self);
        self.0.write().parent = Weak::new();
    }
}

/// Splits a `{uri}local` attribute name.
fn split_qualified(name: &str) -> Option<(&str, &str)> {
    name.strip_prefix('{')?.split_once('}')
}

/// The prefix bound to `uri`, declaring one into `out` when none is in scope.
fn bind_prefix(
    uri: &str,
    preferred: &[(String, String)],
    bound: &mut Vec<(String, String)>,
    out: &mut String,
) -> String {
    if let Some((prefix, _)) = bound.iter().find(|(_, u)| u == uri) {
        return prefix.clone();
    }
    let taken = |prefix: &str| bound.iter().any(|(p, _)| p == prefix);
    let prefix = preferred
        .iter()
        .find(|(p, u)| u == uri && !taken(p))
        .map(|(p, _)| p.clone())
        .unwrap_or_else(|| (0..).map(|n| format!("ns{n}")).find(|p| !taken(p)).unwrap_or_default());
    out.push_str(" xmlns:");
    out.push_str(&prefix);
    out.push_str("=\"");
    out.push_str(&escape(uri));
    out.push('"');
    bound.push((prefix.clone(), uri.to_string()));
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn namespaced_attributes_round_trip() {
        let xml = concat!(
            r#"<r xmlns:xl="http://www.w3.org/1999/xlink">"#,
            r#"<a xl:href="x" xml:lang="en"/><b xl:title="t"/></r>"#,
        );
        let root = Element::parse(xml).unwrap();
        let out = root.to_xml();

        assert_eq!(
            out,
            concat!(
                r#"<r><a xmlns:xl="http://www.w3.org/1999/xlink" xl:href="x" xml:lang="en"/>"#,
                r#"<b xmlns:xl="http://www.w3.org/1999/xlink" xl:title="t"/></r>"#,
            )
        );
        let reparsed = Element::parse(&out).unwrap();
        assert_eq!(reparsed.children()[0].attribute("{http://www.w3.org/1999/xlink}href").as_deref(), Some("x"));
        assert_eq!(reparsed.to_xml(), out);
    }

    #[test]
    fn built_namespaced_attributes_get_generated_prefixes() {
        let root = Element::new("r")
            .with_attribute("{urn:a}x", "1")
            .with_child(Element::new("c").with_attribute("{urn:a}y", "2").with_attribute("{urn:b}z", "3"));

        assert_eq!(
            root.to_xml(),
            r#"<r xmlns:ns0="urn:a" ns0:x="1"><c xmlns:ns1="urn:b" ns0:y="2" ns1:z="3"/></r>"#
        );
        assert!(Element::parse(&root.to_xml()).is_ok());
    }

    #[test]
    fn builds_and_serializes() {
        let root = Element::new("root")
            .with_attribute("a", "1 < 2")
            .with_child(Element::new("x").with_text("hi"))
            .with_child(Element::new("y"));

        assert_eq!(root.to_xml(), r#"<root a="1 &lt; 2"><x>hi</x><y/></root>"#);
    }

    #[test]
    fn deep_copy_is_detached_and_independent() {
        let root = Element::parse("<r><a>t</a>tail</r>").unwrap();
        let copy = root.deep_copy();

        assert_ne!(copy, root);
        assert_eq!(copy.to_xml(), root.to_xml());

        copy.children()[0].set_local_name("b");
        assert_eq!(root.to_xml(), "<r><a>t</a>tail</r>");
        assert_eq!(copy.to_xml(), "<r><b>t</b>tail</r>");
        assert_eq!(copy.children()[0].parent(), Some(copy.clone()));
    }

    #[test]
    fn detach_keeps_tail_text() {
        let root = Element::parse("<r>a<x/>b<y/>c</r>").unwrap();
        let children = root.children();

        children[0].detach();
        assert_eq!(root.to_xml(), "<r>ab<y/>c</r>");

        children[1].detach();
        assert_eq!(root.to_xml(), "<r>abc</r>");
        assert!(children[1].parent().is_none());
    }

    #[test]
    fn append_child_moves_between_parents() {
        let a = Element::new("a");
        let b = Element::new("b");
        let child = Element::new("c");

        a.append_child(child.clone());
        b.append_child(child.clone());

        assert!(a.children().is_empty());
        assert_eq!(b.children(), vec![child.clone()]);
        assert_eq!(child.parent(), Some(b));
    }

    #[test]
    fn siblings_and_full_text() {
        let root = Element::parse("<r>1<a>2</a>3<b>4<c>5</c></b>6</r>").unwrap();
        let children = root.children();

        assert_eq!(children[0].next_sibling(), Some(children[1].clone()));
        assert_eq!(children[1].previous_sibling(), Some(children[0].clone()));
        assert_eq!(children[0].previous_sibling(), None);
        assert_eq!(root.full_text(), "123456");
        assert_eq!(children[1].index(), Some(1));
    }
}
