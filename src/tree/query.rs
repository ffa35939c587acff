//! Query evaluation for [`Element`] trees.
//!
//! Two small languages compile to the same location-path representation:
//!
//! - an XPath 1.0 subset: absolute and relative paths, `//`, `.`, `..`, `*`,
//!   `node()`, the element axes, positional and attribute/text predicates and
//!   `|` unions;
//! - a CSS subset: type selectors (optionally `ns|name`), `*`, `#id`, `.class`,
//!   `[a]`, `[a=v]`, `[a~=v]`, the four combinators and `,` groups.
//!
//! Name tests compare local names. The tree keeps namespace URIs but no prefix
//! bindings, so a prefix in a name test only requires that the node is in
//! *some* namespace (`|name` requires no namespace, `*|name` accepts any).
//!
//! Paths run over items: besides elements there is the document item, the
//! parent of the outermost element. That is what makes `/a` and `//a` select
//! the top element itself.

use super::element::Element;
use crate::node::{QueryError, TreeNode};
use indexmap::IndexSet;
use std::collections::HashMap;
use std::iter;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Item {
    Document(Element),
    Node(Element),
}

impl Item {
    fn element(self) -> Option<Element> {
        match self {
            Item::Document(_) => None,
            Item::Node(e) => Some(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfNode,
    Parent,
    Ancestor,
    FollowingSibling,
    PrecedingSibling,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "self" => Axis::SelfNode,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            _ => return None,
        })
    }

    /// Nodes along the axis, nearest first.
    fn walk(self, item: &Item) -> Vec<Item> {
        match (self, item) {
            (Axis::SelfNode, _) => vec![item.clone()],
            (Axis::Child, Item::Document(top)) => vec![Item::Node(top.clone())],
            (Axis::Child, Item::Node(e)) => e.children().into_iter().map(Item::Node).collect(),
            (Axis::Descendant, Item::Document(top)) => {
                iter::once(top.clone()).chain(top.descendants()).map(Item::Node).collect()
            }
            (Axis::Descendant, Item::Node(e)) => e.descendants().into_iter().map(Item::Node).collect(),
            (Axis::DescendantOrSelf, _) => iter::once(item.clone()).chain(Axis::Descendant.walk(item)).collect(),
            (Axis::Parent, Item::Node(e)) => match e.parent() {
                Some(parent) => vec![Item::Node(parent)],
                None => vec![Item::Document(e.clone())],
            },
            (Axis::Ancestor, Item::Node(e)) => {
                let mut out = Vec::new();
                let mut current = e.clone();
                while let Some(parent) = current.parent() {
                    out.push(Item::Node(parent.clone()));
                    current = parent;
                }
                out.push(Item::Document(current));
                out
            }
            (Axis::FollowingSibling, Item::Node(e)) => {
                let Some(parent) = e.parent() else { return Vec::new() };
                parent.children().into_iter().skip_while(|c| c != e).skip(1).map(Item::Node).collect()
            }
            (Axis::PrecedingSibling, Item::Node(e)) => {
                let Some(parent) = e.parent() else { return Vec::new() };
                let mut before: Vec<Item> =
                    parent.children().into_iter().take_while(|c| c != e).map(Item::Node).collect();
                before.reverse();
                before
            }
            (Axis::Parent | Axis::Ancestor | Axis::FollowingSibling | Axis::PrecedingSibling, Item::Document(_)) => {
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Namespace {
    Any,
    Without,
    Within,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    /// `node()`: elements and the document item.
    Node,
    /// An element test; `local: None` is `*`.
    Element { namespace: Namespace, local: Option<String> },
}

impl NameTest {
    const ANY_ELEMENT: NameTest = NameTest::Element { namespace: Namespace::Any, local: None };

    fn matches(&self, item: &Item) -> bool {
        match (self, item) {
            (NameTest::Node, _) => true,
            (NameTest::Element { .. }, Item::Document(_)) => false,
            (NameTest::Element { namespace, local }, Item::Node(e)) => {
                let namespace_ok = match namespace {
                    Namespace::Any => true,
                    Namespace::Without => e.namespace().is_none(),
                    Namespace::Within => e.namespace().is_some(),
                };
                namespace_ok && local.as_ref().is_none_or(|l| *l == e.local_name())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Position(usize),
    Last,
    HasAttribute(String),
    AttributeEquals(String, String),
    AttributeHasWord(String, String),
    TextEquals(String),
    FullTextEquals(String),
    SelfName(NameTest),
}

impl Predicate {
    fn filter(&self, items: Vec<Item>) -> Vec<Item> {
        let size = items.len();
        items
            .into_iter()
            .enumerate()
            .filter(|(index, item)| self.matches(item, index + 1, size))
            .map(|(_, item)| item)
            .collect()
    }

    fn matches(&self, item: &Item, position: usize, size: usize) -> bool {
        let element = match item {
            Item::Node(e) => Some(e),
            Item::Document(_) => None,
        };
        match self {
            Predicate::Position(n) => position == *n,
            Predicate::Last => position == size,
            Predicate::SelfName(test) => test.matches(item),
            Predicate::HasAttribute(name) => element.is_some_and(|e| e.attribute(name).is_some()),
            Predicate::AttributeEquals(name, value) => {
                element.is_some_and(|e| e.attribute(name).as_ref() == Some(value))
            }
            Predicate::AttributeHasWord(name, word) => element
                .and_then(|e| e.attribute(name))
                .is_some_and(|v| v.split_whitespace().any(|w| w == word)),
            Predicate::TextEquals(value) => element.is_some_and(|e| {
                iter::once(e.text()).chain(e.children().iter().map(|c| c.tail())).flatten().any(|t| t == *value)
            }),
            Predicate::FullTextEquals(value) => element.is_some_and(|e| e.full_text() == *value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NameTest,
    predicates: Vec<Predicate>,
}

impl Step {
    fn new(axis: Axis, test: NameTest) -> Self {
        Step { axis, test, predicates: Vec::new() }
    }

    fn apply(&self, item: &Item) -> Vec<Item> {
        let candidates: Vec<Item> = self.axis.walk(item).into_iter().filter(|i| self.test.matches(i)).collect();
        self.predicates.iter().fold(candidates, |items, predicate| predicate.filter(items))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Path {
    absolute: bool,
    steps: Vec<Step>,
}

impl Path {
    fn evaluate(&self, context: &Element) -> Vec<Element> {
        let start = if self.absolute { Item::Document(context.top()) } else { Item::Node(context.clone()) };
        let mut items = vec![start];
        for step in &self.steps {
            let next: IndexSet<Item> = items.iter().flat_map(|item| step.apply(item)).collect();
            items = next.into_iter().collect();
        }
        items.into_iter().filter_map(Item::element).collect()
    }
}

/// A compiled expression: the union of its paths, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Query {
    paths: Vec<Path>,
}

impl Query {
    pub(crate) fn xpath(expression: &str) -> Result<Self, QueryError> {
        XPathParser { cursor: Cursor::new(expression) }.parse()
    }

    pub(crate) fn css(selector: &str) -> Result<Self, QueryError> {
        CssParser { cursor: Cursor::new(selector) }.parse()
    }

    pub(crate) fn evaluate(&self, context: &Element) -> Vec<Element> {
        let found: IndexSet<Element> = self.paths.iter().flat_map(|path| path.evaluate(context)).collect();
        if found.len() < 2 {
            return found.into_iter().collect();
        }

        let top = context.top();
        let order: HashMap<Element, usize> =
            iter::once(top.clone()).chain(top.descendants()).enumerate().map(|(i, e)| (e, i)).collect();
        let mut nodes: Vec<Element> = found.into_iter().collect();
        nodes.sort_by_key(|n| order.get(n).copied().unwrap_or(usize::MAX));
        nodes
    }
}

// --- Parsing -----------------------------------------------------------------

struct Cursor<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Cursor { source, chars: source.chars().collect(), pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        let n = s.chars().count();
        if self.chars.len() >= self.pos + n && self.chars[self.pos..self.pos + n].iter().copied().eq(s.chars()) {
            self.pos += n;
            true
        } else {
            false
        }
    }

    /// Skips whitespace and reports whether there was any.
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn expect(&mut self, c: char) -> Result<(), QueryError> {
        if self.eat(c) { Ok(()) } else { Err(self.unexpected(&format!("expected `{c}`"))) }
    }

    fn take_while(&mut self, f: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&f) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// An XML name, with an optional `prefix:` part.
    fn xml_name(&mut self) -> Option<String> {
        if !self.peek().is_some_and(is_name_start) {
            return None;
        }
        let mut name = self.take_while(is_name_char);
        if self.peek() == Some(':') && self.peek_at(1).is_some_and(is_name_start) {
            self.pos += 1;
            name.push(':');
            name.push_str(&self.take_while(is_name_char));
        }
        Some(name)
    }

    fn css_ident(&mut self) -> Option<String> {
        let starts = self.peek().is_some_and(|c| is_name_start(c) || c == '-');
        starts.then(|| self.take_while(|c| c.is_alphanumeric() || c == '-' || c == '_'))
    }

    fn literal(&mut self) -> Result<String, QueryError> {
        let Some(quote) = self.peek().filter(|c| *c == '"' || *c == '\'') else {
            return Err(self.unexpected("expected a quoted string"));
        };
        self.pos += 1;
        let value = self.take_while(|c| c != quote);
        self.expect(quote)?;
        Ok(value)
    }

    fn error(&self, message: impl Into<String>) -> QueryError {
        QueryError::new(self.source, message)
    }

    fn unexpected(&self, context: &str) -> QueryError {
        match self.peek() {
            Some(c) => self.error(format!("{context}, found `{c}` at offset {}", self.pos)),
            None => self.error(format!("{context}, found end of expression")),
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

struct XPathParser<'a> {
    cursor: Cursor<'a>,
}

impl XPathParser<'_> {
    fn parse(mut self) -> Result<Query, QueryError> {
        let mut paths = vec![self.path()?];
        loop {
            self.cursor.skip_ws();
            if self.cursor.eat('|') {
                paths.push(self.path()?);
            } else {
                break;
            }
        }
        if !self.cursor.at_end() {
            return Err(self.cursor.unexpected("expected `|` or end of expression"));
        }
        Ok(Query { paths })
    }

    fn path(&mut self) -> Result<Path, QueryError> {
        let c = &mut self.cursor;
        c.skip_ws();
        let mut steps = Vec::new();
        let absolute = if c.eat_str("//") {
            steps.push(Step::new(Axis::DescendantOrSelf, NameTest::Node));
            true
        } else if c.eat('/') {
            c.skip_ws();
            if !self.at_step() {
                return Ok(Path { absolute: true, steps });
            }
            true
        } else {
            false
        };

        steps.push(self.step()?);
        loop {
            let c = &mut self.cursor;
            c.skip_ws();
            if c.eat_str("//") {
                steps.push(Step::new(Axis::DescendantOrSelf, NameTest::Node));
            } else if !c.eat('/') {
                break;
            }
            steps.push(self.step()?);
        }
        Ok(Path { absolute, steps })
    }

    fn at_step(&self) -> bool {
        self.cursor.peek().is_some_and(|c| is_name_start(c) || c == '*' || c == '.' || c == '@')
    }

    fn step(&mut self) -> Result<Step, QueryError> {
        let c = &mut self.cursor;
        c.skip_ws();
        if c.eat_str("..") {
            return Ok(Step::new(Axis::Parent, NameTest::Node));
        }
        if c.eat('.') {
            return Ok(Step::new(Axis::SelfNode, NameTest::Node));
        }
        if c.peek() == Some('@') {
            return Err(c.error("attribute steps are not supported, use a predicate such as `[@name]`"));
        }

        let mut axis = Axis::Child;
        let saved = c.pos;
        if let Some(name) = c.xml_name() {
            c.skip_ws();
            if c.eat_str("::") {
                axis = Axis::from_name(&name).ok_or_else(|| c.error(format!("unknown axis `{name}`")))?;
                c.skip_ws();
            } else {
                c.pos = saved;
            }
        }

        let test = self.name_test()?;
        let mut step = Step::new(axis, test);
        loop {
            self.cursor.skip_ws();
            if !self.cursor.eat('[') {
                break;
            }
            step.predicates.push(self.predicate()?);
            self.cursor.skip_ws();
            self.cursor.expect(']')?;
        }
        Ok(step)
    }

    fn name_test(&mut self) -> Result<NameTest, QueryError> {
        let c = &mut self.cursor;
        if c.eat('*') {
            return Ok(NameTest::ANY_ELEMENT);
        }
        let Some(name) = c.xml_name() else {
            return Err(c.unexpected("expected a name test"));
        };
        if name == "node" && c.eat_str("()") {
            return Ok(NameTest::Node);
        }
        Ok(match name.split_once(':') {
            Some((_, local)) => NameTest::Element { namespace: Namespace::Within, local: Some(local.to_string()) },
            None => NameTest::Element { namespace: Namespace::Any, local: Some(name) },
        })
    }

    fn predicate(&mut self) -> Result<Predicate, QueryError> {
        let c = &mut self.cursor;
        c.skip_ws();
        if c.peek().is_some_and(|ch| ch.is_ascii_digit()) {
            let digits = c.take_while(|ch| ch.is_ascii_digit());
            return match digits.parse::<usize>() {
                Ok(n) if n > 0 => Ok(Predicate::Position(n)),
                _ => Err(c.error(format!("invalid position `{digits}`"))),
            };
        }
        if c.eat_str("last()") {
            return Ok(Predicate::Last);
        }
        if c.eat('@') {
            let Some(name) = c.xml_name() else {
                return Err(c.unexpected("expected an attribute name"));
            };
            c.skip_ws();
            if !c.eat('=') {
                return Ok(Predicate::HasAttribute(name));
            }
            c.skip_ws();
            return Ok(Predicate::AttributeEquals(name, c.literal()?));
        }
        if c.eat_str("text()") {
            c.skip_ws();
            c.expect('=')?;
            c.skip_ws();
            return Ok(Predicate::TextEquals(c.literal()?));
        }
        if c.eat('.') {
            c.skip_ws();
            c.expect('=')?;
            c.skip_ws();
            return Ok(Predicate::FullTextEquals(c.literal()?));
        }
        Err(c.unexpected("unsupported predicate"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

struct CssParser<'a> {
    cursor: Cursor<'a>,
}

impl CssParser<'_> {
    fn parse(mut self) -> Result<Query, QueryError> {
        let mut paths = Vec::new();
        loop {
            self.cursor.skip_ws();
            paths.push(self.complex()?);
            self.cursor.skip_ws();
            if !self.cursor.eat(',') {
                break;
            }
        }
        if !self.cursor.at_end() {
            return Err(self.cursor.unexpected("expected a combinator or `,`"));
        }
        Ok(Query { paths })
    }

    fn complex(&mut self) -> Result<Path, QueryError> {
        let (test, predicates) = self.compound()?;
        let mut steps = vec![Step { axis: Axis::DescendantOrSelf, test, predicates }];

        loop {
            let spaced = self.cursor.skip_ws();
            let combinator = match self.cursor.peek() {
                Some('>') => Combinator::Child,
                Some('+') => Combinator::Adjacent,
                Some('~') => Combinator::Sibling,
                Some(',') | None => break,
                Some(_) if spaced => Combinator::Descendant,
                Some(_) => return Err(self.cursor.unexpected("expected a combinator")),
            };
            if combinator != Combinator::Descendant {
                self.cursor.pos += 1;
                self.cursor.skip_ws();
            }

            let (test, mut predicates) = self.compound()?;
            steps.push(match combinator {
                Combinator::Descendant => Step { axis: Axis::Descendant, test, predicates },
                Combinator::Child => Step { axis: Axis::Child, test, predicates },
                Combinator::Sibling => Step { axis: Axis::FollowingSibling, test, predicates },
                Combinator::Adjacent => {
                    predicates.splice(0..0, [Predicate::Position(1), Predicate::SelfName(test)]);
                    Step { axis: Axis::FollowingSibling, test: NameTest::ANY_ELEMENT, predicates }
                }
            });
        }

        Ok(Path { absolute: false, steps })
    }

    fn compound(&mut self) -> Result<(NameTest, Vec<Predicate>), QueryError> {
        let c = &mut self.cursor;
        let mut matched = false;
        let mut test = NameTest::ANY_ELEMENT;

        let first = if c.eat('*') { Some("*".to_string()) } else { c.css_ident() };
        if c.peek() == Some('|') && c.peek_at(1) != Some('=') {
            c.pos += 1;
            let namespace = match first.as_deref() {
                None => Namespace::Without,
                Some("*") => Namespace::Any,
                Some(_) => Namespace::Within,
            };
            let local = if c.eat('*') {
                None
            } else {
                Some(c.css_ident().ok_or_else(|| c.unexpected("expected an element name"))?)
            };
            test = NameTest::Element { namespace, local };
            matched = true;
        } else if let Some(name) = first {
            let local = (name != "*").then_some(name);
            test = NameTest::Element { namespace: Namespace::Any, local };
            matched = true;
        }

        let mut predicates = Vec::new();
        loop {
            if c.eat('#') {
                let id = c.css_ident().ok_or_else(|| c.unexpected("expected an id"))?;
                predicates.push(Predicate::AttributeEquals("id".into(), id));
            } else if c.eat('.') {
                let class = c.css_ident().ok_or_else(|| c.unexpected("expected a class name"))?;
                predicates.push(Predicate::AttributeHasWord("class".into(), class));
            } else if c.eat('[') {
                predicates.push(attribute_selector(c)?);
            } else {
                break;
            }
            matched = true;
        }

        if !matched {
            return Err(c.unexpected("expected a selector"));
        }
        Ok((test, predicates))
    }
}

fn attribute_selector(c: &mut Cursor<'_>) -> Result<Predicate, QueryError> {
    c.skip_ws();
    let name = c.css_ident().ok_or_else(|| c.unexpected("expected an attribute name"))?;
    c.skip_ws();
    if c.eat(']') {
        return Ok(Predicate::HasAttribute(name));
    }
    let predicate = if c.eat_str("~=") {
        c.skip_ws();
        Predicate::AttributeHasWord(name, css_value(c)?)
    } else if c.eat('=') {
        c.skip_ws();
        Predicate::AttributeEquals(name, css_value(c)?)
    } else {
        return Err(c.unexpected("unsupported attribute selector"));
    };
    c.skip_ws();
    c.expect(']')?;
    Ok(predicate)
}

fn css_value(c: &mut Cursor<'_>) -> Result<String, QueryError> {
    if matches!(c.peek(), Some('"' | '\'')) {
        c.literal()
    } else {
        c.css_ident().ok_or_else(|| c.unexpected("expected an attribute value"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const SAMPLE: &str = concat!(
        r#"<section xmlns="foo"><table id="t"><head>Table Header</head></table>"#,
        r#"<cb type="start" class="marker break">X</cb><row>#</row><row n="2">2</row></section>"#,
    );

    fn texts(nodes: &[Element]) -> Vec<String> {
        nodes.iter().map(|n| n.full_text()).collect()
    }

    #[rstest]
    #[case::child("table > head", &["Table Header"])]
    #[case::adjacent("table + cb", &["X"])]
    #[case::siblings("table ~ row", &["#", "2"])]
    #[case::descendant("section head", &["Table Header"])]
    #[case::id("#t head", &["Table Header"])]
    #[case::class(".break", &["X"])]
    #[case::attribute("row[n]", &["2"])]
    #[case::attribute_value("cb[type=start]", &["X"])]
    #[case::attribute_quoted("cb[type='start']", &["X"])]
    #[case::attribute_word("[class~=marker]", &["X"])]
    #[case::group("head, cb", &["Table Header", "X"])]
    #[case::in_some_namespace("x|cb", &["X"])]
    #[case::without_namespace("|cb", &[])]
    fn css_selectors(#[case] selector: &str, #[case] expected: &[&str]) {
        let root = Element::parse(SAMPLE).unwrap();
        assert_eq!(texts(&root.select(selector).unwrap()), expected);
    }

    #[rstest]
    #[case::descendants("//row", &["#", "2"])]
    #[case::top("/section/cb", &["X"])]
    #[case::position("//row[1]", &["#"])]
    #[case::last("//row[last()]", &["2"])]
    #[case::attribute("//*[@type='start']", &["X"])]
    #[case::text("//row[text()='2']", &["2"])]
    #[case::full_text("//table[.='Table Header']", &["Table Header"])]
    #[case::parent("//head/..", &["Table Header"])]
    #[case::axis("//table/following-sibling::*[2]", &["#"])]
    #[case::preceding("//row[1]/preceding-sibling::*[1]", &["X"])]
    #[case::union("//cb | //head", &["Table Header", "X"])]
    fn xpath_expressions(#[case] expression: &str, #[case] expected: &[&str]) {
        let root = Element::parse(SAMPLE).unwrap();
        assert_eq!(texts(&root.query(expression).unwrap()), expected);
    }

    #[test]
    fn double_slash_matches_the_top_element() {
        let root = Element::parse("<a><a/><b/></a>").unwrap();
        let found = root.query("//a").unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0], root);
    }

    #[test]
    fn relative_xpath_starts_at_the_context_node() {
        let root = Element::parse("<r><a><b/></a><b/></r>").unwrap();
        let a = root.children()[0].clone();

        assert_eq!(a.query("b").unwrap().len(), 1);
        assert_eq!(a.query("//b").unwrap().len(), 2);
        assert_eq!(a.query(".").unwrap(), vec![a.clone()]);
        assert_eq!(a.query("ancestor::*").unwrap(), vec![root]);
    }

    #[rstest]
    #[case("a")]
    #[case("a > b")]
    #[case("*")]
    #[case("ns|a.c")]
    #[case("family-name")]
    #[case("a, b ~ c")]
    fn selector_grammar_accepts(#[case] selector: &str) {
        assert!(Element::is_selector(selector));
    }

    #[rstest]
    #[case("//a")]
    #[case("a/b")]
    #[case("a[")]
    #[case("")]
    #[case("a >")]
    #[case("a[@x]")]
    fn selector_grammar_rejects(#[case] selector: &str) {
        assert!(!Element::is_selector(selector));
    }

    #[rstest]
    #[case("a[")]
    #[case("@a")]
    #[case("foo::a")]
    #[case("a[0]")]
    #[case("a]")]
    fn malformed_xpath_is_an_error(#[case] expression: &str) {
        let root = Element::new("a");
        let err = root.query(expression).unwrap_err();
        assert_eq!(err.expression, expression);
    }
}
