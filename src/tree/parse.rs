use super::element::Element;
use crate::node::{TreeNode, TreeNodeMut};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;

/// A document could not be turned into an element tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed document at byte {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("document has no root element")]
    Empty,
    #[error("document has more than one root element (second one is <{0}>)")]
    MultipleRoots(String),
    #[error("element <{0}> is never closed")]
    Unclosed(String),
    #[error("text outside of the root element: {0:?}")]
    StrayText(String),
    #[error("namespace prefix `{0}` is not bound")]
    UnboundPrefix(String),
}

pub(crate) const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Default)]
struct Scopes(Vec<HashMap<String, String>>);

impl Scopes {
    fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.0.iter().rev().find_map(|scope| scope.get(prefix)).map(String::as_str)
    }
}

pub(crate) fn parse_document(xml: &str) -> Result<Element, ParseError> {
    let mut reader = Reader::from_str(xml);
    let mut scopes = Scopes::default();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position();
        let syntax = |message: String| ParseError::Syntax { position, message };

        match reader.read_event().map_err(|e| syntax(e.to_string()))? {
            Event::Start(start) => {
                let element = open(&start, &mut scopes, &stack, &root).map_err(|e| e.at(position))?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = open(&start, &mut scopes, &stack, &root).map_err(|e| e.at(position))?;
                scopes.0.pop();
                if stack.is_empty() {
                    root = Some(element);
                }
            }
            Event::End(_) => {
                scopes.0.pop();
                if let Some(element) = stack.pop() {
                    if stack.is_empty() {
                        root = Some(element);
                    }
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| syntax(e.to_string()))?;
                add_text(&stack, &text)?;
            }
            Event::CData(data) => {
                let bytes = data.into_inner();
                add_text(&stack, &String::from_utf8_lossy(&bytes))?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes
            // carry nothing the element tree models.
            _ => {}
        }
    }

    if let Some(open) = stack.first() {
        return Err(ParseError::Unclosed(open.local_name()));
    }
    root.ok_or(ParseError::Empty)
}

enum OpenError {
    Parse(ParseError),
    Syntax(String),
}

impl OpenError {
    fn at(self, position: usize) -> ParseError {
        match self {
            OpenError::Parse(e) => e,
            OpenError::Syntax(message) => ParseError::Syntax { position, message },
        }
    }
}

fn open(
    start: &BytesStart<'_>,
    scopes: &mut Scopes,
    stack: &[Element],
    root: &Option<Element>,
) -> Result<Element, OpenError> {
    let qualified = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut declarations = HashMap::new();
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| OpenError::Syntax(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(|e| OpenError::Syntax(e.to_string()))?.into_owned();

        if key == "xmlns" {
            declarations.insert(String::new(), value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declarations.insert(prefix.to_string(), value);
        } else {
            attributes.push((key, value));
        }
    }
    scopes.0.push(declarations);

    let (prefix, local_name) = match qualified.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", qualified.as_str()),
    };

    if stack.is_empty() && root.is_some() {
        return Err(OpenError::Parse(ParseError::MultipleRoots(local_name.to_string())));
    }

    let namespace = match scopes.resolve(prefix) {
        Some("") => None,
        Some(uri) => Some(uri.to_string()),
        None if prefix.is_empty() => None,
        None => return Err(OpenError::Parse(ParseError::UnboundPrefix(prefix.to_string()))),
    };

    let element = Element::new(local_name);
    element.set_namespace(namespace);
    for (key, value) in &attributes {
        let Some((prefix, local)) = key.split_once(':') else {
            element.set_attribute(key, value);
            continue;
        };
        let uri = match scopes.resolve(prefix) {
            Some(uri) if !uri.is_empty() => uri,
            _ => return Err(OpenError::Parse(ParseError::UnboundPrefix(prefix.to_string()))),
        };
        if uri != XML_NAMESPACE {
            element.prefer_prefix(prefix, uri);
        }
        element.set_attribute(&format!("{{{uri}}}{local}"), value);
    }
    if let Some(parent) = stack.last() {
        parent.append_child(element.clone());
    }
    Ok(element)
}

fn add_text(stack: &[Element], text: &str) -> Result<(), ParseError> {
    match stack.last() {
        Some(current) => {
            current.push_text(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(ParseError::StrayText(text.trim().to_string())),
    }
}
