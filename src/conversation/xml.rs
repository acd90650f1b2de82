//! Minimal XML element tree built on quick-xml's event reader.
//!
//! Strict: one root element, balanced tags, no text outside the root.
//! Only what tool markup needs: names, attributes, text and children.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum XmlError {
    #[error("{0}")]
    Syntax(String),

    #[error("mismatched closing tag: expected </{expected}>, found </{found}>")]
    Mismatched { expected: String, found: String },

    #[error("unclosed element <{0}>")]
    Unclosed(String),

    #[error("document has no root element")]
    NoRoot,

    #[error("content after the root element")]
    TrailingContent,

    #[error("text outside the root element")]
    StrayText,
}

/// A parsed element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Concatenated direct text content (entities unescaped).
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Parse a complete document into its root element.
pub fn parse_document(input: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if root.is_some() {
                    return Err(XmlError::TrailingContent);
                }
                stack.push(open_element(&e)?);
            }
            Ok(Event::Empty(e)) => {
                if root.is_some() {
                    return Err(XmlError::TrailingContent);
                }
                let element = open_element(&e)?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::End(e)) => {
                let found = decode(e.name().as_ref())?;
                let element = stack
                    .pop()
                    .ok_or_else(|| XmlError::Syntax(format!("unexpected closing tag </{found}>")))?;
                if element.name != found {
                    return Err(XmlError::Mismatched {
                        expected: element.name,
                        found,
                    });
                }
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| XmlError::Syntax(e.to_string()))?;
                push_text(&mut stack, &text)?;
            }
            Ok(Event::CData(c)) => {
                let bytes = c.into_inner();
                push_text(&mut stack, &String::from_utf8_lossy(&bytes))?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {} // declarations, comments, processing instructions
            Err(e) => return Err(XmlError::Syntax(e.to_string())),
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::Unclosed(open.name));
    }
    root.ok_or(XmlError::NoRoot)
}

fn open_element(start: &BytesStart<'_>) -> Result<Element, XmlError> {
    let name = decode(start.name().as_ref())?;
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Syntax(e.to_string()))?;
        let key = decode(attr.key.as_ref())?;
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Syntax(e.to_string()))?;
        attributes.push((key, value.into_owned()));
    }
    Ok(Element {
        name,
        attributes,
        ..Element::default()
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

fn push_text(stack: &mut [Element], text: &str) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(element) => {
            element.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(XmlError::StrayText),
    }
}

fn decode(bytes: &[u8]) -> Result<String, XmlError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| XmlError::Syntax(e.to_string()))
}
