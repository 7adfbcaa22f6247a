//! Minimal element tree over quick-xml
//!
//! VSAC responses arrive both with namespace-prefixed element names
//! (`ns0:DescribedValueSet`) and without them, and the prefix is not always
//! declared. The tree keeps raw qualified names and all lookups go through
//! [`Element::child`], which accepts either form.

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum XmlError {
    #[error("{0}")]
    Syntax(#[from] quick_xml::Error),
    #[error("invalid attribute: {0}")]
    Attribute(#[from] AttrError),
    #[error("element name is not valid UTF-8")]
    InvalidName,
    #[error("document has no root element")]
    NoRootElement,
    #[error("document has more than one root element")]
    MultipleRoots,
    #[error("text outside the root element")]
    StrayText,
    #[error("unclosed element <{0}>")]
    Unclosed(String),
}

/// How an element name was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NameForm<'a> {
    Prefixed { prefix: &'a str, local: &'a str },
    Bare(&'a str),
}

impl<'a> NameForm<'a> {
    pub(crate) fn of(qname: &'a str) -> Self {
        match qname.split_once(':') {
            Some((prefix, local)) => NameForm::Prefixed { prefix, local },
            None => NameForm::Bare(qname),
        }
    }

    pub(crate) fn local(self) -> &'a str {
        match self {
            NameForm::Prefixed { local, .. } => local,
            NameForm::Bare(local) => local,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub(crate) fn is_named(&self, local: &str) -> bool {
        NameForm::of(&self.name).local() == local
    }

    /// First child whose name is `local` with or without a prefix.
    pub(crate) fn child(&self, local: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is_named(local))
    }

    pub(crate) fn children_named<'s>(
        &'s self,
        local: &'s str,
    ) -> impl Iterator<Item = &'s Element> + 's {
        self.children.iter().filter(move |c| c.is_named(local))
    }

    pub(crate) fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| NameForm::of(name).local() == local)
            .map(|(_, value)| value.as_str())
    }

    /// Trimmed text of the named child, `None` when absent or blank.
    pub(crate) fn child_text(&self, local: &str) -> Option<String> {
        let text = self.child(local)?.text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

pub(crate) fn parse_document(input: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(element_from_start(&start)?),
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                // quick-xml already verified the end tag matches the open one.
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element)?;
                }
            }
            Event::Text(text) => {
                let text = text.unescape()?;
                match stack.last_mut() {
                    Some(current) => current.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err(XmlError::StrayText),
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::Unclosed(open.name));
    }
    root.ok_or(XmlError::NoRootElement)
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, XmlError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|_| XmlError::InvalidName)?
        .to_string();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(|_| XmlError::InvalidName)?;
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let value = attr.unescape_value()?;
        attributes.push((key.to_string(), value.into_owned()));
    }

    Ok(Element {
        name,
        attributes,
        ..Default::default()
    })
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(XmlError::MultipleRoots)
    }
}
