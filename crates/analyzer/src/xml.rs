//! Minimal XML element tree for proxy descriptors.

use edgeshift_common::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Deepest element nesting accepted by [`XmlElement::parse`].
pub const MAX_DEPTH: usize = 256;

/// An element with its attributes, trimmed text and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Parse a document into its root element.
    ///
    /// Fails with `InvalidFormat` on malformed markup, unclosed elements,
    /// stray text, more than one root or nesting deeper than [`MAX_DEPTH`].
    pub fn parse(content: &str) -> Result<XmlElement> {
        let mut reader = Reader::from_str(content);
        reader.trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                Error::InvalidFormat(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            })?;

            match event {
                Event::Start(start) => {
                    ensure_single_root(&root)?;
                    if stack.len() >= MAX_DEPTH {
                        return Err(Error::InvalidFormat(format!(
                            "Elements nested deeper than {} levels",
                            MAX_DEPTH
                        )));
                    }
                    stack.push(element_from(&start)?);
                }
                Event::Empty(start) => {
                    ensure_single_root(&root)?;
                    let element = element_from(&start)?;
                    close(element, &mut stack, &mut root);
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::InvalidFormat("Unexpected closing tag".to_string()))?;
                    close(element, &mut stack, &mut root);
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| Error::InvalidFormat(e.to_string()))?;
                    append_text(&mut stack, &text)?;
                }
                Event::CData(data) => {
                    let data = data.into_inner();
                    append_text(&mut stack, &String::from_utf8_lossy(&data))?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::InvalidFormat(format!(
                "Unclosed element <{}>",
                open.name
            )));
        }

        root.ok_or_else(|| Error::InvalidFormat("Document has no root element".to_string()))
    }

    /// Value of the named attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Direct children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// All descendants in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        let mut pending: Vec<&XmlElement> = self.children.iter().rev().collect();
        while let Some(element) = pending.pop() {
            out.push(element);
            pending.extend(element.children.iter().rev());
        }
        out
    }

    /// Descendants with the given name, in document order.
    pub fn descendants_named(&self, name: &str) -> Vec<&XmlElement> {
        self.descendants()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).to_string();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::InvalidFormat(format!("Bad attribute in <{}>: {}", name, e)))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::InvalidFormat(e.to_string()))?
            .to_string();
        attributes.push((key, value));
    }

    Ok(XmlElement {
        name,
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

fn ensure_single_root(root: &Option<XmlElement>) -> Result<()> {
    match root {
        Some(existing) => Err(Error::InvalidFormat(format!(
            "Content after root element <{}>",
            existing.name
        ))),
        None => Ok(()),
    }
}

fn close(element: XmlElement, stack: &mut [XmlElement], root: &mut Option<XmlElement>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

fn append_text(stack: &mut [XmlElement], text: &str) -> Result<()> {
    match stack.last_mut() {
        Some(current) => {
            current.text.push_str(text.trim());
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(Error::InvalidFormat(
            "Text outside of the root element".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROXY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<APIProxy name="weather" revision="3">
    <Description>Weather &amp; forecasts</Description>
    <Policies>
        <Policy>VerifyAPIKey</Policy>
        <Policy>Quota</Policy>
    </Policies>
    <ProxyEndpoints><ProxyEndpoint>default</ProxyEndpoint></ProxyEndpoints>
    <Empty/>
</APIProxy>"#;

    #[test]
    fn test_parse_tree() {
        let root = XmlElement::parse(PROXY).unwrap();
        assert_eq!(root.name, "APIProxy");
        assert_eq!(root.attr("name"), Some("weather"));
        assert_eq!(root.attr("missing"), None);
        assert_eq!(root.child("Description").unwrap().text, "Weather & forecasts");

        let policies: Vec<&str> = root
            .child("Policies")
            .unwrap()
            .children_named("Policy")
            .map(|p| p.text.as_str())
            .collect();
        assert_eq!(policies, vec!["VerifyAPIKey", "Quota"]);
        assert!(root.child("Empty").is_some());
    }

    #[test]
    fn test_descendants_in_document_order() {
        let root = XmlElement::parse(
            "<Flow><Step><Name>A</Name></Step><Sub><Step><Name>B</Name></Step></Sub></Flow>",
        )
        .unwrap();
        let names: Vec<&str> = root
            .descendants_named("Name")
            .into_iter()
            .map(|n| n.text.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_nesting_depth_is_bounded() {
        let nested = |depth: usize| format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));

        let root = XmlElement::parse(&nested(MAX_DEPTH)).unwrap();
        assert_eq!(root.descendants_named("a").len(), MAX_DEPTH - 1);

        let err = XmlElement::parse(&nested(MAX_DEPTH + 1)).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));

        let err = XmlElement::parse(&nested(200_000)).unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_cdata_is_text() {
        let root = XmlElement::parse("<Script><![CDATA[if (a < b) {}]]></Script>").unwrap();
        assert_eq!(root.text, "if (a < b) {}");
    }

    #[test]
    fn test_malformed_documents() {
        for bad in [
            "<APIProxy><Policies></APIProxy>",
            "<APIProxy>",
            "<a/><b/>",
            "",
            "just text",
        ] {
            let err = XmlElement::parse(bad).unwrap_err();
            assert!(err.is_structural(), "{} should be malformed", bad);
        }
    }
}
