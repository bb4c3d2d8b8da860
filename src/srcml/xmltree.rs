//! A minimal, lenient in-memory tree for srcml's XML output.
//!
//! `quick-xml`'s pull parser is configured non-strict (`check_end_names =
//! false`) so a truncated or slightly malformed document — the timeout/crash
//! cases spec.md §4.C calls out — still yields whatever was parsed before
//! the failure, per spec.md §7's "truncated documents yield whatever units
//! were parsed before failure."
//!
//! Namespace handling is deliberately cheap: srcml's default namespace
//! (`src`) appears unprefixed on every element, `cpp:` elements carry an
//! explicit prefix, and position info is read from whichever attribute has
//! local name `line`/`column` regardless of its declared namespace. This
//! mirrors the crate's overall "lexical, not semantic" matching philosophy
//! (spec.md §1).

use quick_xml::events::Event;
use quick_xml::Reader;

/// One element of the parsed tree. Text is *own direct text only* — the
/// text immediately inside the tag before any child element — matching
/// `lxml.etree.Element.text` semantics that the original reference
/// implementation relies on for its name-extraction rewrite loop.
#[derive(Debug, Default, Clone)]
pub struct XmlNode {
    pub prefix: Option<String>,
    pub tag: String,
    pub attrs: std::collections::HashMap<String, String>,
    pub children: Vec<XmlNode>,
    pub text: String,
    pub position_line: Option<u32>,
}

impl XmlNode {
    fn new(prefix: Option<String>, tag: String) -> Self {
        Self {
            prefix,
            tag,
            attrs: std::collections::HashMap::new(),
            children: Vec::new(),
            text: String::new(),
            position_line: None,
        }
    }

    pub fn is_src(&self, tag: &str) -> bool {
        self.prefix.is_none() && self.tag == tag
    }

    pub fn is_cpp(&self, tag: &str) -> bool {
        self.prefix.as_deref() == Some("cpp") && self.tag == tag
    }

    /// Full recursive text content, own text followed by each child's.
    /// Whitespace between text and child elements is not reconstructed
    /// precisely — only used for macro-token text, where this is enough.
    pub fn full_text(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.full_text());
        }
        out
    }
}

fn split_qname(raw: &str) -> (Option<String>, String) {
    match raw.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, raw.to_string()),
    }
}

fn local_attr_name(raw: &str) -> &str {
    raw.rsplit(':').next().unwrap_or(raw)
}

/// Parse srcml XML bytes into a tree rooted at the top-level `<unit>`
/// element. Malformed or truncated input yields a best-effort partial tree
/// rather than an error — see module docs.
pub fn parse(xml: &[u8]) -> XmlNode {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text = true;
    reader.config_mut().check_end_names = false;

    let mut stack: Vec<XmlNode> = vec![XmlNode::new(None, "__root__".to_string())];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let raw = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let (prefix, tag) = split_qname(&raw);
                let mut node = XmlNode::new(prefix, tag);
                apply_attrs(&mut node, &e);
                stack.push(node);
            }
            Ok(Event::Empty(e)) => {
                let raw = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let (prefix, tag) = split_qname(&raw);
                let mut node = XmlNode::new(prefix, tag);
                apply_attrs(&mut node, &e);
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Ok(Event::Text(e)) => {
                if let Ok(text) = e.unescape() {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(text.trim());
                    }
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() > 1 {
                    let finished = stack.pop().expect("stack checked non-empty above");
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(finished);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    // Lenient recovery: unwind any still-open elements (a truncated
    // document) into the document so far, deepest first.
    while stack.len() > 1 {
        let finished = stack.pop().expect("stack checked non-empty above");
        if let Some(parent) = stack.last_mut() {
            parent.children.push(finished);
        }
    }

    let mut root = stack.pop().unwrap_or_else(|| XmlNode::new(None, "__root__".to_string()));
    root.children
        .pop()
        .unwrap_or_else(|| XmlNode::new(None, "unit".to_string()))
}

fn apply_attrs(node: &mut XmlNode, start: &quick_xml::events::BytesStart) {
    for attr in start.attributes().flatten() {
        let raw_key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let Ok(value) = attr.unescape_value() else {
            continue;
        };
        let local = local_attr_name(&raw_key).to_string();
        if local == "line" {
            node.position_line = value.parse().ok();
        }
        node.attrs.insert(local, value.into_owned());
    }
}
