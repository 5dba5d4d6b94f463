//! Arena representation of a labeled document tree.
//!
//! Nodes carry dense ids assigned in pre-order, children live as contiguous
//! slices of one flat array, and every label or payload is a range of a
//! single byte buffer. Node 0 is the synthetic document root.

use std::ops::Range;

use crate::error::{Error, Result};

pub type NodeId = u32;

pub const ROOT: NodeId = 0;

/// Label marker of tag nodes.
pub const TAG_MARKER: u8 = b'<';
/// Label marker of attribute nodes.
pub const ATTRIBUTE_MARKER: u8 = b'@';
/// Label of every content node.
pub const CONTENT_TOKEN: &[u8] = b"=";
/// Label of the synthetic document root (a tag with an empty name).
pub const ROOT_TOKEN: &[u8] = b"<";
/// Payload of the content child added to an element with no tag or content
/// children. Never valid in UTF-8 text, elided on output.
pub const EMPTY_FILLER: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Tag,
    Attribute,
    Content,
}

impl NodeKind {
    /// Kind of a label token, judged by its marker byte.
    pub fn of_token(token: &[u8]) -> Option<NodeKind> {
        match token.first() {
            Some(&TAG_MARKER) => Some(NodeKind::Tag),
            Some(&ATTRIBUTE_MARKER) => Some(NodeKind::Attribute),
            Some(b'=') => Some(NodeKind::Content),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: NodeId,             // Root points to itself
    bytes: Range<u32>,          // Label token or payload in `Tree::text`
    children: Range<u32>,       // Slice of `Tree::child_ids`
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    child_ids: Vec<NodeId>,
    text: Vec<u8>,
}

impl Tree {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id as usize].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        match id {
            ROOT => None,
            _ => Some(self.nodes[id as usize].parent),
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        let range = &self.nodes[id as usize].children;
        &self.child_ids[range.start as usize..range.end as usize]
    }

    /// Label token (`<name`, `@name` or `=`) of a node.
    pub fn label(&self, id: NodeId) -> &[u8] {
        let node = &self.nodes[id as usize];
        match node.kind {
            NodeKind::Content => CONTENT_TOKEN,
            _ => &self.text[node.bytes.start as usize..node.bytes.end as usize],
        }
    }

    /// Payload of a content node, empty for other kinds.
    pub fn content(&self, id: NodeId) -> &[u8] {
        let node = &self.nodes[id as usize];
        match node.kind {
            NodeKind::Content => &self.text[node.bytes.start as usize..node.bytes.end as usize],
            _ => &[],
        }
    }

    pub fn is_last_child(&self, id: NodeId) -> bool {
        match self.parent(id) {
            None => true,
            Some(p) => self.children(p).last() == Some(&id),
        }
    }

    pub fn content_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Content).count()
    }

    /// Serializes the document below the root as XML text.
    pub fn to_xml(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.text.len() * 2);
        self.write_xml(ROOT, &mut out);
        out
    }

    /// Serializes the subtree rooted at `id`.
    pub fn write_xml(&self, id: NodeId, out: &mut Vec<u8>) {
        enum Step {
            Enter(NodeId),
            Exit(NodeId),
        }
        let mut stack = vec![Step::Enter(id)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(node) => match self.kind(node) {
                    NodeKind::Content => {
                        let payload = self.content(node);
                        if payload != [EMPTY_FILLER] {
                            out.extend_from_slice(payload);
                        }
                    }
                    NodeKind::Attribute => self.write_attribute(node, out),
                    NodeKind::Tag => {
                        let children = self.children(node);
                        let split = children
                            .iter()
                            .position(|&c| self.kind(c) != NodeKind::Attribute)
                            .unwrap_or(children.len());
                        if node != ROOT {
                            out.extend_from_slice(self.label(node));
                            for &attr in &children[..split] {
                                self.write_attribute(attr, out);
                            }
                            out.push(b'>');
                            stack.push(Step::Exit(node));
                        }
                        for &child in children[split..].iter().rev() {
                            stack.push(Step::Enter(child));
                        }
                    }
                },
                Step::Exit(node) => {
                    out.extend_from_slice(b"</");
                    out.extend_from_slice(&self.label(node)[1..]);
                    out.push(b'>');
                }
            }
        }
    }

    fn write_attribute(&self, attr: NodeId, out: &mut Vec<u8>) {
        out.push(b' ');
        out.extend_from_slice(&self.label(attr)[1..]);
        let value: Vec<u8> = self.children(attr).iter().flat_map(|&c| self.content(c)).copied().collect();
        write_quoted(&value, out);
    }
}

/// Writes `="value"`, switching to single quotes when the value holds a
/// double quote.
pub fn write_quoted(value: &[u8], out: &mut Vec<u8>) {
    let quote = if value.contains(&b'"') { b'\'' } else { b'"' };
    out.push(b'=');
    out.push(quote);
    out.extend_from_slice(value);
    out.push(quote);
}

/// Names become alphabet tokens, which are split again at marker bytes and
/// terminated by NUL in the image.
fn check_name(what: &str, name: &[u8]) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Parse(format!("{} with an empty name", what)));
    }
    if let Some(&byte) = name
        .iter()
        .find(|&&b| matches!(b, TAG_MARKER | ATTRIBUTE_MARKER | b'=' | 0))
    {
        return Err(Error::Parse(format!(
            "{} name {:?} contains reserved byte {:?}",
            what,
            String::from_utf8_lossy(name),
            byte as char
        )));
    }
    Ok(())
}

/// Incremental tree construction driven by a document parser.
///
/// Ids are handed out in creation order, which is pre-order as long as
/// elements are opened and closed in document order.
#[derive(Debug)]
pub struct TreeBuilder {
    nodes: Vec<(NodeKind, NodeId, Range<u32>)>,
    children: Vec<Vec<NodeId>>,
    text: Vec<u8>,
    open: Vec<NodeId>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        let mut builder = TreeBuilder {
            nodes: Vec::new(),
            children: Vec::new(),
            text: Vec::new(),
            open: Vec::new(),
        };
        let root = builder.push_node(NodeKind::Tag, ROOT, ROOT_TOKEN);
        builder.open.push(root);
        builder
    }

    fn push_node(&mut self, kind: NodeKind, parent: NodeId, bytes: &[u8]) -> NodeId {
        let id = self.nodes.len() as NodeId;
        let start = self.text.len() as u32;
        self.text.extend_from_slice(bytes);
        self.nodes.push((kind, parent, start..self.text.len() as u32));
        self.children.push(Vec::new());
        if id != ROOT {
            self.children[parent as usize].push(id);
        }
        id
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or(ROOT)
    }

    /// Opens a tag node named `name` under the current element.
    pub fn open_element(&mut self, name: &[u8]) -> Result<NodeId> {
        check_name("element", name)?;
        let mut token = Vec::with_capacity(name.len() + 1);
        token.push(TAG_MARKER);
        token.extend_from_slice(name);
        let id = self.push_node(NodeKind::Tag, self.current(), &token);
        self.open.push(id);
        Ok(id)
    }

    /// Adds an attribute node and its single content child to the current
    /// element.
    pub fn attribute(&mut self, name: &[u8], value: &[u8]) -> Result<NodeId> {
        if self.open.len() < 2 {
            return Err(Error::Parse("attribute outside of an element".into()));
        }
        let current = self.current() as usize;
        if self.children[current].iter().any(|&c| self.nodes[c as usize].0 != NodeKind::Attribute) {
            return Err(Error::Parse("attribute after element content".into()));
        }
        check_name("attribute", name)?;
        let mut token = Vec::with_capacity(name.len() + 1);
        token.push(ATTRIBUTE_MARKER);
        token.extend_from_slice(name);
        let id = self.push_node(NodeKind::Attribute, self.current(), &token);
        self.push_node(NodeKind::Content, id, value);
        Ok(id)
    }

    /// Adds a content node under the current element.
    pub fn text(&mut self, bytes: &[u8]) -> NodeId {
        self.push_node(NodeKind::Content, self.current(), bytes)
    }

    /// Closes the current element, giving it the empty filler if it has no
    /// tag or content children.
    pub fn close_element(&mut self) -> Result<NodeId> {
        if self.open.len() < 2 {
            return Err(Error::Parse("closing tag without an open element".into()));
        }
        let id = self.current();
        let needs_filler = self.children[id as usize]
            .iter()
            .all(|&c| self.nodes[c as usize].0 == NodeKind::Attribute);
        if needs_filler {
            self.push_node(NodeKind::Content, id, &[EMPTY_FILLER]);
        }
        self.open.pop();
        Ok(id)
    }

    /// Label of the innermost open element, `None` at top level.
    pub fn open_label(&self) -> Option<&[u8]> {
        if self.open.len() < 2 {
            return None;
        }
        let (_, _, range) = &self.nodes[self.current() as usize];
        Some(&self.text[range.start as usize + 1..range.end as usize])
    }

    pub fn finish(self) -> Result<Tree> {
        if self.open.len() > 1 {
            return Err(Error::Parse(format!(
                "{} element(s) left open at end of input",
                self.open.len() - 1
            )));
        }
        if self.children[ROOT as usize].is_empty() {
            return Err(Error::Parse("document has no content".into()));
        }

        let mut child_ids = Vec::with_capacity(self.nodes.len());
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for ((kind, parent, bytes), kids) in self.nodes.into_iter().zip(self.children) {
            let start = child_ids.len() as u32;
            child_ids.extend_from_slice(&kids);
            nodes.push(Node {
                kind,
                parent,
                bytes,
                children: start..child_ids.len() as u32,
            });
        }
        Ok(Tree {
            nodes,
            child_ids,
            text: self.text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tree {
        let mut b = TreeBuilder::new();
        b.open_element(b"book").unwrap();
        b.attribute(b"id", b"7").unwrap();
        b.open_element(b"title").unwrap();
        b.text(b"XBW");
        b.close_element().unwrap();
        b.open_element(b"empty").unwrap();
        b.close_element().unwrap();
        b.close_element().unwrap();
        b.finish().unwrap()
    }

    #[test]
    fn ids_follow_preorder() {
        let tree = sample();
        let labels: Vec<String> = (0..tree.len() as NodeId)
            .map(|id| String::from_utf8_lossy(tree.label(id)).into_owned())
            .collect();
        assert_eq!(labels, ["<", "<book", "@id", "=", "<title", "=", "<empty", "="]);
        assert_eq!(tree.children(1), &[2, 4, 6]);
        assert_eq!(tree.parent(3), Some(2));
        assert_eq!(tree.parent(ROOT), None);
        assert_eq!(tree.content(7), &[EMPTY_FILLER]);
        assert!(tree.is_last_child(6));
        assert!(!tree.is_last_child(4));
    }

    #[test]
    fn xml_output_elides_filler() {
        let tree = sample();
        assert_eq!(
            String::from_utf8(tree.to_xml()).unwrap(),
            r#"<book id="7"><title>XBW</title><empty></empty></book>"#
        );
    }

    #[test]
    fn attribute_only_elements_get_filler() {
        let mut b = TreeBuilder::new();
        b.open_element(b"a").unwrap();
        b.attribute(b"x", b"1").unwrap();
        b.close_element().unwrap();
        let tree = b.finish().unwrap();
        assert_eq!(tree.children(1).len(), 2);
        assert_eq!(tree.kind(4), NodeKind::Content);
        assert_eq!(tree.to_xml(), br#"<a x="1"></a>"#.to_vec());
    }

    #[test]
    fn attribute_quotes_follow_the_value() {
        let mut b = TreeBuilder::new();
        b.open_element(b"a").unwrap();
        b.attribute(b"x", b"1\"2").unwrap();
        b.attribute(b"y", b"it's").unwrap();
        b.close_element().unwrap();
        let tree = b.finish().unwrap();
        assert_eq!(tree.to_xml(), br#"<a x='1"2' y="it's"></a>"#.to_vec());
    }

    #[test]
    fn marker_bytes_in_names_are_rejected() {
        let mut b = TreeBuilder::new();
        assert!(matches!(b.open_element(b"a@b"), Err(Error::Parse(_))));
        assert!(matches!(b.open_element(b"a<b"), Err(Error::Parse(_))));
        assert!(matches!(b.open_element(b"a\0"), Err(Error::Parse(_))));
        b.open_element(b"a").unwrap();
        assert!(matches!(b.attribute(b"k=v", b"1"), Err(Error::Parse(_))));
        assert!(matches!(b.attribute(b"", b"1"), Err(Error::Parse(_))));
        b.attribute(b"k", b"1").unwrap();
    }

    #[test]
    fn unbalanced_input_is_rejected() {
        let mut b = TreeBuilder::new();
        b.open_element(b"a").unwrap();
        assert!(b.finish().is_err());

        let mut b = TreeBuilder::new();
        assert!(b.close_element().is_err());
        assert!(b.attribute(b"x", b"1").is_err());
        assert!(TreeBuilder::new().finish().is_err());
    }
}
