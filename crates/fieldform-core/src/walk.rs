//! Record graph traversal
//!
//! Depth-first, pre-order walk over a record's declared fields. Nested
//! records are entered, sequences and maps are entered element by element
//! (after a `dive`, or to reach record elements), and every scalar leaf with
//! a directive chain is handed to a [`LeafSink`]. The walker never holds a
//! borrow into the graph across a sink call: it re-locates each node from
//! the root through its structural cursor.
//!
//! Copyright (c) 2025 Fieldform Team
//! Licensed under the Apache-2.0 license

use crate::cancel::CancelToken;
use crate::directive::{is_skip_tag, Directive, DirectiveParser};
use crate::error::{Error, Result};
use crate::namespace::{key_segment, locate, Namespace, Step};
use crate::registry::Registry;
use crate::source::{DirectiveSource, FieldDescriptor};
use crate::unwrap::extract;
use crate::value::{FieldInfo, Kind, Reflect, ReflectRef, Value};
use std::borrow::Cow;

/// A scalar field (or element) ready for its directive chain
pub(crate) struct Leaf<'l> {
    /// Index of the top-level field this leaf belongs to
    pub group: usize,
    pub steps: &'l [Step],
    /// Cursor length of the nearest enclosing record
    pub parent_depth: usize,
    pub namespace: &'l Namespace,
    pub field: &'l str,
    pub struct_field: &'l str,
    pub chain: &'l [Directive],
    pub kind: Kind,
    pub nullable: bool,
    pub value: Value,
}

/// Receives leaves in traversal order
pub(crate) trait LeafSink {
    fn leaf(&mut self, root: &mut dyn Reflect, leaf: Leaf<'_>) -> Result<()>;
}

#[derive(Clone)]
struct NodeNames {
    display: Cow<'static, str>,
    structural: Cow<'static, str>,
}

impl NodeNames {
    fn field(info: &'static FieldInfo) -> Self {
        Self {
            display: Cow::Borrowed(info.display_name()),
            structural: Cow::Borrowed(info.name),
        }
    }

    fn element(&self, step: &Step) -> Self {
        let segment = match step {
            Step::Index(index) => format!("[{}]", index),
            Step::Key(key) => key_segment(key),
            Step::Field(_) => String::new(),
        };
        Self {
            display: Cow::Owned(format!("{}{}", self.display, segment)),
            structural: Cow::Owned(format!("{}{}", self.structural, segment)),
        }
    }
}

struct Node {
    kind: Kind,
    nullable: bool,
    settable: bool,
    value: Option<Value>,
}

enum Elements {
    Indices(usize),
    Keys(Vec<Value>),
}

/// Walks one root record, feeding leaves to a sink
pub(crate) struct Walker<'w> {
    registry: &'w Registry,
    source: &'w dyn DirectiveSource,
    cancel: Option<&'w CancelToken>,
    namespace: &'w mut Namespace,
    cursor: &'w mut Vec<Step>,
    group: usize,
}

impl<'w> Walker<'w> {
    pub fn new(
        registry: &'w Registry,
        source: &'w dyn DirectiveSource,
        namespace: &'w mut Namespace,
        cursor: &'w mut Vec<Step>,
    ) -> Self {
        Self {
            registry,
            source,
            cancel: None,
            namespace,
            cursor,
            group: 0,
        }
    }

    /// Check `cancel` before each top-level field
    pub fn with_cancel(mut self, cancel: Option<&'w CancelToken>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Visit every field of the record at `root`
    pub fn walk(&mut self, root: &mut dyn Reflect, sink: &mut dyn LeafSink) -> Result<()> {
        self.walk_record(root, sink, true)
    }

    fn walk_record(&mut self, root: &mut dyn Reflect, sink: &mut dyn LeafSink, top: bool) -> Result<()> {
        let (record_name, infos) = match extract(locate(&*root, &self.cursor[..]))
            .value
            .map(|v| v.reflect_ref())
        {
            Some(ReflectRef::Record(record)) => (record.record_name(), record.field_infos()),
            _ => return Ok(()),
        };
        let parent_depth = self.cursor.len();

        for (index, info) in infos.iter().enumerate() {
            if top {
                self.group = index;
                if self.cancel.is_some_and(CancelToken::is_cancelled) {
                    return Err(Error::Cancelled {
                        namespace: info.name.to_string(),
                    });
                }
            }

            let mark = self.namespace.mark();
            self.namespace.push_field(info.display_name(), info.name);
            self.cursor.push(Step::Field(index));

            let result = self.visit_field(root, sink, record_name, index, info, parent_depth);

            self.cursor.pop();
            self.namespace.reset_to(mark);
            result?;
        }
        Ok(())
    }

    fn visit_field(
        &mut self,
        root: &mut dyn Reflect,
        sink: &mut dyn LeafSink,
        record: &'static str,
        index: usize,
        info: &'static FieldInfo,
        parent_depth: usize,
    ) -> Result<()> {
        let source = self.source;
        let tag = {
            let descriptor = FieldDescriptor {
                record,
                index,
                info,
                value: locate(&*root, &self.cursor[..]),
            };
            source.directives(&descriptor).unwrap_or("")
        };

        if is_skip_tag(tag) || (info.omit && tag.trim().is_empty()) {
            return Ok(());
        }

        let chain = DirectiveParser::new(self.registry).parse(tag);
        self.visit_node(
            root,
            sink,
            &chain,
            &NodeNames::field(info),
            parent_depth,
            info.readonly,
        )
    }

    fn visit_node(
        &mut self,
        root: &mut dyn Reflect,
        sink: &mut dyn LeafSink,
        chain: &[Directive],
        names: &NodeNames,
        parent_depth: usize,
        readonly: bool,
    ) -> Result<()> {
        let node = self.inspect(&*root, !chain.is_empty());

        if readonly || !node.settable {
            if chain.is_empty() {
                return Ok(());
            }
            return Err(Error::NotSettable {
                namespace: self.namespace.structural().to_string(),
                directives: render(chain),
            });
        }

        match node.kind {
            Kind::Optional | Kind::Dynamic | Kind::Invalid => Ok(()),
            Kind::Record => match chain.first() {
                None => self.walk_record(root, sink, false),
                Some(directive) => Err(self.unsupported(directive, node.kind)),
            },
            Kind::Sequence | Kind::Map => match chain.split_first() {
                None => self.visit_elements(root, sink, &[], names, parent_depth),
                Some((first, rest)) if first.is_dive() => {
                    self.visit_elements(root, sink, rest, names, parent_depth)
                }
                Some((first, _)) => Err(self.unsupported(first, node.kind)),
            },
            kind => {
                if chain.is_empty() {
                    return Ok(());
                }
                if let Some(dive) = chain.iter().find(|d| d.is_dive()) {
                    return Err(self.unsupported(dive, kind));
                }
                let Some(value) = node.value else {
                    return Ok(());
                };

                let leaf = Leaf {
                    group: self.group,
                    steps: &self.cursor[..],
                    parent_depth,
                    namespace: &*self.namespace,
                    field: &names.display,
                    struct_field: &names.structural,
                    chain,
                    kind,
                    nullable: node.nullable,
                    value,
                };
                sink.leaf(root, leaf)
            }
        }
    }

    fn visit_elements(
        &mut self,
        root: &mut dyn Reflect,
        sink: &mut dyn LeafSink,
        chain: &[Directive],
        names: &NodeNames,
        parent_depth: usize,
    ) -> Result<()> {
        let elements = match extract(locate(&*root, &self.cursor[..]))
            .value
            .map(|v| v.reflect_ref())
        {
            Some(ReflectRef::Sequence(seq)) => Elements::Indices(seq.len()),
            Some(ReflectRef::Map(map)) => Elements::Keys(map.keys()),
            _ => return Ok(()),
        };

        match elements {
            Elements::Indices(len) => {
                for index in 0..len {
                    self.visit_element(root, sink, chain, names, parent_depth, Step::Index(index))?;
                }
            }
            Elements::Keys(keys) => {
                for key in keys {
                    self.visit_element(root, sink, chain, names, parent_depth, Step::Key(key))?;
                }
            }
        }
        Ok(())
    }

    fn visit_element(
        &mut self,
        root: &mut dyn Reflect,
        sink: &mut dyn LeafSink,
        chain: &[Directive],
        names: &NodeNames,
        parent_depth: usize,
        step: Step,
    ) -> Result<()> {
        let mark = self.namespace.mark();
        match &step {
            Step::Index(index) => self.namespace.push_index(*index),
            Step::Key(key) => self.namespace.push_key(key),
            Step::Field(_) => {}
        }

        // Element names only matter to leaves, which need a chain.
        let owned;
        let element_names = if chain.is_empty() {
            names
        } else {
            owned = names.element(&step);
            &owned
        };

        self.cursor.push(step);
        let result = self.visit_node(root, sink, chain, element_names, parent_depth, false);
        self.cursor.pop();
        self.namespace.reset_to(mark);
        result
    }

    fn inspect(&self, root: &dyn Reflect, read_value: bool) -> Node {
        let ex = extract(locate(root, &self.cursor[..]));
        let (settable, value) = match ex.value.map(|v| v.reflect_ref()) {
            Some(ReflectRef::Scalar(scalar)) if ex.kind.is_scalar() => {
                (scalar.is_settable(), read_value.then(|| scalar.get()))
            }
            _ => (true, None),
        };
        Node {
            kind: ex.kind,
            nullable: ex.nullable,
            settable,
            value,
        }
    }

    fn unsupported(&self, directive: &Directive, kind: Kind) -> Error {
        Error::UnsupportedTarget {
            directive: directive.name().to_string(),
            namespace: self.namespace.structural().to_string(),
            kind,
        }
    }
}

fn render(chain: &[Directive]) -> String {
    chain
        .iter()
        .map(Directive::name)
        .collect::<Vec<_>>()
        .join(",")
}
