/// Expansion tree: one node per segment, expanded depth-first.
use tracing::trace;

use super::action::Action;
use super::context::ExpansionContext;
use super::error::{ExpansionError, GrammarError};
use super::tag::{parse_tag, ModifierCall};
use super::tokenizer::{resolve_escapes, tokenize, Segment, SegmentKind};

/// What a node holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A whole rule that still needs tokenizing.
    Root,
    PlainText,
    Tag,
    Action,
}

impl From<SegmentKind> for NodeKind {
    fn from(kind: SegmentKind) -> Self {
        match kind {
            SegmentKind::PlainText => NodeKind::PlainText,
            SegmentKind::Tag => NodeKind::Tag,
            SegmentKind::Action => NodeKind::Action,
        }
    }
}

/// Position of a node within its tree: depth plus index among siblings.
/// Used for diagnostics only, never to reach the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub depth: usize,
    pub child_index: usize,
}

/// A node of an expansion tree. Parents own their children.
#[derive(Debug, Clone)]
pub struct ExpansionNode {
    kind: NodeKind,
    raw: String,
    depth: usize,
    child_index: usize,
    parent: Option<NodeRef>,
    expanded: bool,
    children: Vec<ExpansionNode>,
    finished_text: String,
    /// The rule the children were built from.
    child_rule: Option<String>,
    symbol: Option<String>,
    modifiers: Vec<String>,
    preactions: Vec<Action>,
    postactions: Vec<Action>,
    /// Set for bare action nodes.
    action: Option<Action>,
    errors: Vec<ExpansionError>,
}

impl ExpansionNode {
    pub fn root(rule: impl Into<String>) -> Self {
        Self::new(NodeKind::Root, rule.into(), 0, 0, None)
    }

    fn child(parent: NodeRef, child_index: usize, segment: Segment) -> Self {
        Self::new(
            segment.kind.into(),
            segment.raw,
            parent.depth + 1,
            child_index,
            Some(parent),
        )
    }

    fn new(
        kind: NodeKind,
        raw: String,
        depth: usize,
        child_index: usize,
        parent: Option<NodeRef>,
    ) -> Self {
        Self {
            kind,
            raw,
            depth,
            child_index,
            parent,
            expanded: false,
            children: Vec::new(),
            finished_text: String::new(),
            child_rule: None,
            symbol: None,
            modifiers: Vec::new(),
            preactions: Vec::new(),
            postactions: Vec::new(),
            action: None,
            errors: Vec::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn child_index(&self) -> usize {
        self.child_index
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef {
            depth: self.depth,
            child_index: self.child_index,
        }
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.parent
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn children(&self) -> &[ExpansionNode] {
        &self.children
    }

    pub fn finished_text(&self) -> &str {
        &self.finished_text
    }

    pub fn into_finished_text(self) -> String {
        self.finished_text
    }

    pub fn child_rule(&self) -> Option<&str> {
        self.child_rule.as_deref()
    }

    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    pub fn modifiers(&self) -> &[String] {
        &self.modifiers
    }

    pub fn preactions(&self) -> &[Action] {
        &self.preactions
    }

    pub fn postactions(&self) -> &[Action] {
        &self.postactions
    }

    pub fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    /// Errors from this node and everything below it.
    pub fn errors(&self) -> &[ExpansionError] {
        &self.errors
    }

    /// The node as written in its rule, used in place of text for nodes
    /// that were never expanded.
    pub fn source(&self) -> String {
        match self.kind {
            NodeKind::Root | NodeKind::PlainText => self.raw.clone(),
            NodeKind::Tag => format!("#{}#", self.raw),
            NodeKind::Action => format!("[{}]", self.raw),
        }
    }

    /// Expand this node. Later calls do nothing.
    ///
    /// With `prevent_recursion` the children are built but not expanded and
    /// the text shows them in source form.
    pub fn expand(
        &mut self,
        ctx: &mut ExpansionContext<'_>,
        prevent_recursion: bool,
    ) -> Result<(), GrammarError> {
        if self.expanded {
            return Ok(());
        }
        self.expanded = true;
        trace!(kind = ?self.kind, raw = %self.raw, depth = self.depth, "expanding node");

        if self.kind == NodeKind::PlainText {
            self.finished_text = self.raw.clone();
            return Ok(());
        }

        if !ctx.enter() {
            trace!(raw = %self.raw, "node refused by recursion limit");
            self.errors.push(ExpansionError::RecursionLimit {
                limit: ctx.max_depth(),
                raw: self.raw.clone(),
            });
            self.finished_text = format!("(({}))", self.raw);
            return Ok(());
        }

        let result = match self.kind {
            NodeKind::Root => self.expand_children(ctx, self.raw.clone(), prevent_recursion),
            NodeKind::Tag => self.expand_tag(ctx, prevent_recursion),
            NodeKind::Action => self.expand_action(ctx),
            NodeKind::PlainText => Ok(()),
        };
        ctx.exit();
        result
    }

    fn expand_children(
        &mut self,
        ctx: &mut ExpansionContext<'_>,
        rule: String,
        prevent_recursion: bool,
    ) -> Result<(), GrammarError> {
        let tokenized = tokenize(rule.as_str());
        self.errors.extend(tokenized.errors);
        self.child_rule = Some(rule);

        let parent = self.node_ref();
        self.children = tokenized
            .segments
            .into_iter()
            .enumerate()
            .map(|(i, segment)| ExpansionNode::child(parent, i, segment))
            .collect();

        let mut text = String::new();
        for child in &mut self.children {
            if prevent_recursion {
                text.push_str(&child.source());
                continue;
            }
            child.expand(ctx, prevent_recursion)?;
            self.errors.extend(child.errors.iter().cloned());
            text.push_str(&child.finished_text);
        }
        self.finished_text = text;
        Ok(())
    }

    fn expand_tag(
        &mut self,
        ctx: &mut ExpansionContext<'_>,
        prevent_recursion: bool,
    ) -> Result<(), GrammarError> {
        let parsed = parse_tag(&self.raw)?;
        self.errors.extend(parsed.errors);
        self.modifiers = parsed.modifiers;
        self.preactions = parsed.preactions.iter().map(|raw| Action::parse(raw)).collect();

        let mut guards = Vec::new();
        let mut result = Ok(());
        for action in &self.preactions {
            match action.activate(ctx, &mut self.errors) {
                Ok(Some(guard)) => guards.push(guard),
                Ok(None) => {}
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        if result.is_ok() {
            result = self.resolve_symbol(ctx, parsed.symbol, prevent_recursion);
        }

        // Pushes made by this tag end with its subtree, even on failure.
        for guard in guards {
            self.postactions.push(guard.undo_action());
            if let Err(e) = guard.release(ctx.grammar_mut()) {
                self.errors.push(e);
            }
        }
        result
    }

    fn resolve_symbol(
        &mut self,
        ctx: &mut ExpansionContext<'_>,
        symbol: String,
        prevent_recursion: bool,
    ) -> Result<(), GrammarError> {
        let selected = ctx.select_rule(&symbol, Some(self.node_ref()), &mut self.errors)?;
        let rule = selected.unwrap_or_else(|| format!("(({}))", symbol));
        self.symbol = Some(symbol);
        self.expand_children(ctx, rule, prevent_recursion)?;
        self.apply_modifiers(ctx);
        Ok(())
    }

    fn apply_modifiers(&mut self, ctx: &ExpansionContext<'_>) {
        for text in &self.modifiers {
            let call = ModifierCall::parse(text);
            match ctx.grammar().modifier(&call.name) {
                Some(modifier) => self.finished_text = modifier(&self.finished_text, &call.params),
                None => {
                    self.finished_text.push_str(&format!("((.{}))", call.name));
                    self.errors.push(ExpansionError::MissingModifier(call.name));
                }
            }
        }
    }

    fn expand_action(&mut self, ctx: &mut ExpansionContext<'_>) -> Result<(), GrammarError> {
        let action = Action::parse(&self.raw);
        // A bare push has no enclosing tag to undo it; it stays until popped.
        let _ = action.activate(ctx, &mut self.errors)?;
        self.action = Some(action);
        self.finished_text.clear();
        Ok(())
    }

    /// Resolve escape markers in the finished text. Run once, at the root.
    pub fn clear_escape_chars(&mut self) {
        self.finished_text = resolve_escapes(&self.finished_text);
    }
}
