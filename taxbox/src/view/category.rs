// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::Labels;
use crate::controller::{AddTermOutcome, ControllerEvent, EventKind, TaxonomyController};
use crate::store::StoreResult;
use crate::term::{NewTermInput, PanelContext, Term, TermId};
use log::debug;
use std::collections::{HashMap, HashSet};

pub const NO_PARENT: i64 = -1;
const INDENT: &str = "\u{a0}\u{a0}\u{a0}\u{a0}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistNode {
    pub id: TermId,
    pub name: String,
    pub checked: bool,
    pub popular: bool,
    /// False for terms whose ancestor chain is not loaded.
    pub selectable: bool,
    pub children: Vec<ChecklistNode>,
}

impl ChecklistNode {
    fn leaf(term: &Term, selectable: bool) -> Self {
        Self {
            id: term.id,
            name: term.name.clone(),
            checked: term.selected,
            popular: term.popular,
            selectable,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChecklistPanel {
    context: PanelContext,
    nodes: Vec<ChecklistNode>,
    renders: u64,
}

impl ChecklistPanel {
    fn new(context: PanelContext) -> Self {
        Self {
            context,
            nodes: Vec::new(),
            renders: 0,
        }
    }

    pub fn context(&self) -> PanelContext {
        self.context
    }

    pub fn nodes(&self) -> &[ChecklistNode] {
        &self.nodes
    }

    /// How many times the panel was rebuilt from controller state.
    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn find(&self, id: TermId) -> Option<&ChecklistNode> {
        fn walk(nodes: &[ChecklistNode], id: TermId) -> Option<&ChecklistNode> {
            nodes.iter().find_map(|node| {
                if node.id == id {
                    Some(node)
                } else {
                    walk(&node.children, id)
                }
            })
        }
        walk(&self.nodes, id)
    }

    fn replace(&mut self, nodes: Vec<ChecklistNode>) {
        self.nodes = nodes;
        self.renders += 1;
    }

    fn set_checked(&mut self, id: TermId, checked: bool) -> bool {
        fn walk(nodes: &mut [ChecklistNode], id: TermId, checked: bool) -> bool {
            nodes.iter_mut().any(|node| {
                if node.id == id {
                    node.checked = checked;
                    true
                } else {
                    walk(&mut node.children, id, checked)
                }
            })
        }
        walk(&mut self.nodes, id, checked)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentOption {
    pub value: i64,
    pub label: String,
    pub level: usize,
}

impl ParentOption {
    pub fn class(&self) -> String {
        format!("level-{}", self.level)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AddNewForm {
    pub visible: bool,
    pub parent_options: Vec<ParentOption>,
}

/// Checklist view for hierarchical taxonomies: an "all" tree, a "most used"
/// list and an inline form for new terms.
pub struct CategoryBox {
    controller: TaxonomyController,
    labels: Labels,
    active_tab: PanelContext,
    all: ChecklistPanel,
    popular: ChecklistPanel,
    form: AddNewForm,
}

impl CategoryBox {
    pub fn new(controller: TaxonomyController, labels: Labels) -> Self {
        let mut view = Self {
            controller,
            labels,
            active_tab: PanelContext::All,
            all: ChecklistPanel::new(PanelContext::All),
            popular: ChecklistPanel::new(PanelContext::Popular),
            form: AddNewForm::default(),
        };
        view.render_all();
        view
    }

    pub fn controller(&self) -> &TaxonomyController {
        &self.controller
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn active_tab(&self) -> PanelContext {
        self.active_tab
    }

    pub fn panel(&self, context: PanelContext) -> &ChecklistPanel {
        match context {
            PanelContext::All => &self.all,
            PanelContext::Popular => &self.popular,
        }
    }

    pub fn form(&self) -> &AddNewForm {
        &self.form
    }

    /// The submit button stays disabled while a creation is in flight.
    pub fn is_submitting(&self) -> bool {
        self.controller.has_pending_creations()
    }

    pub fn switch_tab(&mut self, tab: PanelContext) {
        self.active_tab = tab;
    }

    pub fn toggle_add_form(&mut self) {
        self.form.visible = !self.form.visible;
        self.active_tab = PanelContext::All;
    }

    /// Only terms whose whole ancestor chain is loaded can be checked.
    pub fn is_selectable(&self, id: TermId) -> bool {
        anchored_ids(&self.controller.terms()).contains(&id)
    }

    /// Checkbox gesture from one of the panels. The originating panel is
    /// patched in place; the other one re-renders when the event arrives.
    /// Checking an unselectable term is refused; unchecking always goes through.
    pub fn toggle_term(&mut self, panel: PanelContext, id: TermId, checked: bool) -> bool {
        if checked && !self.is_selectable(id) {
            debug!(
                "{}: term {} has no loaded ancestor chain",
                self.controller.slug(),
                id
            );
            return false;
        }
        let changed = if checked {
            self.controller.set_selected(id, Some(panel))
        } else {
            self.controller.remove_selected(id, Some(panel))
        };
        if changed {
            match panel {
                PanelContext::All => self.all.set_checked(id, checked),
                PanelContext::Popular => self.popular.set_checked(id, checked),
            };
        }
        changed
    }

    /// `parent` is the raw value of the parent picker.
    pub async fn submit_new_term(&self, name: &str, parent: &str) -> StoreResult<AddTermOutcome> {
        if self.is_submitting() {
            return Ok(AddTermOutcome::InFlight);
        }
        let mut input = NewTermInput::named(name);
        input.parent = parse_parent(parent);
        self.controller.add_term(input).await
    }

    pub fn handle(&mut self, event: &ControllerEvent) {
        match &event.kind {
            EventKind::TermsChanged
            | EventKind::TermCreated(_)
            | EventKind::TermDeleted(_)
            | EventKind::Ready => self.render_all(),
            EventKind::PopularChanged => self.render_popular(),
            EventKind::SelectionChanged { context, .. } => {
                if *context != Some(PanelContext::All) {
                    self.render_terms();
                }
                if *context != Some(PanelContext::Popular) {
                    self.render_popular();
                }
            }
        }
    }

    pub fn render_all(&mut self) {
        self.render_terms();
        self.render_popular();
    }

    fn render_terms(&mut self) {
        let terms = self.controller.terms();
        let mut nodes = hierarchize(&terms);
        prioritize(&mut nodes);
        self.all.replace(nodes);
        self.form.parent_options = parent_options(&terms, self.labels.get("parent_item"));
    }

    fn render_popular(&mut self) {
        let terms = self.controller.terms();
        let anchored = anchored_ids(&terms);
        let nodes = self
            .controller
            .popular()
            .iter()
            .map(|term| ChecklistNode::leaf(term, anchored.contains(&term.id)))
            .collect();
        self.popular.replace(nodes);
    }
}

/// Ids of terms whose whole ancestor chain is present in `terms`.
fn anchored_ids(terms: &[Term]) -> HashSet<TermId> {
    let parents: HashMap<TermId, TermId> = terms.iter().map(|term| (term.id, term.parent)).collect();
    let mut anchored = HashSet::new();
    for term in terms {
        let mut seen = HashSet::new();
        let mut current = term.id;
        let reaches_root = loop {
            if anchored.contains(&current) {
                break true;
            }
            if !seen.insert(current) {
                break false;
            }
            match parents.get(&current).copied() {
                Some(0) => break true,
                Some(parent) => current = parent,
                None => break false,
            }
        };
        if reaches_root {
            anchored.extend(seen);
        }
    }
    anchored
}

/// Nests each term under its parent. Terms whose ancestors are missing or
/// form a cycle are listed after the roots, flat and not selectable.
pub fn hierarchize(terms: &[Term]) -> Vec<ChecklistNode> {
    let anchored = anchored_ids(terms);
    let mut children: HashMap<TermId, Vec<&Term>> = HashMap::new();
    for term in terms.iter().filter(|term| anchored.contains(&term.id)) {
        children.entry(term.parent).or_default().push(term);
    }

    fn build(parent: TermId, children: &HashMap<TermId, Vec<&Term>>) -> Vec<ChecklistNode> {
        children
            .get(&parent)
            .map(|terms| {
                terms
                    .iter()
                    .map(|term| ChecklistNode {
                        children: build(term.id, children),
                        ..ChecklistNode::leaf(term, true)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    let mut nodes = build(0, &children);
    nodes.extend(
        terms
            .iter()
            .filter(|term| !anchored.contains(&term.id))
            .map(|term| ChecklistNode::leaf(term, false)),
    );
    nodes
}

/// Moves checked nodes ahead of unchecked siblings at every level, keeping
/// relative order otherwise.
pub fn prioritize(nodes: &mut [ChecklistNode]) {
    nodes.sort_by_key(|node| !node.checked);
    for node in nodes.iter_mut() {
        prioritize(&mut node.children);
    }
}

/// Depth-first parent picker entries, led by the "no parent" choice.
pub fn parent_options(terms: &[Term], parent_label: &str) -> Vec<ParentOption> {
    fn walk(nodes: &[ChecklistNode], level: usize, options: &mut Vec<ParentOption>) {
        for node in nodes.iter().filter(|node| node.selectable) {
            options.push(ParentOption {
                value: i64::try_from(node.id).unwrap_or(i64::MAX),
                label: format!("{}{}", INDENT.repeat(level), node.name),
                level,
            });
            walk(&node.children, level + 1, options);
        }
    }

    let mut options = vec![ParentOption {
        value: NO_PARENT,
        label: format!("— {} —", parent_label),
        level: 0,
    }];
    walk(&hierarchize(terms), 0, &mut options);
    options
}

/// Reads a picker value the lenient way form values are read: optional
/// sign, leading digits, anything after them ignored.
pub fn parse_parent(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(index, _)| index)
        .unwrap_or(digits.len());
    let number: i64 = digits[..end].parse().ok()?;
    Some(if negative { -number } else { number })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use crate::term::TaxonomyDescriptor;
    use std::sync::Arc;

    fn term(id: TermId, name: &str, parent: TermId) -> Term {
        Term::new(id, name).with_parent(parent)
    }

    fn ids(nodes: &[ChecklistNode]) -> Vec<TermId> {
        nodes.iter().map(|node| node.id).collect()
    }

    async fn loaded_view(terms: Vec<Term>) -> (CategoryBox, Arc<MemoryBackend>) {
        let taxonomy = TaxonomyDescriptor::new("category", "categories", true);
        let backend = Arc::new(MemoryBackend::new());
        backend.add_taxonomy(taxonomy.clone());
        backend.seed_terms("categories", terms);
        let controller = TaxonomyController::new(taxonomy.clone(), 3, backend.clone());
        controller.load().await.expect("load");
        let view = CategoryBox::new(controller, Labels::for_taxonomy(&taxonomy));
        (view, backend)
    }

    #[test]
    fn hierarchize_nests_children_under_loaded_parents() {
        let terms = vec![
            term(1, "Tech", 0),
            term(2, "AI", 1),
            term(3, "ML", 2),
            term(4, "News", 0),
        ];
        let nodes = hierarchize(&terms);
        assert_eq!(ids(&nodes), vec![1, 4]);
        assert_eq!(ids(&nodes[0].children), vec![2]);
        assert_eq!(ids(&nodes[0].children[0].children), vec![3]);
        assert!(nodes[0].children[0].children[0].selectable);
    }

    #[test]
    fn orphans_and_cycles_render_flat_and_unselectable() {
        let terms = vec![
            term(1, "Tech", 0),
            term(5, "Orphan", 99),
            term(6, "Orphan child", 5),
            term(7, "Loop a", 8),
            term(8, "Loop b", 7),
        ];
        let nodes = hierarchize(&terms);
        assert_eq!(ids(&nodes), vec![1, 5, 6, 7, 8]);
        assert!(nodes[0].selectable);
        assert!(nodes[1..].iter().all(|node| !node.selectable && node.children.is_empty()));
    }

    #[tokio::test]
    async fn unanchored_terms_refuse_the_checkbox() {
        let (mut view, _) = loaded_view(vec![
            term(1, "Tech", 0).with_count(3),
            term(5, "Orphan", 99).with_count(2),
        ])
        .await;

        assert!(!view.is_selectable(5));
        assert!(!view.toggle_term(PanelContext::All, 5, true));
        assert!(!view.toggle_term(PanelContext::Popular, 5, true));
        assert!(view.controller().selected_ids().is_empty());

        assert!(view.toggle_term(PanelContext::All, 1, true));
        assert_eq!(view.controller().selected_ids(), vec![1]);
    }

    #[tokio::test]
    async fn unanchored_terms_can_still_be_unchecked() {
        let (mut view, _) = loaded_view(vec![term(5, "Orphan", 99)]).await;
        assert!(view.controller().set_selected(5, None));
        assert!(view.toggle_term(PanelContext::All, 5, false));
        assert!(view.controller().selected_ids().is_empty());
    }

    #[test]
    fn prioritize_floats_checked_siblings() {
        let mut nodes = hierarchize(&[
            term(1, "a", 0),
            term(2, "b", 0),
            term(3, "c", 0),
            term(4, "c1", 3),
            term(5, "c2", 3),
        ]);
        nodes[2].checked = true;
        nodes[2].children[1].checked = true;
        prioritize(&mut nodes);
        assert_eq!(ids(&nodes), vec![3, 1, 2]);
        assert_eq!(ids(&nodes[0].children), vec![5, 4]);
    }

    #[test]
    fn parent_options_are_levelled() {
        let options = parent_options(
            &[term(1, "Tech", 0), term(2, "AI", 1), term(3, "ML", 2), term(4, "Lost", 42)],
            "Parent Category",
        );
        let values: Vec<i64> = options.iter().map(|option| option.value).collect();
        assert_eq!(values, vec![NO_PARENT, 1, 2, 3]);
        assert_eq!(options[0].label, "— Parent Category —");
        assert_eq!(options[2].class(), "level-1");
        assert_eq!(options[3].label, format!("{}ML", INDENT.repeat(2)));
    }

    #[test]
    fn parse_parent_reads_leading_integer() {
        assert_eq!(parse_parent("12"), Some(12));
        assert_eq!(parse_parent(" -1"), Some(-1));
        assert_eq!(parse_parent("7abc"), Some(7));
        assert_eq!(parse_parent(""), None);
        assert_eq!(parse_parent("none"), None);
    }

    #[tokio::test]
    async fn selecting_a_child_keeps_it_nested() {
        let (mut view, _) = loaded_view(vec![
            term(1, "Tech", 0).with_count(5),
            term(2, "AI", 1).with_count(2),
        ])
        .await;

        assert!(view.toggle_term(PanelContext::All, 2, true));
        view.handle(&ControllerEvent {
            version: view.controller().version(),
            kind: EventKind::TermsChanged,
        });
        assert_eq!(view.controller().selected_ids(), vec![2]);

        let nodes = view.panel(PanelContext::All).nodes();
        assert_eq!(ids(nodes), vec![1]);
        assert_eq!(ids(&nodes[0].children), vec![2]);
        assert!(nodes[0].children[0].checked);
        assert!(!nodes[0].checked);
    }

    #[tokio::test]
    async fn originating_panel_is_patched_not_rerendered() {
        let (mut view, _) = loaded_view(vec![term(1, "Tech", 0).with_count(5)]).await;
        let mut events = view.controller().subscribe();
        let all_renders = view.panel(PanelContext::All).renders();
        let popular_renders = view.panel(PanelContext::Popular).renders();

        assert!(view.toggle_term(PanelContext::Popular, 1, true));
        assert!(view.panel(PanelContext::Popular).find(1).is_some_and(|node| node.checked));
        let event = events.try_recv().expect("event");
        view.handle(&event);

        assert_eq!(view.panel(PanelContext::Popular).renders(), popular_renders);
        assert_eq!(view.panel(PanelContext::All).renders(), all_renders + 1);
        assert!(view.panel(PanelContext::All).find(1).is_some_and(|node| node.checked));
    }

    #[tokio::test]
    async fn add_form_toggle_resets_tab() {
        let (mut view, _) = loaded_view(vec![term(1, "Tech", 0)]).await;
        view.switch_tab(PanelContext::Popular);
        view.toggle_add_form();
        assert!(view.form().visible);
        assert_eq!(view.active_tab(), PanelContext::All);
        assert_eq!(view.form().parent_options.len(), 2);
    }

    #[tokio::test]
    async fn submit_creates_child_and_refreshes_tree() {
        let (mut view, _) = loaded_view(vec![term(1, "Tech", 0)]).await;
        let mut events = view.controller().subscribe();
        let outcome = view.submit_new_term("AI", "1").await.expect("submit");
        let AddTermOutcome::Created(created) = outcome else {
            panic!("expected creation");
        };
        while let Ok(event) = events.try_recv() {
            view.handle(&event);
        }
        let nodes = view.panel(PanelContext::All).nodes();
        assert_eq!(ids(&nodes[0].children), vec![created.id]);
        assert!(nodes[0].children[0].checked);
        assert!(!view.is_submitting());
    }

    #[tokio::test]
    async fn submit_is_refused_while_a_creation_is_pending() {
        let (view, backend) = loaded_view(vec![term(1, "Tech", 0)]).await;
        backend.hold();
        let controller = view.controller().clone();
        let first = tokio::spawn(async move {
            controller.add_term(NewTermInput::named("Slow")).await
        });
        while !view.is_submitting() {
            tokio::task::yield_now().await;
        }
        let outcome = view.submit_new_term("Other", "-1").await.expect("refused");
        assert_eq!(outcome, AddTermOutcome::InFlight);
        backend.release();
        first.await.expect("join").expect("first");
        assert!(!view.is_submitting());
    }
}
