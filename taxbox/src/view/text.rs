// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Plain-text rendering for the interactive shell.

use super::category::{CategoryBox, ChecklistNode};
use super::tag::TagBox;
use super::TaxonomyView;
use crate::term::PanelContext;
use std::fmt::{self, Write};

fn checkbox(node: &ChecklistNode) -> &'static str {
    match (node.selectable, node.checked) {
        (false, _) => "[-]",
        (true, true) => "[x]",
        (true, false) => "[ ]",
    }
}

fn write_nodes(out: &mut String, nodes: &[ChecklistNode], depth: usize) -> fmt::Result {
    for node in nodes {
        write!(out, "{}{} {} (#{})", "  ".repeat(depth + 1), checkbox(node), node.name, node.id)?;
        if node.popular {
            out.push_str(" *");
        }
        out.push('\n');
        write_nodes(out, &node.children, depth + 1)?;
    }
    Ok(())
}

pub fn render_category(view: &CategoryBox) -> Result<String, fmt::Error> {
    let labels = view.labels();
    let mut out = String::new();
    let tab = |context: PanelContext, label: &str| {
        if view.active_tab() == context {
            format!("[{}]", label)
        } else {
            label.to_string()
        }
    };
    writeln!(
        out,
        "{} ({}): {} | {}",
        view.controller().taxonomy().name,
        view.controller().slug(),
        tab(PanelContext::All, labels.get("all_items")),
        tab(PanelContext::Popular, labels.get("most_used")),
    )?;

    let panel = view.panel(view.active_tab());
    if panel.nodes().is_empty() {
        writeln!(out, "  {}", labels.get("no_terms"))?;
    } else {
        write_nodes(&mut out, panel.nodes(), 0)?;
    }

    let form = view.form();
    if form.visible {
        let state = if view.is_submitting() {
            " (submitting)"
        } else {
            ""
        };
        writeln!(out, "  + {}{}", labels.get("add_new_item"), state)?;
        for option in &form.parent_options {
            writeln!(out, "    {:>4}  {}", option.value, option.label)?;
        }
    }
    Ok(out)
}

pub fn render_tag(view: &TagBox) -> Result<String, fmt::Error> {
    let labels = view.labels();
    let mut out = String::new();
    writeln!(
        out,
        "{} ({}): {}",
        view.controller().taxonomy().name,
        view.controller().slug(),
        labels.get("separate_items_with_commas")
    )?;
    if view.chips().is_empty() {
        writeln!(out, "  -")?;
    } else {
        let chips: Vec<String> = view
            .chips()
            .iter()
            .map(|chip| format!("[{} x #{}]", chip.name, chip.id))
            .collect();
        writeln!(out, "  {}", chips.join(" "))?;
    }
    if view.cloud_visible() {
        writeln!(out, "  {}:", labels.get("choose_from_most_used"))?;
        out.push_str(&render_cloud(view)?);
    }
    Ok(out)
}

pub fn render_cloud(view: &TagBox) -> Result<String, fmt::Error> {
    let mut out = String::new();
    if let Some(message) = view.empty_cloud_message() {
        writeln!(out, "    {}", message)?;
        return Ok(out);
    }
    for entry in view.cloud() {
        writeln!(
            out,
            "    {}{} (#{}, {}, {})",
            if entry.selected { "*" } else { "" },
            entry.name,
            entry.id,
            entry.size,
            entry.title
        )?;
    }
    Ok(out)
}

impl fmt::Display for TaxonomyView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = match self {
            TaxonomyView::Category(view) => render_category(view)?,
            TaxonomyView::Tag(view) => render_tag(view)?,
        };
        f.write_str(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::TaxonomyController;
    use crate::store::MemoryBackend;
    use crate::term::{TaxonomyDescriptor, Term};
    use crate::view::ViewSettings;
    use std::sync::Arc;

    #[tokio::test]
    async fn checklist_renders_tree_with_marks() {
        let taxonomy = TaxonomyDescriptor::new("category", "categories", true);
        let backend = Arc::new(MemoryBackend::new());
        backend.add_taxonomy(taxonomy.clone());
        backend.seed_terms(
            "categories",
            vec![
                Term::new(1, "Tech").with_count(5),
                Term::new(2, "AI").with_parent(1),
                Term::new(3, "Lost").with_parent(40),
            ],
        );
        backend.assign("categories", 1, &[2]);
        let controller = TaxonomyController::new(taxonomy, 1, backend);
        controller.load().await.expect("load");

        let view = TaxonomyView::for_controller(controller, &ViewSettings::default());
        let text = view.to_string();
        assert!(text.starts_with("category (category): [All] | Most Used\n"));
        assert!(text.contains("  [ ] Tech (#1) *\n"));
        assert!(text.contains("    [x] AI (#2)"));
        assert!(text.contains("  [-] Lost (#3)"));
    }

    #[tokio::test]
    async fn tag_box_renders_chips_and_cloud() {
        let taxonomy = TaxonomyDescriptor::new("post_tag", "tags", false);
        let backend = Arc::new(MemoryBackend::new());
        backend.add_taxonomy(taxonomy.clone());
        backend.seed_terms("tags", vec![Term::new(1, "rust").with_count(1)]);
        backend.assign("tags", 1, &[1]);
        let controller = TaxonomyController::new(taxonomy, 1, backend);
        controller.load().await.expect("load");

        let mut view = TaxonomyView::for_controller(controller, &ViewSettings::default());
        if let Some(tags) = view.as_tag_mut() {
            tags.toggle_cloud();
        }
        let text = view.to_string();
        assert!(text.contains("  [rust x #1]\n"));
        assert!(text.contains("    *rust (#1, 8pt, 2 topics)"));
    }
}
