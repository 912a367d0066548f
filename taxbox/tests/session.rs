// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

mod common;

use common::{POST_ID, TestHarness};
use taxbox::cli::{self, CliErrorKind, Flow, ShellCommand};
use taxbox::item::PostDocument;
use taxbox::term::{NewTermInput, PanelContext, Term, TermId};
use taxbox::view::TaxonomyView;
use tokio::io::BufReader;

fn ids(terms: &[Term]) -> Vec<TermId> {
    terms.iter().map(|term| term.id).collect()
}

async fn run_line(harness: &mut TestHarness, line: &str, item: &mut PostDocument) -> String {
    let registry = cli::build_registry().expect("registry");
    let command = registry.resolve(&cli::tokenize(line)).expect("command");
    match cli::execute(&mut harness.session, command, item)
        .await
        .expect("execute")
    {
        Flow::Continue(output) => output,
        Flow::Quit => String::new(),
    }
}

#[tokio::test]
async fn session_builds_a_box_per_post_taxonomy() {
    let harness = TestHarness::new(POST_ID).await;
    assert_eq!(harness.session.slugs(), vec!["category", "post_tag"]);
    assert!(harness.session.get("genre").is_none());

    let category = harness.session.get("category").expect("category box");
    assert!(matches!(category.view(), TaxonomyView::Category(_)));
    assert!(category.controller().is_ready());
    assert_eq!(ids(&category.get_selection()), vec![2]);
    assert_eq!(ids(&category.get_popular()), vec![4, 1, 2, 5, 3]);

    let tags = harness.session.get("post_tag").expect("tag box");
    assert!(matches!(tags.view(), TaxonomyView::Tag(_)));
    assert_eq!(ids(&tags.get_selection()), vec![10, 12]);
    assert_eq!(ids(&tags.get_popular()), vec![10, 11, 12, 13]);
}

#[tokio::test]
async fn checklist_nests_children_and_floats_checked_terms() {
    let harness = TestHarness::new(POST_ID).await;
    let category = harness.session.get("category").expect("category box");
    let view = category.view().as_category().expect("checklist");

    let panel = view.panel(PanelContext::All);
    let roots: Vec<TermId> = panel.nodes().iter().map(|node| node.id).collect();
    assert_eq!(roots, vec![1, 5, 4]);
    let children: Vec<(TermId, bool)> = panel.nodes()[0]
        .children
        .iter()
        .map(|node| (node.id, node.checked))
        .collect();
    assert_eq!(children, vec![(2, true), (3, false)]);

    let options: Vec<(i64, usize)> = view
        .form()
        .parent_options
        .iter()
        .map(|option| (option.value, option.level))
        .collect();
    assert_eq!(options, vec![(-1, 0), (1, 0), (3, 1), (2, 1), (5, 0), (4, 0)]);
}

#[tokio::test]
async fn new_item_has_empty_selection_and_no_selection_fetch() {
    let harness = TestHarness::new(0).await;
    for taxonomy_box in harness.session.boxes() {
        assert!(taxonomy_box.get_selection().is_empty());
        assert!(!taxonomy_box.get_all().is_empty());
    }
    assert_eq!(
        harness.backend.requests(),
        vec!["GET taxonomies?type=post", "GET categories", "GET tags"]
    );
}

#[tokio::test]
async fn facade_queries_and_local_mutations() {
    let harness = TestHarness::new(POST_ID).await;
    let tags = harness.session.get("post_tag").expect("tag box");

    assert!(tags.has(11));
    assert_eq!(tags.find("tokio").map(|term| term.id), Some(12));
    assert_eq!(tags.get(99), None);
    assert_eq!(
        ids(&tags.filter(|term| term.count == 0)),
        vec![13]
    );

    assert_eq!(tags.add_to_selection(&[11, 12, 99]), 1);
    assert_eq!(ids(&tags.get_selection()), vec![10, 12, 11]);
    assert_eq!(tags.remove_from_selection(&[10, 10]), 1);
    assert_eq!(tags.empty(), 2);
    assert!(tags.get_selection().is_empty());

    assert!(tags.add(Term::new(50, "local-only")));
    assert!(tags.has(50));
    assert!(tags.remove(50));
    assert!(!tags.has(50));
    assert_eq!(harness.backend.terms("tags").len(), 4);
}

#[tokio::test]
async fn create_adds_without_selecting_and_delete_forces() {
    let harness = TestHarness::new(POST_ID).await;
    let tags = harness.session.get("post_tag").expect("tag box");

    let created = tags
        .create(NewTermInput::named("serde"))
        .await
        .expect("create")
        .expect("created term");
    assert!(tags.has(created.id));
    assert!(!tags.controller().is_selected(created.id));

    assert!(tags.delete(10).await.expect("delete"));
    assert!(!tags.has(10));
    assert_eq!(ids(&tags.get_selection()), vec![12]);
    assert!(
        harness
            .backend
            .requests()
            .contains(&"DELETE tags/10?force=true".to_string())
    );
    assert!(harness.backend.terms("tags").iter().all(|term| term.id != 10));
}

#[tokio::test]
async fn shell_commands_drive_the_views_and_save() {
    let mut harness = TestHarness::new(POST_ID).await;
    let mut document = PostDocument::new(POST_ID);

    let output = run_line(&mut harness, "select category 4 --context pop", &mut document).await;
    assert_eq!(output, "selected #4 in category");
    let output = run_line(&mut harness, "select category 4", &mut document).await;
    assert_eq!(output, "#4 is already selected in category");

    let output = run_line(&mut harness, "add post_tag async, actix web", &mut document).await;
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines[0], "async: selected existing #11");
    assert!(lines[1].starts_with("actix web: created #"));

    let output = run_line(&mut harness, "add category Europe --parent 2", &mut document).await;
    assert!(output.starts_with("Europe: created #"));
    let europe = harness
        .session
        .get("category")
        .and_then(|taxonomy_box| taxonomy_box.find("Europe"))
        .expect("europe");
    assert_eq!(europe.parent, 2);

    let output = run_line(&mut harness, "find post_tag actix-web", &mut document).await;
    assert!(output.starts_with("actix web (#"));
    assert!(output.ends_with("selected"));

    let output = run_line(&mut harness, "show post_tag", &mut document).await;
    assert!(output.contains("[rust x #10]"));
    assert!(output.contains("[async x #11]"));

    let output = run_line(&mut harness, "save", &mut document).await;
    assert_eq!(output, "saved 2 taxonomies on post 7");
    let categories = document.field("categories").expect("categories field").to_vec();
    let mut sorted = categories.clone();
    sorted.sort_unstable();
    let mut expected = vec![2, 4, europe.id];
    expected.sort_unstable();
    assert_eq!(sorted, expected);
    let tags = document.field("tags").expect("tags field");
    assert_eq!(&tags[..3], &[10, 12, 11]);
    assert_eq!(tags.len(), 4);
}

#[tokio::test]
async fn reset_discards_unsaved_selection() {
    let mut harness = TestHarness::new(POST_ID).await;
    let mut document = PostDocument::new(POST_ID);
    run_line(&mut harness, "empty post_tag", &mut document).await;
    assert!(
        harness
            .session
            .get("post_tag")
            .expect("tags")
            .get_selection()
            .is_empty()
    );

    let before = harness.session.controller("post_tag").expect("tags").generation();
    let output = run_line(&mut harness, "reset post_tag", &mut document).await;
    assert!(output.contains("[rust x #10]"));
    let controller = harness.session.controller("post_tag").expect("tags");
    assert!(controller.generation() > before);
    assert_eq!(controller.selected_ids(), vec![10, 12]);
}

#[tokio::test]
async fn shell_rejects_invalid_requests() {
    let mut harness = TestHarness::new(0).await;
    let mut document = PostDocument::new(0);

    let err = cli::execute(&mut harness.session, ShellCommand::Save, &mut document)
        .await
        .expect_err("unsaved item");
    assert_eq!(err.kind(), CliErrorKind::Usage);

    let err = cli::execute(
        &mut harness.session,
        ShellCommand::Cloud {
            taxonomy: "category".to_string(),
        },
        &mut document,
    )
    .await
    .expect_err("no cloud for categories");
    assert_eq!(err.kind(), CliErrorKind::Usage);

    let err = cli::execute(
        &mut harness.session,
        ShellCommand::Empty {
            taxonomy: "genre".to_string(),
        },
        &mut document,
    )
    .await
    .expect_err("unknown taxonomy");
    assert_eq!(err.kind(), CliErrorKind::Session);
    assert!(err.to_string().contains("genre"));
}

#[tokio::test]
async fn shell_refuses_terms_without_a_loaded_parent() {
    let mut harness = TestHarness::new(POST_ID).await;
    let mut document = PostDocument::new(POST_ID);
    harness
        .backend
        .seed_term("categories", Term::new(30, "Stray").with_parent(99));
    harness.session.reset("category").await.expect("reset");

    for context in [None, Some(PanelContext::All)] {
        let err = cli::execute(
            &mut harness.session,
            ShellCommand::Select {
                taxonomy: "category".to_string(),
                id: 30,
                context,
            },
            &mut document,
        )
        .await
        .expect_err("stray term");
        assert_eq!(err.kind(), CliErrorKind::Session);
        assert!(err.to_string().contains("parent is not loaded"));
    }
    let controller = harness.session.controller("category").expect("categories");
    assert_eq!(controller.selected_ids(), vec![2]);
}

#[tokio::test]
async fn scripted_shell_session() {
    let mut harness = TestHarness::new(POST_ID).await;
    let mut document = PostDocument::new(POST_ID);
    let script = "cloud post_tag\nselect category 5\nfrobnicate\n\nsave\nquit\nselect category 4\n";
    let mut output: Vec<u8> = Vec::new();

    cli::run_shell(
        &mut harness.session,
        &mut document,
        BufReader::new(script.as_bytes()),
        &mut output,
    )
    .await
    .expect("shell");

    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("Choose from the most used:"));
    assert!(text.contains("*rust (#10, 22pt, 6 topics)"));
    assert!(text.contains("selected #5 in category"));
    assert!(text.contains("error: Unknown command 'frobnicate'"));
    assert!(text.contains("saved 2 taxonomies on post 7"));
    assert!(!text.contains("selected #4"));
    assert_eq!(document.field("categories"), Some(&[5, 2][..]));
}
