// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! The interactive shell driving an [`EditingSession`] from text commands.

pub(crate) mod parse_utils;

use crate::controller::AddTermOutcome;
use crate::item::ContentItem;
use crate::registry::{EditingSession, SessionError, TaxonomyBox};
use crate::store::{StoreError, StoreResult};
use crate::term::{PanelContext, Term, TermId};
use crate::view::TaxonomyView;
use crate::view::tag::split_tags;
use log::debug;
use parse_utils::{next_value, parse_context, parse_required_arg, parse_term_id, reject_extra};
use std::collections::BTreeSet;
use std::fmt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub use parse_utils::tokenize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorKind {
    Usage,
    Session,
}

#[derive(Debug, Clone)]
pub struct CliError {
    kind: CliErrorKind,
    message: String,
}

impl CliError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self {
            kind: CliErrorKind::Usage,
            message: message.into(),
        }
    }

    pub fn session(message: impl Into<String>) -> Self {
        Self {
            kind: CliErrorKind::Session,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> CliErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> i32 {
        match self.kind {
            CliErrorKind::Usage => 2,
            CliErrorKind::Session => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<SessionError> for CliError {
    fn from(err: SessionError) -> Self {
        CliError::session(err.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        CliError::session(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Select {
        taxonomy: String,
        id: TermId,
        context: Option<PanelContext>,
    },
    Deselect {
        taxonomy: String,
        id: TermId,
    },
    Add {
        taxonomy: String,
        names: String,
        parent: Option<String>,
    },
    Delete {
        taxonomy: String,
        id: TermId,
    },
    Find {
        taxonomy: String,
        query: String,
    },
    Show {
        taxonomy: Option<String>,
    },
    Tab {
        taxonomy: String,
        context: PanelContext,
    },
    Cloud {
        taxonomy: String,
    },
    Reset {
        taxonomy: String,
    },
    Empty {
        taxonomy: String,
    },
    Save,
    Help,
    Quit,
}

pub struct CommandSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static [&'static str],
    pub parser: fn(&[String]) -> Result<ShellCommand, CliError>,
}

impl CommandSpec {
    fn matches_exact(&self, token: &str) -> bool {
        self.name.eq_ignore_ascii_case(token)
            || self
                .aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(token))
    }

    fn matches_prefix(&self, token: &str) -> bool {
        let token = token.to_ascii_lowercase();
        self.name.to_ascii_lowercase().starts_with(&token)
            || self
                .aliases
                .iter()
                .any(|alias| alias.to_ascii_lowercase().starts_with(&token))
    }
}

pub struct CliRegistry {
    commands: Vec<CommandSpec>,
    names: BTreeSet<String>,
}

impl Default for CliRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CliRegistry {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            names: BTreeSet::new(),
        }
    }

    pub fn register(&mut self, command: CommandSpec) -> Result<(), CliError> {
        let keys = std::iter::once(command.name).chain(command.aliases.iter().copied());
        for key in keys {
            if !self.names.insert(key.to_ascii_lowercase()) {
                return Err(CliError::usage(format!(
                    "Duplicate command name or alias '{}'",
                    key
                )));
            }
        }
        self.commands.push(command);
        Ok(())
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    /// Resolves the first token to a command, by exact name or alias first
    /// and then by unambiguous prefix, and parses the remaining tokens.
    pub fn resolve(&self, tokens: &[String]) -> Result<ShellCommand, CliError> {
        let Some(first) = tokens.first() else {
            return Err(CliError::usage("Missing command"));
        };
        let token = first.to_ascii_lowercase();
        let command = match self.commands.iter().find(|cmd| cmd.matches_exact(&token)) {
            Some(command) => command,
            None => self.resolve_prefix(&token)?,
        };
        (command.parser)(&tokens[1..])
    }

    fn resolve_prefix(&self, token: &str) -> Result<&CommandSpec, CliError> {
        let matched: Vec<&CommandSpec> = self
            .commands
            .iter()
            .filter(|command| command.matches_prefix(token))
            .collect();
        match matched.as_slice() {
            [command] => Ok(command),
            [] => Err(CliError::usage(format!("Unknown command '{}'", token))),
            _ => {
                let mut names: Vec<&str> = matched.iter().map(|command| command.name).collect();
                names.sort();
                Err(CliError::usage(format!(
                    "Ambiguous command prefix '{}': {}",
                    token,
                    names.join(", ")
                )))
            }
        }
    }
}

pub fn build_registry() -> Result<CliRegistry, CliError> {
    let mut registry = CliRegistry::new();
    for command in command_specs() {
        registry.register(command)?;
    }
    Ok(registry)
}

fn command_specs() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: "select",
            aliases: &["check"],
            usage: &["select <taxonomy> <id> [--context all|pop]"],
            parser: parse_select,
        },
        CommandSpec {
            name: "deselect",
            aliases: &["uncheck"],
            usage: &["deselect <taxonomy> <id>"],
            parser: parse_deselect,
        },
        CommandSpec {
            name: "add",
            aliases: &[],
            usage: &["add <taxonomy> <name>[,<name>...] [--parent <id>]"],
            parser: parse_add,
        },
        CommandSpec {
            name: "delete",
            aliases: &["rm"],
            usage: &["delete <taxonomy> <id>"],
            parser: parse_delete,
        },
        CommandSpec {
            name: "find",
            aliases: &[],
            usage: &["find <taxonomy> <name-or-slug>"],
            parser: parse_find,
        },
        CommandSpec {
            name: "show",
            aliases: &["ls"],
            usage: &["show [<taxonomy>]"],
            parser: parse_show,
        },
        CommandSpec {
            name: "tab",
            aliases: &[],
            usage: &["tab <taxonomy> all|pop"],
            parser: parse_tab,
        },
        CommandSpec {
            name: "cloud",
            aliases: &[],
            usage: &["cloud <taxonomy>"],
            parser: |args| parse_taxonomy_only(args, "cloud", |taxonomy| ShellCommand::Cloud { taxonomy }),
        },
        CommandSpec {
            name: "reset",
            aliases: &[],
            usage: &["reset <taxonomy>"],
            parser: |args| parse_taxonomy_only(args, "reset", |taxonomy| ShellCommand::Reset { taxonomy }),
        },
        CommandSpec {
            name: "empty",
            aliases: &["clear"],
            usage: &["empty <taxonomy>"],
            parser: |args| parse_taxonomy_only(args, "empty", |taxonomy| ShellCommand::Empty { taxonomy }),
        },
        CommandSpec {
            name: "save",
            aliases: &[],
            usage: &["save"],
            parser: |args| reject_extra(args, "save").map(|_| ShellCommand::Save),
        },
        CommandSpec {
            name: "help",
            aliases: &["?"],
            usage: &["help"],
            parser: |_args| Ok(ShellCommand::Help),
        },
        CommandSpec {
            name: "quit",
            aliases: &["exit"],
            usage: &["quit"],
            parser: |_args| Ok(ShellCommand::Quit),
        },
    ]
}

fn parse_select(args: &[String]) -> Result<ShellCommand, CliError> {
    let (taxonomy, rest) = parse_required_arg(args, "taxonomy")?;
    let (raw_id, rest) = parse_required_arg(rest, "term id")?;
    let id = parse_term_id(&raw_id)?;
    let mut context = None;

    let mut idx = 0;
    while idx < rest.len() {
        match rest[idx].as_str() {
            "--context" => {
                if context.is_some() {
                    return Err(CliError::usage("Duplicate --context"));
                }
                idx += 1;
                context = Some(parse_context(&next_value(rest, &mut idx, "--context")?)?);
            }
            flag => {
                return Err(CliError::usage(format!(
                    "Unknown flag for select: {}",
                    flag
                )));
            }
        }
    }

    Ok(ShellCommand::Select {
        taxonomy,
        id,
        context,
    })
}

fn parse_deselect(args: &[String]) -> Result<ShellCommand, CliError> {
    let (taxonomy, rest) = parse_required_arg(args, "taxonomy")?;
    let (raw_id, rest) = parse_required_arg(rest, "term id")?;
    reject_extra(rest, "deselect")?;
    Ok(ShellCommand::Deselect {
        taxonomy,
        id: parse_term_id(&raw_id)?,
    })
}

fn parse_add(args: &[String]) -> Result<ShellCommand, CliError> {
    let (taxonomy, rest) = parse_required_arg(args, "taxonomy")?;
    let mut words: Vec<String> = Vec::new();
    let mut parent = None;

    let mut idx = 0;
    while idx < rest.len() {
        match rest[idx].as_str() {
            "--parent" => {
                if parent.is_some() {
                    return Err(CliError::usage("Duplicate --parent"));
                }
                idx += 1;
                parent = Some(next_value(rest, &mut idx, "--parent")?);
            }
            word => {
                words.push(word.to_string());
                idx += 1;
            }
        }
    }

    let names = words.join(" ");
    if split_tags(&names).is_empty() {
        return Err(CliError::usage("add requires at least one term name"));
    }
    Ok(ShellCommand::Add {
        taxonomy,
        names,
        parent,
    })
}

fn parse_delete(args: &[String]) -> Result<ShellCommand, CliError> {
    let (taxonomy, rest) = parse_required_arg(args, "taxonomy")?;
    let (raw_id, rest) = parse_required_arg(rest, "term id")?;
    reject_extra(rest, "delete")?;
    Ok(ShellCommand::Delete {
        taxonomy,
        id: parse_term_id(&raw_id)?,
    })
}

fn parse_find(args: &[String]) -> Result<ShellCommand, CliError> {
    let (taxonomy, rest) = parse_required_arg(args, "taxonomy")?;
    if rest.is_empty() {
        return Err(CliError::usage("Missing name or slug"));
    }
    Ok(ShellCommand::Find {
        taxonomy,
        query: rest.join(" "),
    })
}

fn parse_show(args: &[String]) -> Result<ShellCommand, CliError> {
    let taxonomy = args.first().cloned();
    if args.len() > 1 {
        reject_extra(&args[1..], "show")?;
    }
    Ok(ShellCommand::Show { taxonomy })
}

fn parse_tab(args: &[String]) -> Result<ShellCommand, CliError> {
    let (taxonomy, rest) = parse_required_arg(args, "taxonomy")?;
    let (raw, rest) = parse_required_arg(rest, "panel")?;
    reject_extra(rest, "tab")?;
    Ok(ShellCommand::Tab {
        taxonomy,
        context: parse_context(&raw)?,
    })
}

fn parse_taxonomy_only(
    args: &[String],
    command: &str,
    build: fn(String) -> ShellCommand,
) -> Result<ShellCommand, CliError> {
    let (taxonomy, rest) = parse_required_arg(args, "taxonomy")?;
    reject_extra(rest, command)?;
    Ok(build(taxonomy))
}

pub fn help_text() -> String {
    let registry = match build_registry() {
        Ok(registry) => registry,
        Err(err) => {
            return format!("Failed to build command registry: {}", err);
        }
    };

    let mut out = String::new();
    push_line(&mut out, "Usage:");
    push_line(&mut out, "  taxbox [-C <root>] [--item <id>]");
    push_line(&mut out, "");
    push_line(&mut out, "Options:");
    push_line(&mut out, "  -C <root>     Directory holding config.yaml (default: .).");
    push_line(&mut out, "  --item <id>   Edit this item instead of item.id from the config.");
    push_line(&mut out, "  -h, --help    Show this help.");
    push_line(&mut out, "");
    push_line(&mut out, "Shell commands:");
    for command in registry.commands() {
        push_line(
            &mut out,
            &format!("  {}{}", command.name, format_aliases(command.aliases)),
        );
        for usage in command.usage {
            push_line(&mut out, &format!("    {}", usage));
        }
    }
    push_line(&mut out, "");
    push_line(&mut out, "Notes:");
    push_line(
        &mut out,
        "  Commands are case-insensitive and accept unambiguous prefixes.",
    );
    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

fn format_aliases(aliases: &[&str]) -> String {
    if aliases.is_empty() {
        String::new()
    } else {
        format!(" (aliases: {})", aliases.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue(String),
    Quit,
}

fn lookup<'a>(session: &'a EditingSession, slug: &str) -> Result<&'a TaxonomyBox, CliError> {
    session
        .get(slug)
        .ok_or_else(|| SessionError::UnknownTaxonomy(slug.to_string()).into())
}

fn lookup_mut<'a>(
    session: &'a mut EditingSession,
    slug: &str,
) -> Result<&'a mut TaxonomyBox, CliError> {
    session
        .get_mut(slug)
        .ok_or_else(|| SessionError::UnknownTaxonomy(slug.to_string()).into())
}

pub fn describe_term(term: &Term) -> String {
    let mut line = format!(
        "{} (#{}) slug={} count={}",
        term.name, term.id, term.slug, term.count
    );
    if !term.is_root() {
        line.push_str(&format!(" parent=#{}", term.parent));
    }
    if term.selected {
        line.push_str(" selected");
    }
    line
}

fn describe_outcome(name: &str, outcome: &StoreResult<AddTermOutcome>) -> String {
    match outcome {
        Ok(AddTermOutcome::Ignored) => format!("{}: ignored", name),
        Ok(AddTermOutcome::Selected(id)) => format!("{}: selected existing #{}", name, id),
        Ok(AddTermOutcome::Created(term)) => format!("{}: created #{}", name, term.id),
        Ok(AddTermOutcome::InFlight) => format!("{}: already being created", name),
        Ok(AddTermOutcome::Abandoned(term)) => {
            format!("{}: created #{} after the box was reset", name, term.id)
        }
        Err(err) => format!("{}: failed: {}", name, err),
    }
}

fn render_box(taxonomy_box: &TaxonomyBox) -> String {
    taxonomy_box.view().to_string()
}

/// Runs one command against the session. Views are synced before any
/// output is rendered.
pub async fn execute(
    session: &mut EditingSession,
    command: ShellCommand,
    item: &mut dyn ContentItem,
) -> Result<Flow, CliError> {
    debug!("shell command: {:?}", command);
    let output = match command {
        ShellCommand::Select {
            taxonomy,
            id,
            context,
        } => {
            let taxonomy_box = lookup_mut(session, &taxonomy)?;
            if taxonomy_box.get(id).is_none() {
                return Err(CliError::session(format!(
                    "Unknown term #{} in {}",
                    id, taxonomy
                )));
            }
            let changed = match (taxonomy_box.view_mut(), context) {
                (TaxonomyView::Category(view), _) if !view.is_selectable(id) => {
                    return Err(CliError::session(format!(
                        "#{} in {} cannot be selected: its parent is not loaded",
                        id, taxonomy
                    )));
                }
                (TaxonomyView::Category(view), Some(panel)) => view.toggle_term(panel, id, true),
                (view, _) => view.controller().set_selected(id, context),
            };
            taxonomy_box.sync();
            if changed {
                format!("selected #{} in {}", id, taxonomy)
            } else {
                format!("#{} is already selected in {}", id, taxonomy)
            }
        }
        ShellCommand::Deselect { taxonomy, id } => {
            let taxonomy_box = lookup_mut(session, &taxonomy)?;
            let changed = match taxonomy_box.view_mut() {
                TaxonomyView::Category(view) => {
                    let panel = view.active_tab();
                    view.toggle_term(panel, id, false)
                }
                TaxonomyView::Tag(view) => view.remove_chip(id),
            };
            taxonomy_box.sync();
            if changed {
                format!("deselected #{} in {}", id, taxonomy)
            } else {
                format!("#{} is not selected in {}", id, taxonomy)
            }
        }
        ShellCommand::Add {
            taxonomy,
            names,
            parent,
        } => {
            let taxonomy_box = lookup_mut(session, &taxonomy)?;
            let results: Vec<(String, StoreResult<AddTermOutcome>)> = match taxonomy_box.view_mut() {
                TaxonomyView::Category(view) => {
                    let parent = parent.as_deref().unwrap_or("-1");
                    let mut results = Vec::new();
                    for name in split_tags(&names) {
                        let outcome = view.submit_new_term(&name, parent).await;
                        results.push((name, outcome));
                    }
                    results
                }
                TaxonomyView::Tag(view) => {
                    if parent.is_some() {
                        return Err(CliError::usage(format!(
                            "{} is not hierarchical; --parent is not allowed",
                            taxonomy
                        )));
                    }
                    view.set_entry(names);
                    view.submit_entry().await
                }
            };
            session.pump();
            results
                .iter()
                .map(|(name, outcome)| describe_outcome(name, outcome))
                .collect::<Vec<_>>()
                .join("\n")
        }
        ShellCommand::Delete { taxonomy, id } => {
            let deleted = lookup(session, &taxonomy)?.delete(id).await?;
            session.pump();
            if deleted {
                format!("deleted #{} from {}", id, taxonomy)
            } else {
                format!("#{} is not a known {} term", id, taxonomy)
            }
        }
        ShellCommand::Find { taxonomy, query } => match lookup(session, &taxonomy)?.find(&query) {
            Some(term) => describe_term(&term),
            None => format!("no {} term named '{}'", taxonomy, query),
        },
        ShellCommand::Show { taxonomy } => {
            session.pump();
            match taxonomy {
                Some(slug) => render_box(lookup(session, &slug)?),
                None if session.is_empty() => "no taxonomies".to_string(),
                None => session
                    .boxes()
                    .map(render_box)
                    .collect::<Vec<_>>()
                    .join("\n"),
            }
        }
        ShellCommand::Tab { taxonomy, context } => {
            let taxonomy_box = lookup_mut(session, &taxonomy)?;
            let Some(view) = taxonomy_box.view_mut().as_category_mut() else {
                return Err(CliError::usage(format!(
                    "{} has no tabs; it is not hierarchical",
                    taxonomy
                )));
            };
            view.switch_tab(context);
            render_box(taxonomy_box)
        }
        ShellCommand::Cloud { taxonomy } => {
            let taxonomy_box = lookup_mut(session, &taxonomy)?;
            let Some(view) = taxonomy_box.view_mut().as_tag_mut() else {
                return Err(CliError::usage(format!(
                    "{} has no tag cloud; it is hierarchical",
                    taxonomy
                )));
            };
            view.toggle_cloud();
            taxonomy_box.sync();
            render_box(taxonomy_box)
        }
        ShellCommand::Reset { taxonomy } => {
            session.reset(&taxonomy).await?;
            render_box(lookup(session, &taxonomy)?)
        }
        ShellCommand::Empty { taxonomy } => {
            let taxonomy_box = lookup_mut(session, &taxonomy)?;
            let cleared = taxonomy_box.empty();
            taxonomy_box.sync();
            format!("cleared {} selected {} terms", cleared, taxonomy)
        }
        ShellCommand::Save => {
            if session.item().id == 0 {
                return Err(CliError::usage(
                    "The item has no id yet; start with --item <id> to save",
                ));
            }
            let saved = session.save(item).await?;
            format!(
                "saved {} taxonomies on {} {}",
                saved,
                session.item().post_type,
                session.item().id
            )
        }
        ShellCommand::Help => help_text(),
        ShellCommand::Quit => return Ok(Flow::Quit),
    };
    Ok(Flow::Continue(output))
}

/// Reads commands line by line until `quit` or end of input. Command
/// errors are printed and the shell keeps going.
pub async fn run_shell<R, W>(
    session: &mut EditingSession,
    item: &mut dyn ContentItem,
    reader: R,
    writer: &mut W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let registry = build_registry().map_err(|err| std::io::Error::other(err.to_string()))?;
    let mut lines = reader.lines();
    loop {
        writer.write_all(b"> ").await?;
        writer.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let tokens = tokenize(&line);
        if tokens.is_empty() {
            continue;
        }
        let result = match registry.resolve(&tokens) {
            Ok(command) => execute(session, command, item).await,
            Err(err) => Err(err),
        };
        let text = match result {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue(output)) => output,
            Err(err) => format!("error: {}", err),
        };
        writer.write_all(text.trim_end().as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(line: &str) -> Vec<String> {
        tokenize(line)
    }

    #[test]
    fn registry_has_no_duplicate_names() {
        let registry = build_registry().expect("registry");
        assert_eq!(registry.commands().len(), 13);
        let mut duplicate = CliRegistry::new();
        duplicate
            .register(CommandSpec {
                name: "show",
                aliases: &[],
                usage: &[],
                parser: |_args| Ok(ShellCommand::Help),
            })
            .expect("first");
        let err = duplicate
            .register(CommandSpec {
                name: "list",
                aliases: &["SHOW"],
                usage: &[],
                parser: |_args| Ok(ShellCommand::Help),
            })
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn resolves_names_aliases_and_prefixes() {
        let registry = build_registry().expect("registry");
        assert_eq!(
            registry.resolve(&tokens("SEL category 3 --context pop")).unwrap(),
            ShellCommand::Select {
                taxonomy: "category".to_string(),
                id: 3,
                context: Some(PanelContext::Popular),
            }
        );
        assert_eq!(
            registry.resolve(&tokens("rm post_tag #9")).unwrap(),
            ShellCommand::Delete {
                taxonomy: "post_tag".to_string(),
                id: 9,
            }
        );
        assert_eq!(registry.resolve(&tokens("q")).unwrap(), ShellCommand::Quit);
        assert_eq!(
            registry.resolve(&tokens("show")).unwrap(),
            ShellCommand::Show { taxonomy: None }
        );
    }

    #[test]
    fn reports_ambiguous_and_unknown_commands() {
        let registry = build_registry().expect("registry");
        let err = registry.resolve(&tokens("de category 1")).unwrap_err();
        assert!(err.to_string().contains("Ambiguous"));
        assert!(err.to_string().contains("delete, deselect"));
        let err = registry.resolve(&tokens("frobnicate")).unwrap_err();
        assert!(err.to_string().contains("Unknown command"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn add_joins_words_and_takes_parent() {
        let registry = build_registry().expect("registry");
        assert_eq!(
            registry
                .resolve(&tokens("add category New York, Paris --parent 4"))
                .unwrap(),
            ShellCommand::Add {
                taxonomy: "category".to_string(),
                names: "New York, Paris".to_string(),
                parent: Some("4".to_string()),
            }
        );
        assert!(registry.resolve(&tokens("add post_tag , ,")).is_err());
        assert!(registry.resolve(&tokens("add post_tag x --parent")).is_err());
    }

    #[test]
    fn usage_errors_for_bad_arguments() {
        let registry = build_registry().expect("registry");
        for line in [
            "select category",
            "select category x",
            "select category 1 --context side",
            "select category 1 --colour red",
            "deselect category 1 2",
            "tab category sideways",
            "cloud",
            "save now",
            "find post_tag",
        ] {
            let err = registry.resolve(&tokens(line)).unwrap_err();
            assert_eq!(err.kind(), CliErrorKind::Usage, "{}", line);
        }
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_text();
        for name in ["select", "deselect", "add", "delete", "find", "show", "cloud", "reset", "empty", "save", "quit"] {
            assert!(help.contains(&format!("  {}", name)), "{}", name);
        }
    }

    #[test]
    fn session_errors_exit_with_one() {
        let err: CliError = SessionError::UnknownTaxonomy("genre".to_string()).into();
        assert_eq!(err.kind(), CliErrorKind::Session);
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "Unknown taxonomy: genre");
    }
}
