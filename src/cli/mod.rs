//! CLI module for Pagesmith

mod args;
mod project;

pub use args::{Args, Command, MapCommand, RefCommand};
pub use project::Project;

use crate::build::{BuildOptions, BuildOutcome, Builder};
use crate::confirm::{AutoConfirm, Confirm, TerminalConfirm};
use crate::document::SearchCriteria;
use crate::error::{Error, Result};
use crate::graph::{
    Mapping, MappingFlag, Reference, ReferenceFlag, ReferenceFlags, ReferenceKind, Upsert,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Run the CLI application
pub fn run() -> ExitCode {
    let args = Args::parse_args();
    init_tracing(args.verbose);

    match execute(args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init();
}

/// Execute parsed arguments against the project they name
pub fn execute(args: Args) -> Result<()> {
    if !args.project.is_dir() {
        return Err(Error::PathNotFound(args.project));
    }

    let confirm: Box<dyn Confirm> = if args.yes {
        Box::new(AutoConfirm(true))
    } else {
        Box::new(TerminalConfirm)
    };

    let mut project = Project::open(&args.project)?;

    match args.command {
        Command::Build { output } => build(&mut project, output, args.verbose, confirm.as_ref()),
        Command::Config { option, value } => config(&mut project, option, value),
        Command::Ref { action } => reference(&mut project, action, confirm.as_ref()),
        Command::Map { action } => mapping(&mut project, action),
    }
}

fn build(
    project: &mut Project,
    output: Option<PathBuf>,
    verbose: bool,
    confirm: &dyn Confirm,
) -> Result<()> {
    project.config.merge_cli(output);
    project.config.validate()?;

    let options = BuildOptions {
        project_root: project.root.clone(),
        output_dir: project.config.output.directory.clone(),
        extension: project.config.output.extension.clone(),
        document_extensions: project.config.documents.extensions.clone(),
        verbose,
    };

    if verbose {
        println!("Project: {}", project.root.display());
        println!("Output: {}", options.output_dir.display());
        println!("Heads: {}", project.graph.heads().collect::<Vec<_>>().join(", "));
    }

    match Builder::new(&project.graph, options).run(confirm)? {
        BuildOutcome::Completed(report) => {
            println!("{}", report.summary());
            for path in &report.outputs {
                println!("  {}", path.display());
            }
            if !report.skipped.is_empty() {
                println!("Skipped empty heads: {}", report.skipped.join(", "));
            }
        }
        BuildOutcome::Cancelled { existing } => {
            println!(
                "Build cancelled, {} existing file(s) left unchanged",
                existing.len()
            );
        }
    }

    Ok(())
}

fn config(project: &mut Project, option: Option<String>, value: Option<String>) -> Result<()> {
    match (option, value) {
        (None, _) => {
            for (key, value) in project.config.entries()? {
                println!("{} = {}", key, value);
            }
        }
        (Some(option), None) => {
            let (key, value) = project.config.get(&option)?;
            println!("{} = {}", key, value);
        }
        (Some(option), Some(value)) => {
            let (key, previous) = project.config.set(&option, &value)?;
            project.save_config()?;
            let (_, current) = project.config.get(&key)?;
            println!("{}: {} -> {}", key, previous, current);
        }
    }
    Ok(())
}

fn reference(project: &mut Project, action: RefCommand, confirm: &dyn Confirm) -> Result<()> {
    match action {
        RefCommand::Set {
            key,
            kind,
            path,
            flags,
        } => {
            let kind: ReferenceKind = kind.parse()?;
            let flags = flags
                .iter()
                .map(|f| f.parse::<ReferenceFlag>())
                .collect::<Result<ReferenceFlags>>()?;

            let resolved = project.resolve(&path);
            let exists = match kind {
                ReferenceKind::File => resolved.is_file(),
                ReferenceKind::Folder => resolved.is_dir(),
            };
            if !exists {
                tracing::warn!(path = %resolved.display(), "{} does not exist yet", kind);
            }

            match project.graph.upsert_reference(&key, path, kind, flags)? {
                Upsert::Created => println!("Created reference '{}'", key),
                Upsert::Updated => println!("Updated reference '{}'", key),
            }
            project.save_graph()
        }

        RefCommand::Remove { key } => {
            let attached = project
                .graph
                .reference(&key)
                .map(|r| r.contributor_mappings().len() + r.consumer_mappings().len())
                .ok_or_else(|| Error::unknown_reference(key.as_str()))?;

            if attached > 0 {
                let prompt = format!(
                    "Reference '{}' has {} mapping(s). Remove them as well?",
                    key, attached
                );
                if !confirm.confirm(&prompt) {
                    println!("Reference '{}' left unchanged", key);
                    return Ok(());
                }
            }

            let removed = project.graph.remove_reference(&key, true)?;
            for mapping in &removed {
                println!("Removed mapping '{}'", mapping.key);
            }
            println!("Removed reference '{}'", key);
            project.save_graph()
        }

        RefCommand::List {
            search,
            paths,
            mappings,
            json,
        } => {
            let references = project.graph.list_references(search.as_deref());

            if json {
                let views: Vec<ReferenceView> = references
                    .iter()
                    .map(|r| ReferenceView::new(r, project.graph.is_head(&r.key)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&views)?);
                return Ok(());
            }

            if references.is_empty() {
                println!("No references found");
                return Ok(());
            }

            for r in references {
                let head = if project.graph.is_head(&r.key) { " (head)" } else { "" };
                println!("{}{}", r.key, head);
                if paths {
                    println!("  {}: {}", r.kind, r.path.display());
                }
                if mappings {
                    for m in r.contributor_mappings() {
                        println!("  <- {}", m);
                    }
                    for m in r.consumer_mappings() {
                        println!("  -> {}", m);
                    }
                }
            }
            Ok(())
        }
    }
}

fn mapping(project: &mut Project, action: MapCommand) -> Result<()> {
    match action {
        MapCommand::Set {
            key,
            consumer,
            contributor,
            consumer_search,
            contributor_search,
            unpack,
        } => {
            let mut mapping = Mapping::new(&key, consumer, contributor)
                .with_consumer_search(parse_terms("consumer", &consumer_search)?)
                .with_contributor_search(parse_terms("contributor", &contributor_search)?);
            if unpack {
                mapping = mapping.with_flag(MappingFlag::Unpack);
            }

            match project.graph.set_mapping(mapping)? {
                Upsert::Created => println!("Created mapping '{}'", key),
                Upsert::Updated => println!("Updated mapping '{}'", key),
            }
            project.save_graph()
        }

        MapCommand::Remove { key } => {
            let removed = project.graph.remove_mapping(&key)?;
            println!(
                "Removed mapping '{}' ({} <- {})",
                removed.key, removed.consumer, removed.contributor
            );
            project.save_graph()
        }

        MapCommand::List {
            search,
            quiet,
            json,
        } => {
            let mappings = project.graph.list_mappings(search.as_deref());

            if json {
                let views: Vec<MappingView> =
                    mappings.iter().map(|m| MappingView::new(m)).collect();
                println!("{}", serde_json::to_string_pretty(&views)?);
                return Ok(());
            }

            if mappings.is_empty() && !quiet {
                println!("No mappings found");
                return Ok(());
            }

            for m in mappings {
                if quiet {
                    println!("{}", m.key);
                    continue;
                }
                println!("{}: {} <- {}", m.key, m.consumer, m.contributor);
                println!("  consumer: {}", m.consumer_search);
                println!("  contributor: {}", m.contributor_search);
                if m.unpack() {
                    println!("  unpack");
                }
            }
            Ok(())
        }
    }
}

fn parse_terms(side: &str, terms: &[String]) -> Result<SearchCriteria> {
    SearchCriteria::from_terms(terms).ok_or_else(|| {
        Error::validation(format!(
            "{} search terms must look like attr=value, got: {}",
            side,
            terms.join(" ")
        ))
    })
}

#[derive(Serialize)]
struct ReferenceView<'a> {
    key: &'a str,
    kind: ReferenceKind,
    path: &'a std::path::Path,
    flags: Vec<&'static str>,
    head: bool,
    contributors: &'a [String],
    consumers: &'a [String],
}

impl<'a> ReferenceView<'a> {
    fn new(reference: &'a Reference, head: bool) -> Self {
        Self {
            key: &reference.key,
            kind: reference.kind,
            path: &reference.path,
            flags: reference.flags.iter().map(|f| f.as_str()).collect(),
            head,
            contributors: reference.contributor_mappings(),
            consumers: reference.consumer_mappings(),
        }
    }
}

#[derive(Serialize)]
struct MappingView<'a> {
    key: &'a str,
    consumer: &'a str,
    contributor: &'a str,
    consumer_search: &'a SearchCriteria,
    contributor_search: &'a SearchCriteria,
    flags: Vec<&'static str>,
}

impl<'a> MappingView<'a> {
    fn new(mapping: &'a Mapping) -> Self {
        Self {
            key: &mapping.key,
            consumer: &mapping.consumer,
            contributor: &mapping.contributor,
            consumer_search: &mapping.consumer_search,
            contributor_search: &mapping.contributor_search,
            flags: mapping.flags.iter().map(|f| f.as_str()).collect(),
        }
    }
}
