use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use dialoguer::Confirm;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "server")]
use ownerchart::serve::{ServeArgs, run_serve};
use ownerchart::store;
use ownerchart::utils::{parse_percentage, split_ids};
use ownerchart::{ChartConfig, ChartLayout, Graph, GraphError, RenderOptions, Viewport, render_svg};

#[derive(Debug, Clone)]
enum OutputDestination {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Parser)]
#[command(
    name = "ownerchart",
    version,
    about = "Edit company ownership graphs and draw them as tidy trees."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Graph file holding `{companies, people}`.
    #[arg(short = 'g', long = "graph", global = true, default_value = "ownerchart.json")]
    pub graph: PathBuf,

    /// JSON file with layout and viewport settings.
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Skip confirmation prompts.
    #[arg(short = 'y', long = "yes", global = true, action = ArgAction::SetTrue)]
    pub yes: bool,

    /// Suppress informational output.
    #[arg(short = 'q', long = "quiet", global = true, action = ArgAction::SetTrue)]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Draw the graph as an SVG document.
    Render(RenderArgs),
    /// Print the computed chart (node boxes, edges, initial viewport) as JSON.
    Layout(LayoutArgs),
    /// Add a company, optionally under an existing parent.
    Add {
        name: String,
        #[arg(long = "type")]
        type_tag: Option<String>,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Rename a company.
    Rename { id: String, name: String },
    /// Change the type tag of a company.
    Retype { id: String, type_tag: String },
    /// Delete a company together with everything below it.
    Delete { id: String },
    /// Add a parent link.
    Link {
        id: String,
        parent: String,
        /// Ownership share, e.g. `40` or `40%`.
        #[arg(long)]
        ownership: Option<String>,
        /// Make the new parent the primary one.
        #[arg(long, action = ArgAction::SetTrue)]
        primary: bool,
    },
    /// Remove a parent link.
    Unlink { id: String, parent: String },
    /// Replace the whole parent list, primary first: `a,b,c`.
    Parents { id: String, parents: String },
    /// Set or clear the ownership share held by a parent.
    Own {
        id: String,
        parent: String,
        share: Option<String>,
    },
    /// Manage people attached to companies.
    #[command(subcommand)]
    Member(MemberCommand),
    /// Load a `{companies, people}` payload, merging by default.
    Import {
        file: PathBuf,
        /// Replace the current graph instead of merging into it.
        #[arg(long, action = ArgAction::SetTrue)]
        replace: bool,
    },
    /// Serve the graph over a JSON API.
    #[cfg(feature = "server")]
    Serve(ServeArgs),
}

#[derive(Debug, Subcommand)]
pub enum MemberCommand {
    Add {
        company: String,
        name: String,
        #[arg(long, default_value = "")]
        role: String,
    },
    Remove {
        id: String,
    },
}

/// Layout settings that override the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct ChartFlags {
    #[arg(long = "node-width")]
    node_width: Option<f64>,

    #[arg(long = "node-height")]
    node_height: Option<f64>,

    #[arg(long = "level-gap")]
    level_gap: Option<f64>,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Path to the output file. Use '-' to write to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    #[arg(short = 'b', long = "background-color", default_value = "white")]
    background_color: String,

    /// Leave member counts out of the node captions.
    #[arg(long = "no-members", action = ArgAction::SetTrue)]
    no_members: bool,

    #[command(flatten)]
    chart: ChartFlags,
}

#[derive(Debug, Args)]
pub struct LayoutArgs {
    /// Path to the output file. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    #[arg(long, default_value_t = 1280.0)]
    width: f64,

    #[arg(long, default_value_t = 800.0)]
    height: f64,

    /// Fit the whole chart into the viewport instead of centring the roots.
    #[arg(long, action = ArgAction::SetTrue)]
    fit: bool,

    #[command(flatten)]
    chart: ChartFlags,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LayoutOutput {
    chart: ChartLayout,
    viewport: Viewport,
}

#[cfg(feature = "server")]
pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve(args) => {
            let config = load_config(cli.global.config.as_deref(), &ChartFlags::default())?;
            run_serve(cli.global.graph, config, args).await
        }
        command => run_command(&cli.global, command),
    }
}

#[cfg(not(feature = "server"))]
pub fn dispatch_sync(cli: Cli) -> Result<()> {
    run_command(&cli.global, cli.command)
}

fn run_command(global: &GlobalArgs, command: Command) -> Result<()> {
    match command {
        Command::Render(args) => run_render(global, args),
        Command::Layout(args) => run_layout(global, args),
        Command::Add {
            name,
            type_tag,
            parent,
        } => {
            let id = edit_graph(&global.graph, |graph| match &parent {
                Some(parent) => graph.add_child_company(parent, &name, type_tag.as_deref()),
                None => graph.add_company(&name, type_tag.as_deref()),
            })?;
            report(global, format!("Added company {id}"));
            Ok(())
        }
        Command::Rename { id, name } => {
            edit_graph(&global.graph, |graph| graph.rename_company(&id, &name))?;
            report(global, format!("Renamed {id}"));
            Ok(())
        }
        Command::Retype { id, type_tag } => {
            edit_graph(&global.graph, |graph| graph.set_type(&id, &type_tag))?;
            report(global, format!("Retyped {id} as {type_tag}"));
            Ok(())
        }
        Command::Delete { id } => run_delete(global, &id),
        Command::Link {
            id,
            parent,
            ownership,
            primary,
        } => {
            let share = ownership.as_deref().map(parse_percentage).transpose()?;
            edit_graph(&global.graph, |graph| {
                graph.add_parent(&id, &parent, share)?;
                if primary {
                    graph.set_primary_parent(&id, &parent)?;
                }
                Ok(())
            })?;
            report(global, format!("Linked {id} -> {parent}"));
            Ok(())
        }
        Command::Unlink { id, parent } => {
            edit_graph(&global.graph, |graph| graph.remove_parent(&id, &parent))?;
            report(global, format!("Unlinked {id} -> {parent}"));
            Ok(())
        }
        Command::Parents { id, parents } => {
            let parents = split_ids(&parents);
            let count = parents.len();
            edit_graph(&global.graph, |graph| graph.set_parents(&id, parents))?;
            report(global, format!("{id} now has {count} parent(s)"));
            Ok(())
        }
        Command::Own { id, parent, share } => {
            let share = share.as_deref().map(parse_percentage).transpose()?;
            edit_graph(&global.graph, |graph| graph.set_ownership(&id, &parent, share))?;
            match share {
                Some(value) => report(global, format!("{parent} owns {value}% of {id}")),
                None => report(global, format!("Cleared ownership of {id} by {parent}")),
            }
            Ok(())
        }
        Command::Member(MemberCommand::Add {
            company,
            name,
            role,
        }) => {
            let id = edit_graph(&global.graph, |graph| graph.add_person(&company, &name, &role))?;
            report(global, format!("Added person {id}"));
            Ok(())
        }
        Command::Member(MemberCommand::Remove { id }) => {
            let person = edit_graph(&global.graph, |graph| graph.remove_person(&id))?;
            report(global, format!("Removed {} ({})", person.name, person.id));
            Ok(())
        }
        Command::Import { file, replace } => run_import(global, &file, replace),
        #[cfg(feature = "server")]
        Command::Serve(_) => bail!("'serve' needs the async runtime; use `dispatch`"),
    }
}

fn run_render(global: &GlobalArgs, args: RenderArgs) -> Result<()> {
    let config = load_config(global.config.as_deref(), &args.chart)?;
    let graph = store::load(&global.graph)?;
    let chart = ChartLayout::compute(&graph, &config);
    warn_broken_cycles(global, &chart);

    let options = RenderOptions {
        background: args.background_color,
        show_members: !args.no_members,
        ..RenderOptions::default()
    };
    let svg = render_svg(&chart, &options)?;

    let dest = parse_output(args.output.as_deref(), Some(&global.graph))?;
    write_output(dest, svg.as_bytes(), global.quiet)
}

fn run_layout(global: &GlobalArgs, args: LayoutArgs) -> Result<()> {
    if args.width <= 0.0 || args.height <= 0.0 {
        bail!("--width and --height must be greater than zero");
    }
    let config = load_config(global.config.as_deref(), &args.chart)?;
    let graph = store::load(&global.graph)?;
    let chart = ChartLayout::compute(&graph, &config);
    warn_broken_cycles(global, &chart);

    let viewport = match (args.fit, chart.bounds) {
        (true, Some(bounds)) => Viewport::fitted(&bounds, args.width, args.height, &config),
        _ => chart.initial_viewport(args.width, args.height, &config),
    };

    let mut json = serde_json::to_string_pretty(&LayoutOutput { chart, viewport })
        .context("failed to encode chart layout")?;
    json.push('\n');

    let dest = parse_output(args.output.as_deref().or(Some("-")), None)?;
    write_output(dest, json.as_bytes(), global.quiet)
}

fn run_delete(global: &GlobalArgs, id: &str) -> Result<()> {
    let graph = store::load(&global.graph)?;
    if !graph.contains(id) {
        return Err(GraphError::UnknownCompany(id.to_string()).into());
    }

    let below = ownerchart::descendants(id, &graph.companies).len();
    if below > 0 && !global.yes {
        let prompt = format!("Delete {id} and the {below} companies below it?");
        if !confirm(&prompt)? {
            report(global, "Nothing deleted".to_string());
            return Ok(());
        }
    }

    let summary = edit_graph(&global.graph, |graph| graph.delete_company(id))?;
    report(
        global,
        format!(
            "Deleted {} companies and {} people",
            summary.companies.len(),
            summary.people.len()
        ),
    );
    Ok(())
}

fn run_import(global: &GlobalArgs, file: &Path, replace: bool) -> Result<()> {
    let contents = fs::read_to_string(file)
        .with_context(|| format!("failed to read '{}'", file.display()))?;
    if contents.trim().is_empty() {
        bail!("input file '{}' was empty", file.display());
    }
    let payload: Value = serde_json::from_str(&contents)
        .map_err(|err| GraphError::Structure(format!("invalid JSON format: {err}")))
        .with_context(|| format!("'{}' is not a graph payload", file.display()))?;

    if replace {
        let incoming = Graph::from_value(payload)
            .with_context(|| format!("'{}' is not a graph payload", file.display()))?;
        let current = store::load_or_default(&global.graph)?;
        if !current.companies.is_empty() && !global.yes {
            let prompt = format!(
                "Replace {} companies and {} people in '{}'?",
                current.companies.len(),
                current.people.len(),
                global.graph.display()
            );
            if !confirm(&prompt)? {
                report(global, "Import cancelled".to_string());
                return Ok(());
            }
        }
        let count = incoming.companies.len();
        edit_graph(&global.graph, |graph| graph.replace(incoming))?;
        report(global, format!("Replaced graph with {count} companies"));
    } else {
        let incoming = Graph::decode_value(payload)
            .with_context(|| format!("'{}' is not a graph payload", file.display()))?;
        let summary = edit_graph(&global.graph, |graph| graph.merge(incoming))?;
        report(
            global,
            format!(
                "Merged {} companies and {} people ({} ids remapped)",
                summary.added_companies,
                summary.added_people,
                summary.remapped.len()
            ),
        );
    }
    Ok(())
}

/// Loads the graph, applies `edit`, and writes it back only if `edit`
/// succeeded.
fn edit_graph<T, F>(path: &Path, edit: F) -> Result<T>
where
    F: FnOnce(&mut Graph) -> Result<T, GraphError>,
{
    let mut graph = store::load_or_default(path)?;
    let value = edit(&mut graph)?;
    store::save(path, &graph)?;
    Ok(value)
}

fn load_config(path: Option<&Path>, flags: &ChartFlags) -> Result<ChartConfig> {
    let mut config = match path {
        Some(path) => ChartConfig::load(path)?,
        None => ChartConfig::default(),
    };
    if let Some(width) = flags.node_width {
        config.node_width = width;
    }
    if let Some(height) = flags.node_height {
        config.node_height = height;
    }
    if let Some(gap) = flags.level_gap {
        config.level_gap = gap;
    }
    config.validate()?;
    Ok(config)
}

fn confirm(prompt: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("confirmation was cancelled; pass --yes to skip it")
}

fn warn_broken_cycles(global: &GlobalArgs, chart: &ChartLayout) {
    if !chart.broken_cycles.is_empty() && !global.quiet {
        eprintln!(
            "warning: primary parent cycle detected; drawn at the top level: {}",
            chart.broken_cycles.join(", ")
        );
    }
}

fn report(global: &GlobalArgs, message: String) {
    if !global.quiet {
        println!("{message}");
    }
}

fn parse_output(output: Option<&str>, graph_path: Option<&Path>) -> Result<OutputDestination> {
    match output {
        Some("-") => Ok(OutputDestination::Stdout),
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(anyhow!(
                        "output directory '{}' does not exist",
                        parent.display()
                    ));
                }
            }
            Ok(OutputDestination::File(path))
        }
        None => match graph_path {
            Some(path) => Ok(OutputDestination::File(path.with_extension("svg"))),
            None => Ok(OutputDestination::Stdout),
        },
    }
}

fn write_output(dest: OutputDestination, bytes: &[u8], quiet: bool) -> Result<()> {
    match dest {
        OutputDestination::Stdout => {
            let mut stdout = io::stdout();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
        OutputDestination::File(path) => {
            fs::write(&path, bytes)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            if !quiet {
                println!("Generated chart -> {}", path.display());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_defaults_next_to_graph() {
        let dest = parse_output(None, Some(Path::new("data/group.json"))).unwrap();
        match dest {
            OutputDestination::File(path) => assert_eq!(path, PathBuf::from("data/group.svg")),
            OutputDestination::Stdout => panic!("expected a file destination"),
        }
        assert!(matches!(
            parse_output(Some("-"), None).unwrap(),
            OutputDestination::Stdout
        ));
    }

    #[test]
    fn flags_override_config() {
        let flags = ChartFlags {
            node_width: Some(200.0),
            node_height: None,
            level_gap: Some(10.0),
        };
        let config = load_config(None, &flags).unwrap();
        assert_eq!(config.node_width, 200.0);
        assert_eq!(config.level_gap, 10.0);
        assert_eq!(config.node_height, ChartConfig::default().node_height);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let flags = ChartFlags {
            node_width: Some(-1.0),
            ..ChartFlags::default()
        };
        assert!(load_config(None, &flags).is_err());
    }

    #[test]
    fn parses_nested_member_command() {
        let cli = Cli::try_parse_from([
            "ownerchart",
            "--graph",
            "g.json",
            "member",
            "add",
            "acme",
            "Ada",
            "--role",
            "CEO",
        ])
        .unwrap();
        assert_eq!(cli.global.graph, PathBuf::from("g.json"));
        assert!(matches!(
            cli.command,
            Command::Member(MemberCommand::Add { ref role, .. }) if role == "CEO"
        ));
    }
}
