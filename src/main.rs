use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process;

use diagtree::export::{self, DotConfig};
use diagtree::layout::{Direction, LayeredLayout, LayoutEngine};
use diagtree::serve::{self, ApiState};
use diagtree::subgraph::{extract, Subgraph};
use diagtree::tree::{build_forest, build_tree_at, render_outline};
use diagtree::{open_slot, Config, Element, ElementStore, ElementType, NoticeLevel, StoreError};

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "diagtree")]
#[command(author, version, about = "Edit and visualize troubleshooting decision trees")]
struct Cli {
    /// Data file to use instead of the configured one (.json, or .db for SQLite)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create .diagtree/config.toml and seed the data file with the sample tree
    Init {
        /// Start with an empty collection instead of the sample tree
        #[arg(long)]
        empty: bool,
    },

    /// Add an element
    Add {
        /// Element type: category, problem, state, verification, action
        #[arg(short = 't', long = "type")]
        kind: ElementType,

        title: String,

        /// Explicit id (generated from the type when omitted)
        #[arg(long)]
        id: Option<String>,

        #[arg(short, long)]
        parent: Option<String>,

        /// Successor (state / action); repeatable
        #[arg(short, long)]
        next: Vec<String>,

        /// Successor when the check passes (verification)
        #[arg(long)]
        ok: Option<String>,

        /// Successor when the check fails (verification)
        #[arg(long)]
        ko: Option<String>,

        /// Mark the element as having documentation
        #[arg(long)]
        usedoc: bool,
    },

    /// Change fields of an existing element
    Update {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long, conflicts_with = "root")]
        parent: Option<String>,

        /// Make the element a root
        #[arg(long)]
        root: bool,

        /// Replace the successors; repeatable
        #[arg(short, long)]
        next: Vec<String>,

        /// Remove every successor
        #[arg(long, conflicts_with = "next")]
        clear_next: bool,

        /// OK successor; an empty value clears it
        #[arg(long)]
        ok: Option<String>,

        /// KO successor; an empty value clears it
        #[arg(long)]
        ko: Option<String>,

        #[arg(long)]
        usedoc: Option<bool>,
    },

    /// Delete an element and everything below it
    Delete { id: String },

    /// Move an element under a new parent
    Move {
        id: String,

        /// New parent id
        #[arg(long, required_unless_present = "root")]
        to: Option<String>,

        /// Move to the root level
        #[arg(long, conflicts_with = "to")]
        root: bool,
    },

    /// Show one element
    Show {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// List the direct children of an element, or the roots
    Children { id: Option<String> },

    /// Print the hierarchy as an outline
    Tree {
        /// Only the subtree below this element
        #[arg(long)]
        root: Option<String>,
    },

    /// Case-insensitive search on titles and ids
    Search { query: String },

    /// Show the flow reachable from an element
    Graph {
        id: String,

        #[arg(short, long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,

        /// Layout direction for json / dot output (tb or lr)
        #[arg(long)]
        direction: Option<Direction>,
    },

    /// Write the whole collection as pretty JSON
    Export {
        /// Output file (defaults to the configured export name)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print to stdout instead of writing a file
        #[arg(long, conflicts_with = "output")]
        stdout: bool,
    },

    /// Replace the collection with the contents of a JSON file
    Import { file: PathBuf },

    /// Report dangling references and summary counts
    Check,

    /// Interactive terminal editor
    Tui,

    /// Serve the JSON API on localhost
    Serve {
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GraphFormat {
    Text,
    Json,
    Dot,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult {
    let config = Config::load();

    match cli.command {
        Command::Init { empty } => init(&config, cli.data, empty),
        Command::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "diagtree", &mut io::stdout());
            Ok(())
        }
        Command::Tui => {
            let store = open_store(&config, cli.data)?;
            // stderr would draw over the alternate screen
            if std::env::var_os("RUST_LOG").is_none() {
                log::set_max_level(log::LevelFilter::Off);
            }
            diagtree::tui::run(store, &config)?;
            Ok(())
        }
        Command::Serve { port } => {
            let store = open_store(&config, cli.data)?;
            serve::start_server(port, ApiState::new(store, &config))?;
            Ok(())
        }
        command => {
            let mut store = open_store(&config, cli.data)?;
            let result = dispatch(&mut store, &config, command);
            print_notices(&mut store);
            result
        }
    }
}

fn open_store(config: &Config, data: Option<PathBuf>) -> CliResult<ElementStore> {
    let path = data.unwrap_or_else(|| config.data_path());
    log::debug!("using data file {}", path.display());
    let slot = open_slot(&path, &config.storage.slot)?;
    Ok(ElementStore::open(slot))
}

/// Success and warning notices go to stderr; errors are reported by `main`
fn print_notices(store: &mut ElementStore) {
    for notice in store.drain_notices() {
        match notice.level {
            NoticeLevel::Success => eprintln!("{} {}", "✓".green(), notice),
            NoticeLevel::Warning => eprintln!("{} {}", "!".yellow().bold(), notice),
            NoticeLevel::Error => {}
        }
    }
}

fn dispatch(store: &mut ElementStore, config: &Config, command: Command) -> CliResult {
    match command {
        Command::Add {
            kind,
            title,
            id,
            parent,
            next,
            ok,
            ko,
            usedoc,
        } => {
            let mut element = Element::new(kind, title)
                .with_id(id.unwrap_or_default())
                .with_next(next)
                .with_branches(ok.as_deref(), ko.as_deref())
                .with_usedoc(usedoc);
            element.parent = parent;
            let id = store.add(element)?;
            println!("{}", id);
        }

        Command::Update {
            id,
            title,
            parent,
            root,
            next,
            clear_next,
            ok,
            ko,
            usedoc,
        } => {
            let mut element = store
                .get(&id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            if let Some(title) = title {
                element.title = title;
            }
            if root {
                element.parent = None;
            } else if parent.is_some() {
                element.parent = parent;
            }
            if clear_next {
                element.next.clear();
            } else if !next.is_empty() {
                element.next = next;
            }
            if let Some(ok) = ok {
                element.next_ok = Some(ok);
            }
            if let Some(ko) = ko {
                element.next_ko = Some(ko);
            }
            if let Some(usedoc) = usedoc {
                element.usedoc = usedoc;
            }
            store.update(element)?;
        }

        Command::Delete { id } => {
            let removed = store.delete(&id)?;
            for rid in removed {
                println!("{}", rid);
            }
        }

        Command::Move { id, to, root } => {
            let parent = if root { None } else { to };
            store.move_element(&id, parent.as_deref())?;
        }

        Command::Show { id, json } => {
            let element = store
                .get(&id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(element)?);
            } else {
                print_element(store, element);
            }
        }

        Command::Children { id } => {
            if let Some(id) = id.as_deref() {
                if !store.contains(id) {
                    return Err(StoreError::NotFound(id.to_string()).into());
                }
            }
            for child in store.children(id.as_deref()) {
                println!("{}", summary_line(child));
            }
        }

        Command::Tree { root } => {
            let forest = match root {
                Some(id) => vec![build_tree_at(store, &id).ok_or(StoreError::NotFound(id))?],
                None => build_forest(store),
            };
            print!("{}", render_outline(&forest));
        }

        Command::Search { query } => {
            let hits = store.search(&query);
            if hits.is_empty() {
                eprintln!("No matches for '{}'", query);
            }
            for el in hits {
                println!("{}", summary_line(el));
            }
        }

        Command::Graph {
            id,
            format,
            direction,
        } => {
            if !store.contains(&id) {
                return Err(StoreError::NotFound(id).into());
            }
            let subgraph = extract(store, &id);
            let mut layout_config = config.layout.clone();
            if let Some(direction) = direction {
                layout_config.direction = direction;
            }
            match format {
                GraphFormat::Text => print_flow(&subgraph),
                GraphFormat::Json => {
                    let layout = LayeredLayout.layout(&subgraph, &layout_config);
                    let view = serde_json::json!({ "subgraph": subgraph, "layout": layout });
                    println!("{}", serde_json::to_string_pretty(&view)?);
                }
                GraphFormat::Dot => {
                    let dot_config = DotConfig {
                        title: store.get(&id).map(|el| el.title.clone()),
                        direction: layout_config.direction,
                        ..DotConfig::default()
                    };
                    print!("{}", export::subgraph_to_dot(&subgraph, &dot_config));
                }
            }
        }

        Command::Export { output, stdout } => {
            if stdout {
                println!("{}", export::export_json(store)?);
            } else {
                let target = output.unwrap_or_else(|| PathBuf::from(&config.export.file_name));
                let written = export::write_export(store, Some(&target))?;
                eprintln!("{} {}", "Exported".green(), written.display());
            }
        }

        Command::Import { file } => {
            let count = export::import_file(store, &file)?;
            println!("{}", count);
        }

        Command::Check => {
            let dangling = store.dangling_references();
            let reachable = diagtree::tree::flatten(&build_forest(store)).len();
            println!("Storage:   {}", store.storage_location());
            println!("Elements:  {}", store.len());
            println!("In tree:   {}", reachable);
            if reachable < store.len() {
                println!(
                    "{} {} element(s) are not reachable from a root",
                    "!".yellow().bold(),
                    store.len() - reachable
                );
            }
            if dangling.is_empty() {
                println!("{}", "No dangling references".green());
            } else {
                for d in &dangling {
                    println!(
                        "{} {}.{} -> {} (missing)",
                        "✗".red(),
                        d.element,
                        d.field,
                        d.target
                    );
                }
                return Err(format!("{} dangling reference(s)", dangling.len()).into());
            }
        }

        Command::Init { .. } | Command::Completion { .. } | Command::Tui | Command::Serve { .. } => {}
    }
    Ok(())
}

fn init(config: &Config, data: Option<PathBuf>, empty: bool) -> CliResult {
    let cwd = std::env::current_dir()?;
    let dir = cwd.join(diagtree::config::CONFIG_DIR);
    let config_path = dir.join(diagtree::config::CONFIG_FILE);

    println!("\n{}", "Initializing diagtree...".cyan().bold());
    println!("   Directory: {}\n", cwd.display());

    fs::create_dir_all(&dir)?;
    if config_path.exists() {
        println!("   {} {} (already exists)", "Skipping".yellow(), config_path.display());
    } else {
        fs::write(&config_path, Config::template())?;
        println!("   {} {}", "Creating".green(), config_path.display());
    }

    let fresh = Config::load_from(&cwd);
    let data_path = data.unwrap_or_else(|| fresh.data_path());
    let slot = open_slot(&data_path, &fresh.storage.slot)?;
    if slot.load()?.is_some() {
        println!("   {} {} (already has data)", "Skipping".yellow(), data_path.display());
    } else {
        let payload = if empty {
            diagtree::ElementsData::default().to_json()?
        } else {
            diagtree::sample::default_json().to_string()
        };
        slot.store(&payload)?;
        println!("   {} {}", "Creating".green(), data_path.display());
    }

    println!("\n{}", "diagtree initialized!".green().bold());
    println!("\nNext steps:");
    println!("  1. Run {} to browse the tree", "diagtree tree".cyan());
    println!("  2. Run {} for the interactive editor", "diagtree tui".cyan());
    println!();
    Ok(())
}

fn type_tag(kind: ElementType) -> colored::ColoredString {
    let tag = format!("[{}]", kind.short_tag());
    match kind {
        ElementType::Category => tag.magenta(),
        ElementType::Problem => tag.yellow(),
        ElementType::State => tag.blue(),
        ElementType::Verification => tag.cyan(),
        ElementType::Action => tag.green(),
    }
}

fn summary_line(el: &Element) -> String {
    format!("{} {} {}", type_tag(el.kind), el.title, format!("({})", el.id).dimmed())
}

fn print_element(store: &ElementStore, el: &Element) {
    let name = |id: &str| {
        store
            .get(id)
            .map(|t| format!("{} ({})", t.title, id))
            .unwrap_or_else(|| format!("{} {}", id, "(missing)".red()))
    };

    println!("{} {}", type_tag(el.kind), el.title.bold());
    println!("  id:      {}", el.id);
    println!("  type:    {}", el.kind.display_name());
    println!(
        "  parent:  {}",
        el.parent.as_deref().map(name).unwrap_or_else(|| "(root)".to_string())
    );
    for target in &el.next {
        println!("  next:    {}", name(target));
    }
    if let Some(ok) = el.next_ok.as_deref() {
        println!("  {}:      {}", "OK".green(), name(ok));
    }
    if let Some(ko) = el.next_ko.as_deref() {
        println!("  {}:      {}", "KO".red(), name(ko));
    }
    if el.usedoc {
        println!("  usedoc:  yes");
    }
    let children = store.children(Some(&el.id));
    if !children.is_empty() {
        println!("  children:");
        for child in children {
            println!("    {}", summary_line(child));
        }
    }
}

fn print_flow(subgraph: &Subgraph) {
    for node in &subgraph.nodes {
        println!("{}", summary_line(node));
        for edge in subgraph.edges.iter().filter(|e| e.source == node.id) {
            let arrow = match edge.label() {
                Some("OK") => "--OK-->".green(),
                Some(label) => format!("--{}-->", label).red(),
                None => "------>".normal(),
            };
            println!("    {} {}", arrow, edge.target);
        }
    }
}
