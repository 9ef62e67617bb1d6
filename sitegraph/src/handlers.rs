use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use sitegraph_core::config::{self, CONFIG_FILE_NAME, DATABASE_FILE_NAME, DEFAULT_MAX_NODES};
use sitegraph_core::graph::{
    graph_from_hierarchy, graph_from_hierarchy_pinned, prepare_hierarchy,
    prepare_hierarchy_cached,
};
use sitegraph_core::report::{
    HierarchySummary, ReportFormat, format_entries, generate_json_report,
    generate_layouts_json_report, generate_text_report, save_report,
};
use sitegraph_core::{
    FetchOptions, GraphStore, HierarchyCache, LayoutKind, LayoutOptions, PathIds, Position,
    Positions, Projection, SiteGraph, SiteGraphConfig,
};
use sitegraph_scanner::{ProgressCallback, SitemapEntry};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Where the sitemap comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapSource {
    Url(Url),
    File(PathBuf),
    Site(Url),
}

impl SitemapSource {
    pub fn from_matches(args: &ArgMatches) -> Result<Self> {
        if let Some(url) = args.get_one::<Url>("url") {
            Ok(SitemapSource::Url(url.clone()))
        } else if let Some(path) = args.get_one::<PathBuf>("file") {
            Ok(SitemapSource::File(path.clone()))
        } else if let Some(site) = args.get_one::<Url>("site") {
            Ok(SitemapSource::Site(site.clone()))
        } else {
            bail!("One of --url, --file or --site must be provided")
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SitemapSource::Url(url) | SitemapSource::Site(url) => url.to_string(),
            SitemapSource::File(path) => path.display().to_string(),
        }
    }
}

/// Config from `--config`, else from the default config dir, else defaults.
pub fn load_config(path: Option<&PathBuf>) -> Result<SiteGraphConfig> {
    match path {
        Some(path) => SiteGraphConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => {
            let default_path = config::config_dir(None).join(CONFIG_FILE_NAME);
            Ok(SiteGraphConfig::load_or_default(&default_path)?)
        }
    }
}

/// Config fetch options with any command-line overrides applied.
pub fn fetch_options_from_matches(args: &ArgMatches, base: &FetchOptions) -> FetchOptions {
    let mut options = base.clone();
    if let Some(timeout) = args.get_one::<u64>("timeout") {
        options.timeout_secs = *timeout;
    }
    if let Some(depth) = args.get_one::<usize>("max-depth") {
        options.max_depth = *depth;
    }
    if let Some(max) = args.get_one::<usize>("max-sitemaps") {
        options.max_sitemaps = *max;
    }
    options
}

/// Command-line layout flags layered over the config's layout options.
pub fn layout_options_from_matches(args: &ArgMatches, base: &LayoutOptions) -> LayoutOptions {
    let mut flags = LayoutOptions::default();
    if let (Some(width), Some(height)) = (args.get_one::<f64>("width"), args.get_one::<f64>("height")) {
        flags = flags.with_viewport(*width, *height);
    }
    if let Some(spacing) = args.get_one::<f64>("spacing") {
        flags = flags.with_spacing(*spacing);
    }
    if let Some(iterations) = args.get_one::<usize>("iterations") {
        flags = flags.with_iterations(*iterations);
    }
    if let Some(seed) = args.get_one::<u64>("seed") {
        flags = flags.with_seed(*seed);
    }
    base.merged_with(&flags)
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Read every entry reachable from `source`. Sub-sitemap failures only
/// shrink the result; a missing root document is an error.
pub async fn load_entries(
    source: &SitemapSource,
    options: &FetchOptions,
    progress: Option<ProgressCallback>,
) -> Result<Vec<SitemapEntry>> {
    let mut fetcher = options
        .build_fetcher()
        .context("Failed to build HTTP client")?;
    if let Some(callback) = progress {
        fetcher = fetcher.with_progress_callback(callback);
    }

    let entries = match source {
        SitemapSource::Url(url) => fetcher
            .fetch(url.as_str())
            .await
            .with_context(|| format!("Failed to fetch sitemap {}", url))?,
        SitemapSource::File(path) => {
            let xml = fs::read_to_string(path)
                .with_context(|| format!("Failed to read sitemap file {}", path.display()))?;
            fetcher
                .walk_document(&xml, &path.display().to_string())
                .await
        }
        SitemapSource::Site(site) => {
            let sitemap_url = fetcher
                .discover(site.as_str())
                .await
                .with_context(|| format!("No sitemap found for {}", site))?;
            fetcher
                .fetch(&sitemap_url)
                .await
                .with_context(|| format!("Failed to fetch sitemap {}", sitemap_url))?
        }
    };

    Ok(entries)
}

async fn load_entries_with_spinner(
    source: &SitemapSource,
    options: &FetchOptions,
    quiet: bool,
) -> Result<Vec<SitemapEntry>> {
    let spinner = spinner(quiet);
    spinner.set_message(format!("Reading sitemap {}", source.describe()));

    let progress_bar = spinner.clone();
    let progress: ProgressCallback = Arc::new(move |count: usize, source_name: String| {
        progress_bar.set_message(format!("{} entries so far ({})", count, source_name));
    });

    let result = load_entries(source, options, Some(progress)).await;
    spinner.finish_and_clear();
    if let (Ok(entries), false) = (&result, quiet) {
        eprintln!("{} {} sitemap entries", "✓".green().bold(), entries.len());
    }
    result
}

/// Write to `output` when given, else print to stdout.
fn emit(content: &str, output: Option<&PathBuf>, quiet: bool) -> Result<()> {
    match output {
        Some(path) => {
            save_report(content, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !quiet {
                eprintln!("{} Saved to {}", "✓".green().bold(), path.display());
            }
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn report_format(args: &ArgMatches) -> ReportFormat {
    args.get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutcome {
    pub config_path: PathBuf,
    pub database_path: PathBuf,
    pub replaced: bool,
}

/// Create `dir` with a default config file and an empty database.
/// Existing files are only replaced with `force`.
pub fn init_config_dir(dir: &Path, force: bool) -> Result<InitOutcome> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    let database_path = dir.join(DATABASE_FILE_NAME);
    let existing = config_path.exists() || GraphStore::exists(&database_path);

    if existing && !force {
        bail!(
            "{} already contains a sitegraph setup (use --force to overwrite)",
            dir.display()
        );
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create config directory {}", dir.display()))?;

    SiteGraphConfig::default()
        .save(&config_path)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    if GraphStore::exists(&database_path) {
        GraphStore::remove(&database_path)
            .with_context(|| format!("Failed to remove {}", database_path.display()))?;
    }
    GraphStore::open(&database_path)
        .with_context(|| format!("Failed to create database {}", database_path.display()))?;

    Ok(InitOutcome {
        config_path,
        database_path,
        replaced: existing,
    })
}

pub fn handle_init(args: &ArgMatches, quiet: bool) -> Result<()> {
    let dir = config::config_dir(args.get_one::<String>("PATH").map(String::as_str));
    let force = args.get_flag("force");

    let spinner = spinner(quiet);
    spinner.set_message(format!("Initializing {}", dir.display()));
    let outcome = init_config_dir(&dir, force);
    spinner.finish_and_clear();
    let outcome = outcome?;

    if !quiet {
        if outcome.replaced {
            println!("{} Replaced existing setup", "⚠".yellow().bold());
        }
        println!("{} sitegraph initialization complete!", "✓".green().bold());
        println!("{} Config: {}", "→".cyan(), outcome.config_path.display());
        println!("{} Database: {}", "→".cyan(), outcome.database_path.display());
    }
    Ok(())
}

pub async fn handle_fetch(args: &ArgMatches, quiet: bool) -> Result<()> {
    let source = SitemapSource::from_matches(args)?;
    let config = load_config(args.get_one::<PathBuf>("config"))?;
    let options = fetch_options_from_matches(args, &config.fetch);

    let entries = load_entries_with_spinner(&source, &options, quiet).await?;
    let content = format_entries(&entries, report_format(args))?;
    emit(&content, args.get_one::<PathBuf>("output"), quiet)
}

pub async fn handle_tree(args: &ArgMatches, quiet: bool) -> Result<()> {
    let source = SitemapSource::from_matches(args)?;
    let config = load_config(args.get_one::<PathBuf>("config"))?;
    let options = fetch_options_from_matches(args, &config.fetch);
    let max_nodes = args
        .get_one::<usize>("max-nodes")
        .copied()
        .unwrap_or(usize::MAX);

    let entries = load_entries_with_spinner(&source, &options, quiet).await?;
    let hierarchy = prepare_hierarchy(&entries, max_nodes)?;
    let summary = HierarchySummary::new(&source.describe(), entries.len(), &hierarchy);

    let content = match report_format(args) {
        ReportFormat::Text => generate_text_report(&summary, &hierarchy),
        ReportFormat::Json => generate_json_report(&summary, &hierarchy, None)?,
    };
    emit(&content, args.get_one::<PathBuf>("output"), quiet)
}

/// What to lay out and how.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRequest {
    pub kind: LayoutKind,
    pub options: LayoutOptions,
    pub max_nodes: usize,
    /// Pages with a stored position keep it instead of being re-laid out.
    pub keep_positions: bool,
}

impl LayoutRequest {
    pub fn new(kind: LayoutKind) -> Self {
        Self {
            kind,
            options: LayoutOptions::default(),
            max_nodes: DEFAULT_MAX_NODES,
            keep_positions: false,
        }
    }
}

/// Lay out `entries` and, with a store, persist the result under `project_id`
/// (a new project when `None`). Returns the graph and the project used.
///
/// The hierarchy comes from `cache`, so laying out the same entries again
/// with another layout does not rebuild it.
pub fn build_graph(
    entries: &[SitemapEntry],
    source_name: &str,
    request: &LayoutRequest,
    cache: &mut HierarchyCache,
    store: Option<(&mut GraphStore, Option<&str>)>,
) -> Result<(SiteGraph, Option<String>)> {
    let hierarchy = prepare_hierarchy_cached(cache, entries, request.max_nodes)?;

    let Some((store, project_id)) = store else {
        return Ok((
            graph_from_hierarchy(
                hierarchy,
                request.kind,
                &request.options,
                &PathIds,
                request.max_nodes,
            ),
            None,
        ));
    };

    let project_id = match project_id {
        Some(id) => {
            if !store.project_exists(id)? {
                bail!("No project with id {}", id);
            }
            id.to_string()
        }
        None => store.create_project(source_name, Some(source_name))?,
    };
    debug!("Persisting graph to project {}", project_id);

    let pinned = if request.keep_positions {
        store.load_positions(&project_id)?
    } else {
        Positions::new()
    };

    let urls: Vec<&str> = hierarchy.iter().map(|node| node.url.as_str()).collect();
    let ids = store.assign_ids(&project_id, &urls)?;
    let graph = graph_from_hierarchy_pinned(
        hierarchy,
        request.kind,
        &request.options,
        &pinned,
        &ids,
        request.max_nodes,
    );
    store.save_projection(&project_id, &graph.projection)?;

    Ok((graph, Some(project_id)))
}

/// Store a hand-placed position for one node.
pub fn move_node(store: &GraphStore, node_id: &str, position: Position) -> Result<()> {
    if !store.update_position(node_id, position)? {
        bail!("No node with id {}", node_id);
    }
    debug!("Moved {} to ({}, {})", node_id, position.x, position.y);
    Ok(())
}

fn open_store(path: &Path) -> Result<GraphStore> {
    let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());
    GraphStore::open(&expanded)
        .with_context(|| format!("Failed to open database {}", expanded.display()))
}

pub async fn handle_layout(args: &ArgMatches, quiet: bool) -> Result<()> {
    let source = SitemapSource::from_matches(args)?;
    let config = load_config(args.get_one::<PathBuf>("config"))?;
    let options = fetch_options_from_matches(args, &config.fetch);

    let kinds: Vec<LayoutKind> = match args.get_many::<String>("layout") {
        Some(names) => names
            .map(|name| name.parse::<LayoutKind>())
            .collect::<std::result::Result<_, _>>()?,
        None => vec![config.layout_kind],
    };
    let mut store = args.get_one::<PathBuf>("db").map(|p| open_store(p)).transpose()?;
    if store.is_some() && kinds.len() > 1 {
        bail!("--db stores one layout per run; pass a single --layout");
    }

    let mut request = LayoutRequest::new(kinds[0]);
    request.options = layout_options_from_matches(args, &config.layout);
    request.max_nodes = args
        .get_one::<usize>("max-nodes")
        .copied()
        .unwrap_or(config.max_nodes);
    request.keep_positions = args.get_flag("keep-positions");

    let entries = load_entries_with_spinner(&source, &options, quiet).await?;
    let source_name = source.describe();
    let project = args.get_one::<String>("project").map(String::as_str);

    let mut cache = HierarchyCache::default();
    let mut graphs = Vec::with_capacity(kinds.len());
    let mut project_id = None;
    for kind in &kinds {
        request.kind = *kind;
        let (graph, saved_to) = build_graph(
            &entries,
            &source_name,
            &request,
            &mut cache,
            store.as_mut().map(|s| (s, project)),
        )?;
        project_id = saved_to;
        graphs.push(graph);
    }

    let Some(first) = graphs.first() else {
        bail!("No layout requested");
    };
    let summary = HierarchySummary::new(&source_name, entries.len(), &first.hierarchy);
    let content = if graphs.len() == 1 {
        generate_json_report(&summary, &first.hierarchy, Some(&first.projection))?
    } else {
        let layouts: Vec<(LayoutKind, &Projection)> =
            graphs.iter().map(|g| (g.layout, &g.projection)).collect();
        generate_layouts_json_report(&summary, &first.hierarchy, &layouts)?
    };
    emit(&content, args.get_one::<PathBuf>("output"), quiet)?;

    if !quiet {
        for graph in &graphs {
            eprintln!(
                "{} {} layout: {} nodes, {} edges",
                "✓".green().bold(),
                graph.layout,
                graph.projection.node_count(),
                graph.projection.edge_count()
            );
        }
        if let Some(id) = project_id {
            eprintln!("{} Saved to project {}", "→".cyan(), id);
        }
    }
    Ok(())
}

pub fn handle_move(args: &ArgMatches, quiet: bool) -> Result<()> {
    let Some(db) = args.get_one::<PathBuf>("db") else {
        bail!("--db is required");
    };
    let Some(node_id) = args.get_one::<String>("node") else {
        bail!("--node is required");
    };
    let (Some(x), Some(y)) = (args.get_one::<f64>("x"), args.get_one::<f64>("y")) else {
        bail!("--x and --y are required");
    };

    let store = open_store(db)?;
    move_node(&store, node_id, Position::new(*x, *y))?;

    if !quiet {
        eprintln!("{} Moved {} to ({}, {})", "✓".green().bold(), node_id, x, y);
    }
    Ok(())
}

pub fn print_banner() {
    eprintln!("{}", "═".repeat(60).bright_blue().bold());
    eprintln!(
        "  {} {}",
        "sitegraph".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
    eprintln!("{}", "═".repeat(60).bright_blue().bold());
}
