use anyhow::{anyhow, Context as _, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use api_explorer::presets::apply_preset;
use api_explorer::response_view::{render_history_item, render_snapshot};
use api_explorer::{
    AppContext, AuthType, ExplorerConfig, HttpMethod, RequestEditor, RequestStatus, RowKind,
};

#[derive(Parser)]
#[command(name = "api-explorer")]
#[command(about = "Explore and exercise the API of a multi-tenant backend", version)]
struct Cli {
    /// Config file (defaults to ~/.api-explorer/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered endpoints
    Routes {
        #[arg(long)]
        tag: Option<String>,
    },
    /// List presets for an endpoint
    Presets { path: String },
    /// Build, validate and send one request
    Send(SendArgs),
    /// Show or clear request history
    History {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        clear: bool,
        #[arg(long)]
        delete: Option<i64>,
    },
    /// Manage cached team ids
    Team {
        #[command(subcommand)]
        command: TeamCommand,
    },
}

#[derive(Args)]
struct SendArgs {
    /// Route template, e.g. /api/v1/users/[id]
    path: String,
    /// HTTP method (defaults to the endpoint's first method)
    #[arg(short = 'X', long)]
    method: Option<String>,
    /// Path parameter as name=value
    #[arg(short = 'p', long = "param")]
    params: Vec<String>,
    /// Query parameter as key=value
    #[arg(short = 'q', long = "query")]
    query: Vec<String>,
    /// Header as "Name: value"
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,
    /// JSON request body
    #[arg(short = 'd', long)]
    data: Option<String>,
    /// Apply a preset by id before the other flags
    #[arg(long)]
    preset: Option<String>,
    /// Authenticate with an API key instead of the session
    #[arg(long)]
    api_key: Option<String>,
    /// Send the admin bypass header instead of team scoping
    #[arg(long)]
    bypass: bool,
    /// Scope the request to a team (also remembered as the active team)
    #[arg(long)]
    team: Option<String>,
    /// Print response headers
    #[arg(long = "headers")]
    show_headers: bool,
}

#[derive(Subcommand)]
enum TeamCommand {
    /// Show the active team and known teams
    Show,
    /// Set the active team
    Set { id: String },
    /// Remember team ids without changing the active team
    Add { ids: Vec<String> },
}

fn split_pair<'a>(raw: &'a str, sep: char, what: &str) -> Result<(&'a str, &'a str)> {
    raw.split_once(sep)
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| anyhow!("invalid {} {:?}, expected key{}value", what, raw, sep))
}

fn list_routes(ctx: &AppContext, tag: Option<&str>) -> Result<()> {
    let registry = ctx.registry()?;
    let endpoints: Vec<_> = match tag {
        Some(tag) => registry.by_tag(tag).collect(),
        None => registry.endpoints().iter().collect(),
    };

    for endpoint in endpoints {
        let methods: Vec<&str> = endpoint.methods.iter().map(|m| m.as_str()).collect();
        let mut line = format!("{:<24} {}", methods.join(","), endpoint.path);
        if endpoint.min_role != api_explorer::Role::Member {
            line.push_str(&format!("  [{}]", endpoint.min_role));
        }
        if let Some(summary) = &endpoint.summary {
            line.push_str(&format!("  - {}", summary));
        }
        println!("{}", line);
    }
    Ok(())
}

fn list_presets(ctx: &AppContext, path: &str) -> Result<()> {
    let presets = ctx.presets()?.for_endpoint(path);
    if presets.is_empty() {
        println!("No presets for {}", path);
        return Ok(());
    }
    for preset in presets {
        match &preset.description {
            Some(description) => println!("{:<20} {} - {}", preset.id, preset.name, description),
            None => println!("{:<20} {}", preset.id, preset.name),
        }
    }
    Ok(())
}

fn prepare_editor(ctx: &AppContext, args: &SendArgs) -> Result<RequestEditor> {
    let mut editor = ctx.editor();

    match ctx.registry()?.lookup(&args.path) {
        Some(endpoint) => editor.select_endpoint(endpoint),
        None => {
            log::warn!("{} is not in the route registry, sending it as-is", args.path);
            editor.select_path(&args.path);
        }
    }

    if let Some(id) = &args.preset {
        let preset = ctx.presets()?.find(&args.path, id)?;
        apply_preset(&mut editor, preset, ctx.db());
    }

    if let Some(method) = &args.method {
        let method =
            HttpMethod::from_str(method).ok_or_else(|| anyhow!("unknown method {}", method))?;
        editor.set_method(method)?;
    }

    for raw in &args.params {
        let (name, value) = split_pair(raw, '=', "path parameter")?;
        editor.set_path_param(name, value)?;
    }
    for raw in &args.query {
        let (key, value) = split_pair(raw, '=', "query parameter")?;
        editor.add_row(RowKind::Query, key, value);
    }
    for raw in &args.headers {
        let (key, value) = split_pair(raw, ':', "header")?;
        editor.add_row(RowKind::Headers, key, value);
    }
    if let Some(body) = &args.data {
        editor.set_body(body.as_str());
    }
    if let Some(key) = &args.api_key {
        editor.set_auth_type(AuthType::ApiKey);
        editor.set_api_key(Some(key.clone()));
    }
    if let Some(team) = &args.team {
        ctx.db().set_active_team_id(team)?;
        editor.set_team_id(Some(team.clone()));
    }
    if args.bypass {
        editor.set_bypass_team_scope(true);
    }

    Ok(editor)
}

async fn send(ctx: &AppContext, args: &SendArgs) -> Result<bool> {
    let editor = prepare_editor(ctx, args)?;
    let config = editor.build_config(&ctx.config().base_url, &ctx.header_policy())?;

    let executor = ctx.executor()?;
    let handle = executor.execute(config.clone());

    let mut wait = Box::pin(handle.wait());
    let status = tokio::select! {
        status = &mut wait => status,
        _ = tokio::signal::ctrl_c() => {
            executor.cancel();
            wait.await
        }
    };

    let snapshot = executor.snapshot();
    println!("{}", render_snapshot(&snapshot, args.show_headers));

    if matches!(status, RequestStatus::Success | RequestStatus::Error) {
        if let Err(e) = ctx.db().record_request(&config, snapshot.response.as_ref()) {
            log::error!("Failed to save history: {}", e);
        }
    }

    Ok(status == RequestStatus::Success)
}

fn history(ctx: &AppContext, limit: Option<usize>, clear: bool, delete: Option<i64>) -> Result<()> {
    if clear {
        ctx.db().clear_all_history()?;
        println!("History cleared");
        return Ok(());
    }
    if let Some(id) = delete {
        if !ctx.db().delete_history(id)? {
            return Err(anyhow!("no history entry #{}", id));
        }
        println!("Deleted #{}", id);
        return Ok(());
    }

    let items = ctx
        .db()
        .load_recent_history(limit.unwrap_or(ctx.config().history_limit))?;
    if items.is_empty() {
        println!("No history yet");
    }
    for item in &items {
        println!("{}", render_history_item(item));
    }
    Ok(())
}

fn team(ctx: &AppContext, command: &TeamCommand) -> Result<()> {
    let db = ctx.db();
    match command {
        TeamCommand::Show => {
            let active = db.active_team_id()?;
            println!("active: {}", active.as_deref().unwrap_or("(none)"));
            for id in db.team_ids()? {
                let marker = if Some(&id) == active.as_ref() { "*" } else { " " };
                println!("{} {}", marker, id);
            }
        }
        TeamCommand::Set { id } => {
            db.set_active_team_id(id)?;
            println!("Active team set to {}", id);
        }
        TeamCommand::Add { ids } => {
            db.remember_team_ids(ids)?;
            println!("Known teams: {}", db.team_ids()?.join(", "));
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<bool> {
    let config = ExplorerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let ctx = AppContext::open(config).context("opening the local store")?;

    match &cli.command {
        Commands::Routes { tag } => list_routes(&ctx, tag.as_deref())?,
        Commands::Presets { path } => list_presets(&ctx, path)?,
        Commands::Send(args) => return send(&ctx, args).await,
        Commands::History {
            limit,
            clear,
            delete,
        } => history(&ctx, *limit, *clear, *delete)?,
        Commands::Team { command } => team(&ctx, command)?,
    }
    Ok(true)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to initialize tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            log::error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
