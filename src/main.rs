use clap::Parser;
use depweave_core::cli::{tracing_init, Cli, Commands};
use depweave_core::dependencies::{self, llm::OllamaChatClient};
use depweave_core::environment::EnvironmentResolver;
use depweave_core::error::Error;
use depweave_core::httpclient::ReqwestTargetClient;
use depweave_core::interactive;
use depweave_core::model::{Id, Project};
use depweave_core::store::{InMemoryStore, Store};
use depweave_core::{executor, reporting, source, spec};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    tracing_init::init_tracing(cli.verbose);

    let json_errors = cli.json_errors;
    if let Err(e) = run(cli).await {
        print_error(&e, json_errors);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    // A single in-process store backs one invocation of the CLI; a real
    // deployment points this at a persistent `Store` implementation instead.
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());

    match cli.command {
        Commands::Ingest { project, source } => cmd_ingest(store.as_ref(), &project, &source).await,
        Commands::Analyze { project, model, llm_url } => {
            cmd_analyze(store.as_ref(), &project, &model, &llm_url).await
        }
        Commands::Promote { project, yes } => cmd_promote(store.as_ref(), &project, yes).await,
        Commands::Run { project, base_url } => cmd_run(store, &project, base_url).await,
        Commands::Report { run_id } => cmd_report(store.as_ref(), &run_id).await,
    }
}

async fn find_or_create_project(store: &dyn Store, name: &str) -> Result<Project, Error> {
    // No lookup-by-name exists on the store; a single-CLI-invocation run
    // always starts from a fresh project, named for operator reference only.
    store
        .create_project(Project {
            id: Id::new_v4(),
            name: name.to_string(),
            owner_ref: None,
        })
        .await
}

async fn cmd_ingest(store: &dyn Store, project: &str, spec_source: &str) -> Result<(), Error> {
    let project = find_or_create_project(store, project).await?;

    let content = if spec_source.starts_with("http://") || spec_source.starts_with("https://") {
        source::UrlSpecSource::new(spec_source).fetch().await?
    } else {
        use depweave_core::fs::OsFileSystem;
        source::FileSpecSource::new(OsFileSystem, std::path::PathBuf::from(spec_source))
            .fetch()
            .await?
    };

    let outcome = spec::ingest(&content, project.id, spec_source, store).await?;
    if outcome.was_idempotent_update {
        println!(
            "Spec content unchanged for project '{}' ({} operations).",
            project.name,
            outcome.apis.len()
        );
    } else {
        println!(
            "Ingested {} operation(s) into project '{}' ({}).",
            outcome.apis.len(),
            project.name,
            project.id
        );
    }
    Ok(())
}

async fn cmd_analyze(store: &dyn Store, project: &str, model: &str, llm_url: &str) -> Result<(), Error> {
    let project = find_or_create_project(store, project).await?;
    let apis = store.list_apis(project.id).await?;

    let mut variables_by_api = std::collections::HashMap::new();
    let mut response_schemas_by_api = std::collections::HashMap::new();
    for api in &apis {
        variables_by_api.insert(api.id, store.list_variables(api.id).await?);
        let schemas = store
            .list_responses(api.id)
            .await?
            .into_iter()
            .map(|r| r.schema)
            .collect();
        response_schemas_by_api.insert(api.id, schemas);
    }

    let input = dependencies::AnalysisInput {
        apis: &apis,
        variables_by_api: &variables_by_api,
        response_schemas_by_api: &response_schemas_by_api,
    };
    let client = OllamaChatClient::new(llm_url);
    let candidates = dependencies::analyze(&input, project.id, &client, model).await;
    let count = candidates.len();
    store.replace_candidates(project.id, candidates).await?;
    println!("{count} dependency candidate(s) recorded for project '{}'.", project.name);
    Ok(())
}

async fn cmd_promote(store: &dyn Store, project: &str, yes: bool) -> Result<(), Error> {
    let project = find_or_create_project(store, project).await?;
    let candidates = store.list_candidates(project.id).await?;

    if candidates.is_empty() {
        println!("No pending dependency candidates for project '{}'.", project.name);
        return Ok(());
    }

    for candidate in candidates {
        let prompt = format!(
            "Confirm dependency {} -> {} ({:?}, confidence {:.2}): {}",
            candidate.source_api_ref, candidate.target_api_ref, candidate.origin, candidate.confidence, candidate.reason
        );
        let accept = if yes { true } else { interactive::confirm(&prompt)? };
        if accept {
            let dependency = dependencies::confirm_candidate(store, &candidate, true).await?;
            println!("Confirmed dependency {}.", dependency.id);
        }
    }
    Ok(())
}

async fn cmd_run(store: Arc<dyn Store>, project: &str, base_url: Option<String>) -> Result<(), Error> {
    let project = find_or_create_project(store.as_ref(), project).await?;
    let http: Arc<dyn depweave_core::httpclient::TargetHttpClient> = Arc::new(ReqwestTargetClient::new());
    let environment = EnvironmentResolver::new(base_url.as_deref(), None);

    let run_id = executor::run(store, http, project.id, environment).await?;
    println!("Run {run_id} completed.");
    Ok(())
}

async fn cmd_report(store: &dyn Store, run_id: &str) -> Result<(), Error> {
    let run_id: Id = run_id
        .parse()
        .map_err(|_| Error::validation_error(format!("'{run_id}' is not a valid run id")))?;
    let summary = reporting::summarize(store, run_id).await?;

    println!(
        "Run {}: {} passed, {} failed, {} running ({} total)",
        summary.run.id, summary.passed, summary.failed, summary.running, summary.total
    );
    for detail in &summary.executions {
        println!(
            "  execution {} — {:?}{}",
            detail.execution.id,
            detail.execution.status,
            detail
                .execution
                .error_message
                .as_ref()
                .map_or_else(String::new, |m| format!(" ({m})"))
        );
    }
    Ok(())
}

fn print_error(error: &Error, json_format: bool) {
    if json_format {
        if let Ok(json) = serde_json::to_string_pretty(&error.to_json()) {
            eprintln!("{json}");
            return;
        }
    }
    eprintln!("{error}");
}
