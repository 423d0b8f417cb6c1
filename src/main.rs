use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, bail};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use html_audit::config::Config;
use html_audit::{
    AsyncHttpClient, AuditEngine, Cli, ConfigManager, ConformanceValidator, DocumentValidator,
    FileDiscovery, OfflineCollaborators, Output, ProgressCallback, ReachabilityProbe, Session,
    VerbosityLevel,
};

const EXIT_KEYWORD: &str = "exit";

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Err(message) = cli.validate() {
        bail!(message);
    }

    let config = ConfigManager::load_config(&cli)
        .await
        .context("Failed to load configuration")?;

    let discovery = FileDiscovery::new()
        .with_extensions(config.files.extensions.clone())
        .with_exclude_patterns(config.files.exclude_patterns.clone())?;
    let files = discovery.discover_files(&cli.path).await?;
    info!("Found {} page(s) under {}", files.len(), cli.path.display());

    let engine = AuditEngine::new(
        build_validator(&config)?,
        ConfigManager::audit_config(&config),
    );
    let session = Session::new(
        &cli.path,
        files,
        engine,
        config.audit.refresh_keyword.clone(),
    );

    let verbosity = VerbosityLevel::from_flags(config.output.verbose, config.output.quiet);
    let output = Arc::new(Output::new(verbosity).with_colors(config.output.color));
    let progress = config
        .audit
        .show_progress
        .then(|| progress_callback(Arc::clone(&output)));

    if let Some(keywords) = &cli.keywords {
        return search(&session, &output, keywords, progress).await;
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!(
            "\nSearch pages by path or author ('{}' re-checks, '{}' quits): ",
            config.audit.refresh_keyword, EXIT_KEYWORD
        );
        std::io::stdout().flush()?;

        let Some(input) = stdin.next_line().await? else {
            break;
        };
        if input.trim().eq_ignore_ascii_case(EXIT_KEYWORD) {
            break;
        }

        search(&session, &output, &input, progress.clone()).await?;
        wait_for_enter(&mut stdin).await?;
    }

    Ok(())
}

/// Network collaborators, replaced by offline ones where disabled
fn build_validator(config: &Config) -> anyhow::Result<DocumentValidator> {
    let offline = Arc::new(OfflineCollaborators);
    if !config.network.check_remote_links && !config.network.use_validator {
        return Ok(DocumentValidator::new(offline.clone(), offline));
    }

    let client = Arc::new(AsyncHttpClient::new(ConfigManager::http_client_config(
        config,
    ))?);

    let probe: Arc<dyn ReachabilityProbe> = if config.network.check_remote_links {
        client.clone()
    } else {
        offline.clone()
    };
    let conformance: Arc<dyn ConformanceValidator> = if config.network.use_validator {
        client
    } else {
        offline
    };

    Ok(DocumentValidator::new(probe, conformance))
}

fn progress_callback(output: Arc<Output>) -> ProgressCallback {
    Arc::new(move |progress| {
        eprint!("\r{}\x1b[K", output.format_progress(&progress));
        if progress.completed == progress.total {
            eprintln!();
        }
    })
}

async fn search(
    session: &Session,
    output: &Output,
    input: &str,
    progress: Option<ProgressCallback>,
) -> anyhow::Result<()> {
    let report = session.search_with_progress(input, progress).await?;
    print!("{}", output.format_report(&report));
    std::io::stdout().flush()?;
    Ok(())
}

async fn wait_for_enter(stdin: &mut Lines<BufReader<Stdin>>) -> anyhow::Result<()> {
    print!("\nPress Enter to continue...");
    std::io::stdout().flush()?;
    stdin.next_line().await?;
    Ok(())
}
