use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use session_core::{
    config::load_config, link::layer_link, AlertSink, HostEnvironment, HttpGateway,
    LoggingAlertSink, MissingUpgradePrompt, ReqwestGateway, SessionWorkspace, StaticEnvironment,
    UpgradePrompt,
};

#[derive(Parser, Debug)]
struct Args {
    /// Path to the navigator configuration file.
    #[arg(long, default_value = "navigator.toml")]
    config: PathBuf,
    /// Page URL the session was opened with; fragment parameters select the
    /// initial layers and feature toggles.
    #[arg(long, default_value = "https://localhost/")]
    url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut config = load_config(&args.config);
    config.apply_fragment_overrides(&args.url);
    if let Some(banner) = &config.banner {
        println!("{banner}");
    }

    let mut workspace = SessionWorkspace::new_with_dependencies(
        config.build_catalog(),
        Arc::new(ReqwestGateway::new()) as Arc<dyn HttpGateway>,
        Arc::new(MissingUpgradePrompt) as Arc<dyn UpgradePrompt>,
        Arc::new(LoggingAlertSink) as Arc<dyn AlertSink>,
        Arc::new(StaticEnvironment::new(args.url.clone())) as Arc<dyn HostEnvironment>,
    );
    workspace.bootstrap(&config).await?;

    println!("Open tabs:");
    let mut shared_urls = Vec::new();
    for (index, tab) in workspace.tabs.iter().enumerate() {
        let marker = if workspace.tabs.active_id() == Some(tab.id) {
            "*"
        } else {
            " "
        };
        match tab.data_context.and_then(|vm| workspace.store.get(vm)) {
            Some(vm) => {
                let letter = workspace.tabs.index_to_char(index).unwrap_or(' ');
                println!(
                    "{marker} [{letter}] {} ({}, v{})",
                    vm.name, vm.domain, vm.version
                );
                if let Some(id) = &vm.domain_version_id {
                    if let Some(domain) = workspace.catalog.get_domain(id) {
                        shared_urls.extend(domain.urls.iter().cloned());
                    }
                }
            }
            None => println!("{marker}     {}", tab.title),
        }
    }

    if !shared_urls.is_empty() {
        shared_urls.dedup();
        println!("Shareable link: {}", layer_link(&args.url, &shared_urls, &config));
    }

    Ok(())
}
