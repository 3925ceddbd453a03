//! `apimsync publish` - apply a tree or a commit diff to the live service

use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use miette::{miette, IntoDiagnostic, Result};

use apimsync_apim::{ApiWriter, ApimClient};
use apimsync_core::Configuration;
use apimsync_publish::{EmptyFs, FileOps, GitFs, LiveFs, PublishSources, Publisher};

fn git_sources(service_folder: &Path, commit_id: &str) -> Result<PublishSources> {
    let service_folder = service_folder.canonicalize().into_diagnostic()?;
    let repo_root = GitFs::discover_root(&service_folder).into_diagnostic()?;
    let prefix: PathBuf = service_folder
        .strip_prefix(&repo_root)
        .map_err(|_| miette!("service folder {} is outside the repository {}", service_folder.display(), repo_root.display()))?
        .to_path_buf();

    let current = GitFs::new(&repo_root, commit_id, &prefix);
    let changed = current.changed_files().into_diagnostic()?;
    let previous: Arc<dyn FileOps> = match current.parent().into_diagnostic()? {
        Some(parent) => Arc::new(parent),
        None => Arc::new(EmptyFs),
    };
    Ok(PublishSources {
        current: Arc::new(current),
        previous,
        changed: Some(changed),
    })
}

pub async fn run(
    service_url: &str,
    service_name: Option<&str>,
    token: &str,
    service_folder: &Path,
    commit_id: Option<&str>,
    configuration: Option<PathBuf>,
) -> Result<()> {
    let sources = match commit_id {
        Some(commit_id) => git_sources(service_folder, commit_id)?,
        None => PublishSources {
            current: Arc::new(LiveFs::new(service_folder)),
            previous: Arc::new(EmptyFs),
            changed: None,
        },
    };

    let label = service_name.unwrap_or(service_url);
    match commit_id {
        Some(commit_id) => eprintln!(
            "Publishing commit {} of {} to {}",
            style(commit_id).yellow(),
            service_folder.display(),
            style(label).cyan()
        ),
        None => eprintln!(
            "Publishing {} to {}",
            service_folder.display(),
            style(label).cyan()
        ),
    }

    let client = ApimClient::new(service_url, token).into_diagnostic()?;
    let publisher = Publisher::new(ApiWriter::new(client), Configuration::from_path(configuration));
    publisher.run(sources).await.into_diagnostic()?;

    eprintln!("{} publish complete", style("✓").green());
    Ok(())
}
