//! `apimsync extract` - snapshot the live service into a directory tree

use std::path::Path;

use console::style;
use miette::{IntoDiagnostic, Result};

use apimsync_apim::ApimClient;
use apimsync_core::{ApiSpecification, Configuration};
use apimsync_extract::Extractor;

pub async fn run(
    service_url: &str,
    service_name: Option<&str>,
    token: &str,
    output_folder: &Path,
    configuration: Option<std::path::PathBuf>,
    specification_format: Option<&str>,
) -> Result<()> {
    let default_format = match specification_format {
        Some(value) => ApiSpecification::from_default_format(value).into_diagnostic()?,
        None => ApiSpecification::default(),
    };

    let label = service_name.unwrap_or(service_url);
    eprintln!("Extracting {} into {}", style(label).cyan(), output_folder.display());

    let client = ApimClient::new(service_url, token).into_diagnostic()?;
    let extractor = Extractor::new(
        client,
        Configuration::from_path(configuration),
        output_folder,
        default_format,
    );
    extractor.run().await.into_diagnostic()?;

    eprintln!("{} extraction complete", style("✓").green());
    Ok(())
}
