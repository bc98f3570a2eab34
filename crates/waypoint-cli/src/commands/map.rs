use crate::OutputFormat;
use crate::commands::{BrowserArgs, MethodArg, runtime};
use anyhow::Result;
use std::time::Duration;
use waypoint_browser::CdpDriver;
use waypoint_core::{BrowserDriver, ElementMapper, EngineConfig, Snapshot, format_url};

/// Load `url` once and print its numbered interactive elements.
pub fn execute(
    url: &str,
    method: Option<MethodArg>,
    show_visuals: bool,
    browser: &BrowserArgs,
    format: OutputFormat,
) -> Result<()> {
    let url = format_url(url);
    let mapper = ElementMapper::new(method.map(Into::into).unwrap_or_default(), show_visuals);
    let idle_timeout = EngineConfig::default().idle_timeout();

    let runtime = runtime()?;
    let snapshot = runtime.block_on(async {
        eprintln!("🚀 Launching Chrome...");
        let driver = CdpDriver::launch(browser.launch_options()).await?;
        let result = map_page(&driver, &mapper, &url, idle_timeout).await;
        if let Err(e) = driver.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
        result
    })?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        OutputFormat::Pretty => {
            println!("🗺️  {} ({} elements)", snapshot.url, snapshot.len());
            println!();
            if snapshot.is_empty() {
                println!("No interactive elements found.");
            } else {
                println!("{}", snapshot.layout());
            }
        }
    }

    Ok(())
}

async fn map_page(
    driver: &CdpDriver,
    mapper: &ElementMapper,
    url: &str,
    idle_timeout: Duration,
) -> Result<Snapshot> {
    let response = driver.navigate(url).await?;
    if response.is_error_status() {
        anyhow::bail!(
            "{} returned HTTP {}",
            url,
            response.status.unwrap_or_default()
        );
    }

    if tokio::time::timeout(idle_timeout, driver.wait_for_idle())
        .await
        .is_err()
    {
        tracing::warn!("Page still loading after {:?}, mapping anyway", idle_timeout);
    }

    Ok(mapper.scan(driver, &response.final_url).await?)
}
