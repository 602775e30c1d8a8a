//! `sitebridge resolve`: run the locator once and print its decision.

use clap::Parser;
use sitebridge_core::RequestContext;
use sitebridge_core::SiteBridgeConfig;

#[derive(Debug, Parser)]
pub struct ResolveArgs {
    /// Request path, e.g. `/chunk.js` or `/studio/assets/app.css`.
    pub path: String,

    /// Referer URL sent with the request.
    #[arg(long = "referer")]
    pub referer: Option<String>,

    /// Project matched most recently. Only honoured with
    /// `probe_order = "recent-first"`.
    #[arg(long = "recent")]
    pub recent: Option<String>,
}

pub fn run(config: &SiteBridgeConfig, args: &ResolveArgs) -> anyhow::Result<()> {
    let locator = config.locator(config.available_projects()?);
    let request = RequestContext::new(&args.path)
        .with_referer(args.referer.as_deref())
        .with_recent(args.recent.as_deref());
    let resolved = locator.locate(&request)?;
    println!(
        "{}\t{}\t{}",
        resolved.project_id,
        resolved.strategy.as_str(),
        resolved.path.display()
    );
    Ok(())
}
