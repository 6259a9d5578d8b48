//! The gc command: duplicate-name cleanup across both stores.

use std::path::Path;

use alm_core::Timestamp;
use anyhow::Result;
use clap::Args;

use crate::{context, output};

#[derive(Args)]
pub struct GcArgs {}

pub async fn run(_args: GcArgs, config: Option<&Path>) -> Result<()> {
    let ctx = context::build(config).await?;

    output::header("Garbage collection");
    let report = ctx.driver.gc(Timestamp::now()).await?;
    output::report(&report);
    Ok(())
}
