//! Person maintenance: removal cascades over the tasks that refer to them.

use std::path::Path;

use alm_core::{EntityId, Timestamp};
use anyhow::Result;
use clap::{Args, Subcommand};

use crate::{context, output};

#[derive(Subcommand)]
pub enum PersonCommand {
    #[command(about = "Remove a person and every inbox task referring to them")]
    Remove(RemoveArgs),
}

#[derive(Args)]
pub struct RemoveArgs {
    /// Ref id of the person to remove
    pub ref_id: EntityId,
}

pub async fn run(cmd: PersonCommand, config: Option<&Path>) -> Result<()> {
    match cmd {
        PersonCommand::Remove(args) => remove(args, config).await,
    }
}

async fn remove(args: RemoveArgs, config: Option<&Path>) -> Result<()> {
    let ctx = context::build(config).await?;

    output::header("Person removal");
    let report = ctx
        .driver
        .remove_person(&args.ref_id, Timestamp::now())
        .await?;
    output::report(&report);
    Ok(())
}
