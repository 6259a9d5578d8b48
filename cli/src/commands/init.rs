//! The init command: creates the local workspace (if it does not exist
//! yet) and provisions the remote container structure for it.

use std::path::Path;

use alm_core::{EntityId, EntityMeta, LocalStore, SyncTarget, Timestamp, UnitOfWork, Workspace};
use anyhow::Result;
use clap::Args;
use sync::SyncRequest;

use crate::{context, output};

#[derive(Args)]
pub struct InitArgs {
    /// Name for a freshly created workspace
    #[arg(long, default_value = "Personal")]
    pub name: String,

    /// IANA timezone for a freshly created workspace
    #[arg(long, default_value = "UTC")]
    pub timezone: String,
}

pub async fn run(args: InitArgs, config: Option<&Path>) -> Result<()> {
    let ctx = context::build(config).await?;
    let right_now = Timestamp::now();

    let uow = ctx.local.begin().await?;
    let existing = uow.workspaces().find_all(None, true, None).await?;
    match existing.first() {
        Some(ws) => {
            output::hint(&format!("workspace {:?} already initialized", ws.name));
        }
        None => {
            let ws = uow
                .workspaces()
                .create(Workspace {
                    meta: EntityMeta::new(EntityId::from_index(0), right_now),
                    name: args.name,
                    timezone: args.timezone,
                    default_project_ref_id: None,
                })
                .await?;
            uow.commit().await?;
            output::success(&format!("created workspace {:?}", ws.name));
        }
    }

    let request = SyncRequest::all(right_now).with_targets([SyncTarget::Structure]);
    ctx.driver.run(&request).await?;
    output::success("remote container structure is in place");
    Ok(())
}
