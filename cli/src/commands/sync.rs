//! The sync command: one reconciliation run over the selected collections.

use std::collections::BTreeSet;
use std::path::Path;

use alm_core::{EntityId, SyncPrefer, SyncTarget, Timestamp};
use anyhow::Result;
use clap::Args;
use sync::SyncRequest;

use crate::{context, output};

#[derive(Args)]
pub struct SyncArgs {
    /// Collections to sync (repeatable); everything when omitted
    #[arg(long = "target", value_name = "TARGET")]
    pub targets: Vec<SyncTarget>,

    /// Delete every remote record of the targeted collections first and
    /// rebuild them from the local side
    #[arg(long)]
    pub drop_all_remote: bool,

    /// Overwrite matching records even when timestamps say nothing changed
    #[arg(long)]
    pub even_if_unmodified: bool,

    /// Which side wins a true conflict (defaults to the configured value)
    #[arg(long, value_name = "SIDE")]
    pub prefer: Option<SyncPrefer>,

    /// Only touch these vacations (repeatable)
    #[arg(long = "filter-vacation", value_name = "REF_ID")]
    pub vacations: Vec<EntityId>,

    /// Only touch these projects (repeatable)
    #[arg(long = "filter-project", value_name = "REF_ID")]
    pub projects: Vec<EntityId>,

    /// Only touch these inbox tasks (repeatable)
    #[arg(long = "filter-inbox-task", value_name = "REF_ID")]
    pub inbox_tasks: Vec<EntityId>,

    /// Only touch these recurring tasks (repeatable)
    #[arg(long = "filter-recurring-task", value_name = "REF_ID")]
    pub recurring_tasks: Vec<EntityId>,

    /// Only touch these big plans (repeatable)
    #[arg(long = "filter-big-plan", value_name = "REF_ID")]
    pub big_plans: Vec<EntityId>,

    /// Only touch these smart lists (repeatable)
    #[arg(long = "filter-smart-list", value_name = "REF_ID")]
    pub smart_lists: Vec<EntityId>,

    /// Only touch these metrics (repeatable)
    #[arg(long = "filter-metric", value_name = "REF_ID")]
    pub metrics: Vec<EntityId>,

    /// Only touch these persons (repeatable)
    #[arg(long = "filter-person", value_name = "REF_ID")]
    pub persons: Vec<EntityId>,
}

pub async fn run(args: SyncArgs, config: Option<&Path>) -> Result<()> {
    let ctx = context::build(config).await?;

    let mut request = SyncRequest::all(Timestamp::now());
    if !args.targets.is_empty() {
        request.sync_targets = args.targets.iter().copied().collect();
    }
    request.drop_all_remote = args.drop_all_remote;
    request.sync_even_if_unmodified = args.even_if_unmodified;
    request.sync_prefer = args.prefer.unwrap_or(ctx.prefer);
    request.filter_vacation_ref_ids = filter(args.vacations);
    request.filter_project_ref_ids = filter(args.projects);
    request.filter_inbox_task_ref_ids = filter(args.inbox_tasks);
    request.filter_recurring_task_ref_ids = filter(args.recurring_tasks);
    request.filter_big_plan_ref_ids = filter(args.big_plans);
    request.filter_smart_list_ref_ids = filter(args.smart_lists);
    request.filter_metric_ref_ids = filter(args.metrics);
    request.filter_person_ref_ids = filter(args.persons);

    output::header("Sync");
    let report = ctx.driver.run(&request).await?;
    output::report(&report);
    Ok(())
}

/// An omitted flag means "no filter", never "match nothing".
fn filter(refs: Vec<EntityId>) -> Option<BTreeSet<EntityId>> {
    if refs.is_empty() {
        None
    } else {
        Some(refs.into_iter().collect())
    }
}
