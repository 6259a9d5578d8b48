//! The list command: prints a smart list's items, optionally narrowed by
//! tags and completion state.
//!
//! Tag filtering is strict membership: an item survives only if it carries
//! every requested tag, so untagged items never pass a tag filter no
//! matter which other flags are set.

use std::path::Path;

use alm_core::{EntityId, LocalStore, SmartListItem, UnitOfWork};
use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::{context, output};

#[derive(Args)]
pub struct ListArgs {
    /// Ref id of the smart list to show
    pub smart_list: EntityId,

    /// Keep only items carrying every one of these tags (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Only finished items
    #[arg(long, conflicts_with = "not_done")]
    pub done: bool,

    /// Only unfinished items
    #[arg(long)]
    pub not_done: bool,
}

pub async fn run(args: ListArgs, config: Option<&Path>) -> Result<()> {
    let ctx = context::build(config).await?;
    let uow = ctx.local.begin().await?;

    let list = match uow.smart_lists().load_by_id(&args.smart_list).await {
        Ok(list) => list,
        Err(e) if e.is_not_found() => {
            anyhow::bail!("no smart list with ref id {}", args.smart_list)
        }
        Err(e) => return Err(e.into()),
    };
    let items = uow
        .smart_list_items()
        .find_all(Some(&args.smart_list), false, None)
        .await?;

    let done = match (args.done, args.not_done) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };

    output::header(&list.name);
    let mut shown = 0;
    for item in items.iter().filter(|item| survives(item, &args.tags, done)) {
        let marker = if item.is_done {
            "✓".green()
        } else {
            "·".dimmed()
        };
        let mut line = format!("  {marker} {}", item.name);
        if !item.tags.is_empty() {
            line.push_str(&format!(" {}", format!("[{}]", item.tags.join(", ")).dimmed()));
        }
        if let Some(url) = &item.url {
            line.push_str(&format!(" {}", url.dimmed()));
        }
        println!("{line}");
        shown += 1;
    }
    if shown == 0 {
        output::hint("no items match");
    }
    Ok(())
}

/// Strict tag membership plus the optional completion-state narrowing.
fn survives(item: &SmartListItem, tags: &[String], done: Option<bool>) -> bool {
    if !tags.iter().all(|tag| item.tags.contains(tag)) {
        return false;
    }
    done.is_none_or(|want| item.is_done == want)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alm_core::{EntityId, EntityMeta, Timestamp};

    fn item(tags: &[&str], is_done: bool) -> SmartListItem {
        SmartListItem {
            meta: EntityMeta::new(
                EntityId::from_index(1),
                Timestamp::from_millis(0).unwrap(),
            ),
            name: "Item".to_string(),
            is_done,
            tags: tags.iter().map(ToString::to_string).collect(),
            url: None,
        }
    }

    #[test]
    fn test_untagged_items_never_pass_a_tag_filter() {
        let untagged = item(&[], false);
        assert!(!survives(&untagged, &["scifi".to_string()], None));
        // Not even when the completion flag matches.
        assert!(!survives(&untagged, &["scifi".to_string()], Some(false)));
    }

    #[test]
    fn test_every_requested_tag_must_be_present() {
        let tagged = item(&["scifi", "owned"], false);
        assert!(survives(&tagged, &["scifi".to_string()], None));
        assert!(survives(
            &tagged,
            &["scifi".to_string(), "owned".to_string()],
            None
        ));
        assert!(!survives(
            &tagged,
            &["scifi".to_string(), "lent".to_string()],
            None
        ));
    }

    #[test]
    fn test_no_tag_filter_keeps_everything_modulo_done_state() {
        let open = item(&[], false);
        let finished = item(&[], true);
        assert!(survives(&open, &[], None));
        assert!(survives(&finished, &[], Some(true)));
        assert!(!survives(&finished, &[], Some(false)));
    }
}
