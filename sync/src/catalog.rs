//! In-run catalog of referenceable entities.
//!
//! Projects, big plans, metrics and persons can be pointed at from other
//! entities and surface remotely as select options or label fields. The
//! catalog carries the `(link_uuid, ref_id, name, created_time)` quadruple
//! for each of them so adapters can translate between local references and
//! remote labels without touching the stores.
//!
//! The driver seeds the catalog from local data before the run starts and
//! refreshes each section as the corresponding collection finishes syncing,
//! so a referrer syncing before its referent still resolves against the
//! local picture.

use alm_core::{EntityId, SelectOption, Timestamp};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub ref_id: EntityId,
    pub link_uuid: Uuid,
    pub name: String,
    pub created_time: Timestamp,
    /// Archived entries still resolve lookups, so references to them are not
    /// mistaken for dangling ones, but they never surface as options.
    pub archived: bool,
}

impl CatalogEntry {
    pub fn new(
        ref_id: EntityId,
        link_uuid: Uuid,
        name: impl Into<String>,
        created_time: Timestamp,
    ) -> Self {
        Self {
            ref_id,
            link_uuid,
            name: name.into(),
            created_time,
            archived: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RefCatalog {
    projects: Vec<CatalogEntry>,
    big_plans: Vec<CatalogEntry>,
    metrics: Vec<CatalogEntry>,
    persons: Vec<CatalogEntry>,
}

macro_rules! catalog_section {
    ($set:ident, $by_uuid:ident, $by_ref:ident, $all:ident, $field:ident) => {
        pub fn $set(&mut self, entries: Vec<CatalogEntry>) {
            self.$field = entries;
            self.$field
                .sort_by(|a, b| a.created_time.cmp(&b.created_time).then(a.ref_id.cmp(&b.ref_id)));
        }

        pub fn $by_uuid(&self, link_uuid: Uuid) -> Option<&CatalogEntry> {
            self.$field.iter().find(|e| e.link_uuid == link_uuid)
        }

        pub fn $by_ref(&self, ref_id: &EntityId) -> Option<&CatalogEntry> {
            self.$field.iter().find(|e| &e.ref_id == ref_id)
        }

        /// Entries in creation order, oldest first.
        pub fn $all(&self) -> &[CatalogEntry] {
            &self.$field
        }
    };
}

impl RefCatalog {
    catalog_section!(set_projects, project_by_uuid, project_by_ref, all_projects, projects);
    catalog_section!(set_big_plans, big_plan_by_uuid, big_plan_by_ref, all_big_plans, big_plans);
    catalog_section!(set_metrics, metric_by_uuid, metric_by_ref, all_metrics, metrics);
    catalog_section!(set_persons, person_by_uuid, person_by_ref, all_persons, persons);

    /// Options for project label fields, one per live project in creation
    /// order, option id = the project's link uuid.
    pub fn project_options(&self) -> Vec<SelectOption> {
        options_of(&self.projects)
    }

    /// Options for the big-plan label field on inbox-task containers.
    pub fn big_plan_options(&self) -> Vec<SelectOption> {
        options_of(&self.big_plans)
    }
}

fn options_of(entries: &[CatalogEntry]) -> Vec<SelectOption> {
    entries
        .iter()
        .filter(|e| !e.archived)
        .map(|e| SelectOption::with_id(e.link_uuid, e.name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ref_id: u64, name: &str, offset: i64) -> CatalogEntry {
        CatalogEntry::new(
            EntityId::from_index(ref_id),
            Uuid::new_v4(),
            name,
            Timestamp::from_millis(1_700_000_000_000 + offset).unwrap(),
        )
    }

    #[test]
    fn test_lookup_by_uuid_and_ref_id() {
        let mut catalog = RefCatalog::default();
        let work = entry(1, "Work", 0);
        let home = entry(2, "Home", 1);
        let work_uuid = work.link_uuid;
        catalog.set_projects(vec![home, work]);

        assert_eq!(catalog.project_by_uuid(work_uuid).unwrap().name, "Work");
        assert_eq!(
            catalog.project_by_ref(&EntityId::from_index(2)).unwrap().name,
            "Home"
        );
        assert!(catalog.project_by_ref(&EntityId::from_index(9)).is_none());
    }

    #[test]
    fn test_entries_are_ordered_by_creation_time() {
        let mut catalog = RefCatalog::default();
        catalog.set_metrics(vec![entry(5, "Later", 100), entry(3, "Earlier", 10)]);
        let names: Vec<&str> = catalog.all_metrics().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Earlier", "Later"]);
    }

    #[test]
    fn test_options_carry_link_uuids_as_ids() {
        let mut catalog = RefCatalog::default();
        let work = entry(1, "Work", 0);
        let work_uuid = work.link_uuid;
        catalog.set_projects(vec![work, entry(2, "Home", 5)]);

        let options = catalog.project_options();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].id, work_uuid);
        assert_eq!(options[0].value, "Work");
        assert_eq!(options[1].value, "Home");
    }

    #[test]
    fn test_archived_entries_resolve_but_are_not_options() {
        let mut catalog = RefCatalog::default();
        let mut old = entry(3, "Mothballed", 0);
        old.archived = true;
        let old_uuid = old.link_uuid;
        catalog.set_big_plans(vec![old, entry(4, "Active", 5)]);

        assert_eq!(catalog.big_plan_by_uuid(old_uuid).unwrap().name, "Mothballed");
        let options = catalog.big_plan_options();
        let values: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["Active"]);
    }

    #[test]
    fn test_sections_are_independent() {
        let mut catalog = RefCatalog::default();
        let plan = entry(7, "Ship v2", 0);
        let plan_uuid = plan.link_uuid;
        catalog.set_big_plans(vec![plan]);
        catalog.set_persons(vec![entry(8, "Alex", 0)]);

        assert!(catalog.big_plan_by_uuid(plan_uuid).is_some());
        assert!(catalog.person_by_uuid(plan_uuid).is_none());
        assert_eq!(catalog.all_persons().len(), 1);
    }
}
