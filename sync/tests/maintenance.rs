//! The maintenance passes driven end to end: duplicate-name gc, person
//! removal and schedule re-derivation, each checked against both stores.

mod support;

use alm_core::{
    CollectionKind, Eisenhower, FieldValue, InboxTaskSource, LocalStore, RecurringTaskPeriod,
    SyncPrefer, SyncedEntity, UnitOfWork,
};
use sync::SyncRequest;
use testing::fixtures::{big_plan, date, inbox_task, metric, person, project, ts, workspace};

use crate::support::engine;

#[tokio::test]
async fn test_gc_cleans_duplicate_remote_records() {
    let eng = engine().await;
    let (ws_ref, keeper_ref, dup_ref) = {
        let uow = eng.local.begin().await.unwrap();
        let ws = uow.workspaces().create(workspace()).await.unwrap();
        let keeper = uow.metrics().create(metric(1, "Steps")).await.unwrap();
        let mut dup = metric(1, "Steps");
        dup.meta.created_time = ts(60);
        let dup = uow.metrics().create(dup).await.unwrap();
        let refs = (
            ws.ref_id().clone(),
            keeper.ref_id().clone(),
            dup.ref_id().clone(),
        );
        uow.commit().await.unwrap();
        refs
    };

    eng.driver.run(&SyncRequest::all(ts(0))).await.unwrap();

    let report = eng.driver.gc(ts(100)).await.unwrap();
    assert!(report.aborted.is_none());
    assert_eq!(report.counters(CollectionKind::Metrics).removed_remote, 1);

    let uow = eng.local.begin().await.unwrap();
    let metrics = uow.metrics().find_all(None, true, None).await.unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].ref_id(), &keeper_ref);
    assert!(uow.metrics().load_by_id(&dup_ref).await.is_err());

    let container = eng.container(CollectionKind::Metrics, &ws_ref).await;
    let records = eng.remote.records_of(&container).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ref_id, Some(keeper_ref));
}

#[tokio::test]
async fn test_gc_pushes_repointed_references_to_the_remote() {
    let eng = engine().await;
    let (project_ref, keeper_uuid, keeper_ref, task_ref) = {
        let uow = eng.local.begin().await.unwrap();
        uow.workspaces().create(workspace()).await.unwrap();
        let proj = uow.projects().create(project(1, "Work")).await.unwrap();
        let keeper = uow.big_plans().create(big_plan(2, "Launch")).await.unwrap();
        let mut dup = big_plan(2, "Launch");
        dup.meta.created_time = ts(60);
        let dup = uow.big_plans().create(dup).await.unwrap();
        let mut task = inbox_task(2, "Ship it");
        task.big_plan_ref_id = Some(dup.ref_id().clone());
        let task = uow.inbox_tasks().create(task).await.unwrap();
        let out = (
            proj.ref_id().clone(),
            keeper.link_uuid,
            keeper.ref_id().clone(),
            task.ref_id().clone(),
        );
        uow.commit().await.unwrap();
        out
    };

    eng.driver.run(&SyncRequest::all(ts(0))).await.unwrap();

    let report = eng.driver.gc(ts(100)).await.unwrap();
    assert_eq!(report.counters(CollectionKind::BigPlans).removed_remote, 1);
    assert_eq!(report.counters(CollectionKind::InboxTasks).pushed, 1);

    let uow = eng.local.begin().await.unwrap();
    let plans = uow.big_plans().find_all(None, true, None).await.unwrap();
    assert_eq!(plans.len(), 1);
    let task = uow.inbox_tasks().load_by_id(&task_ref).await.unwrap();
    assert_eq!(task.big_plan_ref_id, Some(keeper_ref.clone()));

    let plans_container = eng.container(CollectionKind::BigPlans, &project_ref).await;
    let records = eng.remote.records_of(&plans_container).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ref_id, Some(keeper_ref));

    // The re-pointed reference went out immediately, label and id both.
    let inbox = eng.container(CollectionKind::InboxTasks, &project_ref).await;
    let records = eng.remote.records_of(&inbox).await;
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].fields.get("big-plan-id-ref"),
        Some(&FieldValue::Reference(Some(keeper_uuid)))
    );
    assert_eq!(
        records[0].fields.get("big-plan"),
        Some(&FieldValue::select("Launch"))
    );
}

#[tokio::test]
async fn test_remove_person_removes_remote_records_too() {
    let eng = engine().await;
    let (ws_ref, project_ref, person_ref, kept_ref) = {
        let uow = eng.local.begin().await.unwrap();
        let ws = uow.workspaces().create(workspace()).await.unwrap();
        let proj = uow.projects().create(project(1, "Work")).await.unwrap();
        let grandma = uow.persons().create(person(1, "Grandma")).await.unwrap();
        let mut call = inbox_task(2, "Call Grandma");
        call.person_ref_id = Some(grandma.ref_id().clone());
        uow.inbox_tasks().create(call).await.unwrap();
        let kept = uow.inbox_tasks().create(inbox_task(2, "Unrelated")).await.unwrap();
        let out = (
            ws.ref_id().clone(),
            proj.ref_id().clone(),
            grandma.ref_id().clone(),
            kept.ref_id().clone(),
        );
        uow.commit().await.unwrap();
        out
    };

    eng.driver.run(&SyncRequest::all(ts(0))).await.unwrap();

    let report = eng.driver.remove_person(&person_ref, ts(50)).await.unwrap();
    assert_eq!(report.counters(CollectionKind::Persons).removed_remote, 1);
    assert_eq!(report.counters(CollectionKind::InboxTasks).removed_remote, 1);

    let uow = eng.local.begin().await.unwrap();
    assert!(uow
        .persons()
        .find_all(None, true, None)
        .await
        .unwrap()
        .is_empty());
    let tasks = uow.inbox_tasks().find_all(None, true, None).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].ref_id(), &kept_ref);

    let persons_container = eng.container(CollectionKind::Persons, &ws_ref).await;
    assert!(eng.remote.records_of(&persons_container).await.is_empty());
    let inbox = eng.container(CollectionKind::InboxTasks, &project_ref).await;
    let records = eng.remote.records_of(&inbox).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ref_id, Some(kept_ref));
}

#[tokio::test]
async fn test_schedule_changes_rederive_generated_tasks() {
    let eng = engine().await;
    let (project_ref, metric_ref, task_ref) = {
        let uow = eng.local.begin().await.unwrap();
        uow.workspaces().create(workspace()).await.unwrap();
        let proj = uow.projects().create(project(1, "Work")).await.unwrap();
        let mut weight = metric(1, "Weight");
        weight.collection_period = Some(RecurringTaskPeriod::Monthly);
        weight.collection_eisenhower = Some(Eisenhower::Important);
        let weight = uow.metrics().create(weight).await.unwrap();
        let mut collect = inbox_task(2, "Weigh in");
        collect.source = InboxTaskSource::Metric;
        collect.metric_ref_id = Some(weight.ref_id().clone());
        let collect = uow.inbox_tasks().create(collect).await.unwrap();
        let out = (
            proj.ref_id().clone(),
            weight.ref_id().clone(),
            collect.ref_id().clone(),
        );
        uow.commit().await.unwrap();
        out
    };

    // First run normalizes the generated task against the current schedule.
    eng.driver.run(&SyncRequest::all(ts(0))).await.unwrap();
    {
        let uow = eng.local.begin().await.unwrap();
        let task = uow.inbox_tasks().load_by_id(&task_ref).await.unwrap();
        assert_eq!(task.name, "Collect value for Weight");
        assert_eq!(task.recurring_gen_right_now, Some(ts(0)));
    }

    // Rename the metric locally, then sync preferring the local side.
    {
        let uow = eng.local.begin().await.unwrap();
        let mut weight = uow.metrics().load_by_id(&metric_ref).await.unwrap();
        weight.name = "Body weight".to_string();
        weight.meta.touch(ts(50));
        uow.metrics().save(weight).await.unwrap();
        uow.commit().await.unwrap();
    }
    eng.remote.set_now(ts(55)).await;
    let request = SyncRequest {
        sync_prefer: SyncPrefer::Local,
        ..SyncRequest::all(ts(60))
    };
    let report = eng.driver.run(&request).await.unwrap();
    assert!(report.counters(CollectionKind::InboxTasks).pushed >= 1);

    let uow = eng.local.begin().await.unwrap();
    let task = uow.inbox_tasks().load_by_id(&task_ref).await.unwrap();
    assert_eq!(task.name, "Collect value for Body weight");
    assert_eq!(task.recurring_timeline, Some("2024-Feb".to_string()));
    assert_eq!(task.due_date, Some(date(2024, 2, 29)));
    assert_eq!(task.eisenhower, Eisenhower::Important);
    assert_eq!(task.recurring_gen_right_now, Some(ts(60)));

    let inbox = eng.container(CollectionKind::InboxTasks, &project_ref).await;
    let records = eng.remote.records_of(&inbox).await;
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].fields.get("name"),
        Some(&FieldValue::text("Collect value for Body weight"))
    );
}
