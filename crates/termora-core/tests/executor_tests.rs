use std::{fs, sync::Arc, time::Duration};

use termora_core::{
    BackupManager, ExecutionOutcome, Executor, MemoryStore, PlanStatus, RollbackOutcome,
    StepStatus, TermoraError,
    context::SessionContext,
    models::{FailurePolicy, Plan, RecordFilter, Step, StepKind, Outcome},
};

mod common;
use common::{FailingMemory, create_test_store, executor};

fn confirmed(mut plan: Plan) -> Plan {
    plan.transition(PlanStatus::Confirmed)
        .expect("Failed to confirm plan");
    plan
}

#[tokio::test]
async fn test_mkdir_and_rm_rf_in_one_plan() {
    let (_temp_dir, store, work) = create_test_store().await;
    let executor = executor(&store, &work);

    let plan = store
        .save_plan(Plan::from_proposal(
            "create and remove a scratch dir",
            termora_core::ProposedPlan {
                actions: vec![
                    termora_core::planning::ProposedAction::shell("mkdir backup_test"),
                    termora_core::planning::ProposedAction::shell("rm -rf backup_test"),
                ],
                ..Default::default()
            },
        ))
        .await
        .expect("Failed to save plan");
    assert!(!plan.steps[0].destructive);
    assert!(plan.steps[1].destructive);

    let mut plan = confirmed(plan);
    let report = executor
        .execute(&mut plan, true)
        .await
        .expect("Failed to execute plan");
    assert!(report.is_completed());
    assert_eq!(plan.status, PlanStatus::Completed);
    assert!(!work.join("backup_test").exists());
    assert_eq!(plan.steps[0].backup_id, None);

    let backups = BackupManager::new(store.clone());
    let entries = backups.list().await.expect("Failed to list backups");
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].restored);
    assert_eq!(plan.steps[1].backup_id, Some(entries[0].id));

    let outcome = backups.rollback_last().await.expect("Failed to roll back");
    assert!(matches!(outcome, RollbackOutcome::Restored { .. }));
    assert!(work.join("backup_test").is_dir());
}

#[tokio::test]
async fn test_mkdir_then_rm_rf_with_rollback() {
    let (_temp_dir, store, work) = create_test_store().await;
    let executor = executor(&store, &work);

    // Create the directory and put a file in it
    let mut plan = store
        .save_plan(Plan::new("make a build dir", vec![Step::shell("mkdir build")]))
        .await
        .expect("Failed to save plan");
    let report = executor
        .execute(&mut plan, true)
        .await
        .expect("Failed to execute plan");
    assert!(report.is_completed());
    fs::write(work.join("build/output.txt"), "artifact").expect("Failed to write file");

    // Remove it: the destructive step suspends first
    let mut plan = store
        .save_plan(Plan::from_proposal(
            "remove the build dir",
            termora_core::ProposedPlan {
                actions: vec![termora_core::planning::ProposedAction::shell("rm -rf build")],
                ..Default::default()
            },
        ))
        .await
        .expect("Failed to save plan");
    assert!(plan.steps[0].destructive);
    let mut plan = confirmed(plan);

    let report = executor
        .execute(&mut plan, false)
        .await
        .expect("Failed to execute plan");
    match &report.outcome {
        ExecutionOutcome::Suspended {
            step_index,
            preview,
        } => {
            assert_eq!(*step_index, 0);
            assert_eq!(preview, "$ rm -rf build");
        }
        other => panic!("expected suspension, got {other:?}"),
    }
    assert!(work.join("build").is_dir(), "nothing ran before the grant");
    assert_eq!(plan.status, PlanStatus::Pending);

    executor
        .confirm_step(&mut plan, 0)
        .await
        .expect("Failed to confirm step");
    let report = executor
        .execute(&mut plan, false)
        .await
        .expect("Failed to execute plan");
    assert!(report.is_completed());
    assert!(!work.join("build").exists());

    // The backup exists and is unrestored
    let backups = BackupManager::new(store.clone());
    let entries = backups.list().await.expect("Failed to list backups");
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].restored);
    assert_eq!(plan.steps[0].backup_id, Some(entries[0].id));
    assert_eq!(entries[0].items[0].path, work.join("build"));

    // Roll back and get the exact content again
    let outcome = backups
        .rollback_last()
        .await
        .expect("Failed to roll back");
    assert!(matches!(outcome, RollbackOutcome::Restored { .. }));
    assert_eq!(
        fs::read_to_string(work.join("build/output.txt")).expect("Failed to read file"),
        "artifact"
    );

    let again = backups
        .rollback_id(entries[0].id)
        .await
        .expect("Second rollback should be a no-op");
    assert_eq!(
        again,
        RollbackOutcome::AlreadyRestored {
            id: entries[0].id
        }
    );
    assert!(matches!(
        backups.rollback_last().await,
        Err(TermoraError::NothingToRollback)
    ));

    // Both executed steps are in the history
    let history = store
        .query(RecordFilter::recent(10))
        .await
        .expect("Failed to query history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].payload, "rm -rf build");
    assert_eq!(history[0].outcome, Outcome::Success);
    assert_eq!(history[1].payload, "mkdir build");
}

#[tokio::test]
async fn test_destructive_step_never_runs_without_grant() {
    let (_temp_dir, store, work) = create_test_store().await;
    let executor = executor(&store, &work);
    fs::write(work.join("victim.txt"), "keep me").expect("Failed to write file");

    let plan = Plan::new(
        "touch then delete",
        vec![
            Step::shell("touch first.txt"),
            Step::shell("rm -f victim.txt").destructive(),
            Step::shell("touch last.txt"),
        ],
    );
    let mut plan = confirmed(store.save_plan(plan).await.expect("Failed to save plan"));

    let report = executor
        .execute(&mut plan, false)
        .await
        .expect("Failed to execute plan");
    assert!(report.is_suspended());
    assert!(work.join("first.txt").exists());
    assert!(work.join("victim.txt").exists());
    assert!(!work.join("last.txt").exists());

    let stored = store.require_plan(plan.id).await.expect("Plan should exist");
    assert_eq!(stored.status, PlanStatus::Pending);
    assert_eq!(stored.steps[0].status, StepStatus::Succeeded);
    assert_eq!(stored.steps[1].status, StepStatus::Pending);

    // Re-confirming the plan without the step grant suspends again
    let mut plan = confirmed(stored);
    let report = executor
        .execute(&mut plan, false)
        .await
        .expect("Failed to execute plan");
    assert!(report.is_suspended());
    assert!(work.join("victim.txt").exists());
}

#[tokio::test]
async fn test_pending_plan_requires_confirmation() {
    let (_temp_dir, store, work) = create_test_store().await;
    let executor = executor(&store, &work);
    let mut plan = store
        .save_plan(Plan::new("hello", vec![Step::shell("echo hello")]))
        .await
        .expect("Failed to save plan");

    let err = executor.execute(&mut plan, false).await.unwrap_err();
    assert!(matches!(err, TermoraError::InvalidState { .. }));
    assert_eq!(plan.steps[0].status, StepStatus::Pending);
}

#[tokio::test]
async fn test_failure_skips_dependent_but_runs_independent_steps() {
    let (_temp_dir, store, work) = create_test_store().await;
    let executor = executor(&store, &work);

    let plan = Plan::new(
        "mixed",
        vec![
            Step::shell("echo oops >&2; exit 3"),
            Step::shell("touch independent.txt").independent(),
            Step::shell("touch dependent.txt"),
        ],
    );
    let mut plan = confirmed(store.save_plan(plan).await.expect("Failed to save plan"));

    let report = executor
        .execute(&mut plan, false)
        .await
        .expect("Failed to execute plan");
    match &report.outcome {
        ExecutionOutcome::Failed {
            step_index,
            stderr,
            cause,
            rollback,
            ..
        } => {
            assert_eq!(*step_index, 0);
            assert!(stderr.contains("oops"));
            assert_eq!(cause, "exit code 3");
            assert!(rollback.is_none());
        }
        other => panic!("expected failure, got {other:?}"),
    }
    let failure = report.failure().expect("Report should carry a failure");
    assert!(matches!(
        failure,
        TermoraError::StepExecutionFailure { index: 0, .. }
    ));

    assert!(work.join("independent.txt").exists());
    assert!(!work.join("dependent.txt").exists());
    assert_eq!(plan.status, PlanStatus::Failed);
    let statuses: Vec<_> = plan.steps.iter().map(|step| step.status).collect();
    assert_eq!(
        statuses,
        vec![StepStatus::Failed, StepStatus::Succeeded, StepStatus::Skipped]
    );

    let history = store
        .query(RecordFilter::recent(10))
        .await
        .expect("Failed to query history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].outcome, Outcome::Failure);
    assert_eq!(history[1].exit_code, Some(3));
}

#[tokio::test]
async fn test_history_write_failure_fails_the_step() {
    let (_temp_dir, store, work) = create_test_store().await;
    let executor = Executor::new(
        store.clone(),
        Arc::new(FailingMemory),
        SessionContext::new(&work),
    );

    let plan = Plan::new(
        "two echoes",
        vec![Step::shell("echo first"), Step::shell("touch second.txt")],
    );
    let mut plan = confirmed(store.save_plan(plan).await.expect("Failed to save plan"));

    let report = executor
        .execute(&mut plan, false)
        .await
        .expect("Failed to execute plan");
    match &report.outcome {
        ExecutionOutcome::Failed {
            step_index, cause, ..
        } => {
            assert_eq!(*step_index, 0);
            assert!(cause.contains("Memory write failed"), "{cause}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(plan.steps[0].status, StepStatus::Failed);
    assert_eq!(plan.steps[0].exit_code, Some(0));
    assert_eq!(plan.steps[1].status, StepStatus::Skipped);
    assert!(!work.join("second.txt").exists());
    assert_eq!(plan.status, PlanStatus::Failed);
}

#[tokio::test]
async fn test_halt_and_rollback_restores_failed_step() {
    let (_temp_dir, store, work) = create_test_store().await;
    let executor = executor(&store, &work);
    fs::create_dir(work.join("data")).expect("Failed to create dir");
    fs::write(work.join("data/rows.csv"), "a,b\n1,2\n").expect("Failed to write file");

    let plan = Plan::new(
        "wipe and fail",
        vec![
            Step::shell("rm -rf data && exit 1").destructive(),
            Step::shell("touch never.txt").independent(),
        ],
    )
    .with_failure_policy(FailurePolicy::HaltAndRollback);
    let mut plan = store.save_plan(plan).await.expect("Failed to save plan");

    let report = executor
        .execute(&mut plan, true)
        .await
        .expect("Failed to execute plan");
    match &report.outcome {
        ExecutionOutcome::Failed { rollback, .. } => {
            assert!(matches!(rollback, Some(RollbackOutcome::Restored { .. })));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(plan.status, PlanStatus::RolledBack);
    assert_eq!(plan.steps[1].status, StepStatus::Skipped);
    assert!(!work.join("never.txt").exists());
    assert_eq!(
        fs::read_to_string(work.join("data/rows.csv")).expect("Failed to read restored file"),
        "a,b\n1,2\n"
    );

    let stored = store.require_plan(plan.id).await.expect("Plan should exist");
    assert_eq!(stored.status, PlanStatus::RolledBack);
}

#[tokio::test]
async fn test_backup_failure_stops_before_the_step() {
    let (_temp_dir, store, work) = create_test_store().await;
    let executor = executor(&store, &work);
    fs::write(work.join("victim.txt"), "keep me").expect("Failed to write file");

    // A regular file where the blob directory should be
    fs::remove_dir_all(store.blob_dir()).expect("Failed to remove blob dir");
    fs::write(store.blob_dir(), "").expect("Failed to block blob dir");

    let plan = Plan::new(
        "delete",
        vec![
            Step::shell("touch before.txt"),
            Step::shell("rm victim.txt").destructive(),
            Step::shell("touch after.txt"),
        ],
    );
    let mut plan = store.save_plan(plan).await.expect("Failed to save plan");

    let err = executor.execute(&mut plan, true).await.unwrap_err();
    match err {
        TermoraError::BackupFailed { path, .. } => assert_eq!(path, work.join("victim.txt")),
        other => panic!("expected backup failure, got {other:?}"),
    }
    assert!(work.join("victim.txt").exists());
    assert!(!work.join("after.txt").exists());

    let stored = store.require_plan(plan.id).await.expect("Plan should exist");
    assert_eq!(stored.status, PlanStatus::Failed);
    let statuses: Vec<_> = stored.steps.iter().map(|step| step.status).collect();
    assert_eq!(
        statuses,
        vec![StepStatus::Succeeded, StepStatus::Skipped, StepStatus::Skipped]
    );
}

#[tokio::test]
async fn test_cancel_suspended_plan() {
    let (_temp_dir, store, work) = create_test_store().await;
    let executor = executor(&store, &work);
    fs::write(work.join("victim.txt"), "keep me").expect("Failed to write file");

    let plan = Plan::new(
        "delete",
        vec![Step::shell("rm victim.txt"), Step::shell("ls")],
    );
    let mut plan = store.save_plan(plan).await.expect("Failed to save plan");
    assert!(!plan.steps[0].destructive, "flags come from the proposal");
    plan.steps[0].destructive = true;
    let mut plan = confirmed(plan);

    let report = executor
        .execute(&mut plan, false)
        .await
        .expect("Failed to execute plan");
    assert!(report.is_suspended());

    executor.cancel(&mut plan).await.expect("Failed to cancel");
    assert_eq!(plan.status, PlanStatus::Cancelled);
    assert!(plan.steps.iter().all(|step| step.status == StepStatus::Skipped));
    assert!(work.join("victim.txt").exists());

    let err = executor.execute(&mut plan, true).await.unwrap_err();
    assert!(matches!(err, TermoraError::InvalidState { .. }));
    let err = executor.confirm_step(&mut plan, 0).await.unwrap_err();
    assert!(matches!(err, TermoraError::InvalidState { .. }));
}

#[tokio::test]
async fn test_timeout_fails_the_step() {
    let (_temp_dir, store, work) = create_test_store().await;
    let executor = executor(&store, &work).with_command_timeout(Duration::from_millis(300));

    let mut plan = store
        .save_plan(Plan::new("wait", vec![Step::shell("sleep 5")]))
        .await
        .expect("Failed to save plan");
    let report = executor
        .execute(&mut plan, true)
        .await
        .expect("Failed to execute plan");
    match &report.outcome {
        ExecutionOutcome::Failed { cause, .. } => assert!(cause.contains("timed out"), "{cause}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(plan.steps[0].exit_code, Some(-1));
}

#[tokio::test]
async fn test_script_and_schedule_steps() {
    let (_temp_dir, store, work) = create_test_store().await;
    let executor = executor(&store, &work);

    let plan = Plan::new(
        "script and schedule",
        vec![
            Step::script("sh", "echo from script > script.out"),
            Step::new(
                StepKind::ScheduleDefinition,
                r#"{"trigger": "every day at 09:00", "intent": "clean the downloads folder"}"#,
            ),
        ],
    );
    let mut plan = store.save_plan(plan).await.expect("Failed to save plan");
    let report = executor
        .execute(&mut plan, true)
        .await
        .expect("Failed to execute plan");
    assert!(report.is_completed());
    assert_eq!(
        fs::read_to_string(work.join("script.out")).expect("Failed to read script output"),
        "from script\n"
    );
    assert!(plan.steps[1].stdout.starts_with("Registered schedule"));

    let schedules = store.list_schedules().await.expect("Failed to list schedules");
    assert_eq!(schedules.len(), 1);
    assert_eq!(schedules[0].description, "every day at 09:00");
}

#[tokio::test]
async fn test_backups_disabled_takes_no_snapshot() {
    let (_temp_dir, store, work) = create_test_store().await;
    let executor = executor(&store, &work).with_backups(false);
    fs::write(work.join("gone.txt"), "x").expect("Failed to write file");

    let mut plan = store
        .save_plan(Plan::new("delete", vec![Step::shell("rm gone.txt").destructive()]))
        .await
        .expect("Failed to save plan");
    let report = executor
        .execute(&mut plan, true)
        .await
        .expect("Failed to execute plan");
    assert!(report.is_completed());
    assert_eq!(plan.steps[0].backup_id, None);
    assert!(
        BackupManager::new(store.clone())
            .list()
            .await
            .expect("Failed to list backups")
            .is_empty()
    );
}
