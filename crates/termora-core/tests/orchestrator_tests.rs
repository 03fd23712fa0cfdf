use std::{fs, sync::Arc, time::Duration};

use jiff::{SignedDuration, Zoned};
use termora_core::{
    Agent, AgentSettings, DirectCommandProvider, MemoryStore, PlanStatus, RequestState,
    TermoraError,
    context::SessionContext,
    models::{
        NewCommandRecord, NewScheduleEntry, Outcome, RecordFilter, ScheduleTemplate, Step,
        StepKind,
    },
    planning::{ActionType, ProposedAction, ProposedPlan},
    scheduler::TriggerRule,
};

mod common;
use common::{RecordingProvider, SlowProvider, StaticProvider, create_test_store};

fn proposal(commands: &[&str]) -> ProposedPlan {
    ProposedPlan {
        explanation: "test plan".to_string(),
        actions: commands.iter().map(|c| ProposedAction::shell(*c)).collect(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_propose_then_confirm() {
    let (_temp_dir, store, work) = create_test_store().await;
    let agent = Agent::new(
        store.clone(),
        Arc::new(StaticProvider(proposal(&["echo hello > greeting.txt"]))),
    );
    let context = SessionContext::new(&work);

    let mut run = agent
        .propose("write a greeting", &context)
        .await
        .expect("Failed to propose");
    assert_eq!(run.state, RequestState::AwaitingConfirmation);
    assert_eq!(run.plan.status, PlanStatus::Pending);
    assert!(run.plan.id > 0);
    assert!(!work.join("greeting.txt").exists(), "nothing runs before confirmation");

    // The redirect makes the step destructive, so it still needs a grant
    let report = agent
        .confirm(&mut run, false)
        .await
        .expect("Failed to confirm");
    assert!(report.is_suspended());
    assert_eq!(run.state, RequestState::AwaitingConfirmation);
    assert_eq!(run.suspended_step(), Some((0, "$ echo hello > greeting.txt")));

    let report = agent
        .confirm_step(&mut run)
        .await
        .expect("Failed to confirm step");
    assert!(report.is_completed());
    assert_eq!(run.state, RequestState::Completed);
    assert_eq!(
        fs::read_to_string(work.join("greeting.txt")).expect("Failed to read file"),
        "hello\n"
    );

    let stored = store.require_plan(run.plan.id).await.expect("Plan should exist");
    assert_eq!(stored.status, PlanStatus::Completed);
}

#[tokio::test]
async fn test_cancel_awaiting_run() {
    let (_temp_dir, store, work) = create_test_store().await;
    let agent = Agent::new(store.clone(), Arc::new(StaticProvider(proposal(&["touch x"]))));
    let context = SessionContext::new(&work);

    let mut run = agent
        .propose("make x", &context)
        .await
        .expect("Failed to propose");
    agent.cancel(&mut run).await.expect("Failed to cancel");
    assert_eq!(run.state, RequestState::Cancelled);
    assert_eq!(run.plan.status, PlanStatus::Cancelled);

    let err = agent.confirm(&mut run, true).await.unwrap_err();
    assert!(matches!(err, TermoraError::InvalidState { .. }));
    assert!(!work.join("x").exists());
}

#[tokio::test]
async fn test_planning_timeout_persists_nothing() {
    let (_temp_dir, store, work) = create_test_store().await;
    let agent = Agent::new(
        store.clone(),
        Arc::new(SlowProvider {
            delay: Duration::from_secs(5),
            proposal: proposal(&["echo late"]),
        }),
    )
    .with_settings(AgentSettings {
        planning_timeout: Duration::from_millis(100),
        ..AgentSettings::default()
    });

    let err = agent
        .propose("anything", &SessionContext::new(&work))
        .await
        .unwrap_err();
    assert!(matches!(err, TermoraError::PlanningTimeout { .. }));
    assert!(store.recent_plans(10).await.expect("Failed to list").is_empty());
    assert!(
        store
            .query(RecordFilter::recent(10))
            .await
            .expect("Failed to query")
            .is_empty()
    );
}

#[tokio::test]
async fn test_malformed_proposals_are_rejected() {
    let (_temp_dir, store, work) = create_test_store().await;
    let context = SessionContext::new(&work);

    let empty = Agent::new(store.clone(), Arc::new(StaticProvider(ProposedPlan::default())));
    let err = empty.propose("do nothing", &context).await.unwrap_err();
    assert!(matches!(err, TermoraError::MalformedPlan { .. }));

    let bad_schedule = ProposedPlan {
        actions: vec![ProposedAction {
            action_type: ActionType::Schedule,
            content: "whenever you feel like it".to_string(),
            ..ProposedAction::shell("")
        }],
        ..Default::default()
    };
    let agent = Agent::new(store.clone(), Arc::new(StaticProvider(bad_schedule)));
    let err = agent.propose("schedule something", &context).await.unwrap_err();
    assert!(matches!(err, TermoraError::MalformedPlan { .. }));

    assert!(store.recent_plans(10).await.expect("Failed to list").is_empty());
}

#[tokio::test]
async fn test_empty_intent_is_rejected() {
    let (_temp_dir, store, work) = create_test_store().await;
    let agent = Agent::new(store, Arc::new(StaticProvider(proposal(&["ls"]))));
    let err = agent
        .propose("   ", &SessionContext::new(&work))
        .await
        .unwrap_err();
    assert!(matches!(err, TermoraError::InvalidInput { .. }));
}

async fn seed_history(agent: &Agent) {
    agent
        .store()
        .append(NewCommandRecord {
            intent: "compress the logs".to_string(),
            plan_id: None,
            step_id: None,
            step_kind: StepKind::ShellCommand,
            payload: "tar czf logs.tgz logs".to_string(),
            directory: "/work".to_string(),
            project: None,
            tags: Vec::new(),
            outcome: Outcome::Success,
            exit_code: Some(0),
            output: "private listing".to_string(),
            duration_ms: Some(30),
        })
        .await
        .expect("Failed to append record");
}

#[tokio::test]
async fn test_history_output_is_withheld_unless_allowed() {
    let (_temp_dir, store, work) = create_test_store().await;
    let context = SessionContext {
        shell_history: vec!["ssh deploy@prod".to_string()],
        ..SessionContext::new(&work)
    };

    let provider = Arc::new(RecordingProvider {
        proposal: proposal(&["ls"]),
        ..Default::default()
    });
    let agent = Agent::new(store.clone(), provider.clone()).with_settings(AgentSettings {
        send_to_api: false,
        ..AgentSettings::default()
    });
    seed_history(&agent).await;
    agent
        .propose("compress logs again", &context)
        .await
        .expect("Failed to propose");

    let provider_open = Arc::new(RecordingProvider {
        proposal: proposal(&["ls"]),
        ..Default::default()
    });
    let open = Agent::new(store.clone(), provider_open.clone()).with_settings(AgentSettings {
        send_to_api: true,
        ..AgentSettings::default()
    });
    open.propose("compress logs again", &context)
        .await
        .expect("Failed to propose");

    let requests = provider.requests.lock().expect("poisoned");
    assert_eq!(requests[0].intent, "compress logs again");
    assert_eq!(requests[0].history.len(), 1);
    assert_eq!(requests[0].history[0].payload, "tar czf logs.tgz logs");
    assert!(requests[0].history[0].output.is_empty());
    assert!(requests[0].context.shell_history.is_empty());

    let requests = provider_open.requests.lock().expect("poisoned");
    assert_eq!(requests[0].history[0].output, "private listing");
    assert_eq!(requests[0].context.shell_history, vec!["ssh deploy@prod"]);
}

#[tokio::test]
async fn test_direct_command_without_planner() {
    let (_temp_dir, store, work) = create_test_store().await;
    let agent = Agent::new(store.clone(), Arc::new(DirectCommandProvider::new()));
    let context = SessionContext::new(&work);

    let run = agent
        .handle("echo direct", &context, false)
        .await
        .expect("Failed to handle");
    assert_eq!(run.state, RequestState::Completed);
    assert_eq!(run.plan.steps[0].stdout, "direct\n");

    let err = agent
        .handle("please tidy up my photos", &context, false)
        .await
        .unwrap_err();
    assert!(matches!(err, TermoraError::PlanningFailure { .. }));
}

#[tokio::test]
async fn test_recurring_intent_registers_schedule() {
    let (_temp_dir, store, work) = create_test_store().await;
    let agent = Agent::new(store.clone(), Arc::new(StaticProvider(proposal(&["echo cleaning"]))));

    let run = agent
        .handle(
            "every day at 09:00 clean the downloads folder",
            &SessionContext::new(&work),
            true,
        )
        .await
        .expect("Failed to handle");
    assert_eq!(run.state, RequestState::Completed);

    let schedule = run.schedule.expect("Schedule should be registered");
    assert_eq!(schedule.description, "every day at 09:00");
    assert_eq!(schedule.rule, TriggerRule::Daily { hour: 9, minute: 0 });
    assert_eq!(
        schedule.template,
        ScheduleTemplate::Intent("clean the downloads folder".to_string())
    );
    assert_eq!(store.list_schedules().await.expect("Failed to list").len(), 1);
}

#[tokio::test]
async fn test_plan_with_schedule_step_registers_once() {
    let (_temp_dir, store, work) = create_test_store().await;
    let scheduled = ProposedPlan {
        actions: vec![ProposedAction {
            action_type: ActionType::Schedule,
            content: r#"{"trigger": "hourly", "intent": "check disk usage"}"#.to_string(),
            ..ProposedAction::shell("")
        }],
        ..Default::default()
    };
    let agent = Agent::new(store.clone(), Arc::new(StaticProvider(scheduled)));

    let run = agent
        .handle("check disk usage hourly", &SessionContext::new(&work), true)
        .await
        .expect("Failed to handle");
    assert_eq!(run.state, RequestState::Completed);
    assert!(run.schedule.is_none());
    assert_eq!(store.list_schedules().await.expect("Failed to list").len(), 1);
}

#[tokio::test]
async fn test_run_due_fires_and_marks_every_entry() {
    let (_temp_dir, store, work) = create_test_store().await;
    let agent = Agent::new(
        store.clone(),
        Arc::new(StaticProvider(proposal(&["touch from-intent.txt"]))),
    );
    let context = SessionContext::new(&work);

    let intent = store
        .register_schedule(
            NewScheduleEntry::from_intent("hourly", "touch a file every hour")
                .expect("Failed to parse"),
        )
        .await
        .expect("Failed to register");
    let plan = store
        .register_schedule(NewScheduleEntry {
            description: "hourly".to_string(),
            rule: TriggerRule::Interval { seconds: 3600 },
            template: ScheduleTemplate::Plan(vec![Step::shell("touch from-plan.txt")]),
        })
        .await
        .expect("Failed to register");
    let broken = store
        .register_schedule(NewScheduleEntry {
            description: "hourly".to_string(),
            rule: TriggerRule::Interval { seconds: 3600 },
            template: ScheduleTemplate::Plan(vec![Step::shell("  ")]),
        })
        .await
        .expect("Failed to register");
    let disabled = store
        .register_schedule(
            NewScheduleEntry::from_intent("hourly", "never runs").expect("Failed to parse"),
        )
        .await
        .expect("Failed to register");
    store
        .set_schedule_enabled(disabled.id, false)
        .await
        .expect("Failed to disable");

    // Not due yet
    let runs = agent
        .run_due(&Zoned::now(), &context, true)
        .await
        .expect("Failed to run due schedules");
    assert!(runs.is_empty());

    let later = Zoned::now()
        .checked_add(SignedDuration::from_hours(2))
        .expect("Failed to add hours");
    let runs = agent
        .run_due(&later, &context, true)
        .await
        .expect("Failed to run due schedules");
    let ids: Vec<u64> = runs.iter().map(|run| run.schedule_id).collect();
    assert_eq!(ids, vec![intent.id, plan.id, broken.id]);

    let first = runs[0].result.as_ref().expect("Intent run should succeed");
    assert_eq!(first.state, RequestState::Completed);
    assert!(first.schedule.is_none(), "scheduled runs never re-register");
    assert!(work.join("from-intent.txt").exists());
    assert!(work.join("from-plan.txt").exists());
    assert!(matches!(
        runs[2].result,
        Err(TermoraError::MalformedPlan { .. })
    ));

    // Every fired entry is marked, even the broken one
    let again = agent
        .run_due(&later, &context, true)
        .await
        .expect("Failed to run due schedules");
    assert!(again.is_empty());
    let broken = store.get_schedule(broken.id).await.expect("Schedule should exist");
    assert_eq!(broken.last_fired_at, Some(later.timestamp()));
    assert_eq!(store.list_schedules().await.expect("Failed to list").len(), 4);
}
