//! End-to-end runs of the orchestrator against scripted agents

use std::sync::Arc;

use serde_json::json;

use super::*;
use crate::agent::ChatResponse;
use crate::testing::{tool_call, FakeRepository, FakeTracker, ScriptedProvider};

const REQUIREMENT: &str = "Add input validation to the login endpoint";

fn pm_script() -> Vec<ChatResponse> {
    vec![
        ChatResponse::tools(vec![tool_call(
            "create_jira_issue",
            json!({
                "summary": "Validate login input",
                "description": "Reject malformed login payloads",
                "acceptance_criteria": "1. Empty username is rejected"
            }),
        )]),
        ChatResponse::text("Created the task. PHASE_COMPLETE"),
    ]
}

fn dev_script() -> Vec<ChatResponse> {
    vec![
        ChatResponse::tools(vec![tool_call(
            "create_branch",
            json!({"branch_name": "feature/ABC-42-login-validation"}),
        )]),
        ChatResponse::tools(vec![tool_call(
            "create_or_update_file",
            json!({"file_path": "src/login.rs", "content": "pub fn validate() {}\n"}),
        )]),
        ChatResponse::tools(vec![tool_call(
            "create_pull_request",
            json!({"title": "ABC-42: validate login input", "body": "Implements ABC-42"}),
        )]),
        ChatResponse::text("Pull request is open. PHASE_COMPLETE"),
    ]
}

fn review_script(approved: bool) -> Vec<ChatResponse> {
    if approved {
        vec![
            ChatResponse::tools(vec![tool_call("get_pr_diff", json!({"pr_number": 17}))]),
            ChatResponse::tools(vec![tool_call(
                "approve_pull_request",
                json!({"pr_number": 17, "body": "Looks good"}),
            )]),
            ChatResponse::text("Clean and complete.\n\nAPPROVED"),
        ]
    } else {
        vec![
            ChatResponse::tools(vec![tool_call("get_pr_diff", json!({"pr_number": 17}))]),
            ChatResponse::tools(vec![tool_call(
                "add_pr_review",
                json!({"pr_number": 17, "body": "Handle empty input", "event": "REQUEST_CHANGES"}),
            )]),
            ChatResponse::text("Empty input is not handled.\n\nCHANGES_REQUESTED"),
        ]
    }
}

fn fix_script() -> Vec<ChatResponse> {
    vec![
        ChatResponse::tools(vec![tool_call("get_pr_reviews", json!({"pr_number": 17}))]),
        ChatResponse::tools(vec![tool_call(
            "create_or_update_file",
            json!({"file_path": "src/login.rs", "content": "pub fn validate() { todo() }\n"}),
        )]),
        ChatResponse::text("Pushed the fix. PHASE_COMPLETE"),
    ]
}

struct Harness {
    provider: Arc<ScriptedProvider>,
    tracker: Arc<FakeTracker>,
    repo: Arc<FakeRepository>,
    pipeline: Pipeline,
}

fn harness(scripts: Vec<Vec<ChatResponse>>, max_rounds: u32, config_fn: impl FnOnce(&mut Config)) -> Harness {
    harness_with(scripts, max_rounds, FakeRepository::new().with_next_pr(17), config_fn)
}

fn harness_with(
    scripts: Vec<Vec<ChatResponse>>,
    max_rounds: u32,
    repo: FakeRepository,
    config_fn: impl FnOnce(&mut Config),
) -> Harness {
    let provider = Arc::new(ScriptedProvider::new(scripts));
    let tracker = Arc::new(FakeTracker::new().with_next_number(42));
    let repo = Arc::new(repo);

    let mut config = Config::default();
    config.pipeline.max_rounds = max_rounds;
    config_fn(&mut config);

    let pipeline = Pipeline::new(
        config,
        provider.clone(),
        tracker.clone(),
        repo.clone(),
        "dev",
    );
    Harness {
        provider,
        tracker,
        repo,
        pipeline,
    }
}

fn phase_starts(events: &[PipelineEvent]) -> Vec<Phase> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::PhaseStart { phase, .. } => Some(*phase),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_requirement_flows_to_review_as_scalars() {
    let h = harness(
        vec![pm_script(), dev_script(), review_script(true)],
        3,
        |_| {},
    );
    let mut events: Vec<PipelineEvent> = Vec::new();

    let outcome = h
        .pipeline
        .run(PipelineInput::Requirement(REQUIREMENT.to_string()), &mut events)
        .await
        .unwrap();

    assert_eq!(outcome.issue_key.as_deref(), Some("ABC-42"));
    assert_eq!(outcome.pr_number, 17);
    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.status, OutcomeStatus::Approved);
    assert!(!outcome.needs_follow_up());

    // Each invocation sees only fixed template text plus scalars
    let tasks = h.provider.tasks();
    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks[0], REQUIREMENT);
    assert_eq!(tasks[1], prompts::developer_task("ABC-42"));
    assert_eq!(tasks[2], prompts::architect_task(17));
    assert!(!tasks[1].contains("Created the task"));
    assert!(!tasks[2].contains("Pull request is open"));

    assert_eq!(
        h.provider.opened(),
        vec!["gpt-4o-mini", "gpt-4o-mini", "gpt-4o"]
    );

    // Fresh history for every invocation
    for request in h.provider.requests() {
        assert!(request.messages.len() < 10);
    }
    let prompts = h.provider.system_prompts();
    assert!(prompts[0].starts_with("# Product Manager"));
    assert!(prompts[1].contains("acme/widgets"));
    assert!(prompts[2].starts_with("# Architect"));

    assert_eq!(h.tracker.created().len(), 1);
    assert_eq!(
        h.repo.writes()[0].3,
        "feature/ABC-42-login-validation"
    );

    assert!(events.contains(&PipelineEvent::Artifact {
        artifact: Artifact::IssueKey,
        value: "ABC-42".to_string(),
    }));
    assert!(events.contains(&PipelineEvent::Artifact {
        artifact: Artifact::PullRequestNumber,
        value: "17".to_string(),
    }));
    assert_eq!(
        events.last(),
        Some(&PipelineEvent::Summary {
            issue_key: Some("ABC-42".to_string()),
            issue_url: Some("https://jira.example/browse/ABC-42".to_string()),
            pr_number: 17,
            pr_url: "https://github.com/acme/widgets/pull/17".to_string(),
            rounds: 1,
            status: OutcomeStatus::Approved,
        })
    );
}

#[tokio::test]
async fn test_approval_in_first_round_skips_fix() {
    let h = harness(vec![review_script(true)], 3, |_| {});
    let mut events: Vec<PipelineEvent> = Vec::new();

    let outcome = h
        .pipeline
        .run(
            PipelineInput::PullRequest {
                number: 17,
                issue_key: None,
            },
            &mut events,
        )
        .await
        .unwrap();

    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.status, OutcomeStatus::Approved);
    assert_eq!(phase_starts(&events), vec![Phase::ArchitectReview]);
    assert!(events.contains(&PipelineEvent::Verdict {
        round: 1,
        text: "Clean and complete.\n\nAPPROVED".to_string(),
        approved: true,
    }));
    assert_eq!(h.provider.opened().len(), 1);
}

#[tokio::test]
async fn test_two_rejections_then_approval() {
    let h = harness(
        vec![
            review_script(false),
            fix_script(),
            review_script(false),
            fix_script(),
            review_script(true),
        ],
        3,
        |_| {},
    );
    let mut events: Vec<PipelineEvent> = Vec::new();

    let outcome = h
        .pipeline
        .run(
            PipelineInput::PullRequest {
                number: 17,
                issue_key: Some("ABC-42".to_string()),
            },
            &mut events,
        )
        .await
        .unwrap();

    assert_eq!(outcome.rounds, 3);
    assert_eq!(outcome.status, OutcomeStatus::Approved);
    assert_eq!(
        phase_starts(&events),
        vec![
            Phase::ArchitectReview,
            Phase::DeveloperFix,
            Phase::ArchitectReview,
            Phase::DeveloperFix,
            Phase::ArchitectReview,
        ]
    );

    // Fix tasks name the pull request head and nothing else from the review
    let tasks = h.provider.tasks();
    assert_eq!(
        tasks[1],
        prompts::developer_fix_task(17, "feature/pr-17", Some("ABC-42"))
    );
    assert!(tasks[1].contains("Add a comment to ABC-42"));
    assert!(!tasks[1].contains("Empty input is not handled"));

    // Fix writes land on the head branch
    let writes = h.repo.writes();
    assert_eq!(writes.len(), 2);
    assert!(writes.iter().all(|w| w.3 == "feature/pr-17"));

    let rounds: Vec<Option<Round>> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::PhaseStart { round, .. } => Some(*round),
            _ => None,
        })
        .collect();
    assert_eq!(rounds[4], Some(Round { number: 3, max: 3 }));
}

#[tokio::test]
async fn test_round_cap_ends_without_fourth_review() {
    let h = harness(
        vec![
            review_script(false),
            fix_script(),
            review_script(false),
            fix_script(),
            review_script(false),
            // never used
            review_script(true),
        ],
        3,
        |_| {},
    );
    let mut events: Vec<PipelineEvent> = Vec::new();

    let outcome = h
        .pipeline
        .run(
            PipelineInput::PullRequest {
                number: 17,
                issue_key: None,
            },
            &mut events,
        )
        .await
        .unwrap();

    assert_eq!(outcome.rounds, 3);
    assert_eq!(outcome.status, OutcomeStatus::MaxRoundsReached);
    assert!(outcome.needs_follow_up());

    let starts = phase_starts(&events);
    assert_eq!(
        starts.iter().filter(|p| **p == Phase::ArchitectReview).count(),
        3
    );
    assert_eq!(
        starts.iter().filter(|p| **p == Phase::DeveloperFix).count(),
        2
    );
    assert_eq!(starts.last(), Some(&Phase::ArchitectReview));
    assert_eq!(h.provider.remaining(), 1);

    // Without a known issue the fix task names none
    let tasks = h.provider.tasks();
    assert_eq!(tasks[1], prompts::developer_fix_task(17, "feature/pr-17", None));
    assert!(!tasks[1].contains("ABC-"));
}

#[tokio::test]
async fn test_missing_issue_key_aborts_before_developer() {
    let h = harness(
        vec![
            vec![ChatResponse::text(
                "I could not reach the tracker. PHASE_COMPLETE",
            )],
            dev_script(),
        ],
        3,
        |_| {},
    );
    let mut events: Vec<PipelineEvent> = Vec::new();

    let err = h
        .pipeline
        .run(PipelineInput::Requirement(REQUIREMENT.to_string()), &mut events)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Extraction {
            phase: Phase::ProductManager,
            artifact: Artifact::IssueKey
        }
    ));
    assert!(err.is_fatal());
    assert_eq!(h.provider.opened().len(), 1);
    assert_eq!(phase_starts(&events), vec![Phase::ProductManager]);
}

#[tokio::test]
async fn test_missing_pr_number_aborts_before_review() {
    let h = harness(
        vec![
            pm_script(),
            vec![ChatResponse::text("Nothing to change. PHASE_COMPLETE")],
            review_script(true),
        ],
        3,
        |_| {},
    );

    let err = h
        .pipeline
        .run(PipelineInput::Requirement(REQUIREMENT.to_string()), &mut NullSink)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Extraction {
            phase: Phase::Developer,
            artifact: Artifact::PullRequestNumber
        }
    ));
    assert_eq!(h.provider.remaining(), 1);
}

#[tokio::test]
async fn test_empty_requirement_is_rejected() {
    let h = harness(vec![pm_script()], 3, |_| {});
    let err = h
        .pipeline
        .run(PipelineInput::Requirement("   ".to_string()), &mut NullSink)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingRequirement));
    assert!(h.provider.opened().is_empty());
}

#[tokio::test]
async fn test_resume_from_issue_skips_product_manager() {
    let h = harness(vec![dev_script(), review_script(true)], 3, |_| {});
    let mut events: Vec<PipelineEvent> = Vec::new();

    let outcome = h
        .pipeline
        .run(PipelineInput::Issue("ABC-42".to_string()), &mut events)
        .await
        .unwrap();

    assert_eq!(outcome.issue_key.as_deref(), Some("ABC-42"));
    assert_eq!(
        phase_starts(&events),
        vec![Phase::Developer, Phase::ArchitectReview]
    );
    assert!(h.tracker.created().is_empty());
}

#[tokio::test]
async fn test_exhausted_budget_still_extracts() {
    // Task, call batch and result batch fill a cap of 3
    let h = harness(
        vec![pm_script(), dev_script(), review_script(true)],
        3,
        |config| config.budgets.pm = 3,
    );
    let mut events: Vec<PipelineEvent> = Vec::new();

    let outcome = h
        .pipeline
        .run(PipelineInput::Requirement(REQUIREMENT.to_string()), &mut events)
        .await
        .unwrap();

    assert_eq!(outcome.issue_key.as_deref(), Some("ABC-42"));
    assert!(events.contains(&PipelineEvent::BudgetExhausted {
        phase: Phase::ProductManager,
        limit: 3,
    }));
}

#[tokio::test]
async fn test_failed_head_lookup_aborts() {
    let h = harness_with(
        vec![review_script(true)],
        3,
        FakeRepository::new().failing_lookup(),
        |_| {},
    );
    let err = h
        .pipeline
        .run(
            PipelineInput::PullRequest {
                number: 17,
                issue_key: None,
            },
            &mut NullSink,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(h.provider.opened().is_empty());
}

#[tokio::test]
async fn test_self_approval_fallback_still_approves() {
    let h = harness_with(
        vec![review_script(true)],
        3,
        FakeRepository::new().blocking_self_approval(),
        |_| {},
    );
    let outcome = h
        .pipeline
        .run(
            PipelineInput::PullRequest {
                number: 17,
                issue_key: None,
            },
            &mut NullSink,
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Approved);
    let submitted = h.repo.reviews_submitted();
    assert_eq!(submitted.len(), 2);
    assert!(submitted[1].1.starts_with("APPROVED"));
}

#[tokio::test]
async fn test_extraction_is_deterministic() {
    let h = harness(vec![pm_script(), dev_script(), review_script(true)], 1, |_| {});
    let first = h
        .pipeline
        .run(PipelineInput::Requirement(REQUIREMENT.to_string()), &mut NullSink)
        .await
        .unwrap();

    let h = harness(vec![pm_script(), dev_script(), review_script(true)], 1, |_| {});
    let second = h
        .pipeline
        .run(PipelineInput::Requirement(REQUIREMENT.to_string()), &mut NullSink)
        .await
        .unwrap();

    assert_eq!(first, second);
}
