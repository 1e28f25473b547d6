// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the queue lifecycle.
//!
//! Each test builds an isolated TestHarness over an in-memory store and a
//! scripted executor. The tokio clock is paused, so send delays and timeouts
//! elapse instantly once the runtime is idle.

use std::sync::Arc;
use std::time::Duration;

use dmflow_core::types::{ContactStatus, QueueStatus, TaskStatus};
use dmflow_engine::Command;
use dmflow_test_utils::{MockExecutor, SendScript, TestHarness};

async fn has_log(harness: &TestHarness, needle: &str) -> bool {
    harness.logs().await.iter().any(|l| l.message.contains(needle))
}

// ---- Start ----

#[tokio::test(start_paused = true)]
async fn start_builds_one_task_per_eligible_contact() {
    let harness = TestHarness::builder().with_contacts(4).build().await.unwrap();
    let list = harness.contact_list().await;
    harness
        .records
        .update_contact_status(&list.contacts[0].id, ContactStatus::Sent, None)
        .await
        .unwrap();
    harness
        .records
        .update_contact_status(&list.contacts[1].id, ContactStatus::Failed, Some("x".into()))
        .await
        .unwrap();

    let response = harness.start().await;
    assert!(response.success, "start failed: {:?}", response.error);
    let queue = response.queue.unwrap();
    assert_eq!(queue.total_tasks, 3);
    assert_eq!(queue.current_index, 0);
    assert_eq!(queue.status, QueueStatus::Running);
    assert!(queue.tasks.iter().all(|t| t.username != "user1"));
    assert!(queue.tasks.iter().all(|t| t.message == format!("Hi User{}!", &t.username[4..])));

    harness.wait_until_idle().await;
    let history = harness.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, QueueStatus::Completed);
    assert_eq!(history[0].completed_tasks, 3);
    assert!(has_log(&harness, "Started queue \"Test run\" with 3 tasks").await);
    assert!(has_log(&harness, "Queue \"Test run\" completed").await);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn completed_run_marks_contacts_and_counts_sends() {
    let harness = TestHarness::builder().with_contacts(3).build().await.unwrap();
    assert!(harness.start().await.success);
    harness.wait_until_idle().await;

    let list = harness.contact_list().await;
    assert!(list.contacts.iter().all(|c| c.status == ContactStatus::Sent));
    assert!(list.contacts.iter().all(|c| c.sent_at.is_some()));
    assert_eq!(harness.settings().await.today_sent_count, 3);
    assert_eq!(harness.executor.sent_count().await, 3);
    assert_eq!(harness.executor.surfaces_opened(), 1);
    assert_eq!(harness.executor.surfaces_closed(), 1);
    assert!(harness.records.active_queue().await.unwrap().is_none());

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn start_rejects_unknown_list_and_template() {
    let harness = TestHarness::builder().build().await.unwrap();

    let response = harness
        .dispatch(Command::StartQueue {
            list_id: "missing".into(),
            template_id: harness.template_id.clone(),
            name: "x".into(),
        })
        .await;
    assert!(!response.success);
    assert!(response.error.unwrap().contains("not found"));

    let response = harness
        .dispatch(Command::StartQueue {
            list_id: harness.list_id.clone(),
            template_id: "missing".into(),
            name: "x".into(),
        })
        .await;
    assert!(!response.success);
    assert!(response.error.unwrap().contains("template"));
    assert!(harness.records.active_queue().await.unwrap().is_none());
    assert_eq!(harness.executor.surfaces_opened(), 0);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn start_with_nothing_eligible_is_an_empty_queue() {
    let harness = TestHarness::builder().with_contacts(2).build().await.unwrap();
    for contact in harness.contact_list().await.contacts {
        harness
            .records
            .update_contact_status(&contact.id, ContactStatus::Sent, None)
            .await
            .unwrap();
    }

    let response = harness.start().await;
    assert!(!response.success);
    assert!(response.error.unwrap().contains("no contacts"));
    assert!(harness.status().await.is_none());

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn start_while_active_is_rejected_and_changes_nothing() {
    let executor = Arc::new(MockExecutor::new());
    executor.set_send_delay(Duration::from_secs(10)).await;
    let harness = TestHarness::builder()
        .with_executor(executor)
        .build()
        .await
        .unwrap();

    let first = harness.start().await.queue.unwrap();
    harness.wait_for_sends(1).await;

    let second = harness.start().await;
    assert!(!second.success);
    assert!(second.error.unwrap().contains("already"));

    let active = harness.status().await.unwrap();
    assert_eq!(active.id, first.id);
    let persisted = harness.records.active_queue().await.unwrap().unwrap();
    assert_eq!(persisted.id, first.id);
    assert_eq!(harness.executor.surfaces_opened(), 1);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_surface_open_leaves_state_untouched() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.executor.fail_next_opens(1);

    let response = harness.start().await;
    assert!(!response.success);
    assert!(response.error.unwrap().contains("surface agent unreachable"));
    assert!(harness.records.active_queue().await.unwrap().is_none());
    assert!(harness.history().await.is_empty());

    // The next start goes through.
    assert!(harness.start().await.success);
    harness.wait_until_idle().await;

    harness.shutdown().await;
}

// ---- Counters and retries ----

#[tokio::test(start_paused = true)]
async fn counters_stay_consistent_through_a_mixed_run() {
    let harness = TestHarness::builder()
        .with_contacts(5)
        .with_settings(|s| {
            s.auto_retry = false;
            s.pause_on_error = false;
        })
        .build()
        .await
        .unwrap();
    harness.executor.set_send_delay(Duration::from_secs(1)).await;
    harness
        .executor
        .push_script([
            SendScript::Succeed,
            SendScript::Fail("user not found".into()),
            SendScript::Succeed,
            SendScript::Fail("blocked".into()),
            SendScript::Succeed,
        ])
        .await;

    assert!(harness.start().await.success);
    loop {
        match harness.status().await {
            Some(queue) => {
                assert!(queue.counters_consistent(), "inconsistent: {queue:?}");
                assert_eq!(queue.total_tasks, 5);
            }
            None => break,
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    let done = &harness.history().await[0];
    assert_eq!(done.completed_tasks, 3);
    assert_eq!(done.failed_tasks, 2);
    assert_eq!(done.current_index, 5);
    assert_eq!(done.status, QueueStatus::Completed);
    assert_eq!(harness.settings().await.today_sent_count, 3);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn retries_exhaust_at_max_and_record_the_contact_error() {
    let harness = TestHarness::builder()
        .with_contacts(2)
        .with_settings(|s| {
            s.max_retries = 2;
            s.pause_on_error = false;
        })
        .build()
        .await
        .unwrap();
    harness.executor.fail_next(3, "Message button not found").await;

    assert!(harness.start().await.success);
    harness.wait_until_idle().await;

    let done = &harness.history().await[0];
    let first = &done.tasks[0];
    assert_eq!(first.status, TaskStatus::Failed);
    assert_eq!(first.retry_count, 2);
    assert_eq!(first.error.as_deref(), Some("Message button not found"));
    assert_eq!(done.tasks[1].status, TaskStatus::Sent);
    assert_eq!(done.failed_tasks, 1);
    assert_eq!(done.completed_tasks, 1);
    assert_eq!(harness.executor.sent_count().await, 4);

    let contact = &harness.contact_list().await.contacts[0];
    assert_eq!(contact.status, ContactStatus::Failed);
    assert_eq!(contact.error_message.as_deref(), Some("Message button not found"));

    assert!(has_log(&harness, "retrying (1/2)").await);
    assert!(has_log(&harness, "retrying (2/2)").await);
    assert!(has_log(&harness, "Failed to send to @user1: Message button not found").await);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn terminal_failure_pauses_when_pause_on_error() {
    let harness = TestHarness::builder()
        .with_contacts(3)
        .with_settings(|s| s.auto_retry = false)
        .build()
        .await
        .unwrap();
    harness.executor.fail_next(1, "blocked").await;

    assert!(harness.start().await.success);
    let paused = harness
        .wait_for(|q| q.is_some_and(|q| q.status == QueueStatus::Paused))
        .await
        .unwrap();
    assert_eq!(paused.current_index, 1);
    assert_eq!(paused.failed_tasks, 1);
    assert!(paused.paused_at.is_some());
    assert_eq!(harness.executor.sent_count().await, 1);

    let resumed = harness.dispatch(Command::ResumeQueue).await;
    assert!(resumed.success);
    harness.wait_until_idle().await;
    assert_eq!(harness.history().await[0].completed_tasks, 2);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn hung_send_times_out_as_a_failed_attempt() {
    let harness = TestHarness::builder()
        .with_contacts(2)
        .with_send_timeout(Duration::from_secs(5))
        .with_settings(|s| {
            s.auto_retry = false;
            s.pause_on_error = false;
        })
        .build()
        .await
        .unwrap();
    harness.executor.push_script([SendScript::Hang]).await;

    assert!(harness.start().await.success);
    harness.wait_until_idle().await;

    let done = &harness.history().await[0];
    assert_eq!(done.tasks[0].status, TaskStatus::Failed);
    assert!(done.tasks[0].error.as_deref().unwrap().contains("timed out"));
    assert_eq!(done.tasks[1].status, TaskStatus::Sent);

    harness.shutdown().await;
}

// ---- Pause, resume, stop ----

#[tokio::test(start_paused = true)]
async fn pause_mid_send_keeps_the_outcome_and_never_double_counts() {
    let harness = TestHarness::builder().with_contacts(3).build().await.unwrap();
    harness.executor.set_send_delay(Duration::from_secs(10)).await;

    assert!(harness.start().await.success);
    harness.wait_for_sends(1).await;

    let paused = harness.dispatch(Command::PauseQueue).await;
    assert_eq!(paused.queue.unwrap().status, QueueStatus::Paused);

    // The in-flight send lands while paused.
    let settled = harness
        .wait_for(|q| q.is_some_and(|q| q.completed_tasks == 1))
        .await
        .unwrap();
    assert_eq!(settled.status, QueueStatus::Paused);
    assert_eq!(settled.current_index, 1);
    assert_eq!(settled.tasks[0].status, TaskStatus::Sent);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.executor.sent_count().await, 1);
    assert_eq!(harness.settings().await.today_sent_count, 1);

    let resumed = harness.dispatch(Command::ResumeQueue).await;
    assert_eq!(resumed.queue.unwrap().status, QueueStatus::Running);
    harness.wait_until_idle().await;

    let sent = harness.executor.sent().await;
    let usernames: Vec<_> = sent.iter().map(|r| r.username.as_str()).collect();
    assert_eq!(usernames, ["user1", "user2", "user3"]);
    assert_eq!(harness.settings().await.today_sent_count, 3);
    assert!(has_log(&harness, "Queue paused").await);
    assert!(has_log(&harness, "Queue resumed").await);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_without_a_queue_are_harmless() {
    let harness = TestHarness::builder().build().await.unwrap();

    let paused = harness.dispatch(Command::PauseQueue).await;
    assert!(paused.success);
    assert!(paused.queue.is_none());

    let resumed = harness.dispatch(Command::ResumeQueue).await;
    assert!(resumed.success);
    assert!(resumed.queue.is_none());

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stop_archives_the_queue_exactly_once() {
    let harness = TestHarness::builder().with_contacts(3).build().await.unwrap();
    harness.executor.set_send_delay(Duration::from_secs(10)).await;

    assert!(harness.start().await.success);
    harness.wait_for_sends(1).await;
    harness.dispatch(Command::PauseQueue).await;
    harness
        .wait_for(|q| q.is_some_and(|q| q.completed_tasks == 1))
        .await;

    let stopped = harness.dispatch(Command::StopQueue).await;
    assert!(stopped.success);
    assert!(stopped.queue.is_none());
    assert!(harness.status().await.is_none());

    let again = harness.dispatch(Command::StopQueue).await;
    assert!(again.success);

    let history = harness.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, QueueStatus::Idle);
    assert_eq!(history[0].completed_tasks, 1);
    assert!(harness.records.active_queue().await.unwrap().is_none());
    assert_eq!(harness.executor.surfaces_closed(), 1);
    assert!(has_log(&harness, "Queue stopped").await);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stop_during_a_send_waits_for_its_outcome() {
    let harness = TestHarness::builder().with_contacts(3).build().await.unwrap();
    harness.executor.set_send_delay(Duration::from_secs(5)).await;

    assert!(harness.start().await.success);
    harness.wait_for_sends(1).await;

    let stopped = harness.dispatch(Command::StopQueue).await;
    assert!(stopped.success);
    assert!(stopped.queue.is_none());

    let history = harness.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].tasks[0].status, TaskStatus::Sent);
    assert_eq!(history[0].completed_tasks, 1);
    assert_eq!(harness.contact_list().await.contacts[0].status, ContactStatus::Sent);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.executor.sent_count().await, 1);

    harness.shutdown().await;
}

// ---- Daily limit ----

#[tokio::test(start_paused = true)]
async fn reaching_the_daily_limit_pauses_before_the_next_send() {
    let harness = TestHarness::builder()
        .with_contacts(3)
        .with_settings(|s| {
            s.daily_limit = 30;
            s.today_sent_count = 29;
        })
        .build()
        .await
        .unwrap();

    assert!(harness.start().await.success);
    let paused = harness
        .wait_for(|q| q.is_some_and(|q| q.status == QueueStatus::Paused))
        .await
        .unwrap();

    assert_eq!(paused.completed_tasks, 1);
    assert_eq!(paused.current_index, 1);
    assert_eq!(harness.executor.sent_count().await, 1);
    assert_eq!(harness.settings().await.today_sent_count, 30);
    assert!(has_log(&harness, "Daily limit reached (30)").await);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn queue_at_the_limit_never_sends() {
    let harness = TestHarness::builder()
        .with_settings(|s| s.today_sent_count = 30)
        .build()
        .await
        .unwrap();

    assert!(harness.start().await.success);
    harness
        .wait_for(|q| q.is_some_and(|q| q.status == QueueStatus::Paused))
        .await;
    assert_eq!(harness.executor.sent_count().await, 0);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn reset_daily_count_respects_force() {
    let harness = TestHarness::builder()
        .with_settings(|s| s.today_sent_count = 12)
        .build()
        .await
        .unwrap();

    let response = harness.dispatch(Command::ResetDailyCount { force: false }).await;
    assert!(response.success);
    assert_eq!(harness.settings().await.today_sent_count, 12);

    let response = harness.dispatch(Command::ResetDailyCount { force: true }).await;
    assert!(response.success);
    assert_eq!(harness.settings().await.today_sent_count, 0);
    assert!(has_log(&harness, "Daily send counter reset").await);

    harness.shutdown().await;
}

// ---- Single DM ----

#[tokio::test(start_paused = true)]
async fn single_dm_uses_its_own_surface_and_counts() {
    let harness = TestHarness::builder().build().await.unwrap();

    let response = harness
        .dispatch(Command::SendSingleDm {
            username: "someone".into(),
            message: "hello there".into(),
        })
        .await;
    assert!(response.success, "{:?}", response.error);

    let sent = harness.executor.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].username, "someone");
    assert_eq!(sent[0].message, "hello there");
    assert_eq!(harness.executor.surfaces_opened(), 1);
    assert_eq!(harness.executor.surfaces_closed(), 1);
    assert_eq!(harness.settings().await.today_sent_count, 1);
    assert!(harness.status().await.is_none());

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn single_dm_at_the_limit_is_refused() {
    let harness = TestHarness::builder()
        .with_settings(|s| s.today_sent_count = 30)
        .build()
        .await
        .unwrap();

    let response = harness
        .dispatch(Command::SendSingleDm {
            username: "someone".into(),
            message: "hi".into(),
        })
        .await;
    assert!(!response.success);
    assert!(response.error.unwrap().contains("30"));
    assert_eq!(harness.executor.sent_count().await, 0);
    assert_eq!(harness.executor.surfaces_opened(), 0);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn single_dm_failure_is_reported_without_counting() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.executor.fail_next(1, "account private").await;

    let response = harness
        .dispatch(Command::SendSingleDm {
            username: "someone".into(),
            message: "hi".into(),
        })
        .await;
    assert!(!response.success);
    assert!(response.error.unwrap().contains("account private"));
    assert_eq!(harness.settings().await.today_sent_count, 0);
    assert_eq!(harness.executor.surfaces_closed(), 1);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn overlapping_single_dms_respect_the_limit() {
    let harness = TestHarness::builder()
        .with_settings(|s| s.today_sent_count = 29)
        .build()
        .await
        .unwrap();
    harness.executor.set_send_delay(Duration::from_secs(5)).await;

    let dm = |username: &str| Command::SendSingleDm {
        username: username.into(),
        message: "hi".into(),
    };
    let (first, second) = tokio::join!(harness.dispatch(dm("ada")), harness.dispatch(dm("bob")));

    assert!(first.success, "{:?}", first.error);
    assert!(!second.success);
    assert!(second.error.unwrap().contains("daily limit reached (30)"));
    assert_eq!(harness.settings().await.today_sent_count, 30);
    assert_eq!(harness.executor.sent_count().await, 1);
    assert_eq!(harness.executor.surfaces_opened(), 1);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn single_dm_during_queue_send_respects_the_limit() {
    let harness = TestHarness::builder()
        .with_contacts(2)
        .with_settings(|s| s.today_sent_count = 29)
        .build()
        .await
        .unwrap();
    harness.executor.set_send_delay(Duration::from_secs(5)).await;
    assert!(harness.start().await.success);
    harness.wait_for_sends(1).await;

    let response = harness
        .dispatch(Command::SendSingleDm {
            username: "someone".into(),
            message: "hi".into(),
        })
        .await;

    assert!(!response.success);
    assert!(response.error.unwrap().contains("daily limit reached (30)"));
    assert_eq!(harness.settings().await.today_sent_count, 30);
    assert_eq!(harness.executor.sent_count().await, 1);

    let queue = harness
        .wait_for(|q| q.is_some_and(|q| q.status == QueueStatus::Paused))
        .await
        .unwrap();
    assert_eq!(queue.completed_tasks, 1);
    assert_eq!(queue.current_index, 1);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn single_dm_waits_for_the_queue_send_and_the_queue_continues() {
    let harness = TestHarness::builder().with_contacts(2).build().await.unwrap();
    harness.executor.set_send_delay(Duration::from_secs(5)).await;
    assert!(harness.start().await.success);
    harness.wait_for_sends(1).await;

    let asked = tokio::time::Instant::now();
    let response = harness
        .dispatch(Command::SendSingleDm {
            username: "someone".into(),
            message: "hi".into(),
        })
        .await;
    assert!(response.success, "{:?}", response.error);
    // The queue send finishes first, then the single DM takes its own 5s.
    assert!(asked.elapsed() >= Duration::from_secs(9));

    harness.wait_until_idle().await;
    let usernames: Vec<_> = harness
        .executor
        .sent()
        .await
        .into_iter()
        .map(|r| r.username)
        .collect();
    assert_eq!(usernames, vec!["user1", "someone", "user2"]);
    assert_eq!(harness.settings().await.today_sent_count, 3);
    let history = harness.history().await;
    assert_eq!(history[0].status, QueueStatus::Completed);
    assert_eq!(history[0].completed_tasks, 2);

    harness.shutdown().await;
}

// ---- Recovery and storage failures ----

#[tokio::test(start_paused = true)]
async fn interrupted_queue_resumes_after_restart() {
    let first = TestHarness::builder().with_contacts(3).build().await.unwrap();
    first.executor.set_send_delay(Duration::from_secs(30)).await;
    assert!(first.start().await.success);
    first.wait_for_sends(1).await;
    let store = first.store.clone();
    let queue_id = first.status().await.unwrap().id;
    first.shutdown().await;

    let persisted = first_task_status(&store).await;
    assert_eq!(persisted, TaskStatus::Navigating);

    let second = TestHarness::builder().with_store(store).build().await.unwrap();
    second.wait_until_idle().await;

    let history = second.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, queue_id);
    assert_eq!(history[0].status, QueueStatus::Completed);
    assert_eq!(history[0].completed_tasks, 3);
    assert_eq!(second.executor.sent_count().await, 3);
    assert!(has_log(&second, "Recovered interrupted queue").await);

    second.shutdown().await;
}

async fn first_task_status(store: &Arc<dmflow_test_utils::MemoryStore>) -> TaskStatus {
    let raw = store
        .raw(dmflow_core::StateKey::ActiveQueue)
        .await
        .expect("active queue persisted");
    let queue: dmflow_core::types::TaskQueue = serde_json::from_value(raw).unwrap();
    queue.tasks[0].status
}

#[tokio::test(start_paused = true)]
async fn paused_queue_stays_paused_after_restart() {
    let first = TestHarness::builder().with_contacts(3).build().await.unwrap();
    first.executor.set_send_delay(Duration::from_secs(5)).await;
    assert!(first.start().await.success);
    first.wait_for_sends(1).await;
    first.dispatch(Command::PauseQueue).await;
    first
        .wait_for(|q| q.is_some_and(|q| q.completed_tasks == 1))
        .await;
    let store = first.store.clone();
    first.shutdown().await;

    let second = TestHarness::builder().with_store(store).build().await.unwrap();
    let queue = second.status().await.unwrap();
    assert_eq!(queue.status, QueueStatus::Paused);
    assert_eq!(queue.current_index, 1);
    assert!(queue.execution_surface.is_none());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(second.executor.sent_count().await, 0);

    assert!(second.dispatch(Command::ResumeQueue).await.success);
    second.wait_until_idle().await;
    assert_eq!(second.executor.sent_count().await, 2);
    assert_eq!(second.executor.surfaces_opened(), 1);

    second.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn storage_failure_halts_the_run() {
    let harness = TestHarness::builder().with_contacts(3).build().await.unwrap();
    harness.executor.set_send_delay(Duration::from_secs(5)).await;

    assert!(harness.start().await.success);
    harness.wait_for_sends(1).await;
    harness.store.set_fail_writes(true);

    let halted = harness
        .wait_for(|q| q.is_some_and(|q| q.status == QueueStatus::Paused))
        .await
        .unwrap();
    assert_eq!(halted.current_index, 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.executor.sent_count().await, 1);

    harness.store.set_fail_writes(false);
    assert!(harness.dispatch(Command::ResumeQueue).await.success);
    harness.wait_until_idle().await;
    assert_eq!(harness.executor.sent_count().await, 3);

    harness.shutdown().await;
}
