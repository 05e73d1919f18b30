use std::sync::atomic::Ordering;
use std::time::Duration;

use ::common::{SubmissionStatus, TestCaseStatus};
use mq::SubmissionQueue;
use tokio_util::sync::CancellationToken;

use crate::support::{LOOPING_SOLUTION, RAISING_SOLUTION, SUM_SOLUTION, TestEnv};

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn sum_program_passes_every_test() {
        let env = TestEnv::new(2, Duration::ZERO);
        let id = env.submit(SUM_SOLUTION, &[("5 10", "15"), ("1 2", "3")]).await;

        env.run_until_final(&[id]).await;

        let submission = env.store.submission(id);
        assert_eq!(submission.status, SubmissionStatus::Completed);
        assert_eq!(submission.score, Some(100));
        assert!(submission.completed_at.is_some());

        let results = env.store.results(id);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == TestCaseStatus::Passed));
        assert_eq!(results[0].actual_output.as_deref(), Some("15"));
        assert_eq!(results[1].actual_output.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn wrong_answer_lowers_the_score() {
        let env = TestEnv::new(1, Duration::ZERO);
        let id = env
            .submit(SUM_SOLUTION, &[("1 1", "2"), ("2 2", "4"), ("3 3", "7")])
            .await;

        env.run_until_final(&[id]).await;

        let submission = env.store.submission(id);
        assert_eq!(submission.status, SubmissionStatus::Completed);
        assert_eq!(submission.score, Some(66));
        assert_eq!(env.store.results(id)[2].status, TestCaseStatus::Failed);
    }

    #[tokio::test]
    async fn raising_program_is_runtime_error() {
        let env = TestEnv::new(1, Duration::ZERO);
        let id = env.submit(RAISING_SOLUTION, &[("1 2", "3")]).await;

        env.run_until_final(&[id]).await;

        let submission = env.store.submission(id);
        assert_eq!(submission.status, SubmissionStatus::RuntimeError);
        let results = env.store.results(id);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, TestCaseStatus::RuntimeError);
        assert!(
            results[0]
                .error_message
                .as_deref()
                .unwrap()
                .contains("bad input")
        );
    }

    #[tokio::test]
    async fn infinite_loop_is_time_limit_exceeded() {
        let env = TestEnv::new(1, Duration::ZERO);
        let id = env.submit(LOOPING_SOLUTION, &[("1 2", "3")]).await;

        env.run_until_final(&[id]).await;

        let submission = env.store.submission(id);
        assert_eq!(submission.status, SubmissionStatus::TimeLimitExceeded);
        let limit_ms = env.language.time_limit_seconds as i64 * 1000;
        assert!(submission.execution_time_ms.unwrap() >= limit_ms);
    }

    #[tokio::test]
    async fn zero_test_cases_never_reach_running() {
        let env = TestEnv::new(1, Duration::ZERO);
        let id = env.submit(SUM_SOLUTION, &[]).await;

        env.run_until_final(&[id]).await;

        let submission = env.store.submission(id);
        assert_eq!(submission.status, SubmissionStatus::RuntimeError);
        assert!(submission.completed_at.is_some());
        assert!(!env.store.history(id).contains(&SubmissionStatus::Running));
        assert_eq!(env.sandbox.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn workspaces_are_cleaned_up() {
        let env = TestEnv::new(2, Duration::ZERO);
        let ok = env.submit(SUM_SOLUTION, &[("1 2", "3")]).await;
        let crash = env.submit(RAISING_SOLUTION, &[("1 2", "3")]).await;

        env.run_until_final(&[ok, crash]).await;

        assert_eq!(env.workspace_entries(), 0);
    }
}

mod worker_behavior {
    use super::*;

    #[tokio::test]
    async fn concurrency_never_exceeds_limit() {
        let env = TestEnv::new(2, Duration::from_millis(50));
        let mut ids = Vec::new();
        for _ in 0..8 {
            ids.push(env.submit(SUM_SOLUTION, &[("1 2", "3")]).await);
        }

        env.run_until_final(&ids).await;

        assert!(env.sandbox.max_active.load(Ordering::SeqCst) <= 2);
        assert_eq!(env.sandbox.created.load(Ordering::SeqCst), 8);
        for id in ids {
            assert_eq!(env.store.submission(id).status, SubmissionStatus::Completed);
        }
    }

    #[tokio::test]
    async fn finished_submission_is_not_executed_twice() {
        let env = TestEnv::new(1, Duration::ZERO);
        let id = env.submit(SUM_SOLUTION, &[("1 2", "3")]).await;
        env.run_until_final(&[id]).await;

        env.queue.enqueue(id).await.unwrap();
        let other = env.submit(SUM_SOLUTION, &[("2 2", "4")]).await;
        env.run_until_final(&[other]).await;

        assert_eq!(env.sandbox.created.load(Ordering::SeqCst), 2);
        assert_eq!(env.queue.queue_length().await, 0);
    }

    #[tokio::test]
    async fn shutdown_drains_buffered_submissions() {
        let env = TestEnv::new(2, Duration::from_millis(200));
        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(env.submit(SUM_SOLUTION, &[("1 2", "3")]).await);
        }

        let shutdown = CancellationToken::new();
        let worker = env.worker();
        let stopper = {
            let shutdown = shutdown.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(60)).await;
                shutdown.cancel();
            }
        };
        tokio::time::timeout(Duration::from_secs(10), async {
            tokio::join!(worker.run(shutdown.clone(), CancellationToken::new()), stopper)
        })
        .await
        .expect("worker did not drain in time");

        assert_eq!(env.queue.queue_length().await, 0);
        for id in ids {
            assert_eq!(env.store.submission(id).status, SubmissionStatus::Completed);
        }
    }

    #[tokio::test]
    async fn abort_marks_running_submission() {
        let env = TestEnv::new(1, Duration::from_secs(30));
        let id = env.submit(SUM_SOLUTION, &[("1 2", "3")]).await;

        let shutdown = CancellationToken::new();
        let abort = CancellationToken::new();
        let worker = env.worker();
        let stopper = {
            let shutdown = shutdown.clone();
            let abort = abort.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                shutdown.cancel();
                abort.cancel();
            }
        };
        tokio::time::timeout(Duration::from_secs(10), async {
            tokio::join!(worker.run(shutdown.clone(), abort.clone()), stopper)
        })
        .await
        .expect("worker did not stop after abort");

        let submission = env.store.submission(id);
        assert_eq!(submission.status, SubmissionStatus::RuntimeError);
        assert_eq!(submission.runtime_error.as_deref(), Some("Execution aborted"));
        assert_eq!(env.workspace_entries(), 0);
    }
}
