//! Backend-agnostic queue scenarios shared by the conformance suites

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use dog_topic_queue::{JobId, Payload, QueueBackend, QueueConfig, QueueError, QueueService};

pub const BLOCK: Duration = Duration::from_millis(40);

pub fn service<B: QueueBackend + 'static>(backend: B) -> QueueService<B> {
    QueueService::with_config(
        backend,
        QueueConfig::default().with_max_retries(2).with_block_duration(BLOCK),
    )
}

fn email(to: &str) -> Payload {
    Payload::new().with("to", to).with("subject", "Hi")
}

pub async fn add_and_fetch<B: QueueBackend + 'static>(queue: QueueService<B>) {
    let job = queue.add_job("email", email("a@b.com")).await.unwrap();
    assert!(!job.done);
    assert_eq!(job.retries, 0);
    assert!(job.blocked_until.is_none());
    assert!(job.worker_id.is_none());

    let jobs = queue.fetch_queues().await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0], job);
    assert_eq!(jobs[0].payload.get("to").and_then(|v| v.as_str()), Some("a@b.com"));

    let stats = queue.topic_stats("email").await.unwrap().unwrap();
    assert_eq!(stats.added, 1);
    assert_eq!(stats.getted, 0);
}

pub async fn concurrent_leases_hand_out_one_job<B: QueueBackend + 'static>(queue: QueueService<B>) {
    let job = queue.add_job("email", email("a@b.com")).await.unwrap();
    let queue = Arc::new(queue);

    let attempts = (0..16).map(|n| {
        let queue = queue.clone();
        async move {
            queue
                .get_job("email", &format!("w{}", n), "host", 3, Duration::from_secs(30))
                .await
                .unwrap()
        }
    });
    let leased: Vec<_> = futures::future::join_all(attempts).await.into_iter().flatten().collect();

    assert_eq!(leased.len(), 1);
    assert_eq!(leased[0].id, job.id);
    assert_eq!(leased[0].retries, 1);
    assert_eq!(queue.topic_stats("email").await.unwrap().unwrap().getted, 1);
}

pub async fn nothing_eligible<B: QueueBackend + 'static>(queue: QueueService<B>) {
    assert!(queue.lease_job("email", "w1", "h1").await.unwrap().is_none());

    queue.add_job("sms", email("a@b.com")).await.unwrap();
    assert!(queue.lease_job("email", "w1", "h1").await.unwrap().is_none());

    // Leased and still blocked
    queue.lease_job("sms", "w1", "h1").await.unwrap().unwrap();
    assert!(queue.lease_job("sms", "w2", "h2").await.unwrap().is_none());
}

pub async fn oldest_first<B: QueueBackend + 'static>(queue: QueueService<B>) {
    let first = queue.add_job("email", email("1@b.com")).await.unwrap();
    let second = queue.add_job("email", email("2@b.com")).await.unwrap();
    let third = queue.add_job("email", email("3@b.com")).await.unwrap();

    let mut order = Vec::new();
    while let Some(job) = queue.lease_job("email", "w1", "h1").await.unwrap() {
        order.push(job.id);
    }
    assert_eq!(order, vec![first.id, second.id, third.id]);
}

pub async fn ack_excludes_job<B: QueueBackend + 'static>(queue: QueueService<B>) {
    queue.add_job("email", email("a@b.com")).await.unwrap();
    let job = queue.lease_job("email", "w1", "h1").await.unwrap().unwrap();
    assert_eq!(job.worker_id.as_deref(), Some("w1"));
    assert_eq!(job.worker_hostname.as_deref(), Some("h1"));

    let acked = queue.ack_job(&job.id).await.unwrap();
    assert!(acked.done);
    assert!(acked.error.is_none());

    tokio::time::sleep(BLOCK * 2).await;
    assert!(queue.lease_job("email", "w1", "h1").await.unwrap().is_none());
}

pub async fn retry_until_exhausted<B: QueueBackend + 'static>(queue: QueueService<B>) {
    let job = queue.add_job("email", email("a@b.com")).await.unwrap();

    // max_retries 2: leasable while retries <= 2, so three leases in total
    for attempt in 1..=3u32 {
        let leased = queue.lease_job("email", "w1", "h1").await.unwrap().unwrap();
        assert_eq!(leased.id, job.id);
        assert_eq!(leased.retries, attempt);

        let failed = queue.error_job(&job.id, "smtp timeout", false).await.unwrap();
        assert!(!failed.done);
        assert_eq!(failed.error.as_deref(), Some("smtp timeout"));

        assert!(queue.lease_job("email", "w1", "h1").await.unwrap().is_none());
        tokio::time::sleep(BLOCK * 2).await;
    }

    assert!(queue.lease_job("email", "w1", "h1").await.unwrap().is_none());

    let stats = queue.topic_stats("email").await.unwrap().unwrap();
    assert_eq!(stats.getted, 3);
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.done, 0);
}

pub async fn fatal_error_marks_done<B: QueueBackend + 'static>(queue: QueueService<B>) {
    queue.add_job("email", email("a@b.com")).await.unwrap();
    let job = queue.lease_job("email", "w1", "h1").await.unwrap().unwrap();

    let failed = queue.error_job(&job.id, "bad address", true).await.unwrap();
    assert!(failed.done);
    assert!(failed.is_failed());

    tokio::time::sleep(BLOCK * 2).await;
    assert!(queue.lease_job("email", "w1", "h1").await.unwrap().is_none());
}

pub async fn clean_removes_exactly_finished<B: QueueBackend + 'static>(queue: QueueService<B>) {
    let acked = queue.add_job("email", email("1@b.com")).await.unwrap();
    let failed = queue.add_job("email", email("2@b.com")).await.unwrap();
    let exhausted = queue.add_job("email", email("3@b.com")).await.unwrap();
    let pending = queue.add_job("email", email("4@b.com")).await.unwrap();
    let leased = queue.add_job("sms", email("5@b.com")).await.unwrap();

    queue.lease_job("email", "w1", "h1").await.unwrap().unwrap();
    queue.ack_job(&acked.id).await.unwrap();
    queue.lease_job("email", "w1", "h1").await.unwrap().unwrap();
    queue.error_job(&failed.id, "bad address", true).await.unwrap();

    // Drive the third job past max_retries (2)
    for _ in 0..3 {
        let job = queue
            .get_job("email", "w1", "h1", 2, Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.id, exhausted.id);
    }
    queue.lease_job("sms", "w1", "h1").await.unwrap().unwrap();

    assert_eq!(queue.clean_queue().await.unwrap(), 3);

    let mut left: Vec<JobId> = queue.fetch_queues().await.unwrap().into_iter().map(|job| job.id).collect();
    left.sort();
    let mut expected = vec![pending.id, leased.id];
    expected.sort();
    assert_eq!(left, expected);
}

pub async fn email_scenario<B: QueueBackend + 'static>(queue: QueueService<B>) {
    queue
        .add_job("email", Payload::new().with("to", "a@b.com").with("subject", "Hi"))
        .await
        .unwrap();

    let before = Utc::now();
    let job = queue
        .get_job("email", "w1", "host1", 3, Duration::from_secs(5))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.retries, 1);
    assert_eq!(job.worker_id.as_deref(), Some("w1"));

    let blocked_for = (job.blocked_until.unwrap() - before).num_milliseconds();
    assert!((4_000..=6_000).contains(&blocked_for), "blocked for {} ms", blocked_for);

    // Leased and blocked for another worker
    assert!(queue
        .get_job("email", "w2", "host2", 3, Duration::from_secs(5))
        .await
        .unwrap()
        .is_none());

    queue.ack_job(&job.id).await.unwrap();

    let stats = queue.topic_stats("email").await.unwrap().unwrap();
    assert_eq!((stats.added, stats.getted, stats.done, stats.failed), (1, 1, 1, 0));

    let all = queue.fetch_stats().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0], stats);
}

pub async fn reset_empties_queue<B: QueueBackend + 'static>(queue: QueueService<B>) {
    for n in 0..4 {
        queue.add_job("email", Payload::new().with("n", n)).await.unwrap();
    }
    let job = queue.lease_job("email", "w1", "h1").await.unwrap().unwrap();
    queue.ack_job(&job.id).await.unwrap();

    assert_eq!(queue.reset_queue().await.unwrap(), 4);
    assert!(queue.fetch_queues().await.unwrap().is_empty());
    assert_eq!(queue.reset_queue().await.unwrap(), 0);

    // Counters survive a reset
    assert_eq!(queue.topic_stats("email").await.unwrap().unwrap().added, 4);
}

pub async fn unknown_job_is_not_found<B: QueueBackend + 'static>(queue: QueueService<B>) {
    let err = queue.ack_job(&JobId::new()).await.unwrap_err();
    assert!(matches!(err, QueueError::JobNotFound(_)));

    let err = queue.error_job(&JobId::new(), "boom", false).await.unwrap_err();
    assert!(matches!(err, QueueError::JobNotFound(_)));
}
