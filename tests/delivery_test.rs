mod common;

use async_trait::async_trait;
use common::{
    engine, engine_with_history, seed, setup_store, BrokenHistory, RecordingTransport, Sent,
};
use std::sync::Arc;
use tg_broadcastbot::db::BroadcastHistoryRepository;
use tg_broadcastbot::delivery::Pacer;
use tg_broadcastbot::model::Draft;

#[derive(Default)]
struct CountingPacer {
    waits: usize,
}

#[async_trait]
impl Pacer for CountingPacer {
    async fn ready(&mut self) {
        self.waits += 1;
    }
}

fn text_draft(text: &str) -> Draft {
    Draft {
        text: text.into(),
        image_ref: None,
    }
}

#[tokio::test]
async fn failures_are_counted_and_do_not_abort_the_run() {
    let store = setup_store().await;
    seed(&store, &[1, 2, 3, 4, 5]).await;
    let transport = RecordingTransport::failing_for(&[2, 4]);
    let engine = engine(&store, &transport);

    let permit = engine.try_acquire().unwrap();
    let recipients = engine.snapshot().await.unwrap();
    let mut pacer = CountingPacer::default();
    let report = engine
        .deliver_with(&permit, &recipients, &text_draft("Hello"), &mut pacer)
        .await;

    assert_eq!(report.success_count, 3);
    assert_eq!(report.failure_count, 2);
    assert_eq!(report.attempted(), 5);
    assert_eq!(pacer.waits, 5);

    let attempts = transport.attempts().await;
    let recipients: Vec<i64> = attempts.iter().map(Sent::recipient).collect();
    assert_eq!(recipients, vec![1, 2, 3, 4, 5]);

    let history = store.recent_records(10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(report.record_id, Some(history[0].id));
    assert_eq!(history[0].text, "Hello");
    assert_eq!(history[0].image_ref, None);
    assert_eq!(history[0].success_count, 3);
    assert_eq!(history[0].failure_count, 2);
}

#[tokio::test]
async fn one_record_even_when_every_send_fails() {
    let store = setup_store().await;
    seed(&store, &[7, 8]).await;
    let transport = RecordingTransport::failing_for(&[7, 8]);
    let engine = engine(&store, &transport);

    let permit = engine.try_acquire().unwrap();
    let recipients = engine.snapshot().await.unwrap();
    let report = engine.deliver(&permit, &recipients, &text_draft("nobody")).await;
    assert_eq!(report.success_count, 0);
    assert_eq!(report.failure_count, 2);

    let history = store.recent_records(10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].success_count, 0);
}

#[tokio::test]
async fn empty_registry_still_records_the_run() {
    let store = setup_store().await;
    let transport = RecordingTransport::default();
    let engine = engine(&store, &transport);

    let permit = engine.try_acquire().unwrap();
    let recipients = engine.snapshot().await.unwrap();
    assert!(recipients.is_empty());
    let report = engine.deliver(&permit, &recipients, &text_draft("void")).await;
    assert_eq!(report.attempted(), 0);
    assert!(transport.attempts().await.is_empty());
    assert_eq!(store.recent_records(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn image_drafts_use_photo_with_caption() {
    let store = setup_store().await;
    seed(&store, &[1, 2]).await;
    let transport = RecordingTransport::default();
    let engine = engine(&store, &transport);

    let draft = Draft {
        text: "Sale!".into(),
        image_ref: Some("photo-file-id".into()),
    };
    let permit = engine.try_acquire().unwrap();
    let recipients = engine.snapshot().await.unwrap();
    engine.deliver(&permit, &recipients, &draft).await;

    for sent in transport.attempts().await {
        match sent {
            Sent::Image {
                image_ref, caption, ..
            } => {
                assert_eq!(image_ref, "photo-file-id");
                assert_eq!(caption, "Sale!");
            }
            other => panic!("expected photo send, got {:?}", other),
        }
    }
    let history = store.recent_records(1).await.unwrap();
    assert_eq!(history[0].image_ref.as_deref(), Some("photo-file-id"));
}

#[tokio::test]
async fn counts_survive_a_failed_history_write() {
    let store = setup_store().await;
    seed(&store, &[1, 2, 3]).await;
    let transport = RecordingTransport::failing_for(&[3]);
    let history = BrokenHistory::default();
    let engine = engine_with_history(&store, Arc::new(history.clone()), &transport);

    let permit = engine.try_acquire().unwrap();
    let recipients = engine.snapshot().await.unwrap();
    let report = engine.deliver(&permit, &recipients, &text_draft("Hello")).await;

    assert_eq!(transport.attempts().await.len(), 3);
    assert_eq!(history.appends().await, 1);
    assert_eq!(report.record_id, None);
    assert_eq!(report.success_count, 2);
    assert_eq!(report.failure_count, 1);
}

#[tokio::test]
async fn run_sweeps_the_given_snapshot_only() {
    let store = setup_store().await;
    seed(&store, &[1, 2]).await;
    let transport = RecordingTransport::default();
    let engine = engine(&store, &transport);

    let permit = engine.try_acquire().unwrap();
    let recipients = engine.snapshot().await.unwrap();
    seed(&store, &[3]).await;
    let report = engine.deliver(&permit, &recipients, &text_draft("late")).await;

    assert_eq!(report.attempted(), 2);
    assert!(transport.attempts_to(3).await.is_empty());
}

#[tokio::test]
async fn only_one_run_at_a_time() {
    let store = setup_store().await;
    let transport = RecordingTransport::default();
    let engine = engine(&store, &transport);

    let permit = engine.try_acquire().unwrap();
    assert!(engine.try_acquire().is_none());
    drop(permit);
    assert!(engine.try_acquire().is_some());
}
