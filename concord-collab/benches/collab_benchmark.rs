use concord_collab::activity::{ActivityEntry, ActivityKind, ActivityLog, ActivityQuery};
use concord_collab::broadcast::BroadcastHub;
use concord_collab::document::{Document, DocumentHandle, DocumentInfo, DocumentKind};
use concord_collab::event::{CollabEvent, Topic};
use concord_collab::operation::Operation;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;
use uuid::Uuid;

fn text_document(content: &str) -> Document {
    let info = DocumentInfo::new(Uuid::new_v4(), "bench", DocumentKind::Text, Uuid::new_v4());
    Document::new(info, content)
}

fn bench_transform_over_log(c: &mut Criterion) {
    let author = Uuid::new_v4();
    let log: Vec<Operation> = (0..100)
        .map(|i| match i % 3 {
            0 => Operation::insert(author, i * 2, "abc", 0),
            1 => Operation::delete(author, i, 2, 0),
            _ => Operation::replace(author, i, 1, "xy", 0),
        })
        .collect();

    c.bench_function("transform_over_100_ops", |b| {
        b.iter(|| {
            let mut op = Operation::delete(author, black_box(150), 10, 0);
            op.transform_over(black_box(&log));
            black_box(op);
        })
    });
}

fn bench_submit_stale(c: &mut Criterion) {
    let author = Uuid::new_v4();
    let seed = "lorem ipsum dolor sit amet ".repeat(40);

    c.bench_function("document_submit_stale_by_50", |b| {
        b.iter_batched(
            || {
                let mut doc = text_document(&seed);
                for v in 0..50 {
                    doc.submit(Operation::insert(author, v as usize, "q", v)).unwrap();
                }
                doc
            },
            |mut doc| {
                black_box(doc.submit(Operation::insert(author, 500, "late", 0)).unwrap());
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_actor_submit(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let hub = Arc::new(BroadcastHub::new(1024));
    let handle = rt.block_on(async { DocumentHandle::spawn(text_document(""), hub.clone()) });
    let author = Uuid::new_v4();

    c.bench_function("actor_submit_roundtrip", |b| {
        b.iter(|| {
            rt.block_on(async {
                let version = handle.snapshot().await.unwrap().version;
                black_box(handle.submit(Operation::insert(author, 0, "a", version)).await.unwrap());
            })
        })
    });
}

fn bench_broadcast_fan_out(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let hub = BroadcastHub::new(4096);
    let topic = Topic::Room(Uuid::new_v4());
    let _receivers: Vec<_> = rt.block_on(async {
        let mut out = Vec::new();
        for _ in 0..100 {
            out.push(hub.subscribe(topic).await);
        }
        out
    });
    let event = CollabEvent::MemberAdded { workspace_id: Uuid::new_v4(), user_id: Uuid::new_v4() };

    c.bench_function("broadcast_100_subscribers", |b| {
        b.iter(|| rt.block_on(async { black_box(hub.publish(topic, event.clone()).await) }))
    });
}

fn bench_activity_query(c: &mut Criterion) {
    let mut log = ActivityLog::new(1000);
    let users: Vec<Uuid> = (0..10).map(|_| Uuid::new_v4()).collect();
    for i in 0..1000 {
        log.log(ActivityEntry::new(ActivityKind::DocumentEdited, users[i % users.len()]));
    }
    let query = ActivityQuery { user: Some(users[3]), limit: Some(20), ..Default::default() };

    c.bench_function("activity_query_full_log", |b| {
        b.iter(|| black_box(log.query(black_box(&query))))
    });
}

criterion_group!(
    benches,
    bench_transform_over_log,
    bench_submit_stale,
    bench_actor_submit,
    bench_broadcast_fan_out,
    bench_activity_query,
);
criterion_main!(benches);
