use criterion::{Criterion, criterion_group, criterion_main};
use doc_store::{DocumentStore, InMemoryDocumentStore, StorePath, Version, WriteIntent};

fn bench_single_path_commit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("doc_store/single_path_commit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryDocumentStore::new();
                let path = StorePath::parse("users/1").unwrap();
                store
                    .commit(vec![WriteIntent::put(
                        path,
                        Version::initial(),
                        serde_json::json!({"balance": 1000}),
                    )])
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_two_path_commit_chain(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("doc_store/two_path_commit_chain_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryDocumentStore::new();
                let user = StorePath::parse("users/1").unwrap();
                let item = StorePath::parse("categories/steam/items/a").unwrap();
                let mut version = Version::initial();
                for i in 0..100 {
                    store
                        .commit(vec![
                            WriteIntent::put(user.clone(), version, serde_json::json!(i)),
                            WriteIntent::put(item.clone(), version, serde_json::json!(i)),
                        ])
                        .await
                        .unwrap();
                    version = version.next();
                }
            });
        });
    });
}

fn bench_read_after_writes(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryDocumentStore::new();
    let path = StorePath::parse("users/1").unwrap();
    rt.block_on(async {
        store
            .commit(vec![WriteIntent::put(
                path.clone(),
                Version::initial(),
                serde_json::json!({"balance": 1000}),
            )])
            .await
            .unwrap();
    });

    c.bench_function("doc_store/read", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.read(&path).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_single_path_commit,
    bench_two_path_commit_chain,
    bench_read_after_writes
);
criterion_main!(benches);
