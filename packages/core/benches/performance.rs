//! Performance benchmarks for Fiber core operations
//!
//! Run with: `cargo bench -p fiber-core`
//!
//! These benchmarks measure critical path performance:
//! - Page insertion under a growing parent (interval splice cost)
//! - Subtree relocation between sections (coordinate rewrite cost)
//! - URL lookup against a populated site (fragment + ancestor batching)
//! - Block reordering with dense renumbering

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fiber_core::db::{DatabaseService, TursoStore};
use fiber_core::models::{ContentItem, InsertPosition, MovePosition, Page};
use fiber_core::services::{
    ContentItemService, CreatePageParams, EditorConfig, PageService, PlacementService,
    StaticRouteResolver,
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::runtime::Runtime;

/// Setup a page service with a fresh database
async fn setup_page_service() -> (PageService, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("bench.db");

    let db = Arc::new(DatabaseService::new(db_path).await.unwrap());
    let store = Arc::new(TursoStore::new(db));
    let service = PageService::new(store, Arc::new(StaticRouteResolver::new()));
    (service, temp_dir)
}

/// Setup the full service stack for placement benchmarks
async fn setup_block_services() -> (PageService, ContentItemService, PlacementService, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("bench.db");

    let db = Arc::new(DatabaseService::new(db_path).await.unwrap());
    let store = Arc::new(TursoStore::new(db));
    let routes = Arc::new(StaticRouteResolver::new());
    let pages = PageService::new(store.clone(), routes.clone());
    let content = ContentItemService::new(store.clone(), routes.clone());
    let placements = PlacementService::new(store, routes);
    (pages, content, placements, temp_dir)
}

async fn create_page(
    service: &PageService,
    title: &str,
    url: &str,
    position: InsertPosition,
) -> Page {
    service
        .create_page(CreatePageParams::new(title, url, position))
        .await
        .unwrap()
}

/// Benchmark appending children under one parent
///
/// Measures the interval splice: every insert shifts the parent's right
/// endpoint and renumbers everything after the splice point.
/// Target: < 10ms per insert on a warm database
fn bench_page_inserts(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("insert_last_child", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (service, _temp) = setup_page_service().await;
                let root = create_page(&service, "Home", "", InsertPosition::Root).await;

                let start = std::time::Instant::now();
                for i in 0..iters {
                    let page = create_page(
                        &service,
                        &format!("Page {}", i),
                        &format!("page-{}", i),
                        InsertPosition::LastChildOf(root.id.clone()),
                    )
                    .await;
                    black_box(page);
                }
                start.elapsed()
            })
        });
    });
}

/// Benchmark moving a 30-page chapter between two sections
///
/// Measures the full move path: coordinate rewrite for the subtree, gap
/// closing at the source, and the URL cascade over an empty content table.
/// Target: < 50ms per move for a 30-page subtree
fn bench_subtree_moves(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("subtree_move");
    group.sample_size(10); // Fewer samples for expensive operations

    group.bench_function("move_30_page_chapter", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (service, _temp) = setup_page_service().await;
                let home = create_page(&service, "Home", "", InsertPosition::Root).await;
                let section_a = create_page(
                    &service,
                    "Section A",
                    "section-a",
                    InsertPosition::LastChildOf(home.id.clone()),
                )
                .await;
                let section_b = create_page(
                    &service,
                    "Section B",
                    "section-b",
                    InsertPosition::LastChildOf(home.id.clone()),
                )
                .await;
                let chapter = create_page(
                    &service,
                    "Chapter",
                    "chapter",
                    InsertPosition::LastChildOf(section_a.id.clone()),
                )
                .await;
                for i in 0..29 {
                    create_page(
                        &service,
                        &format!("Page {}", i),
                        &format!("page-{}", i),
                        InsertPosition::LastChildOf(chapter.id.clone()),
                    )
                    .await;
                }

                let editor = EditorConfig::default();
                let start = std::time::Instant::now();
                for i in 0..iters {
                    let target = if i % 2 == 0 { &section_b } else { &section_a };
                    service
                        .move_page(
                            &chapter.id,
                            &target.id,
                            MovePosition::InsideAsFirstChild,
                            &editor,
                        )
                        .await
                        .unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

/// Benchmark URL lookup on a site with colliding leaf segments
///
/// Four sections each carry a child whose URL ends in `guide`, so the
/// lookup has to derive candidate URLs through the batched ancestor cache.
/// Target: < 5ms per lookup
fn bench_url_lookup(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("find_by_url_derived", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (service, _temp) = setup_page_service().await;
                let home = create_page(&service, "Home", "", InsertPosition::Root).await;
                for i in 0..4 {
                    let section = create_page(
                        &service,
                        &format!("Section {}", i),
                        &format!("section-{}", i),
                        InsertPosition::LastChildOf(home.id.clone()),
                    )
                    .await;
                    create_page(
                        &service,
                        "Guide",
                        "guide",
                        InsertPosition::LastChildOf(section.id.clone()),
                    )
                    .await;
                }

                let start = std::time::Instant::now();
                for _ in 0..iters {
                    let hit = service.find_by_url("/section-2/guide/").await.unwrap();
                    black_box(hit.unwrap());
                }
                start.elapsed()
            })
        });
    });
}

/// Benchmark reordering within a 50-placement block
///
/// Alternates moving one placement to the front and back of the block, so
/// every move renumbers the full ordered list.
/// Target: < 20ms per reorder
fn bench_block_reorder(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("block_reorder");
    group.sample_size(20);

    group.bench_function("move_within_50_placements", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (pages, content, placements, _temp) = setup_block_services().await;
                let home = create_page(&pages, "Home", "", InsertPosition::Root).await;

                let editor = EditorConfig::default();
                let mut created = Vec::new();
                for i in 0..50 {
                    let item = content
                        .create_content_item(
                            ContentItem::new(
                                format!("Item {}", i),
                                String::new(),
                                format!("<p>Item {}</p>", i),
                            ),
                            &editor,
                        )
                        .await
                        .unwrap();
                    let placement = placements
                        .add_to_page(&home.id, &item.id, "main", None)
                        .await
                        .unwrap();
                    created.push(placement);
                }
                let first = &created[0];
                let mover = &created[49];

                let start = std::time::Instant::now();
                for i in 0..iters {
                    let before = if i % 2 == 0 { Some(first.id.as_str()) } else { None };
                    placements
                        .move_placement(&mover.id, before, None)
                        .await
                        .unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_page_inserts,
    bench_subtree_moves,
    bench_url_lookup,
    bench_block_reorder
);
criterion_main!(benches);
