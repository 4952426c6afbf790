//! End-to-end scenarios for the page tree and the URL rename cascade
//!
//! Tests cover:
//! - Subtree moves that change absolute URLs and rewrite stored content
//! - URL renames through `update_page` and their read-model refresh
//! - Raw-HTML sites where only `content_html` is rewritten
//! - Three-stage URL lookup against a populated site
//! - Persistence across a store close and reopen
//! - Structural consistency after longer operation sequences

use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use fiber_core::db::{DatabaseService, FiberStore, TursoStore};
use fiber_core::models::{
    ContentItem, InsertPosition, MovePosition, Page, PageContentItem, PageUpdate,
};
use fiber_core::services::{
    ContentItemService, CreatePageParams, EditorConfig, PageService, StaticRouteResolver,
};

#[cfg(test)]
mod tree_scenario_tests {
    use super::*;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_test_writer()
            .try_init();
    }

    async fn create_test_services() -> Result<(PageService, ContentItemService, TempDir)> {
        init_tracing();
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("scenarios.db");

        let db = Arc::new(DatabaseService::new(db_path).await?);
        let store = Arc::new(TursoStore::new(db));
        let routes = Arc::new(StaticRouteResolver::new());
        let pages = PageService::new(store.clone(), routes.clone());
        let content = ContentItemService::new(store, routes);
        Ok((pages, content, temp_dir))
    }

    async fn create_page(
        pages: &PageService,
        title: &str,
        url: &str,
        position: InsertPosition,
    ) -> Result<Page> {
        let page = pages
            .create_page(CreatePageParams::new(title, url, position))
            .await?;
        Ok(page)
    }

    fn markdown_item(name: &str, markup: &str) -> ContentItem {
        ContentItem::new(name.to_string(), markup.to_string(), String::new())
    }

    fn placement(page: &Page, item: &ContentItem, block: &str) -> PageContentItem {
        PageContentItem::new(page.id.clone(), item.id.clone(), block.to_string())
    }

    /// `home > section1 > abc > xyz` and `home > section2 > def`, with
    /// `def` carrying an absolute URL of its own.
    async fn create_two_section_site(pages: &PageService) -> Result<[Page; 6]> {
        let home = create_page(pages, "Home", "", InsertPosition::Root).await?;
        let section1 = create_page(
            pages,
            "Section 1",
            "section1",
            InsertPosition::LastChildOf(home.id.clone()),
        )
        .await?;
        let section2 = create_page(
            pages,
            "Section 2",
            "section2",
            InsertPosition::LastChildOf(home.id.clone()),
        )
        .await?;
        let abc = create_page(
            pages,
            "Abc",
            "abc",
            InsertPosition::LastChildOf(section1.id.clone()),
        )
        .await?;
        let xyz = create_page(
            pages,
            "Xyz",
            "xyz",
            InsertPosition::LastChildOf(abc.id.clone()),
        )
        .await?;
        let def = create_page(
            pages,
            "Def",
            "/def/",
            InsertPosition::LastChildOf(section2.id.clone()),
        )
        .await?;
        Ok([home, section1, section2, abc, xyz, def])
    }

    // =========================================================================
    // Subtree Moves and the Rename Cascade
    // =========================================================================

    #[tokio::test]
    async fn test_move_rewrites_markdown_content_and_read_model() -> Result<()> {
        let (pages, content, _temp) = create_test_services().await?;
        let [_home, _section1, section2, abc, xyz, _def] =
            create_two_section_site(&pages).await?;

        let editor = EditorConfig::markdown();
        let item = content
            .create_content_item(
                markdown_item(
                    "Signpost",
                    "Go to [abc](/section1/abc/), [xyz](/section1/abc/xyz/) or [def](/def/).",
                ),
                &editor,
            )
            .await?;
        let bystander = content
            .create_content_item(markdown_item("Bystander", "Still [here](/section2/)."), &editor)
            .await?;
        pages.store().add_placement(placement(&xyz, &item, "main")).await?;

        pages
            .move_page(&abc.id, &section2.id, MovePosition::InsideAsFirstChild, &editor)
            .await?;

        let moved_abc = pages.get_page(&abc.id).await?.unwrap();
        let moved_xyz = pages.get_page(&xyz.id).await?.unwrap();
        assert_eq!(pages.absolute_url(&moved_abc).await?, "/section2/abc/");
        assert_eq!(pages.absolute_url(&moved_xyz).await?, "/section2/abc/xyz/");

        let rewritten = content.get_content_item(&item.id).await?.unwrap();
        assert!(rewritten.content_markup.contains("[abc](/section2/abc/)"));
        assert!(rewritten
            .content_markup
            .contains("[xyz](/section2/abc/xyz/)"));
        assert!(rewritten.content_markup.contains("[def](/def/)"));
        assert!(rewritten.content_html.contains("href=\"/section2/abc/\""));
        assert!(rewritten
            .content_html
            .contains("href=\"/section2/abc/xyz/\""));

        // Items without a matching reference keep their stored revision.
        let untouched = content.get_content_item(&bystander.id).await?.unwrap();
        assert_eq!(untouched.content_markup, bystander.content_markup);
        assert_eq!(untouched.updated_at, bystander.updated_at);

        // The placement read model already reflects the new location.
        let usage = content.used_on_pages(&rewritten).await?;
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].url, "/section2/abc/xyz/");
        assert_eq!(usage[0].title, "Xyz");
        Ok(())
    }

    #[tokio::test]
    async fn test_move_without_url_change_leaves_content_alone() -> Result<()> {
        let (pages, content, _temp) = create_test_services().await?;
        let [home, _section1, _section2, _abc, _xyz, def] =
            create_two_section_site(&pages).await?;

        let editor = EditorConfig::markdown();
        let item = content
            .create_content_item(
                markdown_item("Pinned", "The [def page](/def/) never moves."),
                &editor,
            )
            .await?;

        // `def` keeps its absolute URL wherever it sits in the tree.
        pages
            .move_page(&def.id, &home.id, MovePosition::InsideAsFirstChild, &editor)
            .await?;

        let moved = pages.get_page(&def.id).await?.unwrap();
        assert_eq!(pages.absolute_url(&moved).await?, "/def/");
        let stored = content.get_content_item(&item.id).await?.unwrap();
        assert_eq!(stored.content_markup, item.content_markup);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_page_url_cascades_to_descendant_references() -> Result<()> {
        let (pages, content, _temp) = create_test_services().await?;
        let home = create_page(&pages, "Home", "", InsertPosition::Root).await?;
        let blog = create_page(
            &pages,
            "Blog",
            "blog",
            InsertPosition::LastChildOf(home.id.clone()),
        )
        .await?;
        let post = create_page(
            &pages,
            "First Post",
            "first-post",
            InsertPosition::LastChildOf(blog.id.clone()),
        )
        .await?;

        let editor = EditorConfig::markdown();
        let item = content
            .create_content_item(
                markdown_item("Teaser", "Read the [first post](/blog/first-post/)!"),
                &editor,
            )
            .await?;
        pages.store().add_placement(placement(&post, &item, "main")).await?;
        // Materialize the read model so the rename has something to refresh.
        let before = content.used_on_pages(&item).await?;
        assert_eq!(before[0].url, "/blog/first-post/");

        pages
            .update_page(
                &blog.id,
                PageUpdate::new().with_url("journal".to_string()),
                &editor,
            )
            .await?;

        let renamed = pages.get_page(&blog.id).await?.unwrap();
        assert_eq!(pages.absolute_url(&renamed).await?, "/journal/");
        let rewritten = content.get_content_item(&item.id).await?.unwrap();
        assert!(rewritten
            .content_markup
            .contains("[first post](/journal/first-post/)"));

        let usage = content.used_on_pages(&rewritten).await?;
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].url, "/journal/first-post/");
        Ok(())
    }

    #[tokio::test]
    async fn test_title_only_update_does_not_touch_content() -> Result<()> {
        let (pages, content, _temp) = create_test_services().await?;
        let [_home, section1, ..] = create_two_section_site(&pages).await?;

        let editor = EditorConfig::markdown();
        let item = content
            .create_content_item(
                markdown_item("Link farm", "See [section one](/section1/)."),
                &editor,
            )
            .await?;

        pages
            .update_page(
                &section1.id,
                PageUpdate::new().with_title("Renamed Section".to_string()),
                &editor,
            )
            .await?;

        let stored = content.get_content_item(&item.id).await?.unwrap();
        assert_eq!(stored.content_markup, item.content_markup);
        assert_eq!(stored.updated_at, item.updated_at);
        Ok(())
    }

    #[tokio::test]
    async fn test_html_site_rewrites_rendered_content_only() -> Result<()> {
        let (pages, content, _temp) = create_test_services().await?;
        let home = create_page(&pages, "Home", "", InsertPosition::Root).await?;
        let a = create_page(
            &pages,
            "A",
            "a",
            InsertPosition::LastChildOf(home.id.clone()),
        )
        .await?;
        let b = create_page(&pages, "B", "b", InsertPosition::LastChildOf(a.id.clone()))
            .await?;

        // No renderer configured, the site stores hand-written HTML.
        let editor = EditorConfig::default();
        let raw = ContentItem::new(
            "Banner".to_string(),
            String::new(),
            "<p><a href=\"/a/b/\">deep link</a></p>".to_string(),
        );
        let item = content.create_content_item(raw, &editor).await?;

        pages
            .move_page(&b.id, &home.id, MovePosition::InsideAsFirstChild, &editor)
            .await?;

        let moved = pages.get_page(&b.id).await?.unwrap();
        assert_eq!(pages.absolute_url(&moved).await?, "/b/");
        let stored = content.get_content_item(&item.id).await?.unwrap();
        assert!(stored.content_html.contains("href=\"/b/\""));
        assert!(!stored.content_html.contains("/a/b/"));
        Ok(())
    }

    // =========================================================================
    // URL Lookup Against a Populated Site
    // =========================================================================

    #[tokio::test]
    async fn test_find_by_url_resolves_each_lookup_stage() -> Result<()> {
        init_tracing();
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("lookup.db");
        let db = Arc::new(DatabaseService::new(db_path).await?);
        let store = Arc::new(TursoStore::new(db));
        let routes = Arc::new(StaticRouteResolver::new().with_route("support", "/help/"));
        let pages = PageService::new(store, routes);

        let home = create_page(&pages, "Home", "", InsertPosition::Root).await?;
        let products = create_page(
            &pages,
            "Products",
            "products",
            InsertPosition::LastChildOf(home.id.clone()),
        )
        .await?;
        let widget = create_page(
            &pages,
            "Widget",
            "widget",
            InsertPosition::LastChildOf(products.id.clone()),
        )
        .await?;
        let support = create_page(
            &pages,
            "Support",
            "\"support\"",
            InsertPosition::LastChildOf(home.id.clone()),
        )
        .await?;

        // Stored-field match, derived match, and named-route match.
        let hit = pages.find_by_url("products").await?.unwrap();
        assert_eq!(hit.id, products.id);
        let hit = pages.find_by_url("/products/widget/").await?.unwrap();
        assert_eq!(hit.id, widget.id);
        let hit = pages.find_by_url("/help/").await?.unwrap();
        assert_eq!(hit.id, support.id);
        assert!(pages.find_by_url("/nowhere/").await?.is_none());
        Ok(())
    }

    // =========================================================================
    // Shutdown and Reopen
    // =========================================================================

    #[tokio::test]
    async fn test_pages_survive_store_close_and_reopen() -> Result<()> {
        init_tracing();
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("persist.db");

        let home_id = {
            let db = Arc::new(DatabaseService::new(db_path.clone()).await?);
            let store = Arc::new(TursoStore::new(db));
            let pages = PageService::new(store.clone(), Arc::new(StaticRouteResolver::new()));
            let home = create_page(&pages, "Home", "", InsertPosition::Root).await?;
            create_page(
                &pages,
                "News",
                "news",
                InsertPosition::LastChildOf(home.id.clone()),
            )
            .await?;
            store.close().await?;
            home.id
        };

        let db = Arc::new(DatabaseService::new(db_path).await?);
        let store = Arc::new(TursoStore::new(db));
        let pages = PageService::new(store, Arc::new(StaticRouteResolver::new()));
        let home = pages.get_page(&home_id).await?.unwrap();
        assert_eq!(home.title, "Home");
        let children = pages.get_children(&home).await?;
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].title, "News");
        pages.verify_tree(home.tree_id).await?;
        Ok(())
    }

    // =========================================================================
    // Structural Consistency Over Longer Sequences
    // =========================================================================

    #[tokio::test]
    async fn test_trees_stay_consistent_across_operation_sequence() -> Result<()> {
        let (pages, _content, _temp) = create_test_services().await?;
        let editor = EditorConfig::default();
        let [home, section1, section2, abc, xyz, def] =
            create_two_section_site(&pages).await?;
        let ghi = create_page(
            &pages,
            "Ghi",
            "ghi",
            InsertPosition::LastChildOf(section2.id.clone()),
        )
        .await?;
        let second = create_page(&pages, "Second Root", "", InsertPosition::Root).await?;

        pages
            .move_page(&abc.id, &section2.id, MovePosition::InsideAsFirstChild, &editor)
            .await?;
        pages
            .move_page(&ghi.id, &second.id, MovePosition::InsideAsFirstChild, &editor)
            .await?;
        pages
            .move_page(&def.id, &section1.id, MovePosition::InsideAsFirstChild, &editor)
            .await?;
        pages.delete_page(&xyz.id).await?;
        pages
            .move_page(&section1.id, &section2.id, MovePosition::After, &editor)
            .await?;

        for tree_id in pages.store().get_tree_ids().await? {
            pages.verify_tree(tree_id).await?;
        }

        // The forest still contains every surviving page exactly once.
        let mut survivors = Vec::new();
        for tree_id in pages.store().get_tree_ids().await? {
            for page in pages.store().get_tree_pages(tree_id).await? {
                survivors.push(page.id);
            }
        }
        survivors.sort();
        let mut expected = vec![
            home.id, section1.id, section2.id, abc.id, def.id, ghi.id, second.id,
        ];
        expected.sort();
        assert_eq!(survivors, expected);
        Ok(())
    }
}
