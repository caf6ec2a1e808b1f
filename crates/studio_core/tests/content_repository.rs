use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use studio_core::repo::StoreResult;
use studio_core::{
    BlogPost, BlogPostDraft, ContentRepository, ContentStore, FsContentStore, PageCache, PagePath,
    PageData, RepositoryError, SessionKeys, SiteConfig, SqliteContentStore, StoreBackend,
    StoreError,
};

const SECRET: &str = "repository-test-secret";

fn keys() -> Arc<SessionKeys> {
    Arc::new(SessionKeys::new(SECRET))
}

fn admin_token() -> String {
    SessionKeys::new(SECRET)
        .issue("admin@example.com", chrono::Utc::now().timestamp())
        .unwrap()
}

fn config(vars: &[(&str, String)]) -> SiteConfig {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect();
    SiteConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

fn path_str(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

fn draft(slug: &str) -> BlogPostDraft {
    BlogPostDraft {
        slug: slug.to_string(),
        title: "Hello".to_string(),
        date: "2024-03-05".to_string(),
        tags: vec!["a".to_string(), "b".to_string()],
        cover: String::new(),
        content: "First line\nSecond line".to_string(),
    }
}

#[test]
fn configured_primary_never_falls_through_to_fallback() {
    let content_dir = tempfile::tempdir().unwrap();
    let db_dir = tempfile::tempdir().unwrap();
    fs::write(content_dir.path().join("welcome.json"), r#"{"title":"from disk"}"#).unwrap();

    let config = config(&[
        ("STUDIO_DATABASE_URL", format!("sqlite://{}", path_str(&db_dir.path().join("studio.db")))),
        ("STUDIO_CONTENT_DIR", path_str(content_dir.path())),
    ]);
    let cache = Arc::new(PageCache::new());
    let repo = ContentRepository::from_config(&config, keys(), cache).unwrap();

    assert_eq!(repo.backend(), StoreBackend::Primary);
    assert_eq!(repo.read("welcome").unwrap(), None);

    let token = admin_token();
    repo.write(Some(&token), "welcome", &json!({ "title": "from db" }))
        .unwrap();
    assert_eq!(
        repo.read("welcome").unwrap(),
        Some(json!({ "title": "from db" }))
    );
    assert_eq!(
        fs::read_to_string(content_dir.path().join("welcome.json")).unwrap(),
        r#"{"title":"from disk"}"#
    );
}

#[test]
fn unconfigured_primary_uses_only_fallback() {
    let content_dir = tempfile::tempdir().unwrap();
    let config = config(&[("STUDIO_CONTENT_DIR", path_str(content_dir.path()))]);
    let repo =
        ContentRepository::from_config(&config, keys(), Arc::new(PageCache::new())).unwrap();

    assert_eq!(repo.backend(), StoreBackend::Filesystem);
    let token = admin_token();
    repo.write(Some(&token), "beliefs.json", &json!([{ "title": "Clarity" }]))
        .unwrap();
    assert!(content_dir.path().join("beliefs.json").exists());
    assert_eq!(
        repo.read("beliefs").unwrap(),
        Some(json!([{ "title": "Clarity" }]))
    );
}

#[test]
fn read_only_fallback_reports_needs_configuration() {
    let content_dir = tempfile::tempdir().unwrap();
    let config = config(&[
        ("STUDIO_CONTENT_DIR", path_str(content_dir.path())),
        ("VERCEL", "1".to_string()),
    ]);
    let repo =
        ContentRepository::from_config(&config, keys(), Arc::new(PageCache::new())).unwrap();

    let err = repo
        .write(Some(&admin_token()), "theme", &json!({}))
        .unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::StorageUnavailable {
            needs_configuration: true,
            ..
        }
    ));
}

#[test]
fn broken_primary_is_unavailable_not_fallback() {
    let content_dir = tempfile::tempdir().unwrap();
    let not_a_db = content_dir.path().join("garbage.db");
    fs::write(&not_a_db, vec![0xAB; 4096]).unwrap();

    let config = config(&[
        ("DATABASE_URL", path_str(&not_a_db)),
        ("STUDIO_CONTENT_DIR", path_str(content_dir.path())),
    ]);
    let err = ContentRepository::from_config(&config, keys(), Arc::new(PageCache::new()))
        .err()
        .unwrap();
    assert!(matches!(
        err,
        RepositoryError::StorageUnavailable {
            needs_configuration: false,
            ..
        }
    ));
}

#[test]
fn unauthorized_writes_change_nothing_and_skip_invalidation() {
    let store = SqliteContentStore::try_new(studio_core::db::open_db_in_memory().unwrap()).unwrap();
    let cache = Arc::new(PageCache::new());
    let repo = ContentRepository::new(Box::new(store), keys(), cache.clone());
    let token = admin_token();
    repo.write(Some(&token), "welcome", &json!({ "title": "kept" }))
        .unwrap();
    repo.create_post(Some(&token), &draft("kept")).unwrap();
    cache.take_stale();

    let forged = SessionKeys::new("someone-else")
        .issue("admin@example.com", chrono::Utc::now().timestamp())
        .unwrap();
    for session in [None, Some("garbage"), Some(forged.as_str())] {
        assert!(matches!(
            repo.write(session, "welcome", &json!({ "title": "overwritten" })),
            Err(RepositoryError::Unauthorized)
        ));
        assert!(matches!(
            repo.create_post(session, &draft("intruder")),
            Err(RepositoryError::Unauthorized)
        ));
        assert!(matches!(
            repo.update_post(session, "kept", &draft("kept")),
            Err(RepositoryError::Unauthorized)
        ));
        assert!(matches!(
            repo.delete_post(session, "kept"),
            Err(RepositoryError::Unauthorized)
        ));
    }

    assert_eq!(
        repo.read("welcome").unwrap(),
        Some(json!({ "title": "kept" }))
    );
    assert!(repo.get_post("intruder").unwrap().is_none());
    assert!(repo.get_post("kept").unwrap().is_some());
    assert!(cache.take_stale().is_empty());
}

#[test]
fn validation_failures_are_rejected_before_storage() {
    let dir = tempfile::tempdir().unwrap();
    let repo = ContentRepository::new(
        Box::new(FsContentStore::new(dir.path())),
        keys(),
        Arc::new(PageCache::new()),
    );
    let token = admin_token();

    let mut untitled = draft("untitled");
    untitled.title = "  ".to_string();
    let mut bad_date = draft("bad-date");
    bad_date.date = "March fifth".to_string();

    for candidate in [untitled, bad_date, draft("has space")] {
        assert!(matches!(
            repo.create_post(Some(&token), &candidate),
            Err(RepositoryError::Validation(_))
        ));
    }
    assert!(matches!(
        repo.write(Some(&token), "../escape", &json!({})),
        Err(RepositoryError::Validation(_))
    ));
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn post_lifecycle_reports_duplicates_missing_posts_and_invalidates() {
    let store = SqliteContentStore::try_new(studio_core::db::open_db_in_memory().unwrap()).unwrap();
    let cache = Arc::new(PageCache::new());
    let repo = ContentRepository::new(Box::new(store), keys(), cache.clone());
    let token = admin_token();

    let created = repo.create_post(Some(&token), &draft("hello")).unwrap();
    assert_eq!(created.date, "2024-03-05");
    assert_eq!(created.tags, vec!["a".to_string(), "b".to_string()]);
    let stale = cache.take_stale();
    assert!(stale.contains(&PagePath::page("/blog/hello")));
    assert!(stale.contains(&PagePath::page("/admin/blog")));

    assert!(matches!(
        repo.create_post(Some(&token), &draft("hello")),
        Err(RepositoryError::DuplicateSlug(slug)) if slug == "hello"
    ));
    assert!(cache.take_stale().is_empty());

    let mut edit = draft("hello");
    edit.title = "Hello again".to_string();
    let updated = repo.update_post(Some(&token), "hello", &edit).unwrap();
    assert_eq!(updated.title, "Hello again");
    assert!(cache
        .take_stale()
        .contains(&PagePath::page("/admin/blog/edit/hello")));

    assert!(matches!(
        repo.update_post(Some(&token), "nobody", &edit),
        Err(RepositoryError::PostNotFound(slug)) if slug == "nobody"
    ));

    repo.delete_post(Some(&token), "hello").unwrap();
    assert!(repo.get_post("hello").unwrap().is_none());
    assert!(repo.list_posts().unwrap().is_empty());
    assert!(cache.is_stale("/blog/hello"));
}

#[test]
fn content_write_invalidates_dependent_pages() {
    let store = SqliteContentStore::try_new(studio_core::db::open_db_in_memory().unwrap()).unwrap();
    let cache = Arc::new(PageCache::new());
    let repo = ContentRepository::new(Box::new(store), keys(), cache.clone());

    repo.write(Some(&admin_token()), "logo", &json!({ "url": "/uploads/1_logo.png" }))
        .unwrap();
    for path in ["/", "/blog", "/admin/logo", "/development"] {
        assert!(cache.is_stale(path), "{path}");
    }
}

#[test]
fn site_content_and_page_data_come_from_the_selected_store() {
    let store = SqliteContentStore::try_new(studio_core::db::open_db_in_memory().unwrap()).unwrap();
    let repo = ContentRepository::new(Box::new(store), keys(), Arc::new(PageCache::new()));
    let token = admin_token();

    assert_eq!(repo.site_content().unwrap().footer.tagline, "A place to think clearly");
    repo.write(
        Some(&token),
        "site-content",
        &json!({ "footer": { "tagline": "Think slowly" } }),
    )
    .unwrap();
    let site = repo.site_content().unwrap();
    assert_eq!(site.footer.tagline, "Think slowly");
    assert_eq!(site.navigation.believe, "What We Believe");

    let empty = PageData::load(&repo).unwrap();
    assert!(empty.welcome.is_none());
    assert!(empty.beliefs.is_empty());
    assert!(empty.blog_posts.is_empty());

    repo.write(
        Some(&token),
        "beliefs",
        &json!([{ "title": "Clarity", "description": "See plainly", "icon": "eye" }]),
    )
    .unwrap();
    let mut older = draft("older");
    older.date = "2023-01-01".to_string();
    older.cover = "http://cdn.example.com/old.png".to_string();
    repo.create_post(Some(&token), &older).unwrap();
    repo.create_post(Some(&token), &draft("newer")).unwrap();

    let data = PageData::load(&repo).unwrap();
    assert_eq!(data.beliefs.len(), 1);
    assert_eq!(data.beliefs[0].icon, "eye");
    let slugs: Vec<&str> = data.blog_posts.iter().map(|p| p.slug.as_str()).collect();
    assert_eq!(slugs, vec!["newer", "older"]);
    assert_eq!(data.blog_posts[1].cover, "https://cdn.example.com/old.png");
    assert_eq!(data.blog_posts[0].excerpt, "First line Second line");
}

#[test]
fn blank_slug_is_derived_from_title() {
    let store = SqliteContentStore::try_new(studio_core::db::open_db_in_memory().unwrap()).unwrap();
    let repo = ContentRepository::new(Box::new(store), keys(), Arc::new(PageCache::new()));

    let mut untitled_slug = draft("");
    untitled_slug.title = "Notes on Clarity".to_string();
    let created = repo.create_post(Some(&admin_token()), &untitled_slug).unwrap();

    assert!(created.slug.starts_with("notes-on-clarity-"));
    assert!(repo.get_post(&created.slug).unwrap().is_some());
}

/// Commits writes to SQLite but cannot read posts back.
struct WriteOnlyPosts(SqliteContentStore);

impl ContentStore for WriteOnlyPosts {
    fn backend(&self) -> StoreBackend {
        self.0.backend()
    }
    fn get_content(&self, key: &str) -> StoreResult<Option<serde_json::Value>> {
        self.0.get_content(key)
    }
    fn set_content(&self, key: &str, value: &serde_json::Value) -> StoreResult<()> {
        self.0.set_content(key, value)
    }
    fn list_blog_posts(&self) -> StoreResult<Vec<BlogPost>> {
        self.0.list_blog_posts()
    }
    fn get_blog_post(&self, _slug: &str) -> StoreResult<Option<BlogPost>> {
        Err(StoreError::InvalidData("replica lagging".to_string()))
    }
    fn create_blog_post(&self, draft: &BlogPostDraft) -> StoreResult<()> {
        self.0.create_blog_post(draft)
    }
    fn update_blog_post(&self, slug: &str, draft: &BlogPostDraft) -> StoreResult<()> {
        self.0.update_blog_post(slug, draft)
    }
    fn delete_blog_post(&self, slug: &str) -> StoreResult<()> {
        self.0.delete_blog_post(slug)
    }
}

#[test]
fn committed_post_write_succeeds_even_when_read_back_fails() {
    let store = SqliteContentStore::try_new(studio_core::db::open_db_in_memory().unwrap()).unwrap();
    let cache = Arc::new(PageCache::new());
    let repo = ContentRepository::new(Box::new(WriteOnlyPosts(store)), keys(), cache.clone());
    let token = admin_token();

    let created = repo.create_post(Some(&token), &draft("hello")).unwrap();
    assert_eq!(created.slug, "hello");
    assert_eq!(created.title, "Hello");
    assert_eq!(created.tags, vec!["a".to_string(), "b".to_string()]);
    assert!(cache.is_stale("/blog/hello"));

    let mut edit = draft("ignored");
    edit.title = "Edited".to_string();
    let updated = repo.update_post(Some(&token), "hello", &edit).unwrap();
    assert_eq!(updated.slug, "hello");
    assert_eq!(updated.title, "Edited");

    let listed = repo.list_posts().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "Edited");
}

#[test]
fn every_listed_fallback_post_can_be_opened_and_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let blog = dir.path().join("blog");
    fs::create_dir_all(&blog).unwrap();
    let post = "---\ntitle: Old\ndate: 2021-01-01\n---\nText\n";
    fs::write(blog.join("My Post.md"), post).unwrap();
    fs::write(blog.join("old-post.md"), post).unwrap();

    let repo = ContentRepository::new(
        Box::new(FsContentStore::new(dir.path())),
        keys(),
        Arc::new(PageCache::new()),
    );
    let token = admin_token();
    for listed in repo.list_posts().unwrap() {
        assert!(repo.get_post(&listed.slug).unwrap().is_some());
        repo.delete_post(Some(&token), &listed.slug).unwrap();
    }
    assert!(repo.list_posts().unwrap().is_empty());
}
