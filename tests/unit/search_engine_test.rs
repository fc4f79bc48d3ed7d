use chrono::{Duration, TimeZone, Utc};
use rstest::{fixture, rstest};

use shaare_store::managers::bookmark_index::BookmarkIndex;
use shaare_store::services::search_engine::{SearchEngine, SearchEngineTrait};
use shaare_store::types::bookmark::BookmarkDraft;
use shaare_store::types::collection::BookmarkCollection;
use shaare_store::types::render::{BookmarkView, HIGHLIGHT_CLOSE, HIGHLIGHT_OPEN};
use shaare_store::types::search::{Field, Pagination, SearchRequest, Visibility};

struct Corpus {
    collection: BookmarkCollection,
    index: BookmarkIndex,
    engine: SearchEngine,
}

impl Corpus {
    fn run(&self, request: SearchRequest, scope: Visibility) -> Vec<u64> {
        self.engine
            .search(&self.collection, &self.index, &request, scope)
            .ids()
    }
}

/// Ids 1..=6, created one day apart so that id order is creation order.
#[fixture]
fn corpus() -> Corpus {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let drafts = vec![
        BookmarkDraft::new("https://www.rust-lang.org", "The Rust Programming Language")
            .with_description("A language empowering everyone")
            .with_tags(["rust", "lang"]),
        BookmarkDraft::new("https://go.dev", "Go")
            .with_description("Build simple, secure, scalable systems")
            .with_tags(["go", "lang"]),
        BookmarkDraft::new("https://docs.rs", "Docs.rs")
            .with_description("Rust crate documentation")
            .with_tags(["rust", "docs"])
            .private(true),
        BookmarkDraft::new("", "Shopping list")
            .with_description("eggs, milk, \"fresh bread\""),
        BookmarkDraft::new("https://blog.example/async", "Async in depth")
            .with_description("Futures and executors in Rust")
            .with_tags(["rust", "async", ".toread"]),
        BookmarkDraft::new("https://pinned.example", "Pinned announcement")
            .with_tags(["meta"])
            .sticky(true),
    ];
    let mut collection = BookmarkCollection::new();
    for (i, draft) in drafts.into_iter().enumerate() {
        collection.insert_draft(draft, base + Duration::days(i as i64));
    }
    let index = BookmarkIndex::build(&collection);
    Corpus {
        collection,
        index,
        engine: SearchEngine::default(),
    }
}

// === Listing order ===

#[rstest]
fn empty_request_lists_sticky_first_then_newest(corpus: Corpus) {
    assert_eq!(
        corpus.run(SearchRequest::new(), Visibility::All),
        vec![6, 5, 4, 3, 2, 1]
    );
}

#[rstest]
fn ignore_sticky_orders_by_date_only(corpus: Corpus) {
    let mut corpus = corpus;
    if let Some(b) = corpus.collection.bookmarks.get_mut(&1) {
        b.sticky = true;
    }
    corpus.index = BookmarkIndex::build(&corpus.collection);
    assert_eq!(
        corpus.run(SearchRequest::new(), Visibility::All)[..2].to_vec(),
        vec![6, 1]
    );
    assert_eq!(
        corpus.run(SearchRequest::new().ignore_sticky(true), Visibility::All),
        vec![6, 5, 4, 3, 2, 1]
    );
}

// === Tags ===

#[rstest]
#[case(&["rust"], vec![5, 3, 1])]
#[case(&["RUST", "lang"], vec![1])]
#[case(&["rust", "-async"], vec![3, 1])]
#[case(&["lang", "docs"], vec![])]
#[case(&["unknown"], vec![])]
#[case(&["-rust"], vec![6, 4, 2])]
fn tag_filters_are_anded(corpus: Corpus, #[case] tags: &[&str], #[case] expected: Vec<u64>) {
    let request = SearchRequest::new().tags(tags.iter().copied());
    assert_eq!(corpus.run(request, Visibility::All), expected);
}

#[rstest]
fn tags_in_one_string_are_split(corpus: Corpus) {
    let request = SearchRequest::new().tags(["rust lang"]);
    assert_eq!(corpus.run(request, Visibility::All), vec![1]);
}

#[rstest]
fn untagged_only(corpus: Corpus) {
    let request = SearchRequest::new().untagged_only(true);
    assert_eq!(corpus.run(request, Visibility::All), vec![4]);
}

#[rstest]
fn hidden_tag_search_is_private_to_logged_in_users(corpus: Corpus) {
    let request = SearchRequest::new().tags([".toread"]);
    assert_eq!(corpus.run(request.clone(), Visibility::All), vec![5]);
    assert!(corpus.run(request, Visibility::Public).is_empty());
}

// === Visibility ===

#[rstest]
#[case(Visibility::All, vec![6, 5, 4, 3, 2, 1])]
#[case(Visibility::Public, vec![6, 5, 4, 2, 1])]
#[case(Visibility::Private, vec![3])]
fn visibility_scope(corpus: Corpus, #[case] scope: Visibility, #[case] expected: Vec<u64>) {
    assert_eq!(corpus.run(SearchRequest::new(), scope), expected);
}

// === Full text ===

#[rstest]
#[case("rust", vec![5, 3, 1])]
#[case("RUST crate", vec![3])]
#[case("rust -futures", vec![3, 1])]
#[case("\"fresh bread\"", vec![4])]
#[case("\"bread fresh\"", vec![])]
#[case("go.dev", vec![2])]
#[case("async", vec![5])]
#[case("rust < zzz", vec![])]
#[case("rust <zzz", vec![])]
fn full_text_terms(corpus: Corpus, #[case] term: &str, #[case] expected: Vec<u64>) {
    assert_eq!(corpus.run(SearchRequest::new().term(term), Visibility::All), expected);
}

#[rstest]
fn full_text_ignores_highlight_markup_in_query(corpus: Corpus) {
    let term = format!("{}Futures{} <em>executors</em>", HIGHLIGHT_OPEN, HIGHLIGHT_CLOSE);
    assert_eq!(corpus.run(SearchRequest::new().term(&term), Visibility::All), vec![5]);
}

#[rstest]
fn full_text_and_tags_combine(corpus: Corpus) {
    let request = SearchRequest::new().tags(["lang"]).term("systems");
    assert_eq!(corpus.run(request, Visibility::All), vec![2]);
}

#[rstest]
fn highlights_do_not_touch_stored_records(corpus: Corpus) {
    let before = corpus.collection.clone();
    let result = corpus.engine.search(
        &corpus.collection,
        &corpus.index,
        &SearchRequest::new().term("language"),
        Visibility::All,
    );
    assert_eq!(result.ids(), vec![1]);
    assert_eq!(corpus.collection, before);

    let spans = &result.highlights[&1];
    assert_eq!(spans.len(), 1);
    assert!(spans.contains_key(&Field::Title));
    let view = BookmarkView::new(&result.bookmarks[0], result.highlights.get(&1));
    assert_eq!(
        view.highlighted_title(),
        format!(
            "The Rust Programming {}Language{}",
            HIGHLIGHT_OPEN, HIGHLIGHT_CLOSE
        )
    );
    assert_eq!(result.bookmarks[0].title, "The Rust Programming Language");
}

// === Pagination ===

#[rstest]
fn pagination_windows(corpus: Corpus) {
    let all = corpus.run(SearchRequest::new(), Visibility::All);
    let first = corpus.engine.search(
        &corpus.collection,
        &corpus.index,
        &SearchRequest::new().paginate(Pagination::page(1, 4)),
        Visibility::All,
    );
    let second = corpus.engine.search(
        &corpus.collection,
        &corpus.index,
        &SearchRequest::new().paginate(Pagination::page(2, 4)),
        Visibility::All,
    );
    assert_eq!(first.total_count, 6);
    assert_eq!(second.total_count, 6);
    assert_eq!(first.ids(), all[..4].to_vec());
    assert_eq!(second.ids(), all[4..].to_vec());
    assert_eq!(second.page(), 2);
    assert_eq!(second.last_page(), 2);
    assert!(second.is_last_page());
}

#[rstest]
fn offset_beyond_end_is_empty_page_with_total(corpus: Corpus) {
    let result = corpus.engine.search(
        &corpus.collection,
        &corpus.index,
        &SearchRequest::new().paginate(Pagination::new(100, 10)),
        Visibility::All,
    );
    assert!(result.bookmarks.is_empty());
    assert_eq!(result.total_count, 6);
}

#[rstest]
fn search_on_empty_collection(#[values(Visibility::All, Visibility::Public)] scope: Visibility) {
    let collection = BookmarkCollection::new();
    let index = BookmarkIndex::build(&collection);
    let result = SearchEngine::default().search(
        &collection,
        &index,
        &SearchRequest::new().term("anything"),
        scope,
    );
    assert_eq!(result.total_count, 0);
    assert!(result.highlights.is_empty());
}

#[rstest]
fn custom_separator_splits_tag_queries(corpus: Corpus) {
    let engine = SearchEngine::new("|");
    let request = SearchRequest::new().tags(["rust|lang"]);
    let result = engine.search(&corpus.collection, &corpus.index, &request, Visibility::All);
    assert_eq!(result.ids(), vec![1]);
}
