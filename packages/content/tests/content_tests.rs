use sitekit_common::{PageId, SiteError};
use sitekit_content::*;
use std::sync::{Arc, Barrier};
use std::thread;

fn hero(title: &str) -> Section {
    Section::new(
        "hero",
        0,
        SectionBody::Hero(HeroSection {
            title: title.to_string(),
            subtitle: None,
            background_image: None,
            cta: None,
        }),
    )
}

fn retitle(title: &str) -> DraftPatch {
    DraftPatch::UpdateSection {
        id: "hero".into(),
        body: hero(title).body,
    }
}

fn setup() -> (Arc<ContentStore>, PageId) {
    let store = Arc::new(ContentStore::default());
    let page = store
        .create_page(NewPage::new("joes", "home").with_sections(vec![hero("Joe's Pizza")]))
        .unwrap();
    (store, page.id)
}

#[test]
fn test_promote_round_trip_is_independent_of_later_edits() -> anyhow::Result<()> {
    let (store, page) = setup();
    store.mutate_draft(&page, 1, &retitle("Joe's Famous Pizza"), None)?;
    let draft_at_promotion = store.get_snapshot(&page, SnapshotKind::Draft)?;

    store.promote(&page, None)?;
    store.mutate_draft(&page, 2, &retitle("Something Else"), None)?;

    let published = store.get_snapshot(&page, SnapshotKind::Published)?;
    assert_eq!(published.sections, draft_at_promotion.sections);
    assert_eq!(published.based_on, Some(2));
    assert_eq!(published.version, 1);
    Ok(())
}

#[test]
fn test_published_reader_unaffected_by_promotion() -> anyhow::Result<()> {
    let (store, page) = setup();
    store.promote(&page, None)?;
    let held = store.get_snapshot(&page, SnapshotKind::Published)?;

    store.mutate_draft(&page, 1, &retitle("New"), None)?;
    store.promote(&page, None)?;

    assert_eq!(held.sections, vec![hero("Joe's Pizza")]);
    assert_eq!(
        store.get_snapshot(&page, SnapshotKind::Published)?.sections,
        vec![hero("New")]
    );
    Ok(())
}

#[test]
fn test_concurrent_mutations_on_same_base_exactly_one_wins() {
    let (store, page) = setup();
    let writers = 8;
    let barrier = Arc::new(Barrier::new(writers));

    let handles: Vec<_> = (0..writers)
        .map(|i| {
            let store = store.clone();
            let page = page.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store.mutate_draft(&page, 1, &retitle(&format!("writer {i}")), None)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(SiteError::Conflict { current_version: Some(2), .. })))
        .count();

    assert_eq!(winners, 1);
    assert_eq!(conflicts, writers - 1);
    assert_eq!(store.draft_version(&page).unwrap(), 2);
}

#[test]
fn test_revert_restores_published_and_advances_version() -> anyhow::Result<()> {
    let (store, page) = setup();
    store.promote(&page, None)?;
    store.mutate_draft(&page, 1, &retitle("Oops"), None)?;

    let reverted = store.revert_draft_to_published(&page, None)?;
    assert_eq!(reverted.version, 3);
    assert_eq!(reverted.sections, vec![hero("Joe's Pizza")]);

    // An editor still holding version 2 must not write over the revert
    let err = store.mutate_draft(&page, 2, &retitle("Stale"), None).unwrap_err();
    assert!(err.is_conflict());
    Ok(())
}

#[test]
fn test_revert_without_published_is_not_found() {
    let (store, page) = setup();
    let err = store.revert_draft_to_published(&page, None).unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert_eq!(store.draft_version(&page).unwrap(), 1);
}

#[test]
fn test_ingested_sections_compose() {
    let raw = serde_json::json!([
        { "id": "h", "order": 0, "kind": "hero", "title": "Joe's" },
        { "id": "m", "order": 1, "kind": "menu", "items": [] },
        { "id": "bad", "order": 2, "kind": "gallery", "images": "nope" },
        { "id": "r", "order": 3, "kind": "reviews", "reviews": [
            { "author": "Ann", "rating": 5 },
            { "author": "Bob", "rating": 0 }
        ]}
    ]);
    let serde_json::Value::Array(values) = raw else { unreachable!() };
    let (sections, errors) = sections_from_values(values);
    assert_eq!(errors.len(), 1);

    let store = ContentStore::default();
    let page = store
        .create_page(NewPage::new("joes", "home").with_sections(sections))
        .unwrap();
    let draft = store.get_snapshot(&page.id, SnapshotKind::Draft).unwrap();
    let model = compose(&draft);

    let ids: Vec<_> = model.sections.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["h", "m", "r"]);
    assert!(!model.sections[1].validated);

    let json = serde_json::to_value(&model).unwrap();
    assert_eq!(json["sections"][0]["kind"], "hero");
    assert_eq!(json["sections"][1]["items"], serde_json::json!([]));
    assert_eq!(json["mode"], "draft");
}
