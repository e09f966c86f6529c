use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::de::DeserializeOwned;
use serde_json::json;
use services::{Api, AppConfig, AppServices, Claims, Clock, OpenGate};
use storage::repository::{
    CatalogWriter, ProgressFilter, ProgressStore, Storage, UserRepository, WordFilter, WordSource,
};
use vocab_core::model::{CatalogScope, User, UserId, WordEntry, WordKey, WordStatus};
use vocab_core::time::fixed_now;

const SECRET: &[u8] = b"flow-secret";

fn word(category: &str, subcategory: &str, id: u32) -> WordEntry {
    WordEntry {
        local_id: id,
        category: category.into(),
        subcategory: subcategory.into(),
        word: format!("word{id}"),
        meaning: format!("meaning{id}"),
        example: String::new(),
        example_cn: String::new(),
        phonetic: None,
        audio: None,
        part_of_speech: Vec::new(),
        example_audio: None,
    }
}

fn req<T: DeserializeOwned>(value: serde_json::Value) -> T {
    serde_json::from_value(value).unwrap()
}

fn api_at(storage: &Storage, clock: Clock) -> Api {
    Api::new(AppServices::with_jwt(
        storage,
        clock,
        SECRET,
        Arc::new(OpenGate),
    ))
}

async fn setup() -> (Storage, User, String) {
    let storage = Storage::in_memory();
    storage
        .catalog
        .import_words(&[word("cet4", "a", 1), word("cet4", "a", 2), word("cet4", "a", 3)])
        .await
        .unwrap();
    let user = User::new(UserId::generate(), "reader@example.com", fixed_now()).unwrap();
    storage.users.insert_user(&user).await.unwrap();

    let claims = Claims {
        id: user.id.to_string(),
        exp: 4_102_444_800,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap();
    (storage, user, format!("Bearer {token}"))
}

#[tokio::test]
async fn marking_splits_known_and_unmarked() {
    let (storage, _user, token) = setup().await;
    let api = api_at(&storage, Clock::fixed(fixed_now()));

    let marked = api
        .mark(
            &token,
            req(json!({"category": "cet4", "subcategory": "a", "id": 2, "status": "known"})),
        )
        .await;
    assert_eq!(marked.code, 200);
    assert_eq!(marked.data.unwrap().status, WordStatus::Known);

    let known = api
        .words(&token, req(json!({"status": "known"})))
        .await
        .data
        .unwrap();
    let ids: Vec<u32> = known.list.iter().map(|r| r.word.local_id).collect();
    assert_eq!(ids, vec![2]);
    assert_eq!(known.pagination.total, 1);

    let unmarked = api
        .words(&token, req(json!({"status": "unmarked", "subcategory": "a"})))
        .await
        .data
        .unwrap();
    let ids: Vec<u32> = unmarked.list.iter().map(|r| r.word.local_id).collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(unmarked.pagination.total, 2);
    assert!(unmarked.list.iter().all(|r| r.status == WordStatus::Unmarked));

    let stats = api
        .stats(&token, req(json!({"subcategory": "a"})))
        .await
        .data
        .unwrap();
    assert_eq!((stats.total, stats.known, stats.unknown, stats.unmarked), (3, 1, 0, 2));
}

#[tokio::test]
async fn marking_twice_keeps_one_overlay() {
    let (storage, user, token) = setup().await;
    let start = fixed_now();
    let body = |id: u32| json!({"category": "cet4", "subcategory": "a", "id": id, "status": "known"});

    assert_eq!(api_at(&storage, Clock::fixed(start)).mark(&token, req(body(1))).await.code, 200);
    let later = api_at(&storage, Clock::fixed(start + Duration::minutes(1)));
    assert_eq!(later.mark(&token, req(body(2))).await.code, 200);

    let key = WordKey::new("cet4", "a", 1);
    let before = ProgressStore::fetch_one(storage.progress.as_ref(), user.id, &key)
        .await
        .unwrap();
    let again = api_at(&storage, Clock::fixed(start + Duration::minutes(2)));
    assert_eq!(again.mark(&token, req(body(1))).await.code, 200);
    let after = ProgressStore::fetch_one(storage.progress.as_ref(), user.id, &key)
        .await
        .unwrap();
    assert_eq!(before, after);

    let count = storage
        .progress
        .count_by_status(user.id, &ProgressFilter::all())
        .await
        .unwrap();
    assert_eq!(count.known, 2);

    let feed = again
        .words(&token, req(json!({"status": "all"})))
        .await
        .data
        .unwrap();
    let ids: Vec<u32> = feed.list.iter().map(|r| r.word.local_id).collect();
    assert_eq!(ids, vec![2, 1]);
}

#[tokio::test]
async fn unmarking_a_clean_word_leaves_no_overlay() {
    let (storage, user, token) = setup().await;
    let api = api_at(&storage, Clock::fixed(fixed_now()));
    let key = WordKey::new("cet4", "a", 3);

    api.mark(
        &token,
        req(json!({"category": "cet4", "subcategory": "a", "id": 3, "status": "unknown"})),
    )
    .await;
    let back = api
        .mark(
            &token,
            req(json!({"category": "cet4", "subcategory": "a", "id": 3, "status": "unmarked"})),
        )
        .await;
    assert_eq!(back.code, 200);
    assert_eq!(back.data.unwrap().status, WordStatus::Unmarked);

    let overlay = ProgressStore::fetch_one(storage.progress.as_ref(), user.id, &key)
        .await
        .unwrap();
    assert!(overlay.is_none());
}

#[tokio::test]
async fn mistakes_are_recorded_then_cleared() {
    let (storage, user, token) = setup().await;
    let api = api_at(&storage, Clock::fixed(fixed_now()));

    let recorded = api
        .record_mistakes(
            &token,
            req(json!({
                "category": "cet4", "subcategory": "a", "id": 1,
                "mistakes": ["2023-11-13", "2023-11-14"]
            })),
        )
        .await
        .data
        .unwrap();
    assert_eq!(recorded.status, WordStatus::Unmarked);
    assert_eq!(recorded.mistakes.len(), 2);

    let totals = api.totals(&token).await.data.unwrap();
    assert_eq!((totals.mistake_count, totals.learned_count), (1, 0));

    let on_day = api
        .mistakes(&token, req(json!({"dates": ["2023-11-13"]})))
        .await
        .data
        .unwrap();
    assert_eq!(on_day.list.len(), 1);

    let cleared = api
        .clear_mistakes(
            &token,
            req(json!({"words": [{"category": "cet4", "subcategory": "a", "id": 1}]})),
        )
        .await
        .data
        .unwrap();
    assert_eq!((cleared.deleted_count, cleared.updated_count), (1, 0));

    let feed = api.mistakes(&token, req(json!({}))).await.data.unwrap();
    assert!(feed.list.is_empty());
    let key = WordKey::new("cet4", "a", 1);
    let left = ProgressStore::fetch_one(storage.progress.as_ref(), user.id, &key)
        .await
        .unwrap();
    assert!(left.is_none());
}

#[tokio::test]
async fn all_status_feed_is_newest_first_across_catalogs() {
    let (storage, _user, token) = setup().await;
    let start = fixed_now();
    let api = api_at(&storage, Clock::fixed(start));

    let created = api
        .create_custom_category(
            &token,
            req(json!({
                "category": "mine", "categoryName": "Mine",
                "subcategory": "travel", "subcategoryName": "Travel", "emoji": "x",
                "words": [{"word": "gate", "meaning": "door"}]
            })),
        )
        .await;
    assert_eq!(created.code, 200);

    api.mark(
        &token,
        req(json!({"category": "cet4", "subcategory": "a", "id": 1, "status": "known"})),
    )
    .await;
    let later = api_at(&storage, Clock::fixed(start + Duration::hours(1)));
    later
        .mark(
            &token,
            req(json!({
                "category": "mine", "subcategory": "travel", "id": 1,
                "custom": true, "status": "unknown"
            })),
        )
        .await;

    let feed = api
        .words(&token, req(json!({"status": "all"})))
        .await
        .data
        .unwrap();
    let order: Vec<(&str, WordStatus)> = feed
        .list
        .iter()
        .map(|r| (r.word.category.as_str(), r.status))
        .collect();
    assert_eq!(order, vec![("mine", WordStatus::Unknown), ("cet4", WordStatus::Known)]);
    assert_eq!(feed.pagination.total, 2);
}

#[tokio::test]
async fn deleting_a_custom_category_cascades() {
    let (storage, user, token) = setup().await;
    let api = api_at(&storage, Clock::fixed(fixed_now()));

    api.create_custom_category(
        &token,
        req(json!({
            "category": "mine", "categoryName": "Mine",
            "subcategory": "food", "subcategoryName": "Food", "emoji": "y",
            "words": [{"word": "rice", "meaning": "grain"}, {"word": "tea", "meaning": "drink"}]
        })),
    )
    .await;
    api.mark(
        &token,
        req(json!({
            "category": "mine", "subcategory": "food", "id": 2,
            "custom": true, "status": "known"
        })),
    )
    .await;

    let report = api
        .delete_custom_category(&token, req(json!({"category": "mine", "subcategory": "food"})))
        .await
        .data
        .unwrap();
    assert_eq!((report.words_deleted, report.overlays_deleted), (2, 1));

    let scope = CatalogScope::Custom(user.id);
    let words = WordSource::count(storage.words.as_ref(), scope, &WordFilter::all())
        .await
        .unwrap();
    assert_eq!(words, 0);
    assert!(api.custom_categories(&token).await.data.unwrap().is_empty());

    let again = api
        .delete_custom_category(&token, req(json!({"category": "mine", "subcategory": "food"})))
        .await;
    assert_eq!(again.code, 404);
}

#[tokio::test]
async fn rejects_bad_tokens_and_bad_input() {
    let (storage, _user, token) = setup().await;
    let api = api_at(&storage, Clock::fixed(fixed_now()));

    let anon = api.words("Bearer nonsense", req(json!({"status": "known"}))).await;
    assert_eq!(anon.code, 301);
    assert!(!anon.success);
    assert!(anon.data.is_none());

    let bad_status = api.words(&token, req(json!({"status": "maybe"}))).await;
    assert_eq!(bad_status.code, 400);

    let missing = api
        .mark(
            &token,
            req(json!({"category": "cet4", "subcategory": "a", "id": 99, "status": "known"})),
        )
        .await;
    assert_eq!(missing.code, 404);

    let empty_clear = api.clear_mistakes(&token, req(json!({"words": []}))).await;
    assert_eq!(empty_clear.code, 400);
}

#[tokio::test]
async fn check_ins_default_to_today() {
    let (storage, _user, token) = setup().await;
    let api = api_at(&storage, Clock::fixed(fixed_now()));

    let first = api.check_in(&token, req(json!({}))).await.data.unwrap();
    assert!(first.added);
    let repeat = api
        .check_in(&token, req(json!({"date": "2023-11-14"})))
        .await
        .data
        .unwrap();
    assert!(!repeat.added);
    let days = api.check_ins(&token).await.data.unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].to_string(), "2023-11-14");
}

#[tokio::test]
async fn configured_page_size_applies_when_request_has_none() {
    let (storage, _user, token) = setup().await;
    let config = AppConfig::from_lookup(|name| match name {
        "VOCAB_JWT_SECRET" => Some("flow-secret".into()),
        "VOCAB_DEFAULT_LIMIT" => Some("2".into()),
        _ => None,
    })
    .unwrap();
    let api = Api::new(AppServices::with_config(
        &storage,
        Clock::fixed(fixed_now()),
        &config,
        Arc::new(OpenGate),
    ));

    let page = api
        .words(&token, req(json!({"status": "unmarked"})))
        .await
        .data
        .unwrap();
    assert_eq!(page.list.len(), 2);
    assert_eq!(page.pagination.limit, 2);
    assert_eq!(page.pagination.total, 3);
    assert_eq!(page.pagination.pages, 2);
}
