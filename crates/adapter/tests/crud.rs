mod common;

use adapter::{AdapterError, CrudService, Params, Records};
use anyhow::Result;
use serde_json::json;

use common::{note_service, seeded_note_service};

#[tokio::test]
async fn create_then_get_round_trips() -> Result<()> {
    let service = note_service().await?;
    let created = service
        .create(
            json!({"title": "solo", "body": "text", "priority": 2, "done": false}),
            Params::new(),
        )
        .await?
        .into_one()
        .expect("single record");

    let id = created["id"].clone();
    assert!(id.is_number());

    let fetched = service.get(&id, Params::new()).await?;
    assert_eq!(fetched["title"], json!("solo"));
    assert_eq!(fetched["body"], json!("text"));
    assert_eq!(fetched["priority"], json!(2));
    assert_eq!(fetched["done"], json!(false));
    Ok(())
}

#[tokio::test]
async fn create_sequence_returns_same_length_with_same_selection() -> Result<()> {
    let service = note_service().await?;
    let params = Params::with_query(json!({"$select": ["title"]}));

    let single = service
        .create(json!({"title": "one", "priority": 1, "done": false}), params.clone())
        .await?
        .into_one()
        .expect("single record");

    let bulk = service
        .create(
            json!([
                {"title": "two", "priority": 2, "done": false},
                {"title": "three", "priority": 3, "done": false},
                {"title": "four", "priority": 4, "done": true},
            ]),
            params,
        )
        .await?;
    let Records::Many(rows) = bulk else {
        panic!("expected a sequence");
    };
    assert_eq!(rows.len(), 3);

    // each bulk item is field-selected identically to a single create
    let single_keys: Vec<_> = single.as_object().expect("object").keys().cloned().collect();
    for row in &rows {
        let keys: Vec<_> = row.as_object().expect("object").keys().cloned().collect();
        assert_eq!(keys, single_keys);
    }
    Ok(())
}

#[tokio::test]
async fn returning_override_is_clamped_for_bulk_create() -> Result<()> {
    let service = note_service().await?.atomic_returning(true);
    // sqlite cannot run INSERT .. RETURNING; rows still insert one-by-one
    let created = service
        .create(
            json!([
                {"title": "left", "priority": 1, "done": false},
                {"title": "right", "priority": 2, "done": true},
            ]),
            Params::new(),
        )
        .await?;
    assert_eq!(created.len(), 2);
    Ok(())
}

#[tokio::test]
async fn create_rejects_scalars() -> Result<()> {
    let service = note_service().await?;
    let err = service.create(json!("nope"), Params::new()).await.unwrap_err();
    assert!(matches!(err, AdapterError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn get_missing_id_is_not_found() -> Result<()> {
    let service = seeded_note_service().await?;
    let err = service.get(&json!(999), Params::new()).await.unwrap_err();
    assert!(matches!(err, AdapterError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn get_honors_the_filter() -> Result<()> {
    let service = seeded_note_service().await?;
    // note 1 exists but is not done
    let err = service
        .get(&json!(1), Params::with_query(json!({"done": true})))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn update_replaces_the_whole_record() -> Result<()> {
    let service = seeded_note_service().await?;
    // body is omitted on purpose: full replacement must null it out
    let updated = service
        .update(
            &json!(1),
            json!({"title": "replaced", "priority": 9, "done": true}),
            Params::new(),
        )
        .await?;
    assert_eq!(updated["title"], json!("replaced"));
    assert_eq!(updated["priority"], json!(9));
    assert_eq!(updated["body"], json!(null));

    let fetched = service.get(&json!(1), Params::new()).await?;
    assert_eq!(fetched["body"], json!(null));
    assert_eq!(fetched["title"], json!("replaced"));
    Ok(())
}

#[tokio::test]
async fn update_never_replaces_the_id() -> Result<()> {
    let service = seeded_note_service().await?;
    let updated = service
        .update(
            &json!(2),
            json!({"id": 999, "title": "kept", "priority": 3, "done": false}),
            Params::new(),
        )
        .await?;
    assert_eq!(updated["id"], json!(2));

    let err = service.get(&json!(999), Params::new()).await.unwrap_err();
    assert!(matches!(err, AdapterError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn update_with_array_is_a_bad_request() -> Result<()> {
    let service = seeded_note_service().await?;
    let err = service
        .update(&json!(1), json!([{"title": "x"}]), Params::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn update_missing_id_is_not_found() -> Result<()> {
    let service = seeded_note_service().await?;
    let err = service
        .update(
            &json!(999),
            json!({"title": "x", "priority": 0, "done": false}),
            Params::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::NotFound(_)));
    Ok(())
}
