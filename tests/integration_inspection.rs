//! `Inspector`'s read-only status/probe/evict surface.

mod common;

use common::*;
use tierwise::inspection::FoundIn;
use tierwise::Inspector;

#[tokio::test]
async fn probe_reports_local_hit_with_its_type_name() {
    let engine = build_engine();
    let key = test_key("probe-local");
    let _: Option<String> = engine
        .get_or_load(&key, || async { Ok(Some("V".to_string())) })
        .await
        .unwrap();
    assert!(poll_until(|| async { matches!(engine.probe_presence(&key).await.0, FoundIn::Local) }, 500).await);

    let inspector = Inspector::new(engine, true, true);
    let probe = inspector.probe(&key).await;
    assert_eq!(probe.found_in, FoundIn::Local);
    assert!(probe.value_type.unwrap().contains("String"));
}

#[tokio::test]
async fn probe_of_an_unknown_key_has_no_type() {
    let engine = build_engine();
    let inspector = Inspector::new(engine, true, true);
    let probe = inspector.probe(&test_key("never-seen")).await;
    assert_eq!(probe.found_in, FoundIn::Neither);
    assert!(probe.value_type.is_none());
}

#[tokio::test]
async fn evict_through_the_inspector_schedules_removal() {
    let engine = build_engine();
    let key = test_key("probe-evict");
    let _: Option<String> = engine
        .get_or_load(&key, || async { Ok(Some("V".to_string())) })
        .await
        .unwrap();
    assert!(poll_until(|| async { matches!(engine.probe_presence(&key).await.0, FoundIn::Local) }, 500).await);

    let inspector = Inspector::new(engine.clone(), true, true);
    let response = inspector.evict(&key).await;
    assert!(response.scheduled);

    assert!(
        poll_until(
            || async { matches!(engine.probe_presence(&key).await.0, FoundIn::Neither) },
            500
        )
        .await
    );
}
