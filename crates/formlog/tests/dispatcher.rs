//! End-to-end behaviour of the dispatcher over real and faulty logs.

use std::sync::Arc;

use formlog::core::Event;
use formlog::store::StoreState;
use formlog::{Dispatcher, ErrorKind};
use formlog_testkit::generators::{invalid_document, valid_document};
use formlog_testkit::{
    all_vectors, dispatcher_over, memory_dispatcher, submission, Fault, FaultyLog, TestFixture,
};
use proptest::prelude::*;
use serde_json::{json, Value};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_submit_list_info_scenario() {
    let fixture = TestFixture::new();
    let dispatcher = fixture.dispatcher().await;

    let envelope = dispatcher
        .dispatch(
            "submit",
            json!({"username": "alice", "description": "hello", "github": "alice"}),
            json!("r1"),
        )
        .await
        .to_value();
    assert_eq!(envelope["correlationId"], json!("r1"));
    assert_eq!(envelope["success"], json!(true));
    assert_eq!(envelope["record"]["index"], json!(0));
    assert_eq!(envelope["record"]["document"]["github"], json!("alice"));
    assert_eq!(envelope["totalRecords"], json!(1));

    let envelope = dispatcher
        .dispatch("submit", json!({"description": "no name"}), json!("r2"))
        .await
        .to_value();
    assert_eq!(envelope["success"], json!(false));
    assert_eq!(envelope["errorKind"], json!("ValidationError"));
    assert!(envelope["error"].as_str().unwrap().contains("username"));
    assert_eq!(envelope["errors"][0]["field"], json!("username"));

    let envelope = dispatcher
        .dispatch("getRecords", Value::Null, json!("r3"))
        .await
        .to_value();
    assert_eq!(envelope["totalRecords"], json!(1));
    assert_eq!(envelope["records"].as_array().unwrap().len(), 1);
    assert_eq!(
        envelope["records"][0]["document"]["username"],
        json!("alice")
    );

    let envelope = dispatcher
        .dispatch("getInfo", Value::Null, json!("r4"))
        .await
        .to_value();
    assert_eq!(envelope["info"]["length"], json!(1));
    assert_eq!(envelope["info"]["writable"], json!(true));
    assert_eq!(
        envelope["info"]["identity"].as_str().unwrap().len(),
        64
    );
    assert!(envelope["info"]["byteSize"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_vectors_through_dispatcher() {
    let (dispatcher, _) = memory_dispatcher().await;
    let mut expected_length = 0u64;

    for vector in all_vectors() {
        let envelope = dispatcher
            .dispatch("submit", vector.value(), json!(vector.name))
            .await;

        assert_eq!(envelope.success(), vector.is_valid(), "{}", vector.name);
        if vector.is_valid() {
            expected_length += 1;
        } else {
            assert_eq!(envelope.error_kind(), Some(ErrorKind::ValidationError));
        }
        assert_eq!(dispatcher.store().length(), expected_length, "{}", vector.name);
    }
}

#[tokio::test]
async fn test_extra_fields_round_trip_in_order() {
    let (dispatcher, _) = memory_dispatcher().await;
    let payload = json!({"zeta": 1, "username": "u", "alpha": [1, 2], "description": "d"});

    dispatcher
        .dispatch("submit", payload.clone(), Value::Null)
        .await;
    let envelope = dispatcher
        .dispatch("getRecord", json!({"index": 0}), Value::Null)
        .await
        .to_value();

    assert_eq!(envelope["record"]["document"], payload);
    let keys: Vec<&String> = envelope["record"]["document"]
        .as_object()
        .unwrap()
        .keys()
        .collect();
    assert_eq!(keys, vec!["zeta", "username", "alpha", "description"]);
}

#[tokio::test]
async fn test_out_of_range_reads() {
    let (dispatcher, _) = memory_dispatcher().await;
    dispatcher
        .dispatch("submit", submission("a", "b"), Value::Null)
        .await;

    for index in [json!(1), json!(-1), json!(u64::MAX)] {
        let envelope = dispatcher
            .dispatch("getRecord", json!({ "index": index }), Value::Null)
            .await;
        assert_eq!(
            envelope.error_kind(),
            Some(ErrorKind::IndexOutOfRange),
            "index {}",
            index
        );
    }
}

#[tokio::test]
async fn test_concurrent_submits_get_contiguous_indices() {
    let (dispatcher, _) = memory_dispatcher().await;

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .dispatch("submit", submission(&format!("user{}", i), "x"), json!(i))
                    .await
            })
        })
        .collect();

    let mut indices = Vec::new();
    for handle in handles {
        let envelope = handle.await.unwrap().to_value();
        assert_eq!(envelope["success"], json!(true));
        indices.push(envelope["record"]["index"].as_u64().unwrap());
    }
    indices.sort_unstable();

    assert_eq!(indices, (0..50).collect::<Vec<u64>>());
    assert_eq!(dispatcher.store().length(), 50);
}

#[tokio::test]
async fn test_follower_is_read_only_and_sees_writer() {
    let fixture = TestFixture::new();
    let writer = fixture.dispatcher().await;
    let follower = fixture.dispatcher().await;

    let info = follower.dispatch("getInfo", Value::Null, Value::Null).await.to_value();
    assert_eq!(info["info"]["writable"], json!(false));

    let rejected = follower
        .dispatch("submit", submission("mallory", "x"), Value::Null)
        .await;
    assert_eq!(rejected.error_kind(), Some(ErrorKind::PersistenceError));

    writer
        .dispatch("submit", submission("alice", "hello"), Value::Null)
        .await;
    writer
        .dispatch("submit", submission("bob", "hi"), Value::Null)
        .await;

    let records = follower
        .dispatch("getRecords", Value::Null, Value::Null)
        .await
        .to_value();
    assert_eq!(records["totalRecords"], json!(2));
    assert_eq!(records["records"][1]["document"]["username"], json!("bob"));

    let record = follower
        .dispatch("getRecord", json!({"index": 1}), Value::Null)
        .await;
    assert!(record.success());

    assert_eq!(
        fixture
            .events
            .count(|e| matches!(e, Event::LeaseDenied { .. })),
        1
    );
}

#[tokio::test]
async fn test_repeated_failures_make_store_unavailable() {
    let (dispatcher, events) = dispatcher_over(FaultyLog::new()).await;
    dispatcher
        .dispatch("submit", submission("ok", "first"), Value::Null)
        .await;

    dispatcher.store().log().set_fault(Fault::Fail);
    for _ in 0..3 {
        let envelope = dispatcher
            .dispatch("submit", submission("x", "y"), Value::Null)
            .await;
        assert_eq!(envelope.error_kind(), Some(ErrorKind::PersistenceError));
    }

    dispatcher.store().log().set_fault(Fault::None);
    assert_eq!(dispatcher.store().state(), StoreState::Failed);

    for action in ["submit", "getRecords", "getInfo"] {
        let envelope = dispatcher
            .dispatch(action, submission("x", "y"), Value::Null)
            .await;
        assert_eq!(
            envelope.error_kind(),
            Some(ErrorKind::StoreUnavailable),
            "{}",
            action
        );
    }
    assert_eq!(dispatcher.store().length(), 1);
    assert_eq!(
        events.count(|e| matches!(e, Event::StoreFailed { .. })),
        1
    );
}

#[tokio::test]
async fn test_misplaced_append_fails_store_immediately() {
    let (dispatcher, _) = dispatcher_over(FaultyLog::new()).await;
    dispatcher.store().log().set_fault(Fault::WrongIndex);

    let envelope = dispatcher
        .dispatch("submit", submission("a", "b"), Value::Null)
        .await;
    assert_eq!(envelope.error_kind(), Some(ErrorKind::PersistenceError));
    assert_eq!(dispatcher.store().state(), StoreState::Failed);
    assert_eq!(dispatcher.store().length(), 0);
}

#[tokio::test]
async fn test_panicking_action_is_contained() {
    let (dispatcher, _) = dispatcher_over(FaultyLog::new()).await;
    dispatcher.store().log().set_fault(Fault::Panic);

    let envelope = dispatcher
        .dispatch("getInfo", Value::Null, json!("p1"))
        .await
        .to_value();
    assert_eq!(envelope["success"], json!(false));
    assert_eq!(envelope["errorKind"], json!("Internal"));
    assert_eq!(envelope["correlationId"], json!("p1"));
    assert!(envelope["error"].as_str().unwrap().contains("injected panic"));

    dispatcher.store().log().set_fault(Fault::None);
    let envelope = dispatcher.dispatch("getInfo", Value::Null, Value::Null).await;
    assert!(envelope.success());
}

#[tokio::test]
async fn test_state_survives_restart() {
    let fixture = TestFixture::new();
    let identity = {
        let dispatcher: Dispatcher<_> = fixture.dispatcher().await;
        dispatcher
            .dispatch("submit", submission("alice", "persisted"), Value::Null)
            .await;
        dispatcher.store().info().await.unwrap().identity
    };

    let dispatcher = fixture.dispatcher().await;
    let envelope = dispatcher
        .dispatch("getRecord", json!({"index": 0}), Value::Null)
        .await
        .to_value();
    assert_eq!(
        envelope["record"]["document"]["description"],
        json!("persisted")
    );

    let info = dispatcher.dispatch("getInfo", Value::Null, Value::Null).await.to_value();
    assert_eq!(info["info"]["identity"], json!(identity));
    assert_eq!(info["info"]["writable"], json!(true));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_appends_are_retrievable_by_index(docs in prop::collection::vec(valid_document(), 1..12)) {
        runtime().block_on(async {
            let (dispatcher, _) = memory_dispatcher().await;

            for (i, doc) in docs.iter().enumerate() {
                let envelope = dispatcher.dispatch("submit", doc.clone(), Value::Null).await.to_value();
                assert_eq!(envelope["record"]["index"], json!(i));
            }
            assert_eq!(dispatcher.store().length(), docs.len() as u64);

            for (i, doc) in docs.iter().enumerate() {
                let first = dispatcher.dispatch("getRecord", json!({"index": i}), Value::Null).await.to_value();
                let second = dispatcher.dispatch("getRecord", json!({"index": i}), Value::Null).await.to_value();
                assert_eq!(&first["record"]["document"], doc);
                assert_eq!(
                    serde_json::to_vec(&first).unwrap(),
                    serde_json::to_vec(&second).unwrap()
                );
            }
        });
    }

    #[test]
    fn test_invalid_documents_never_consume_an_index(
        before in prop::collection::vec(valid_document(), 0..4),
        invalid in invalid_document(),
    ) {
        runtime().block_on(async {
            let (dispatcher, _) = memory_dispatcher().await;
            for doc in &before {
                dispatcher.dispatch("submit", doc.clone(), Value::Null).await;
            }

            let envelope = dispatcher.dispatch("submit", invalid, Value::Null).await;
            assert_eq!(envelope.error_kind(), Some(ErrorKind::ValidationError));
            assert_eq!(dispatcher.store().length(), before.len() as u64);

            let next = dispatcher.dispatch("submit", submission("n", "m"), Value::Null).await.to_value();
            assert_eq!(next["record"]["index"], json!(before.len()));
        });
    }
}

#[test]
fn test_dispatcher_is_send_sync_clone() {
    fn assert_traits<T: Send + Sync + Clone + 'static>() {}
    assert_traits::<Dispatcher<formlog::store::SqliteLog>>();
    assert_traits::<Dispatcher<Arc<FaultyLog>>>();
}
