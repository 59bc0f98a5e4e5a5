//! Integration tests for the assembled application store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use proptest::prelude::*;
use slicestore_client::{
    auth, configure_store, initialize, user, AuthReducer, AuthState, AuthStatus, ClientConfig,
    RootState, UserReducer, UserState,
};
use slicestore_core::{Action, Opaque, Value, PERSIST, REHYDRATE};
use slicestore_runtime::{
    StoreConfig, StoreError, ViolationLog, ViolationOrigin, ViolationPolicy, DEFAULT_LOG_CAPACITY,
};
use slicestore_testing::helpers::{fold, init_test_tracing};
use slicestore_testing::mocks::{RecordingListener, StubReducer};
use slicestore_testing::properties::arb_action;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn callback() -> Value {
    Value::Opaque(Opaque::named("Function", || ()))
}

/// Default client configuration, recording violations into `log`
fn logged_config(log: &ViolationLog) -> StoreConfig {
    StoreConfig::default().with_serializable_check(
        ClientConfig::default()
            .serializable_check_options()
            .with_log(log.clone()),
    )
}

#[tokio::test]
async fn login_updates_auth_and_leaves_user_alone() {
    init_test_tracing();
    let store = initialize();
    let user_before = store.get_state().user.clone();

    store
        .dispatch(Action::new("auth/login").with_payload(serde_json::json!({"token": "abc"})))
        .await
        .unwrap();

    let state = store.get_state();
    assert_eq!(state.auth.token.as_deref(), Some("abc"));
    assert_eq!(state.auth.status, AuthStatus::Authenticated);
    assert_eq!(state.user, user_before);
}

#[tokio::test]
async fn get_state_is_reference_stable_between_dispatches() {
    let store = initialize();
    let first = store.get_state();
    let second = store.get_state();
    assert!(Arc::ptr_eq(&first, &second));

    store.dispatch(auth::login("abc")).await.unwrap();
    let third = store.get_state();
    let fourth = store.get_state();
    assert!(!Arc::ptr_eq(&first, &third));
    assert!(Arc::ptr_eq(&third, &fourth));
}

#[tokio::test]
async fn persist_with_callbacks_is_not_reported() {
    let log = ViolationLog::new();
    let store = configure_store(AuthReducer, UserReducer, logged_config(&log));

    store
        .dispatch(Action::new(PERSIST).with_payload(Value::object([("register", callback())])))
        .await
        .unwrap();

    assert!(log.is_empty(), "unexpected violations: {:?}", log.snapshot());
}

#[tokio::test]
async fn other_actions_with_callbacks_are_reported() {
    let log = ViolationLog::new();
    let store = configure_store(AuthReducer, UserReducer, logged_config(&log));

    store
        .dispatch(Action::new("auth/login").with_payload(Value::object([
            ("token", Value::from("abc")),
            ("onSuccess", callback()),
        ])))
        .await
        .unwrap();

    let violations = log.snapshot();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].origin, ViolationOrigin::Action);
    assert_eq!(violations[0].action_type, "auth/login");
    assert_eq!(violations[0].key_path, "payload.onSuccess");
    assert_eq!(violations[0].type_name, "Function");
    // Reported, not refused.
    assert_eq!(store.get_state().auth.token.as_deref(), Some("abc"));
}

#[tokio::test]
async fn rehydrate_is_checked_like_any_other_action() {
    let log = ViolationLog::new();
    let store = configure_store(AuthReducer, UserReducer, logged_config(&log));

    store
        .dispatch(Action::new(REHYDRATE).with_payload(Value::object([("handle", callback())])))
        .await
        .unwrap();

    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn non_serializable_state_is_reported_with_its_path() {
    let log = ViolationLog::new();
    let store = configure_store(AuthReducer, UserReducer, logged_config(&log));

    store
        .dispatch(user::update_preference("onChange", Value::Opaque(Opaque::named("Function", || ()))))
        .await
        .unwrap();

    let paths: Vec<_> = log
        .snapshot()
        .into_iter()
        .map(|v| (v.origin, v.key_path))
        .collect();
    assert_eq!(
        paths,
        vec![
            (ViolationOrigin::Action, "payload.value".to_owned()),
            (ViolationOrigin::State, "user.preferences.onChange".to_owned()),
        ]
    );
}

#[tokio::test]
async fn violation_log_stays_bounded_while_state_stays_bad() {
    let log = ViolationLog::new();
    let store = configure_store(AuthReducer, UserReducer, logged_config(&log));
    store
        .dispatch(user::update_preference("onChange", callback()))
        .await
        .unwrap();

    for _ in 0..(DEFAULT_LOG_CAPACITY * 2) {
        store.dispatch(user::update_preference("theme", "dark")).await.unwrap();
    }

    assert_eq!(log.len(), DEFAULT_LOG_CAPACITY);
    assert!(log.evicted() > 0);
    assert!(log.snapshot().iter().all(|v| v.key_path == "user.preferences.onChange"));
}

#[tokio::test]
async fn reject_policy_refuses_the_action() {
    let config = ClientConfig {
        serializable_policy: ViolationPolicy::Reject,
        ..ClientConfig::default()
    };
    let store = slicestore_client::initialize_with(&config);

    let refused = store
        .dispatch(Action::new("auth/login").with_payload(Value::object([
            ("token", Value::from("abc")),
            ("onSuccess", callback()),
        ])))
        .await;
    assert!(matches!(refused, Err(StoreError::NonSerializable { .. })));
    assert_eq!(store.get_state().auth, AuthState::default());

    // PERSIST still flows through.
    let persisted = store
        .dispatch(Action::new(PERSIST).with_payload(Value::object([("register", callback())])))
        .await;
    assert!(persisted.is_ok());
}

#[tokio::test]
async fn disabled_check_reports_nothing() {
    let config = ClientConfig {
        serializable_check: false,
        ..ClientConfig::default()
    };
    let store = slicestore_client::initialize_with(&config);
    assert_eq!(store.health().metadata("middleware"), Some(""));

    let result = store
        .dispatch(Action::new("auth/login").with_payload(Value::object([("onSuccess", callback())])))
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn listener_runs_once_per_dispatch_after_the_update() {
    let store = initialize();
    let (listener, _subscription) = RecordingListener::attach(&store, |s: &RootState| s.auth.token.clone());

    store.dispatch(auth::login("abc")).await.unwrap();

    assert_eq!(listener.count(), 1);
    assert_eq!(listener.calls(), vec![Some("abc".to_owned())]);
}

#[tokio::test]
async fn listeners_run_in_registration_order() {
    let store = initialize();
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let subscriptions: Vec<_> = ["first", "second", "third"]
        .into_iter()
        .map(|name| {
            let order = Arc::clone(&order);
            store.subscribe(move || order.lock().unwrap().push(name))
        })
        .collect();

    store.dispatch(auth::logout()).await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    assert_eq!(subscriptions.len(), store.listener_count());
}

#[tokio::test]
async fn unsubscribe_stops_notifications() {
    let store = initialize();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let subscription = store.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    store.dispatch(auth::login_pending()).await.unwrap();
    assert!(subscription.unsubscribe());
    assert!(!subscription.unsubscribe());
    store.dispatch(auth::login("abc")).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stub_slices_see_every_action() {
    let auth_stub = StubReducer::<AuthState>::inert();
    let user_stub = StubReducer::new(|state: &mut UserState, action: &Action| {
        if action.is("user/clear") {
            state.preferences.clear();
        }
    });
    let store = configure_store(auth_stub.clone(), user_stub.clone(), StoreConfig::default());

    store.dispatch(auth::login("abc")).await.unwrap();
    store.dispatch(user::clear()).await.unwrap();

    assert_eq!(auth_stub.seen(), vec!["auth/login", "user/clear"]);
    assert_eq!(user_stub.seen(), vec!["auth/login", "user/clear"]);
    assert_eq!(store.get_state().auth, AuthState::default());
}

#[test]
fn shared_store_is_one_instance() {
    let first = slicestore_client::shared();
    let second = slicestore_client::shared();
    assert!(Arc::ptr_eq(&first.get_state(), &second.get_state()));

    tokio_test::block_on(first.dispatch(auth::login("shared"))).unwrap();
    assert_eq!(second.get_state().auth.token.as_deref(), Some("shared"));
}

fn arb_session_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(auth::login_pending()),
        "[a-z0-9]{1,12}".prop_map(auth::login),
        "[a-z ]{0,12}".prop_map(auth::login_failed),
        Just(auth::logout()),
        "[a-z0-9]{1,12}".prop_map(|token| {
            Action::new(REHYDRATE).with_payload(Value::object([(
                "auth",
                Value::object([("token", Value::String(token))]),
            )]))
        }),
        ("[a-z]{1,6}", "[a-z]{1,6}").prop_map(|(key, value)| user::update_preference(key, value)),
        ("[a-z0-9]{1,6}", "[A-Z][a-z]{1,6}").prop_map(|(id, name)| {
            user::set_profile(&slicestore_client::UserProfile {
                email: format!("{id}@example.com"),
                id,
                name,
            })
        }),
        Just(user::clear()),
        arb_action(),
    ]
}

proptest! {
    #[test]
    fn slices_evolve_in_isolation(actions in prop::collection::vec(arb_session_action(), 0..24)) {
        let store = initialize();
        for action in actions.clone() {
            tokio_test::block_on(store.dispatch(action)).unwrap();
        }

        let state = store.get_state();
        prop_assert_eq!(&state.auth, &fold(&AuthReducer, &(), actions.clone()));
        prop_assert_eq!(&state.user, &fold(&UserReducer, &(), actions));
    }
}
