//! Application store demo binary
//!
//! Builds the store from the environment and plays a short session through it.

use anyhow::Context;
use slicestore_client::{auth, user, ClientConfig, UserProfile};
use slicestore_core::{Action, Opaque, Value, PERSIST, REHYDRATE};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = ClientConfig::from_env().context("reading store configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| "slicestore_client=info,slicestore_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    slicestore_runtime::metrics::describe_metrics();

    println!("=== Application store ===\n");

    let store = slicestore_client::install(slicestore_client::initialize_with(&config))
        .context("installing the process-wide store")?;

    let observer = store.clone();
    let subscription = store.subscribe(move || {
        let state = observer.get_state();
        tracing::info!(
            status = %state.auth.status,
            profile = ?state.user.profile.as_ref().map(|p| p.name.as_str()),
            preferences = state.user.preferences.len(),
            "State changed"
        );
    });

    // The persistence layer hands over callbacks; the check lets this through.
    let register = Value::Opaque(Opaque::named("Function", || ()));
    let persist = Action::new(PERSIST).with_payload(Value::object([
        ("key", Value::from("root")),
        ("register", register),
    ]));
    println!(">>> Dispatching: {persist}");
    store.dispatch(persist).await?;

    let rehydrate = Action::new(REHYDRATE).with_payload(Value::object([(
        "auth",
        Value::object([("token", Value::Null)]),
    )]));
    println!(">>> Dispatching: {rehydrate}");
    store.dispatch(rehydrate).await?;

    for action in [
        auth::login_pending(),
        auth::login("demo-token"),
        user::set_profile(&UserProfile {
            id: "u-1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
        }),
        user::update_preference("theme", "dark"),
    ] {
        println!(">>> Dispatching: {action}");
        store.dispatch(action).await?;
    }

    let state = slicestore_client::shared().get_state();
    println!(
        "\nLogged in: {} (token {:?}), profile: {:?}",
        state.auth.is_authenticated(),
        state.auth.token,
        state.user.profile.as_ref().map(|p| &p.email),
    );

    println!("\n>>> Dispatching: {}", auth::LOGOUT);
    store.dispatch(auth::logout()).await?;
    let state = store.get_state();
    println!(
        "Logged in: {}, profile: {:?}, preferences kept: {}",
        state.auth.is_authenticated(),
        state.user.profile,
        state.user.preferences.len(),
    );

    subscription.unsubscribe();
    store.shutdown_default().await?;

    let health = store.health();
    println!("\nStore health: {}", health.status);
    Ok(())
}
