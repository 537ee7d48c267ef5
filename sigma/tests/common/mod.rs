#![allow(dead_code)]

use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use sigma::prelude::*;

pub const ACTOR_TYPE: &str = "TestStore";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestState {
    pub a: String,
    pub b: i32,
    pub c: i64,
}

impl TestState {
    pub fn hello() -> Self {
        Self {
            a: "hello".to_string(),
            b: 1,
            c: 2,
        }
    }

    /// Random state; `a` is `len` characters long, or short when `None`.
    pub fn random(len: Option<usize>) -> Self {
        let mut rng = rand::thread_rng();
        let len = len.unwrap_or_else(|| rng.gen_range(1..32));

        Self {
            a: (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(len)
                .map(char::from)
                .collect(),
            b: rng.r#gen(),
            c: rng.r#gen(),
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Write `state` for a fresh identity and read it back into a default container.
pub async fn write_read(
    storage: &StorageProvider,
    identity: &ActorIdentity,
    state: TestState,
) -> ActorState<TestState> {
    let mut written = ActorState::new(state);
    let before = written.token.clone();
    storage
        .write_state(ACTOR_TYPE, identity, &mut written)
        .await
        .unwrap();
    assert_ne!(written.token, before);

    let mut stored = ActorState::<TestState>::default();
    storage
        .read_state(ACTOR_TYPE, identity, &mut stored)
        .await
        .unwrap();

    assert_eq!(stored.state, written.state);
    assert_eq!(stored.token, written.token);
    stored
}
