use crate::token::VersionToken;

/// Caller-owned container for an actor's state and the token it was read at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorState<T> {
    pub state: T,
    pub token: VersionToken,
}

impl<T> ActorState<T> {
    /// Container for a record not yet known to exist.
    pub fn new(state: T) -> Self {
        Self {
            state,
            token: VersionToken::NEW_RECORD,
        }
    }

    pub fn with_token(mut self, token: VersionToken) -> Self {
        self.token = token;
        self
    }
}
