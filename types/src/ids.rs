//! Ledger-assigned identifiers for tasks and verification games.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

macro_rules! ledger_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(B256);

        impl $name {
            pub const ZERO: Self = Self(B256::ZERO);

            pub fn new(bytes: [u8; 32]) -> Self {
                Self(B256::new(bytes))
            }

            /// Build an id whose low-order bytes hold `n` (handy for fixtures).
            pub fn from_u64(n: u64) -> Self {
                Self(B256::left_padding_from(&n.to_be_bytes()))
            }

            pub fn as_b256(&self) -> &B256 {
                &self.0
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0 .0
            }

            pub fn is_zero(&self) -> bool {
                self.0.is_zero()
            }
        }

        impl From<B256> for $name {
            fn from(value: B256) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = TypesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                B256::from_str(s)
                    .map(Self)
                    .map_err(|e| TypesError::InvalidId(format!("{s}: {e}")))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let b = self.as_bytes();
                write!(
                    f,
                    concat!($label, "(0x{:02x}{:02x}..{:02x}{:02x})"),
                    b[0], b[1], b[30], b[31]
                )
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ledger_id!(
    /// Identifier of a task posted to the incentive layer.
    TaskId,
    "TaskId"
);

ledger_id!(
    /// Identifier of a verification game on the dispute resolution layer.
    GameId,
    "GameId"
);

/// Either kind of entity the upkeep scheduler advances.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityId {
    Task(TaskId),
    Game(GameId),
}

impl From<TaskId> for EntityId {
    fn from(id: TaskId) -> Self {
        Self::Task(id)
    }
}

impl From<GameId> for EntityId {
    fn from(id: GameId) -> Self {
        Self::Game(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task(id) => write!(f, "task {id}"),
            Self::Game(id) => write!(f, "game {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_u64_places_value_in_low_bytes() {
        let id = TaskId::from_u64(0x0102);
        let bytes = id.as_bytes();
        assert_eq!(bytes[30], 0x01);
        assert_eq!(bytes[31], 0x02);
        assert!(bytes[..30].iter().all(|b| *b == 0));
    }

    #[test]
    fn display_parses_back() {
        let id = GameId::from_u64(77);
        let parsed: GameId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn invalid_hex_is_rejected() {
        let err = "0xnothex".parse::<TaskId>().unwrap_err();
        assert!(matches!(err, TypesError::InvalidId(_)));
    }

    #[test]
    fn task_and_game_with_same_bytes_are_distinct_entities() {
        let task = EntityId::from(TaskId::from_u64(1));
        let game = EntityId::from(GameId::from_u64(1));
        assert_ne!(task, game);
    }
}
