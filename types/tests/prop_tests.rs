use proptest::prelude::*;

use vsolve_types::proof::CUSTOM_JUDGE_MARKER;
use vsolve_types::{Amount, EventPosition, GameId, Opcode, Phase, TaskId};

proptest! {
    /// TaskId display output parses back to the same id.
    #[test]
    fn task_id_display_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let id = TaskId::new(bytes);
        let parsed: TaskId = id.to_string().parse().unwrap();
        prop_assert_eq!(parsed, id);
    }

    /// GameId::is_zero is true only for all-zero bytes.
    #[test]
    fn game_id_is_zero_correct(bytes in prop::array::uniform32(0u8..)) {
        prop_assert_eq!(GameId::new(bytes).is_zero(), bytes == [0u8; 32]);
    }

    /// Decimal and hex renderings of an amount parse to the same value.
    #[test]
    fn amount_parses_decimal_and_hex(raw in any::<u128>()) {
        let dec: Amount = raw.to_string().parse().unwrap();
        let hex: Amount = format!("{raw:#x}").parse().unwrap();
        prop_assert_eq!(dec, hex);
        prop_assert_eq!(dec.raw(), raw);
    }

    /// Event positions order lexicographically by (block, log index).
    #[test]
    fn event_position_ordering(a in any::<(u64, u64)>(), b in any::<(u64, u64)>()) {
        let pa = EventPosition::new(a.0, a.1);
        let pb = EventPosition::new(b.0, b.1);
        prop_assert_eq!(pa.cmp(&pb), a.cmp(&b));
    }

    /// Only the marker byte routes an opcode to the custom judge, whatever
    /// the surrounding bytes hold.
    #[test]
    fn custom_judge_detection_ignores_other_bytes(
        mut bytes in prop::array::uniform32(0u8..),
        marker in any::<u8>(),
    ) {
        bytes[26] = marker;
        let op = Opcode::new(bytes);
        prop_assert_eq!(op.is_custom_judge(), marker == CUSTOM_JUDGE_MARKER);
    }

    /// Indices past the phase table are rejected.
    #[test]
    fn phase_index_bounds(index in any::<u64>()) {
        prop_assert_eq!(Phase::from_index(index).is_ok(), index < Phase::TABLE.len() as u64);
    }
}

#[test]
fn custom_judge_detection_across_full_byte_range() {
    let custom: Vec<u8> = (0..=u8::MAX)
        .filter(|b| Opcode::with_marker_byte(*b).is_custom_judge())
        .collect();
    assert_eq!(custom, vec![CUSTOM_JUDGE_MARKER]);
}
