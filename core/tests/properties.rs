//! Property tests for invariants 1, 2, and 5 of SPEC_FULL §8: the TAP
//! path table always reaches its target in a BFS-minimal number of
//! cycles, and the alphanumeric comparator orders same-prefix pad names
//! by their numeric suffix.

use jtagscan_core::tap::{next_state, path, path_len, TapState};
use proptest::prelude::*;
use std::collections::VecDeque;

fn state_from_index(i: u8) -> TapState {
    TapState::from_u8(i % 16).expect("index modulo 16 is always a valid state")
}

fn bfs_len(from: TapState, to: TapState) -> u8 {
    if from == to {
        return 0;
    }
    let mut dist = [None; 16];
    dist[from as usize] = Some(0u8);
    let mut q = VecDeque::new();
    q.push_back(from);
    while let Some(cur) = q.pop_front() {
        let d = dist[cur as usize].unwrap();
        for tms in [false, true] {
            let nxt = next_state(cur, tms);
            if dist[nxt as usize].is_none() {
                dist[nxt as usize] = Some(d + 1);
                q.push_back(nxt);
            }
        }
    }
    dist[to as usize].unwrap()
}

proptest! {
    #[test]
    fn path_lands_on_target_and_is_bfs_minimal(fi in 0u8..16, ti in 0u8..16) {
        let from = state_from_index(fi);
        let to = state_from_index(ti);

        let bits = path(from, to);
        let mut cur = from;
        for b in &bits {
            cur = next_state(cur, *b);
        }
        prop_assert_eq!(cur, to);
        prop_assert_eq!(bits.len() as u8, path_len(from, to));
        prop_assert_eq!(path_len(from, to), bfs_len(from, to));
    }

    #[test]
    fn alphanumeric_orders_same_prefix_by_numeric_value(
        prefix in "[A-Z]{1,4}",
        a in 0u32..10_000,
        b in 0u32..10_000,
    ) {
        let left = format!("{}{}", prefix, a);
        let right = format!("{}{}", prefix, b);
        let expected = a.cmp(&b);
        prop_assert_eq!(
            jtagscan_core::device_model::alphanumeric_compare(&left, &right),
            expected
        );
    }
}
