//! Pairing sanitizer for tool invocation/outcome integrity.
//!
//! Repairs a transcript so that every surviving tool invocation is
//! immediately followed, before any other invocation, by the outcomes for
//! its call ids. Downstream model APIs hard-reject transcripts that violate
//! this, so a malformed transcript is never surfaced as an error here: it
//! is always repairable by deletion, in the worst case down to an empty
//! transcript. Losing an unpaired tool exchange is preferred over failing
//! the model call outright.
//!
//! Three passes, applied in order:
//! 1. **Dedup** — drop invocation blocks that repeat a call id within the
//!    same message.
//! 2. **Fast check** — a single forward pass over pending call-id counts;
//!    when it passes, the input is returned unchanged (same allocation).
//! 3. **Repair** — reorder outcome messages behind their invocations
//!    (FIFO per call id), then prune whatever remains unpaired.
//!
//! The leading run of system-role messages is never touched by any pass.
//!
//! This is idempotent: `sanitize(sanitize(x)) == sanitize(x)`.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use copaw_core::message::{Message, leading_system_len};

/// Sanitize a transcript to guarantee pairing integrity.
///
/// Returns the input unchanged (same allocation) when it is already valid,
/// so callers on the hot path pay only a scan.
#[must_use]
pub fn sanitize(mut messages: Vec<Message>) -> Vec<Message> {
    let preserved = leading_system_len(&messages);
    dedup_invocation_blocks(&mut messages[preserved..]);

    if is_pairing_valid(&messages[preserved..]) {
        return messages;
    }

    debug!("sanitizing transcript: repairing tool pairing");
    let tail = messages.split_off(preserved);
    let mut repaired = reorder_outcomes(tail);
    // Deleting an exchange can orphan outcomes (or invocations) it shared a
    // message with, so prune until the fast check passes. Each pass strictly
    // deletes messages, so this terminates.
    loop {
        let before = repaired.len();
        repaired = prune_unpaired(repaired);
        if is_pairing_valid(&repaired) || repaired.len() == before {
            break;
        }
    }
    messages.extend(repaired);
    messages
}

/// Fast pairing validity check: a single forward pass maintaining a pending
/// count per call id.
///
/// A transcript is valid when every outcome decrements a positive pending
/// count, no message interleaves while outcomes are pending, and no count
/// remains pending at the end.
#[must_use]
pub fn is_pairing_valid(messages: &[Message]) -> bool {
    let mut pending: HashMap<&str, usize> = HashMap::new();
    for msg in messages {
        let outcome_ids = msg.outcome_ids();
        for id in &outcome_ids {
            match pending.get_mut(id) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    if *count == 0 {
                        let _ = pending.remove(id);
                    }
                }
                // Orphaned outcome: nothing pending under this id.
                _ => return false,
            }
        }
        // A message with no outcomes arrived between an invocation and its
        // outcomes.
        if !pending.is_empty() && outcome_ids.is_empty() {
            return false;
        }
        for id in msg.invocation_ids() {
            *pending.entry(id).or_insert(0) += 1;
        }
    }
    pending.is_empty()
}

/// Drop invocation blocks that repeat a call id within the same message.
///
/// Mutates messages in place; untouched messages keep their blocks as-is.
fn dedup_invocation_blocks(messages: &mut [Message]) {
    for msg in messages {
        let needs_dedup = {
            let ids = msg.invocation_ids();
            let unique: HashSet<&str> = ids.iter().copied().collect();
            unique.len() != ids.len()
        };
        if !needs_dedup {
            continue;
        }
        debug!(message_id = %msg.id, "removing duplicate invocation blocks");
        let mut seen: HashSet<String> = HashSet::new();
        msg.blocks.retain(|block| {
            if block.is_invocation() {
                if let Some(call_id) = block.call_id() {
                    return seen.insert(call_id.to_owned());
                }
            }
            true
        });
    }
}

/// Move outcome messages directly behind their invocations.
///
/// Outcome-bearing messages queue per call id in insertion order and are
/// consumed FIFO, one per invocation, in the order the ids appear in the
/// invocation's blocks. This attaches the right outcome to each invocation
/// even when call ids repeat across exchanges. An outcome message is placed
/// at most once; unconsumed outcome messages are dropped.
fn reorder_outcomes(messages: Vec<Message>) -> Vec<Message> {
    let mut queues: HashMap<String, VecDeque<usize>> = HashMap::new();
    let mut outcome_indices: HashSet<usize> = HashSet::new();
    for (idx, msg) in messages.iter().enumerate() {
        let ids = msg.outcome_ids();
        if ids.is_empty() {
            continue;
        }
        let _ = outcome_indices.insert(idx);
        for id in ids {
            queues.entry(id.to_owned()).or_default().push_back(idx);
        }
    }

    let mut placed: HashSet<usize> = HashSet::new();
    let mut order: Vec<usize> = Vec::with_capacity(messages.len());
    for (idx, msg) in messages.iter().enumerate() {
        if outcome_indices.contains(&idx) {
            continue;
        }
        order.push(idx);
        for id in msg.invocation_ids() {
            let Some(queue) = queues.get_mut(id) else {
                continue;
            };
            let Some(outcome_idx) = queue.pop_front() else {
                continue;
            };
            if placed.insert(outcome_idx) {
                order.push(outcome_idx);
            }
        }
    }

    let mut slots: Vec<Option<Message>> = messages.into_iter().map(Some).collect();
    order.into_iter().filter_map(|idx| slots[idx].take()).collect()
}

/// Remove invocation/outcome messages that are not properly paired.
///
/// Forward scan: each invocation message must be immediately followed by
/// outcome messages covering all of its ids. A message with any unsatisfied
/// id is deleted whole, together with every outcome message inspected in its
/// run. A second scan then deletes outcome messages whose ids no longer all
/// point at a surviving invocation (orphans exposed by the first pass).
fn prune_unpaired(messages: Vec<Message>) -> Vec<Message> {
    let mut to_remove: HashSet<usize> = HashSet::new();

    let mut i = 0;
    while i < messages.len() {
        let use_ids: HashSet<&str> = messages[i].invocation_ids().into_iter().collect();
        if use_ids.is_empty() {
            i += 1;
            continue;
        }
        let mut required = use_ids;
        let mut inspected: Vec<usize> = Vec::new();
        let mut j = i + 1;
        while j < messages.len() && !required.is_empty() {
            let outcome_ids = messages[j].outcome_ids();
            if outcome_ids.is_empty() {
                break;
            }
            for id in outcome_ids {
                let _ = required.remove(id);
            }
            inspected.push(j);
            j += 1;
        }
        if required.is_empty() {
            i = j;
        } else {
            debug!(message_id = %messages[i].id, "pruning unpaired invocation message");
            let _ = to_remove.insert(i);
            to_remove.extend(inspected);
            i += 1;
        }
    }

    let mut surviving: HashSet<&str> = HashSet::new();
    for (idx, msg) in messages.iter().enumerate() {
        if !to_remove.contains(&idx) {
            surviving.extend(msg.invocation_ids());
        }
    }
    for (idx, msg) in messages.iter().enumerate() {
        if to_remove.contains(&idx) {
            continue;
        }
        let outcome_ids = msg.outcome_ids();
        if !outcome_ids.is_empty() && !outcome_ids.iter().all(|id| surviving.contains(id)) {
            debug!(message_id = %msg.id, "pruning orphaned outcome message");
            let _ = to_remove.insert(idx);
        }
    }

    if to_remove.is_empty() {
        return messages;
    }
    messages
        .into_iter()
        .enumerate()
        .filter_map(|(idx, msg)| (!to_remove.contains(&idx)).then_some(msg))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use copaw_core::content::ContentBlock;
    use copaw_core::message::Role;
    use proptest::prelude::*;
    use serde_json::{Map, json};

    fn invocation(call_id: &str) -> Message {
        Message::invocation(call_id, "search", Map::new())
    }

    fn outcome(call_id: &str) -> Message {
        Message::outcome(call_id, json!("result"))
    }

    fn texts(messages: &[Message]) -> Vec<String> {
        messages.iter().map(Message::text).collect()
    }

    // ── Fast check ───────────────────────────────────────────────────────

    #[test]
    fn valid_empty() {
        assert!(is_pairing_valid(&[]));
    }

    #[test]
    fn valid_plain_conversation() {
        let messages = vec![Message::user("hi"), Message::assistant("hello")];
        assert!(is_pairing_valid(&messages));
    }

    #[test]
    fn valid_paired_exchange() {
        let messages = vec![invocation("a"), outcome("a"), Message::assistant("done")];
        assert!(is_pairing_valid(&messages));
    }

    #[test]
    fn invalid_orphan_outcome() {
        let messages = vec![outcome("a")];
        assert!(!is_pairing_valid(&messages));
    }

    #[test]
    fn invalid_interleaved_message() {
        let messages = vec![invocation("a"), Message::user("hello?"), outcome("a")];
        assert!(!is_pairing_valid(&messages));
    }

    #[test]
    fn invalid_trailing_invocation() {
        let messages = vec![invocation("a")];
        assert!(!is_pairing_valid(&messages));
    }

    #[test]
    fn invalid_surplus_outcome() {
        let messages = vec![invocation("a"), outcome("a"), outcome("a")];
        assert!(!is_pairing_valid(&messages));
    }

    #[test]
    fn valid_duplicate_id_across_exchanges() {
        let messages = vec![invocation("a"), outcome("a"), invocation("a"), outcome("a")];
        assert!(is_pairing_valid(&messages));
    }

    #[test]
    fn valid_multi_invocation_with_separate_outcomes() {
        let multi = Message::with_blocks(
            Role::Assistant,
            vec![
                ContentBlock::invocation("a", "read", Map::new()),
                ContentBlock::invocation("b", "write", Map::new()),
            ],
        );
        let messages = vec![multi, outcome("a"), outcome("b")];
        assert!(is_pairing_valid(&messages));
    }

    // ── Fast path identity ───────────────────────────────────────────────

    #[test]
    fn valid_transcript_returns_same_allocation() {
        let messages = vec![
            Message::system("preamble"),
            Message::user("hi"),
            invocation("a"),
            outcome("a"),
        ];
        let ptr = messages.as_ptr();
        let out = sanitize(messages);
        assert_eq!(out.as_ptr(), ptr);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn empty_input_returns_empty() {
        assert!(sanitize(vec![]).is_empty());
    }

    // ── Dedup pass ───────────────────────────────────────────────────────

    #[test]
    fn duplicate_invocation_in_one_message_deduped() {
        let msg = Message::with_blocks(
            Role::Assistant,
            vec![
                ContentBlock::invocation("a", "search", Map::new()),
                ContentBlock::text("some text"),
                ContentBlock::invocation("a", "search", Map::new()),
            ],
        );
        let out = sanitize(vec![msg, outcome("a")]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].invocation_ids(), vec!["a"]);
        // Non-invocation blocks survive dedup
        assert_eq!(out[0].text(), "some text");
    }

    #[test]
    fn dedup_keeps_distinct_ids() {
        let msg = Message::with_blocks(
            Role::Assistant,
            vec![
                ContentBlock::invocation("a", "read", Map::new()),
                ContentBlock::invocation("b", "write", Map::new()),
            ],
        );
        let out = sanitize(vec![msg, outcome("a"), outcome("b")]);
        assert_eq!(out[0].invocation_ids(), vec!["a", "b"]);
        assert_eq!(out.len(), 3);
    }

    // ── Reorder pass ─────────────────────────────────────────────────────

    #[test]
    fn displaced_outcome_moved_behind_invocation() {
        let inv = invocation("a");
        let text = Message::assistant("working on it");
        let out_msg = outcome("a");
        let expected = vec![inv.id.clone(), out_msg.id.clone(), text.id.clone()];
        let out = sanitize(vec![inv, text, out_msg]);
        let ids: Vec<_> = out.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, expected);
        assert!(is_pairing_valid(&out));
    }

    #[test]
    fn fifo_reorder_under_duplicate_ids() {
        // invocation A(x) → text → invocation B(x) → outcome → outcome:
        // FIFO means A gets the first outcome message and B the second,
        // not nearest-neighbor matching.
        let inv_a = invocation("x");
        let text = Message::user("in between");
        let inv_b = invocation("x");
        let out_1 = outcome("x");
        let out_2 = outcome("x");
        let expected = vec![
            inv_a.id.clone(),
            out_1.id.clone(),
            text.id.clone(),
            inv_b.id.clone(),
            out_2.id.clone(),
        ];
        let out = sanitize(vec![inv_a, text, inv_b, out_1, out_2]);
        let ids: Vec<_> = out.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, expected);
        assert!(is_pairing_valid(&out));
    }

    #[test]
    fn multi_invocation_message_collects_outcomes_in_block_order() {
        let multi = Message::with_blocks(
            Role::Assistant,
            vec![
                ContentBlock::invocation("a", "read", Map::new()),
                ContentBlock::invocation("b", "write", Map::new()),
            ],
        );
        let out_b = outcome("b");
        let out_a = outcome("a");
        let expected = vec![multi.id.clone(), out_a.id.clone(), out_b.id.clone()];
        let out = sanitize(vec![multi, out_b, out_a]);
        let ids: Vec<_> = out.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, expected);
        assert!(is_pairing_valid(&out));
    }

    // ── Prune pass ───────────────────────────────────────────────────────

    #[test]
    fn orphan_outcome_removed() {
        let out = sanitize(vec![Message::user("hi"), outcome("ghost")]);
        assert_eq!(texts(&out), vec!["hi"]);
    }

    #[test]
    fn unpaired_invocation_removed() {
        // Invocation followed directly by an unrelated user message, with
        // no outcome anywhere.
        let out = sanitize(vec![invocation("7"), Message::user("unrelated")]);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_user());
    }

    #[test]
    fn trailing_invocation_removed() {
        let out = sanitize(vec![Message::user("hi"), invocation("a")]);
        assert_eq!(texts(&out), vec!["hi"]);
    }

    #[test]
    fn partial_multi_invocation_removed_whole() {
        // All-or-nothing: a message with ids {a, b} but only an outcome for
        // a loses the message and the inspected outcome.
        let multi = Message::with_blocks(
            Role::Assistant,
            vec![
                ContentBlock::invocation("a", "read", Map::new()),
                ContentBlock::invocation("b", "write", Map::new()),
            ],
        );
        let out = sanitize(vec![Message::user("hi"), multi, outcome("a")]);
        assert_eq!(texts(&out), vec!["hi"]);
    }

    #[test]
    fn surplus_duplicate_outcome_dropped() {
        let inv = invocation("a");
        let out_1 = outcome("a");
        let out_2 = outcome("a");
        let expected = vec![inv.id.clone(), out_1.id.clone()];
        let out = sanitize(vec![inv, out_1, out_2]);
        let ids: Vec<_> = out.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, expected);
        assert!(is_pairing_valid(&out));
    }

    #[test]
    fn shared_outcome_message_cascade_converges() {
        // One outcome message serving two invocations, where the second
        // invocation has no outcome of its own: deleting it orphans the
        // shared outcome, which in turn orphans the first invocation.
        let out = sanitize(vec![
            invocation("a"),
            Message::with_blocks(
                Role::User,
                vec![
                    ContentBlock::outcome("a", json!(1)),
                    ContentBlock::outcome("b", json!(2)),
                ],
            ),
            invocation("b"),
        ]);
        assert!(is_pairing_valid(&out));
        assert!(out.is_empty());
    }

    #[test]
    fn worst_case_everything_pathological_yields_empty() {
        let out = sanitize(vec![outcome("x"), invocation("y"), outcome("z")]);
        assert!(out.is_empty());
    }

    // ── System prefix protection ─────────────────────────────────────────

    #[test]
    fn leading_system_run_never_touched() {
        let sys_1 = Message::system("one");
        let sys_2 = Message::system("two");
        let expected = vec![sys_1.id.clone(), sys_2.id.clone()];
        // Remainder is fully pathological and gets deleted.
        let out = sanitize(vec![sys_1, sys_2, outcome("ghost")]);
        let ids: Vec<_> = out.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, expected);
    }

    // ── Idempotence ──────────────────────────────────────────────────────

    #[test]
    fn sanitize_is_idempotent_on_repair() {
        let messages = vec![
            Message::user("hi"),
            invocation("a"),
            Message::assistant("interleaved"),
            outcome("a"),
            outcome("ghost"),
        ];
        let once = sanitize(messages);
        let twice = sanitize(once.clone());
        assert_eq!(once, twice);
    }

    // ── Properties ───────────────────────────────────────────────────────

    /// Strategy: arbitrary short transcripts mixing text, invocation, and
    /// outcome messages over a small call-id space, including multi-block
    /// messages.
    fn arb_transcript() -> impl Strategy<Value = Vec<Message>> {
        let call_id = prop_oneof![Just("a"), Just("b"), Just("c")];
        let block = prop_oneof![
            3 => Just(ContentBlock::text("chatter")),
            3 => call_id
                .clone()
                .prop_map(|id| ContentBlock::invocation(id, "tool", Map::new())),
            3 => call_id.prop_map(|id| ContentBlock::outcome(id, json!("out"))),
        ];
        let role = prop_oneof![Just(Role::User), Just(Role::Assistant)];
        let message = (role, proptest::collection::vec(block, 1..4))
            .prop_map(|(role, blocks)| Message::with_blocks(role, blocks));
        proptest::collection::vec(message, 0..12)
    }

    proptest! {
        #[test]
        fn prop_sanitize_idempotent(messages in arb_transcript()) {
            let once = sanitize(messages);
            let twice = sanitize(once.clone());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_sanitized_is_pairing_valid(messages in arb_transcript()) {
            let out = sanitize(messages);
            prop_assert!(is_pairing_valid(&out));
        }

        #[test]
        fn prop_no_duplicate_invocation_ids_within_message(messages in arb_transcript()) {
            for msg in sanitize(messages) {
                let ids = msg.invocation_ids();
                let unique: HashSet<&str> = ids.iter().copied().collect();
                prop_assert_eq!(unique.len(), ids.len());
            }
        }

        #[test]
        fn prop_valid_input_untouched(messages in arb_transcript()) {
            let once = sanitize(messages);
            // Once sanitized, a second pass must be the identity.
            let ptr = once.as_ptr();
            let twice = sanitize(once);
            prop_assert_eq!(twice.as_ptr(), ptr);
        }
    }
}
