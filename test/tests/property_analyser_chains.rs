/// PROPERTY-BASED TESTS: analyser chains
///
/// Events for several descriptors, interleaved and shuffled inside one
/// aggregate, come out as one sorted chain per descriptor.

use proptest::prelude::*;

use opus_graph::{Analyser, MemoryGraphStore};
use opus_shared::{AggregationMessage, RawMessage};
use opus_test::call;

const PID: i32 = 314;

fn tagged_times() -> impl Strategy<Value = Vec<(u64, bool)>> {
    prop::collection::hash_set(10u64..50_000, 1..30)
        .prop_flat_map(|times| {
            let times: Vec<u64> = times.into_iter().collect();
            let len = times.len();
            (Just(times), prop::collection::vec(any::<bool>(), len))
        })
        .prop_map(|(times, sides)| times.into_iter().zip(sides).collect::<Vec<_>>())
        .prop_shuffle()
}

proptest! {
    #[test]
    fn prop_each_descriptor_chain_is_sorted(events in tagged_times()) {
        let mut analyser = Analyser::posix(MemoryGraphStore::new()).unwrap();
        let records = events
            .iter()
            .map(|(time, on_four)| {
                let fd = if *on_four { "4" } else { "3" };
                call("write", &[("fd", fd)], 1, *time)
            })
            .collect();

        let batch = vec![
            RawMessage::from_payload(PID, PID, &call("open", &[("pathname", "/a")], 3, 1)).unwrap(),
            RawMessage::from_payload(PID, PID, &call("open", &[("pathname", "/b")], 4, 2)).unwrap(),
            RawMessage::from_payload(PID, PID, &AggregationMessage::new(records)).unwrap(),
        ];
        analyser.analyse_batch(batch);

        let process = analyser.process_node(PID).unwrap();
        for (fd, on_four) in [("3", false), ("4", true)] {
            let mut expected: Vec<u64> = events
                .iter()
                .filter(|(_, side)| *side == on_four)
                .map(|(time, _)| *time)
                .collect();
            expected.sort_unstable();

            let actual: Vec<u64> = analyser
                .cache()
                .get(process, fd)
                .map(|index| index.chains()[0].events().iter().map(|link| link.before_time).collect())
                .unwrap_or_default();
            prop_assert_eq!(actual, expected);
        }
        prop_assert_eq!(analyser.stats().events, events.len());
        prop_assert_eq!(analyser.stats().misplaced, 0);
    }
}
