use proptest::prelude::*;

use prochub::exec::ReplayBuffer;

fn chunks_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..40), 0..20)
}

proptest! {
    // Whatever was appended, a fresh reader sees exactly the newest
    // min(total, capacity) bytes, and counts the rest as missed.
    #[test]
    fn rewind_yields_the_newest_bytes(
        capacity in 1usize..64,
        chunks in chunks_strategy(),
    ) {
        let buffer = ReplayBuffer::new(capacity);
        let mut all = Vec::new();
        for chunk in &chunks {
            buffer.append(chunk);
            all.extend_from_slice(chunk);
        }

        let held = all.len().min(capacity);
        let expected = &all[all.len() - held..];

        let mut reader = buffer.rewind();
        prop_assert_eq!(reader.read_available(), expected.to_vec());
        prop_assert_eq!(reader.missed(), (all.len() - held) as u64);
        prop_assert_eq!(buffer.len(), held);
        prop_assert_eq!(buffer.total_written(), all.len() as u64);
    }

    // Reading in steps between appends never yields more than what was
    // written, and a reader that keeps up never misses anything.
    #[test]
    fn incremental_reader_keeping_up_misses_nothing(
        chunks in chunks_strategy(),
    ) {
        let capacity = 64;
        let buffer = ReplayBuffer::new(capacity);
        let mut reader = buffer.rewind();
        let mut seen = Vec::new();
        let mut all = Vec::new();

        for chunk in &chunks {
            buffer.append(chunk);
            all.extend_from_slice(chunk);
            seen.extend(reader.read_available());
        }

        prop_assert_eq!(reader.missed(), 0);
        prop_assert_eq!(seen, all);
    }
}
