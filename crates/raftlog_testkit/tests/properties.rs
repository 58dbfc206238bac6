//! Property tests comparing the log against an in-memory model.

use proptest::prelude::*;
use raftlog_core::{
    BytesMarshal, LogIndex, PruningStrategy, RaftLogEntry, SegmentedLog, Term, NO_INDEX, NO_TERM,
};
use raftlog_testkit::prelude::*;

/// What the log should hold after a sequence of operations.
#[derive(Debug)]
struct Model {
    prev_index: LogIndex,
    prev_term: Term,
    entries: Vec<(Term, String)>,
}

impl Model {
    fn new() -> Self {
        Self {
            prev_index: NO_INDEX,
            prev_term: NO_TERM,
            entries: Vec::new(),
        }
    }

    fn append_index(&self) -> LogIndex {
        self.prev_index + self.entries.len() as LogIndex
    }

    fn latest_term(&self) -> Term {
        self.entries.last().map_or(self.prev_term, |(t, _)| *t)
    }
}

fn apply(log: &mut TestLog, model: &mut Model, op: &LogOperation) {
    match op {
        LogOperation::Append { bumps } => {
            let mut term = model.latest_term().max(1);
            let entries: Vec<_> = bumps
                .iter()
                .map(|(bump, content)| {
                    term += bump;
                    RaftLogEntry::new(term, content.clone())
                })
                .collect();
            let last = log.append(&entries).unwrap();
            model
                .entries
                .extend(entries.into_iter().map(|e| (e.term, e.content)));
            assert_eq!(last, model.append_index());
        }
        LogOperation::Truncate { back } => {
            let back = (*back as usize).min(model.entries.len());
            let from = model.append_index() + 1 - back as LogIndex;
            log.truncate(from).unwrap();
            model.entries.truncate(model.entries.len() - back);
        }
        LogOperation::Skip { ahead } => {
            let new_index = model.append_index() + LogIndex::from(*ahead);
            let new_term = model.latest_term().max(1) + 1;
            log.skip(new_index, new_term).unwrap();
            model.prev_index = new_index;
            model.prev_term = new_term;
            model.entries.clear();
        }
        LogOperation::Prune { safe } => {
            let safe_index = (model.prev_index + LogIndex::from(*safe)).min(model.append_index());
            let prev_index = log.prune(safe_index).unwrap();
            assert!(prev_index >= model.prev_index && prev_index <= safe_index);
            let dropped = (prev_index - model.prev_index) as usize;
            if dropped > 0 {
                model.prev_term = model.entries[dropped - 1].0;
                model.entries.drain(..dropped);
                model.prev_index = prev_index;
            }
        }
        LogOperation::Reopen => log.reopen(),
    }
}

fn check(log: &TestLog, model: &Model) {
    assert_eq!(log.append_index(), model.append_index());
    assert_eq!(log.prev_index(), model.prev_index);

    let expected: Vec<(LogIndex, Term, String)> = model
        .entries
        .iter()
        .enumerate()
        .map(|(offset, (term, content))| {
            (model.prev_index + 1 + offset as LogIndex, *term, content.clone())
        })
        .collect();
    assert_eq!(log.read_from(model.prev_index + 1), expected);

    for (index, term, _) in &expected {
        assert_eq!(log.read_entry_term(*index).unwrap(), *term, "term at {index}");
    }
    assert_eq!(log.read_entry_term(model.append_index() + 1).unwrap(), NO_TERM);
}

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn log_matches_model(ops in operation_sequence_strategy(1, 24)) {
        let mut log = TestLog::with_config(
            test_config()
                .rotate_at_size(256)
                .pruning_strategy(PruningStrategy::EntryBudget(0)),
        );
        let mut model = Model::new();
        for op in &ops {
            apply(&mut log, &mut model, op);
            check(&log, &model);
        }

        log.reopen();
        check(&log, &model);
    }

    #[test]
    fn batches_read_back_in_order(batch in entry_batch_strategy(1, 40)) {
        let log = TestLog::with_small_segments(200);
        let last = log.append(&batch).unwrap();
        prop_assert_eq!(last, batch.len() as LogIndex - 1);

        let read: Vec<RaftLogEntry<String>> = log
            .open_cursor(0)
            .unwrap()
            .map(|e| e.unwrap().into_entry())
            .collect();
        prop_assert_eq!(read, batch);
    }

    #[test]
    fn cursor_from_any_index_yields_suffix(
        batch in entry_batch_strategy(1, 30),
        start in 0usize..30,
    ) {
        let log = TestLog::with_small_segments(128);
        log.append(&batch).unwrap();
        let start = start.min(batch.len());

        let read: Vec<String> = log.contents_from(start as LogIndex);
        let expected: Vec<String> = batch[start..].iter().map(|e| e.content.clone()).collect();
        prop_assert_eq!(read, expected);
    }

    #[test]
    fn byte_content_round_trips(contents in prop::collection::vec(bytes_strategy(), 1..20)) {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config().rotate_at_size(512);
        let entries: Vec<_> = contents.iter().map(|c| RaftLogEntry::new(1, c.clone())).collect();
        {
            let log = SegmentedLog::open(dir.path(), config.clone(), BytesMarshal).unwrap();
            log.append(&entries).unwrap();
            log.close().unwrap();
        }

        let log = SegmentedLog::open(dir.path(), config, BytesMarshal).unwrap();
        let read: Vec<Vec<u8>> = log.open_cursor(0).unwrap().map(|e| e.unwrap().content).collect();
        prop_assert_eq!(read, contents);
    }
}
