//! Parallel commit of many labeled meetings.
//!
//! Meetings are independent: the store serializes writers per entity, so
//! worker threads only contend when two meetings enrolled the same
//! legislator. One meeting's failure never blocks the rest; every meeting
//! gets its own line in the returned outcomes.

use crate::enroll::workflow::EnrollmentWorkflow;
use crate::enroll::CommitReport;
use crate::error::Result;
use crate::roster::RosterIndex;
use crate::store::ProfileStore;
use crossbeam_channel::unbounded;
use std::collections::HashMap;
use std::thread;

/// Result of committing one meeting in a batch.
#[derive(Debug)]
pub struct MeetingOutcome {
    pub meeting_id: String,
    pub result: Result<CommitReport>,
}

/// Commit `meeting_ids` across up to `workers` threads.
///
/// Outcomes are returned in the same order as the input ids.
pub fn commit_meetings(
    workflow: &EnrollmentWorkflow,
    store: &ProfileStore,
    roster: &RosterIndex,
    meeting_ids: &[String],
    workers: usize,
) -> Vec<MeetingOutcome> {
    let workers = workers.clamp(1, meeting_ids.len().max(1));
    let (work_tx, work_rx) = unbounded::<String>();
    let (done_tx, done_rx) = unbounded::<MeetingOutcome>();

    for id in meeting_ids {
        // Send cannot fail while the receiver is alive in this scope
        let _ = work_tx.send(id.clone());
    }
    drop(work_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let work_rx = work_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move || {
                while let Ok(meeting_id) = work_rx.recv() {
                    let result = workflow.commit(&meeting_id, store, roster);
                    let _ = done_tx.send(MeetingOutcome { meeting_id, result });
                }
            });
        }
        drop(done_tx);
    });

    let mut by_id: HashMap<String, MeetingOutcome> = done_rx
        .into_iter()
        .map(|outcome| (outcome.meeting_id.clone(), outcome))
        .collect();
    meeting_ids
        .iter()
        .filter_map(|id| by_id.remove(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedding;
    use crate::enroll::{DiarizedSegment, LabelDecision};
    use crate::error::RollcallError;
    use crate::extractor::MockExtractor;
    use crate::roster::test_support::sample_roster;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn prepare_meeting(workflow: &EnrollmentWorkflow, meeting_id: &str, slug: &str) {
        let segments = vec![DiarizedSegment {
            speaker_label: "SPEAKER_00".to_string(),
            start_secs: 0.0,
            end_secs: 10.0,
        }];
        workflow
            .ingest_diarization(
                meeting_id,
                &format!("audio/{meeting_id}.wav"),
                Some("HJC"),
                NaiveDate::from_ymd_opt(2025, 1, 23).unwrap(),
                &segments,
            )
            .unwrap();
        let extractor = MockExtractor::new(Embedding::new(vec![1.0, 0.0]));
        workflow.compute_embeddings(meeting_id, &extractor).unwrap();
        workflow
            .label_speaker(
                meeting_id,
                "SPEAKER_00",
                LabelDecision::Assign {
                    slug: slug.to_string(),
                },
            )
            .unwrap();
    }

    #[test]
    fn test_batch_commits_all_meetings() {
        let workdir = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        let workflow = EnrollmentWorkflow::open(workdir.path()).unwrap();
        let store = ProfileStore::open(store_dir.path(), 2).unwrap();
        let roster = sample_roster();

        let ids: Vec<String> = (0..6).map(|i| format!("hjc_m{i}")).collect();
        for id in &ids {
            prepare_meeting(&workflow, id, "gail_chasey");
        }

        let outcomes = commit_meetings(&workflow, &store, &roster, &ids, 3);
        assert_eq!(outcomes.len(), 6);
        for outcome in &outcomes {
            assert!(outcome.result.as_ref().unwrap().is_clean());
        }
        // All six meetings landed on the same entity without lost updates
        let profile = store.get("gail_chasey").unwrap();
        assert_eq!(profile.stats.total_samples, 6);
        profile.verify_aggregate().unwrap();
    }

    #[test]
    fn test_batch_outcomes_keep_input_order() {
        let workdir = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        let workflow = EnrollmentWorkflow::open(workdir.path()).unwrap();
        let store = ProfileStore::open(store_dir.path(), 2).unwrap();
        let roster = sample_roster();

        let ids: Vec<String> = (0..4).map(|i| format!("m{i}")).collect();
        for id in &ids {
            prepare_meeting(&workflow, id, "christine_chandler");
        }

        let outcomes = commit_meetings(&workflow, &store, &roster, &ids, 4);
        let got: Vec<&str> = outcomes.iter().map(|o| o.meeting_id.as_str()).collect();
        assert_eq!(got, vec!["m0", "m1", "m2", "m3"]);
    }

    #[test]
    fn test_one_bad_meeting_does_not_block_others() {
        let workdir = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        let workflow = EnrollmentWorkflow::open(workdir.path()).unwrap();
        let store = ProfileStore::open(store_dir.path(), 2).unwrap();
        let roster = sample_roster();

        prepare_meeting(&workflow, "good", "gail_chasey");
        let ids = vec!["good".to_string(), "never_ingested".to_string()];

        let outcomes = commit_meetings(&workflow, &store, &roster, &ids, 2);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(RollcallError::MeetingNotFound { .. })
        ));
        assert_eq!(store.get("gail_chasey").unwrap().stats.total_samples, 1);
    }
}
