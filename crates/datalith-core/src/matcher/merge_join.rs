//! Module: matcher::merge_join
//! Responsibility: sort-merge join, one ordered pass over the pattern's
//! range against binding runs sorted by join-component bytes.
//! Does not own: the guarantee that the scanned range is ordered by the
//! join position (the dispatcher only picks merge when the chosen index
//! puts the join position right after the constant prefix).
//! Boundary: duplicate join values on either side multiply, never
//! deduplicate.

use crate::{
    datom::{Datom, DatomPosition},
    error::CoreError,
    matcher::{
        binding::{ProjectedBinding, datom_component_bytes},
        emit::CandidateSource,
        nested_loop::BindingRun,
    },
    scan::DatomScan,
};
use std::cmp::Ordering;

///
/// MergeJoinSource
///
/// `runs` are keyed by join-component bytes (not seek prefixes) and must
/// arrive sorted; the scan produces datoms whose join components ascend,
/// so both cursors only ever move forward.
///

pub(super) struct MergeJoinSource {
    scan: DatomScan,
    runs: Vec<BindingRun>,
    join_position: DatomPosition,
    verify: Vec<(DatomPosition, usize)>,
    run_index: usize,
}

impl MergeJoinSource {
    pub(super) fn new(
        scan: DatomScan,
        runs: Vec<BindingRun>,
        join_position: DatomPosition,
        verify: Vec<(DatomPosition, usize)>,
    ) -> Self {
        debug_assert!(runs.windows(2).all(|pair| pair[0].prefix < pair[1].prefix));

        Self {
            scan,
            runs,
            join_position,
            verify,
            run_index: 0,
        }
    }
}

impl CandidateSource for MergeJoinSource {
    fn next_match(&mut self) -> Result<Option<(Datom, usize)>, CoreError> {
        loop {
            if self.run_index >= self.runs.len() {
                return Ok(None);
            }

            let Some(datom) = self.scan.next_datom() else {
                return match self.scan.take_error() {
                    Some(err) => Err(err),
                    None => Ok(None),
                };
            };

            let datom_key = datom_component_bytes(&datom, self.join_position);

            // Advance the binding cursor past runs below this datom.
            while self
                .runs
                .get(self.run_index)
                .is_some_and(|run| run.prefix.as_slice() < datom_key.as_slice())
            {
                self.run_index += 1;
            }

            let Some(run) = self.runs.get(self.run_index) else {
                return Ok(None);
            };

            match datom_key.as_slice().cmp(run.prefix.as_slice()) {
                // Datom below the next binding value: skip it.
                Ordering::Less => continue,
                Ordering::Equal => {
                    let multiplicity = run
                        .rows
                        .iter()
                        .filter(|row| ProjectedBinding::row_matches(row, &self.verify, &datom))
                        .count();
                    if multiplicity > 0 {
                        return Ok(Some((datom, multiplicity)));
                    }
                }
                Ordering::Greater => {
                    unreachable!("binding cursor was advanced past smaller runs");
                }
            }
        }
    }

    fn datoms_scanned(&self) -> u64 {
        self.scan.datoms_scanned()
    }
}
