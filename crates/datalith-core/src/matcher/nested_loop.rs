//! Module: matcher::nested_loop
//! Responsibility: index-nested-loop with seek reuse, one key-only scan,
//! repositioned once per sorted binding run.
//! Does not own: strategy dispatch or the sortedness of caller input
//! (bindings are sorted here, unconditionally, because the seek-reuse
//! invariant depends on it).
//! Boundary: after processing run `i` the cursor sits at a key
//! `>= prefix(i)`, and sorted runs make every later seek non-decreasing.

use crate::{
    datom::{Datom, DatomPosition},
    error::CoreError,
    matcher::{
        binding::{JoinConstant, ProjectedBinding},
        emit::CandidateSource,
    },
    relation::Tuple,
    scan::DatomScan,
};

///
/// BindingRun
///
/// All binding rows sharing one join value, keyed by the seek prefix that
/// value produces.
///

pub(super) struct BindingRun {
    pub(super) prefix: Vec<u8>,
    pub(super) rows: Vec<Tuple>,
}

/// Group projected rows into prefix-sorted runs. Rows whose join cell
/// cannot take the join position's type contribute nothing.
pub(super) fn binding_runs(
    binding: &ProjectedBinding,
    join_column: usize,
    join_position: DatomPosition,
    mut prefix_for: impl FnMut(&JoinConstant) -> Vec<u8>,
) -> Vec<BindingRun> {
    let mut keyed: Vec<(Vec<u8>, Tuple)> = binding
        .rows
        .iter()
        .filter_map(|row| {
            let cell = row.get(join_column)?;
            let constant = JoinConstant::from_cell(cell, join_position)?;
            Some((prefix_for(&constant), row.clone()))
        })
        .collect();

    keyed.sort_by(|(left, _), (right, _)| left.cmp(right));

    let mut runs: Vec<BindingRun> = Vec::new();
    for (prefix, row) in keyed {
        match runs.last_mut() {
            Some(run) if run.prefix == prefix => run.rows.push(row),
            _ => runs.push(BindingRun {
                prefix,
                rows: vec![row],
            }),
        }
    }

    runs
}

///
/// NestedLoopSource
///

pub(super) struct NestedLoopSource {
    scan: DatomScan,
    runs: Vec<BindingRun>,
    verify: Vec<(DatomPosition, usize)>,
    run_index: usize,
    in_run: bool,
}

impl NestedLoopSource {
    pub(super) fn new(
        scan: DatomScan,
        runs: Vec<BindingRun>,
        verify: Vec<(DatomPosition, usize)>,
    ) -> Self {
        Self {
            scan,
            runs,
            verify,
            run_index: 0,
            in_run: false,
        }
    }

    fn surface_scan_end(&mut self) -> Result<(), CoreError> {
        match self.scan.take_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl CandidateSource for NestedLoopSource {
    fn next_match(&mut self) -> Result<Option<(Datom, usize)>, CoreError> {
        loop {
            if !self.in_run {
                let Some(run) = self.runs.get(self.run_index) else {
                    return Ok(None);
                };
                self.scan.seek(&run.prefix)?;
                self.in_run = true;
            }

            let run = &self.runs[self.run_index];
            let Some((key, datom)) = self.scan.next_with_key() else {
                self.surface_scan_end()?;
                // Range exhausted: no later run can match either, but the
                // cursor contract still requires each to observe its seek.
                self.in_run = false;
                self.run_index += 1;
                if self.run_index >= self.runs.len() {
                    return Ok(None);
                }
                continue;
            };

            if key.starts_with(&run.prefix) {
                let multiplicity = run
                    .rows
                    .iter()
                    .filter(|row| ProjectedBinding::row_matches(row, &self.verify, &datom))
                    .count();
                if multiplicity > 0 {
                    return Ok(Some((datom, multiplicity)));
                }
                continue;
            }

            // First key past the run's prefix: advance to the next run.
            // The overshoot key is not lost; the next seek repositions.
            self.in_run = false;
            self.run_index += 1;
        }
    }

    fn datoms_scanned(&self) -> u64 {
        self.scan.datoms_scanned()
    }
}
