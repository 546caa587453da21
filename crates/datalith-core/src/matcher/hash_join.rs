//! Module: matcher::hash_join
//! Responsibility: hash-join scan, one pass over the pattern's range,
//! probing a hash table keyed by the binding's join-value bytes.
//! Does not own: range selection or post-scan filtering.
//! Boundary: the table is keyed by canonical component bytes, so equal
//! interned identities and keywords collide correctly; a probe hit still
//! verifies the full row against the datom for multi-variable joins.

use crate::{
    datom::{Datom, DatomPosition},
    error::CoreError,
    matcher::{
        binding::{JoinConstant, ProjectedBinding, datom_component_bytes},
        emit::CandidateSource,
    },
    relation::Tuple,
    scan::DatomScan,
};
use std::collections::HashMap;

///
/// HashJoinSource
///

pub(super) struct HashJoinSource {
    scan: DatomScan,
    table: HashMap<Vec<u8>, Vec<Tuple>>,
    join_position: DatomPosition,
    verify: Vec<(DatomPosition, usize)>,
}

impl HashJoinSource {
    pub(super) fn new(
        scan: DatomScan,
        binding: &ProjectedBinding,
        join_column: usize,
        join_position: DatomPosition,
        verify: Vec<(DatomPosition, usize)>,
    ) -> Self {
        let mut table: HashMap<Vec<u8>, Vec<Tuple>> = HashMap::with_capacity(binding.rows.len());
        for row in &binding.rows {
            let Some(cell) = row.get(join_column) else {
                continue;
            };
            let Some(constant) = JoinConstant::from_cell(cell, join_position) else {
                continue;
            };
            table
                .entry(constant.component_bytes())
                .or_default()
                .push(row.clone());
        }

        Self {
            scan,
            table,
            join_position,
            verify,
        }
    }
}

impl CandidateSource for HashJoinSource {
    fn next_match(&mut self) -> Result<Option<(Datom, usize)>, CoreError> {
        loop {
            let Some(datom) = self.scan.next_datom() else {
                return match self.scan.take_error() {
                    Some(err) => Err(err),
                    None => Ok(None),
                };
            };

            let probe = datom_component_bytes(&datom, self.join_position);
            let Some(rows) = self.table.get(&probe) else {
                continue;
            };

            let multiplicity = rows
                .iter()
                .filter(|row| ProjectedBinding::row_matches(row, &self.verify, &datom))
                .count();
            if multiplicity > 0 {
                return Ok(Some((datom, multiplicity)));
            }
        }
    }

    fn datoms_scanned(&self) -> u64 {
        self.scan.datoms_scanned()
    }
}
