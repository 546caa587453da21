//! Module: matcher::unbound
//! Responsibility: the no-bindings strategy, one key-only scan over the
//! constants' prefix range.
//! Does not own: post-scan filtering (emit::MatchFilter).
//! Boundary: a pattern with every position variable and no bindings is a
//! full scan of the EAVT namespace, nothing cleverer.

use crate::{
    datom::Datom,
    error::CoreError,
    matcher::emit::CandidateSource,
    scan::DatomScan,
};

///
/// UnboundSource
///

pub(super) struct UnboundSource {
    scan: DatomScan,
}

impl UnboundSource {
    pub(super) const fn new(scan: DatomScan) -> Self {
        Self { scan }
    }
}

impl CandidateSource for UnboundSource {
    fn next_match(&mut self) -> Result<Option<(Datom, usize)>, CoreError> {
        match self.scan.next_datom() {
            Some(datom) => Ok(Some((datom, 1))),
            None => match self.scan.take_error() {
                Some(err) => Err(err),
                None => Ok(None),
            },
        }
    }

    fn datoms_scanned(&self) -> u64 {
        self.scan.datoms_scanned()
    }
}
