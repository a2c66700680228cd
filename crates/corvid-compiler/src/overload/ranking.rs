//! Tiered ranking shared by every symbol lookup.
//!
//! Overload resolution and the struct, alias and global lookups all pick the
//! best entry out of a candidate list the same way:
//!
//! 1. Candidates that do not match the identifier never enter.
//! 2. Matching candidates reach [`Perfectus::Good`] with a badness, or are
//!    rejected with a note explaining why.
//! 3. The lowest badness wins.
//! 4. A tie is broken only when exactly one tied candidate was declared in
//!    the relevant file ([`Perfectus::File`]); otherwise it is ambiguous.

use corvid_core::FileId;

/// How far a candidate got through the match tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Perfectus {
    None,
    Identifier,
    Good,
    File,
}

/// A candidate that matched with a badness.
#[derive(Debug, Clone)]
pub struct Ranked<T> {
    pub item: T,
    pub badness: u32,
    pub perfectus: Perfectus,
}

/// Outcome of ranking.
#[derive(Debug, Clone)]
pub enum RankOutcome<T> {
    Found(Ranked<T>),
    /// Equal badness and no unique candidate in the relevant file.
    Ambiguous(Vec<Ranked<T>>),
    /// Nothing matched; one note per rejected candidate.
    NotFound(Vec<String>),
}

impl<T> RankOutcome<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(ranked) => Some(ranked.item),
            _ => None,
        }
    }
}

/// Collects candidates and selects the best one.
#[derive(Debug)]
pub struct RankedMatch<T> {
    relevant_file: FileId,
    candidates: Vec<Ranked<T>>,
    notes: Vec<String>,
}

impl<T> RankedMatch<T> {
    pub fn new(relevant_file: FileId) -> Self {
        Self {
            relevant_file,
            candidates: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Accept a candidate with a known badness.
    pub fn accept(&mut self, item: T, file: FileId, badness: u32) {
        let perfectus = if file == self.relevant_file {
            Perfectus::File
        } else {
            Perfectus::Good
        };
        self.candidates.push(Ranked {
            item,
            badness,
            perfectus,
        });
    }

    pub fn reject(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn finish(self) -> RankOutcome<T> {
        let Some(best) = self.candidates.iter().map(|c| c.badness).min() else {
            return RankOutcome::NotFound(self.notes);
        };
        let mut tied: Vec<_> = self
            .candidates
            .into_iter()
            .filter(|c| c.badness == best)
            .collect();
        if tied.len() == 1 {
            return RankOutcome::Found(tied.remove(0));
        }
        let in_file = tied.iter().filter(|c| c.perfectus == Perfectus::File).count();
        if in_file == 1 {
            let index = tied
                .iter()
                .position(|c| c.perfectus == Perfectus::File)
                .unwrap_or(0);
            return RankOutcome::Found(tied.swap_remove(index));
        }
        RankOutcome::Ambiguous(tied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_badness_wins() {
        let mut ranked = RankedMatch::new(FileId(0));
        ranked.accept("cast", FileId(1), 1);
        ranked.accept("exact", FileId(1), 0);
        assert_eq!(ranked.finish().found(), Some("exact"));
    }

    #[test]
    fn relevant_file_breaks_ties() {
        let mut ranked = RankedMatch::new(FileId(2));
        ranked.accept("other", FileId(1), 0);
        ranked.accept("local", FileId(2), 0);
        assert_eq!(ranked.finish().found(), Some("local"));
    }

    #[test]
    fn ties_in_other_files_are_ambiguous() {
        let mut ranked = RankedMatch::new(FileId(0));
        ranked.accept("a", FileId(1), 0);
        ranked.accept("b", FileId(2), 0);
        assert!(matches!(ranked.finish(), RankOutcome::Ambiguous(tied) if tied.len() == 2));
    }

    #[test]
    fn ties_in_the_same_file_are_ambiguous() {
        let mut ranked = RankedMatch::new(FileId(1));
        ranked.accept("a", FileId(1), 0);
        ranked.accept("b", FileId(1), 0);
        assert!(matches!(ranked.finish(), RankOutcome::Ambiguous(_)));
    }

    #[test]
    fn rejections_become_notes() {
        let mut ranked: RankedMatch<&str> = RankedMatch::new(FileId(0));
        ranked.reject("expects 2 arguments");
        match ranked.finish() {
            RankOutcome::NotFound(notes) => {
                assert_eq!(notes, vec!["expects 2 arguments".to_string()])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn deterministic_for_same_candidates() {
        let run = || {
            let mut ranked = RankedMatch::new(FileId(0));
            ranked.accept(1, FileId(0), 2);
            ranked.accept(2, FileId(0), 1);
            ranked.accept(3, FileId(1), 1);
            ranked.finish().found()
        };
        assert_eq!(run(), Some(2));
        assert_eq!(run(), run());
    }
}
