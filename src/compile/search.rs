use crate::types::syntax::{Kind, Syntax};

/// Finds syntax delimiters in a document.
///
/// Only a handful of patterns are ever configured so each search tries every
/// pattern and keeps the earliest match, preferring the longest pattern when
/// two start at the same offset. Searches for begin delimiters go through a
/// [`Hits`] cache owned by the caller so that a document is scanned at most
/// once per pattern.
#[derive(Debug, Clone)]
pub struct Searcher {
    patterns: Vec<(Kind, String)>,
}

/// The next known match of every pattern in one document.
///
/// Offsets passed to [`Searcher::find_begin_at`] with the same cache must
/// never decrease.
#[derive(Debug, Clone)]
pub struct Hits {
    /// `None` when the pattern has not been searched for yet, `Some(None)`
    /// when it does not occur again.
    next: Vec<Option<Option<usize>>>,
}

impl Searcher {
    pub fn new(syntax: Syntax) -> Self {
        Self {
            patterns: syntax.patterns,
        }
    }

    /// Returns an empty cache for searching a new document.
    pub fn hits(&self) -> Hits {
        Hits {
            next: vec![None; self.patterns.len()],
        }
    }

    /// Returns the next begin delimiter at or after `at`.
    pub fn find_begin_at(
        &self,
        haystack: &str,
        at: usize,
        hits: &mut Hits,
    ) -> Option<(Kind, usize, usize)> {
        let mut best: Option<(Kind, usize, usize)> = None;
        for (p, (kind, pattern)) in self.patterns.iter().enumerate() {
            if !kind.is_begin() {
                continue;
            }
            let m = match hits.next[p] {
                Some(Some(m)) if m >= at => m,
                Some(None) => continue,
                _ => {
                    let found = haystack[at..].find(pattern.as_str()).map(|i| at + i);
                    hits.next[p] = Some(found);
                    match found {
                        Some(m) => m,
                        None => continue,
                    }
                }
            };
            let n = m + pattern.len();
            best = match best {
                Some((_, bm, bn)) if bm < m || (bm == m && bn >= n) => best,
                _ => Some((*kind, m, n)),
            };
        }
        best
    }

    /// Returns the kind and end offset of a begin delimiter that starts
    /// exactly at `at`.
    pub fn begin_starts_with(&self, haystack: &str, at: usize) -> Option<(Kind, usize)> {
        self.patterns
            .iter()
            .filter(|(k, p)| k.is_begin() && haystack[at..].starts_with(p.as_str()))
            .max_by_key(|(_, p)| p.len())
            .map(|(k, p)| (*k, at + p.len()))
    }

    /// Returns the end offset if the delimiter `kind` starts exactly at `at`.
    pub fn starts_with(&self, haystack: &str, at: usize, kind: Kind) -> Option<usize> {
        let (_, pattern) = self.patterns.iter().find(|(k, _)| *k == kind)?;
        haystack[at..]
            .starts_with(pattern.as_str())
            .then(|| at + pattern.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_begin_earliest() {
        let s = Searcher::new(Syntax::default());
        let mut hits = s.hits();
        let haystack = "ab &{ IF X } ${Y} &{ENDIF}";
        assert_eq!(
            s.find_begin_at(haystack, 0, &mut hits),
            Some((Kind::BeginDirective, 3, 5))
        );
        assert_eq!(
            s.find_begin_at(haystack, 5, &mut hits),
            Some((Kind::BeginVar, 13, 15))
        );
        assert_eq!(
            s.find_begin_at(haystack, 17, &mut hits),
            Some((Kind::BeginDirective, 18, 20))
        );
        assert_eq!(s.find_begin_at(haystack, 20, &mut hits), None);

        let mut hits = s.hits();
        assert_eq!(s.find_begin_at("no tags } here", 0, &mut hits), None);
    }

    #[test]
    fn find_begin_remembers_missing_pattern() {
        let s = Searcher::new(Syntax::default());
        let mut hits = s.hits();
        let haystack = "&{IF X}a&{ENDIF}";
        assert_eq!(
            s.find_begin_at(haystack, 0, &mut hits),
            Some((Kind::BeginDirective, 0, 2))
        );
        let var = s
            .patterns
            .iter()
            .position(|(k, _)| *k == Kind::BeginVar)
            .unwrap();
        assert_eq!(hits.next[var], Some(None));
        assert_eq!(
            s.find_begin_at(haystack, 7, &mut hits),
            Some((Kind::BeginDirective, 8, 10))
        );
    }

    #[test]
    fn find_begin_prefers_longest() {
        let syntax = Syntax::builder().var("<", ">").directive("<%", "%>").build();
        let s = Searcher::new(syntax);
        let mut hits = s.hits();
        assert_eq!(
            s.find_begin_at("a <% IF", 0, &mut hits),
            Some((Kind::BeginDirective, 2, 4))
        );
        assert_eq!(s.begin_starts_with("<%", 0), Some((Kind::BeginDirective, 2)));
    }

    #[test]
    fn starts_with_kind() {
        let s = Searcher::new(Syntax::default());
        assert_eq!(s.starts_with("x}", 1, Kind::EndVar), Some(2));
        assert_eq!(s.starts_with("x}", 0, Kind::EndVar), None);
    }
}
