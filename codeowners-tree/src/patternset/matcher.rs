use std::{cell::RefCell, collections::HashMap};

use thread_local::ThreadLocal;

use super::nfa::{Nfa, StateId};

/// Matches paths against a set of patterns. Created using a
/// [`super::Builder`].
///
/// Files in the same directory share every step of the walk through the NFA
/// except the last, so the states reached for each directory are cached.
/// The cache is kept per thread so matching from many threads never
/// contends on a lock.
pub struct Matcher {
    nfa: Nfa,
    dir_cache: ThreadLocal<RefCell<HashMap<String, Vec<StateId>>>>,
}

impl Matcher {
    pub(crate) fn new(nfa: Nfa) -> Matcher {
        Self {
            nfa,
            dir_cache: ThreadLocal::new(),
        }
    }

    /// Ids of every pattern matching `path`, sorted ascending. `path` is
    /// relative to the repository root and uses `/` separators.
    pub fn matching_patterns(&self, path: &str) -> Vec<usize> {
        let (dir, file_name) = match path.rsplit_once('/') {
            Some((dir, file_name)) => (dir, file_name),
            None => ("", path),
        };
        let dir_states = self.states_for_dir(dir);
        let final_states = self.nfa.step(&dir_states, file_name);
        self.nfa.accepted_patterns(&final_states)
    }

    /// Number of NFA states backing this matcher.
    pub fn state_count(&self) -> usize {
        self.nfa.len()
    }

    fn states_for_dir(&self, dir: &str) -> Vec<StateId> {
        if dir.is_empty() {
            return self.nfa.initial_states();
        }

        let cache = self.dir_cache.get_or_default();
        if let Some(states) = cache.borrow().get(dir) {
            return states.clone();
        }

        // Walk up to the deepest ancestor we already have states for
        let mut ancestor_end = dir.len();
        let (mut states, mut segment_start) = loop {
            match dir[..ancestor_end].rfind('/') {
                Some(idx) => {
                    ancestor_end = idx;
                    if let Some(states) = cache.borrow().get(&dir[..idx]) {
                        break (states.clone(), idx + 1);
                    }
                }
                None => break (self.nfa.initial_states(), 0),
            }
        };

        // Then step back down through the remaining segments, caching the
        // states for every directory on the way
        let mut cache = cache.borrow_mut();
        for segment in dir[segment_start..].split('/') {
            states = self.nfa.step(&states, segment);
            let segment_end = segment_start + segment.len();
            cache.insert(dir[..segment_end].to_owned(), states.clone());
            segment_start = segment_end + 1;
        }
        states
    }
}

impl Clone for Matcher {
    fn clone(&self) -> Self {
        Matcher::new(self.nfa.clone())
    }
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("states", &self.nfa.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::super::Builder;
    use super::*;

    #[test]
    fn test_literal_paths() {
        let patterns = [
            "/api/handlers/user.go",
            "/web/app/index.ts",
            "index.ts",
            "api/main.go",
        ];
        check_matches(
            &patterns,
            &[
                ("api/handlers/user.go", vec![0]),
                ("web/app/index.ts", vec![1, 2]),
                ("web/lib/index.ts", vec![2]),
                ("api/main.go", vec![3]),
                ("svc/api/main.go", vec![]),
                ("api/handlers/user.rs", vec![]),
            ],
        );
    }

    #[test]
    fn test_directory_prefixes() {
        let patterns = ["docs", "docs/api", "docs/api/"];
        check_matches(
            &patterns,
            &[
                ("docs/api/intro.md", vec![0, 1, 2]),
                ("docs/api", vec![0, 1]),
                ("web/docs/api/x.md", vec![0]),
                ("docs", vec![0]),
            ],
        );
    }

    #[test]
    fn test_anchoring() {
        let patterns = ["/Makefile", "Makefile", "/build/Makefile", "build/Makefile"];
        check_matches(
            &patterns,
            &[
                ("Makefile", vec![0, 1]),
                ("build/Makefile", vec![1, 2, 3]),
                ("tools/build/Makefile", vec![1]),
            ],
        );
    }

    #[test]
    fn test_rooted_directory() {
        check_matches(
            &["/docs/"],
            &[
                ("docs/readme.md", vec![0]),
                ("docs/sub/guide.md", vec![0]),
                ("src/docs/fake.md", vec![]),
                ("docs", vec![]),
            ],
        );
    }

    #[test]
    fn test_wildcards() {
        let patterns = [
            "web/*/index.ts",
            "web/app/*",
            "*/*/index.ts",
            "web/app/*/",
        ];
        check_matches(
            &patterns,
            &[
                ("web/app/index.ts", vec![0, 1, 2]),
                ("web/lib/index.ts", vec![0, 2]),
                ("web/app/main.ts", vec![1]),
                ("api/lib/index.ts", vec![2]),
                ("app/index.ts", vec![]),
                ("web/app/components/button.ts", vec![1, 3]),
            ],
        );
    }

    #[test]
    fn test_trailing_wildcards_match_recursively() {
        let patterns = ["/vendor/*", "/third_party/*/"];
        check_matches(
            &patterns,
            &[
                ("vendor", vec![]),
                ("vendor/lib.go", vec![0]),
                ("vendor/github.com/pkg", vec![0]),
                ("third_party", vec![]),
                ("third_party/zlib", vec![]),
                ("third_party/zlib/zlib.h", vec![1]),
            ],
        );
    }

    #[test]
    fn test_mixed_wildcards() {
        let patterns = ["/api/handlers/*.go", "/api/h*/*.*", "*.md"];
        check_matches(
            &patterns,
            &[
                ("api/handlers/user.go", vec![0, 1]),
                ("api/h/x.ts", vec![1]),
                ("api/handlers/README", vec![]),
                ("README.md", vec![2]),
                ("docs/guides/setup.md", vec![2]),
            ],
        );
    }

    #[test]
    fn test_leading_double_stars() {
        let patterns = ["/**/tests", "/**/fixtures/tests", "**/generated"];
        check_matches(
            &patterns,
            &[
                ("a/b/tests", vec![0]),
                ("a/fixtures/tests", vec![0, 1]),
                ("tests", vec![0]),
                ("proto/generated/x.pb.go", vec![2]),
            ],
        );
    }

    #[test]
    fn test_infix_double_stars() {
        let patterns = ["/web/**/index.ts", "/web/index.ts"];
        check_matches(
            &patterns,
            &[
                ("web/index.ts", vec![0, 1]),
                ("web/app/index.ts", vec![0]),
                ("web/app/pages/index.ts", vec![0]),
                ("web/app", vec![]),
                ("api/index.ts", vec![]),
            ],
        );
    }

    #[test]
    fn test_trailing_double_stars() {
        let patterns = ["scripts/**", "**"];
        check_matches(
            &patterns,
            &[
                ("scripts", vec![1]),
                ("Makefile", vec![1]),
                ("scripts/build.sh", vec![0, 1]),
                ("a/b/c", vec![1]),
                ("scripts/ci/lint.sh", vec![0, 1]),
            ],
        );
    }

    #[test]
    fn test_escaped_wildcards() {
        let patterns = ["v\\*1", "a*b\\??", "\\*.log", "notes\\*", "\\*"];
        check_matches(
            &patterns,
            &[
                ("v*1", vec![0]),
                ("vx1", vec![]),
                ("axb?!", vec![1]),
                ("axb?", vec![]),
                ("axbc!", vec![]),
                ("*.log", vec![2]),
                ("x.log", vec![]),
                ("notes*", vec![3]),
                ("notes", vec![]),
                ("*", vec![4]),
                ("a", vec![]),
            ],
        );
    }

    #[test]
    fn test_cache_is_consistent_across_calls() {
        let matcher = build_matcher(&["/a/b/", "c"]);
        for _ in 0..3 {
            assert_eq!(matcher.matching_patterns("a/b/x"), vec![0]);
            assert_eq!(matcher.matching_patterns("a/b/c"), vec![0, 1]);
            assert_eq!(matcher.matching_patterns("a/x"), Vec::<usize>::new());
        }
    }

    fn check_matches(patterns: &[&str], cases: &[(&str, Vec<usize>)]) {
        let matcher = build_matcher(patterns);
        for (path, ids) in cases {
            let actual = matcher.matching_patterns(path).into_iter().collect::<HashSet<_>>();
            let wanted = ids.iter().copied().collect::<HashSet<_>>();
            assert_eq!(
                actual,
                wanted,
                "{} should match {:?}",
                path,
                ids.iter().map(|&i| patterns[i]).collect::<Vec<_>>(),
            );
        }
    }

    fn build_matcher(patterns: &[&str]) -> Matcher {
        let mut builder = Builder::new();
        for pattern in patterns {
            builder.add(pattern).unwrap();
        }
        builder.build()
    }
}
