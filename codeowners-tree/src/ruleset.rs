use std::path::Path;

use tracing::{debug, warn};

use crate::{
    error::Result,
    owners::{join_owners, OwnerMap},
    parser::{self, Rule},
    patternset::{Builder, Matcher},
};

/// A compiled set of CODEOWNERS rules.
///
/// Rules are stored in reverse declaration order, so the first matching
/// rule is the last one declared in the file, which is the one that wins.
/// A rule whose pattern can't be compiled is kept but never matches.
#[derive(Clone, Debug)]
pub struct RuleSet {
    rules: Vec<Rule>,
    matcher: Matcher,
    // Maps matcher pattern ids to indices into `rules`
    rule_ids: Vec<usize>,
}

impl RuleSet {
    /// Build a rule set from rules in declaration order.
    pub fn new(rules: Vec<Rule>) -> Self {
        let mut rules = rules
            .into_iter()
            .filter(|rule| {
                if rule.owners.is_empty() {
                    debug!(line_number = rule.line_number, pattern = %rule.pattern, "ignoring rule without owners");
                }
                !rule.owners.is_empty()
            })
            .collect::<Vec<_>>();
        rules.reverse();

        let mut builder = Builder::new();
        let mut rule_ids = Vec::with_capacity(rules.len());
        for (idx, rule) in rules.iter().enumerate() {
            match builder.add(&rule.pattern) {
                Ok(_) => rule_ids.push(idx),
                Err(error) => warn!(
                    line_number = rule.line_number,
                    pattern = %rule.pattern,
                    %error,
                    "pattern can't be compiled, rule will never match"
                ),
            }
        }

        let matcher = builder.build();
        debug!(
            rules = rules.len(),
            states = matcher.state_count(),
            "compiled rule set"
        );

        RuleSet {
            rules,
            matcher,
            rule_ids,
        }
    }

    /// Parse CODEOWNERS file contents into a rule set.
    pub fn parse(source: &str) -> Self {
        RuleSet::new(parser::parse(source))
    }

    /// Read and parse a CODEOWNERS file into a rule set.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        parser::parse_file(path).map(RuleSet::new)
    }

    /// Rules in precedence order (last declared first).
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every rule matching `path`, in precedence order.
    pub fn all_matching_rules(&self, path: &str) -> Vec<&Rule> {
        self.matcher
            .matching_patterns(path)
            .into_iter()
            .map(|id| &self.rules[self.rule_ids[id]])
            .collect()
    }

    /// The rule that decides the owners of `path`, if any matches.
    pub fn matching_rule(&self, path: &str) -> Option<&Rule> {
        self.matcher
            .matching_patterns(path)
            .first()
            .map(|&id| &self.rules[self.rule_ids[id]])
    }

    pub fn owners(&self, path: &str) -> Option<&[String]> {
        self.matching_rule(path).map(|rule| rule.owners.as_slice())
    }

    /// The owner display string for `path`: the winning rule's owners
    /// joined by a space, or an empty string when no rule matches.
    pub fn resolve_owner(&self, path: &str) -> String {
        self.owners(path).map(join_owners).unwrap_or_default()
    }

    /// Group `paths` by owner display string. Empty paths are skipped.
    pub fn owners_by_file<I, P>(&self, paths: I) -> OwnerMap
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let mut map = OwnerMap::new();
        for path in paths {
            let path = path.as_ref();
            if path.is_empty() {
                continue;
            }
            map.insert(self.resolve_owner(path), path);
        }
        map
    }
}

/// Resolve the owner display string for `path`. See
/// [`RuleSet::resolve_owner`].
pub fn resolve_owner(rule_set: &RuleSet, path: &str) -> String {
    rule_set.resolve_owner(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_declared_rule_wins() {
        let rule_set = RuleSet::parse("*.go teamA\n*.go teamB\n");
        assert_eq!(rule_set.resolve_owner("main.go"), "teamB");

        let rule = rule_set.matching_rule("cmd/main.go").unwrap();
        assert_eq!(rule.line_number, 2);
        assert_eq!(
            rule_set
                .all_matching_rules("main.go")
                .iter()
                .map(|r| r.line_number)
                .collect::<Vec<_>>(),
            vec![2, 1]
        );
    }

    #[test]
    fn test_rules_are_reversed() {
        let rule_set = RuleSet::parse("a @x\n\nb @y\nc\n");
        let patterns = rule_set
            .rules()
            .iter()
            .map(|r| r.pattern.as_str())
            .collect::<Vec<_>>();
        assert_eq!(patterns, vec!["b", "a"]);
    }

    #[test]
    fn test_resolution() {
        let rule_set = RuleSet::parse(concat!(
            "*            @everyone\n",
            "*.md         @docs\n",
            "/src/        @core @core-reviewers\n",
            "/src/ui/     @frontend # !required\n",
            "/src/[bad    @nobody\n",
        ));

        let examples = [
            ("Makefile", "@everyone"),
            ("a/b/README.md", "@docs"),
            ("src/lib.rs", "@core @core-reviewers"),
            ("src/README.md", "@core @core-reviewers"),
            ("src/ui/app.tsx", "@frontend"),
            ("src/[bad", "@core @core-reviewers"),
        ];
        for (path, owner) in examples {
            assert_eq!(rule_set.resolve_owner(path), owner, "owner of {}", path);
        }

        assert!(!rule_set.matching_rule("src/ui/app.tsx").unwrap().required);
        assert_eq!(rule_set.len(), 5);
    }

    #[test]
    fn test_unowned_and_empty_rule_sets() {
        let rule_set = RuleSet::parse("/docs/ @docs\n");
        assert_eq!(rule_set.resolve_owner("src/docs/fake.md"), "");
        assert_eq!(rule_set.owners("src/docs/fake.md"), None);

        let empty = RuleSet::parse("");
        assert!(empty.is_empty());
        assert_eq!(empty.resolve_owner("anything"), "");
    }

    #[test]
    fn test_negated_patterns_never_match() {
        let rule_set = RuleSet::parse("* @all\n!*.lock @nobody\n");
        assert_eq!(rule_set.resolve_owner("Cargo.lock"), "@all");
    }

    #[test]
    fn test_matching_ignores_case() {
        let rule_set = RuleSet::parse("*.MD @docs\n/Web/ @frontend\n");
        assert_eq!(rule_set.resolve_owner("README.md"), "@docs");
        assert_eq!(rule_set.resolve_owner("web/app.ts"), "@frontend");
        assert_eq!(rule_set.resolve_owner("WEB/App.TS"), "@frontend");
        assert_eq!(rule_set.resolve_owner("api/web/app.ts"), "");
    }

    #[test]
    fn test_rules_without_owners_are_dropped() {
        let rule_set = RuleSet::new(vec![
            Rule::new(1, "*.rs", vec!["@rust".to_owned()]),
            Rule::new(2, "*.rs", vec![]),
        ]);
        assert_eq!(rule_set.len(), 1);
        assert_eq!(rule_set.resolve_owner("lib.rs"), "@rust");
    }

    #[test]
    fn test_owners_by_file() {
        let rule_set = RuleSet::parse("*.ts @frontend\n*.go @backend\n");
        let map = rule_set.owners_by_file(["a.ts", "b.go", "", "c.md", "d/e.ts"]);
        assert_eq!(
            map.iter()
                .map(|(owner, paths)| (owner, paths.to_vec()))
                .collect::<Vec<_>>(),
            vec![
                ("@frontend", vec!["a.ts".to_owned(), "d/e.ts".to_owned()]),
                ("@backend", vec!["b.go".to_owned()]),
                ("", vec!["c.md".to_owned()]),
            ]
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let rule_set = RuleSet::parse("docs/ @a\n*.md @b\n");
        let first = rule_set.resolve_owner("x/docs/y.md");
        for _ in 0..5 {
            assert_eq!(rule_set.resolve_owner("x/docs/y.md"), first);
        }
        assert_eq!(resolve_owner(&rule_set.clone(), "x/docs/y.md"), first);
    }
}
