//! Immutable snapshot of one commit (component B).

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::QuitGitError;
use crate::node::Node;
use crate::oid::Oid;
use crate::signature::Signature;
use crate::Repository;

/// The leading `key: value` / `key: "quoted value"` lines recognized at the
/// head of a commit message. `DOTALL` so `.` crosses into the rest of the
/// message: the double-quoted branch is `.*`, greedily spanning newlines and
/// embedded `"` characters up to the *last* `"` in the remaining text, which
/// can swallow subsequent lines (including further `key: value` lines)
/// whole. This is a deliberate, documented asymmetry with the single-quoted
/// branch (`[^']*`, which stops at the first `'`) inherited unchanged from
/// the system this crate implements — its `PROPERTY_REGEX` uses `".*"` but
/// `'[^']*'` under `re.DOTALL`. `MULTILINE` so `^`/`$` anchor per line.
fn property_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?msx)
            \A(?:
                (?P<key>[A-Za-z0-9_]+):\s*
                (?:
                    "(?P<dquoted>.*)"
                    |'(?P<squoted>[^']*)'
                    |(?P<bare>[A-Za-z0-9_]+)
                )
                \n
            )"#,
        )
        .expect("property line pattern is valid")
    })
}

/// Parsed properties plus the message with the property block stripped.
pub(crate) fn extract(raw_message: &str) -> (BTreeMap<String, String>, String) {
    let re = property_line_re();
    let mut properties = BTreeMap::new();
    let mut rest = raw_message;
    loop {
        let Some(captures) = re.captures(rest) else {
            break;
        };
        let whole = captures.get(0).expect("group 0 always matches");
        let key = captures
            .name("key")
            .expect("key group required by the pattern")
            .as_str()
            .to_owned();
        let value = captures
            .name("dquoted")
            .or_else(|| captures.name("squoted"))
            .or_else(|| captures.name("bare"))
            .expect("one value alternative always matches")
            .as_str()
            .to_owned();
        properties.insert(key, value);
        rest = &rest[whole.end()..];
    }
    (properties, rest.trim().to_owned())
}

/// An immutable view of one commit.
pub struct Revision<'repo> {
    repo: &'repo Repository,
    oid: Oid,
    tree: Oid,
    raw_message: String,
    author: Signature,
    committer: Signature,
    parent_oids: Vec<Oid>,
    parsed: OnceLock<(BTreeMap<String, String>, String)>,
    parents: OnceLock<Vec<Revision<'repo>>>,
}

impl<'repo> Revision<'repo> {
    pub(crate) fn new(repo: &'repo Repository, oid: Oid) -> Result<Self, QuitGitError> {
        let info = crate::objects::read_commit(repo.inner(), oid)?;
        Ok(Self {
            repo,
            oid,
            tree: info.tree,
            raw_message: info.message,
            author: info.author,
            committer: info.committer,
            parent_oids: info.parents,
            parsed: OnceLock::new(),
            parents: OnceLock::new(),
        })
    }

    /// This commit's oid.
    #[must_use]
    pub fn id(&self) -> Oid {
        self.oid
    }

    /// The tree this commit points at.
    #[must_use]
    pub(crate) fn tree(&self) -> Oid {
        self.tree
    }

    #[must_use]
    pub fn author(&self) -> &Signature {
        &self.author
    }

    #[must_use]
    pub fn committer(&self) -> &Signature {
        &self.committer
    }

    /// The raw, unparsed commit message (property block included).
    #[must_use]
    pub fn raw_message(&self) -> &str {
        &self.raw_message
    }

    fn parsed(&self) -> &(BTreeMap<String, String>, String) {
        self.parsed.get_or_init(|| extract(&self.raw_message))
    }

    /// Key-value pairs lifted from the head of the commit message.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.parsed().0
    }

    /// The commit message with the property block removed and surrounding
    /// whitespace trimmed.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.parsed().1
    }

    /// This commit's parents, each wrapped as a [`Revision`], in order.
    /// Materialized lazily and cached; the Git object reads for parents
    /// only happen the first time this is called.
    pub fn parents(&self) -> Result<&[Revision<'repo>], QuitGitError> {
        if let Some(parents) = self.parents.get() {
            return Ok(parents);
        }
        let mut parents = Vec::with_capacity(self.parent_oids.len());
        for oid in &self.parent_oids {
            parents.push(Revision::new(self.repo, *oid)?);
        }
        Ok(self.parents.get_or_init(|| parents))
    }

    /// A [`Node`] rooted at this commit, optionally resolved to `path`.
    pub fn node(&self, path: Option<&str>) -> Result<Node<'repo>, QuitGitError> {
        Node::at(self.repo, self.oid, self.tree, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_parses_mixed_quoting() {
        let msg = "source: \"upstream\"\nticket: T42\n\nactual body line";
        let (props, body) = extract(msg);
        assert_eq!(props.get("source").map(String::as_str), Some("upstream"));
        assert_eq!(props.get("ticket").map(String::as_str), Some("T42"));
        assert_eq!(body, "actual body line");
    }

    #[test]
    fn extract_stops_at_first_non_matching_line() {
        let msg = "key: value\nnot a property line\nkey2: value2\n";
        let (props, body) = extract(msg);
        assert_eq!(props.len(), 1);
        assert!(!props.contains_key("key2"));
        assert_eq!(body, "not a property line\nkey2: value2");
    }

    #[test]
    fn extract_with_no_properties_returns_trimmed_message() {
        let msg = "\n\njust a message\n";
        let (props, body) = extract(msg);
        assert!(props.is_empty());
        assert_eq!(body, "just a message");
    }

    #[test]
    fn extract_handles_single_quoted_values_with_internal_spaces() {
        let msg = "title: 'hello world'\nbody text\n";
        let (props, body) = extract(msg);
        assert_eq!(props.get("title").map(String::as_str), Some("hello world"));
        assert_eq!(body, "body text");
    }

    /// Documents the asymmetry described on [`property_line_re`]: a
    /// double-quoted value is greedy and DOTALL, so a second quoted
    /// property on the following line is swallowed into the first value
    /// instead of being parsed as its own property. Single-quoted values do
    /// not have this behavior (see
    /// `extract_handles_single_quoted_values_with_internal_spaces`).
    #[test]
    fn extract_double_quoted_value_greedily_spans_a_following_quoted_line() {
        let msg = "a: \"one\"\nb: \"two\"\nbody\n";
        let (props, body) = extract(msg);
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("a").map(String::as_str), Some("one\"\nb: \"two"));
        assert!(!props.contains_key("b"));
        assert_eq!(body, "body");
    }
}
