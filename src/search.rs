use std::sync::LazyLock;

use regex::Regex;

use crate::{
    error::GithubError,
    github::parse_repository,
    source::Source,
    types::{PullRequest, PullRequestState},
};

static SKIP_CI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[(ci skip|skip ci)\]").expect("skip-ci pattern is a valid regex")
});

/// Composes a GitHub search query from individual qualifiers.
#[derive(Debug, Default)]
pub struct SearchQueryBuilder {
    terms: Vec<String>,
}

impl SearchQueryBuilder {
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    pub fn repo(&mut self, owner: &str, name: &str) -> &mut Self {
        self.terms.push(format!("repo:{}/{}", owner, name));
        self
    }

    pub fn pr_type(&mut self) -> &mut Self {
        self.terms.push("is:pr".to_string());
        self
    }

    pub fn base(&mut self, branch: &str) -> &mut Self {
        self.terms.push(format!("base:{}", quote(branch)));
        self
    }

    pub fn state(&mut self, state: PullRequestState) -> &mut Self {
        match state {
            PullRequestState::Open => self.terms.push("is:open".to_string()),
            PullRequestState::Merged => self.terms.push("is:merged".to_string()),
            PullRequestState::Closed => {
                self.terms.push("is:closed".to_string());
                self.terms.push("is:unmerged".to_string());
            }
        }
        self
    }

    /// Matches pull requests carrying any of `labels`.
    pub fn any_label(&mut self, labels: &[String]) -> &mut Self {
        if !labels.is_empty() {
            let list: Vec<String> = labels.iter().map(|label| quote(label)).collect();
            self.terms.push(format!("label:{}", list.join(",")));
        }
        self
    }

    pub fn build(&self) -> String {
        self.terms.join(" ")
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', ""))
}

/// Builds the search query for the pull requests `source` is interested in.
///
/// GitHub search cannot OR state qualifiers together, so a state qualifier is
/// only added when exactly one state is allowed; otherwise states are left to
/// [`matches_state`].
pub fn search_query_for(source: &Source) -> Result<String, GithubError> {
    let (owner, name) = parse_repository(&source.repository)?;
    let states = source.allowed_states()?;

    let mut builder = SearchQueryBuilder::new();
    builder.repo(owner, name).pr_type();
    if let Some(branch) = source.base_branch() {
        builder.base(branch);
    }
    if let [state] = states.as_slice() {
        builder.state(*state);
    }
    builder.any_label(&source.labels);

    Ok(builder.build())
}

/// Whether `text` carries a `[ci skip]` or `[skip ci]` marker.
pub fn contains_skip_ci(text: &str) -> bool {
    SKIP_CI.is_match(text)
}

pub fn matches_skip_ci(pr: &PullRequest) -> bool {
    contains_skip_ci(&pr.object.title) || contains_skip_ci(&pr.tip.message)
}

pub fn matches_state(pr: &PullRequest, states: &[PullRequestState]) -> bool {
    states.contains(&pr.object.state)
}

/// Tests if a pull request carries at least one of `labels`. An empty list
/// matches everything.
pub fn matches_label_filter(pr: &PullRequest, labels: &[String]) -> bool {
    labels.is_empty() || labels.iter().any(|label| pr.has_label(label))
}

/// Whether `file` matches `pattern` as a glob or lies inside it as a
/// directory.
pub fn path_matches(pattern: &str, file: &str) -> bool {
    let options = glob::MatchOptions {
        require_literal_separator: true,
        ..glob::MatchOptions::new()
    };
    let glob_match = glob::Pattern::new(pattern)
        .map(|compiled| compiled.matches_with(file, options))
        .unwrap_or(false);
    glob_match || is_inside_path(pattern, file)
}

fn is_inside_path(parent: &str, child: &str) -> bool {
    let parent = parent.trim_end_matches('/');
    if parent.is_empty() {
        return false;
    }
    child == parent
        || child
            .strip_prefix(parent)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Files matching at least one of `patterns`.
pub fn filter_paths<'a>(files: &'a [String], patterns: &[String]) -> Vec<&'a str> {
    files
        .iter()
        .filter(|file| patterns.iter().any(|pattern| path_matches(pattern, file)))
        .map(String::as_str)
        .collect()
}

/// Files matching none of `patterns`.
pub fn filter_ignored_paths<'a>(files: &'a [String], patterns: &[String]) -> Vec<&'a str> {
    files
        .iter()
        .filter(|file| !patterns.iter().any(|pattern| path_matches(pattern, file)))
        .map(String::as_str)
        .collect()
}
