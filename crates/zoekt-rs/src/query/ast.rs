// Copyright 2025 HyperZoekt Project
// Derived from sourcegraph/zoekt (https://github.com/sourcegraph/zoekt)
// Copyright 2016 Google Inc. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use regex::bytes::{Regex, RegexBuilder};
use std::fmt;

use super::error::QueryError;

/// Literal match against file content, or against the file name when `file_name` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substring {
    pub pattern: String,
    pub case_sensitive: bool,
    pub file_name: bool,
}

impl Substring {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            case_sensitive: false,
            file_name: false,
        }
    }

    pub fn file_name(pattern: impl Into<String>) -> Self {
        Self {
            file_name: true,
            ..Self::new(pattern)
        }
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }
}

/// Regular expression leaf. The expression is compiled when the leaf is built,
/// so an invalid pattern never reaches a shard.
#[derive(Debug, Clone)]
pub struct RegexpQuery {
    pattern: String,
    case_sensitive: bool,
    file_name: bool,
    regex: Regex,
}

impl RegexpQuery {
    pub fn new(pattern: &str, case_sensitive: bool, file_name: bool) -> Result<Self, QueryError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .multi_line(true)
            .build()
            .map_err(|e| QueryError::InvalidRegex {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            pattern: pattern.to_string(),
            case_sensitive,
            file_name,
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn is_file_name(&self) -> bool {
        self.file_name
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

impl PartialEq for RegexpQuery {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
            && self.case_sensitive == other.case_sensitive
            && self.file_name == other.file_name
    }
}

impl Eq for RegexpQuery {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Plain file match; the wrapper is transparent.
    FileMatch,
    /// Report matching files without line matches.
    FileName,
    /// Holds for a document when the child holds for any document of the same repository.
    Repo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Substring(Substring),
    Regexp(RegexpQuery),
    /// Repository name pattern; matches when the repo name contains it.
    Repo(String),
    Const(bool),
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
    Type { kind: TypeKind, child: Box<Query> },
}

impl Query {
    pub fn substring(pattern: impl Into<String>) -> Self {
        Query::Substring(Substring::new(pattern))
    }

    pub fn file_name(pattern: impl Into<String>) -> Self {
        Query::Substring(Substring::file_name(pattern))
    }

    pub fn regexp(pattern: &str) -> Result<Self, QueryError> {
        Ok(Query::Regexp(RegexpQuery::new(pattern, false, false)?))
    }

    pub fn repo(pattern: impl Into<String>) -> Self {
        Query::Repo(pattern.into())
    }

    pub fn and(children: Vec<Query>) -> Self {
        Query::And(children)
    }

    pub fn or(children: Vec<Query>) -> Self {
        Query::Or(children)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Query) -> Self {
        Query::Not(Box::new(child))
    }

    pub fn typed(kind: TypeKind, child: Query) -> Self {
        Query::Type {
            kind,
            child: Box::new(child),
        }
    }

    /// Shorthand for `Type { kind: Repo, child }`.
    pub fn repo_scoped(child: Query) -> Self {
        Self::typed(TypeKind::Repo, child)
    }

    /// Structural checks that do not depend on any shard. Regex leaves are
    /// already compiled, so only empty literals remain to be rejected here.
    pub fn validate(&self) -> Result<(), QueryError> {
        match self {
            Query::Substring(s) if s.pattern.is_empty() => Err(QueryError::EmptyPattern),
            Query::Substring(_) | Query::Regexp(_) | Query::Repo(_) | Query::Const(_) => Ok(()),
            Query::And(children) | Query::Or(children) => {
                children.iter().try_for_each(Query::validate)
            }
            Query::Not(child) | Query::Type { child, .. } => child.validate(),
        }
    }

    /// True when the tree contains a repo-scoped predicate anywhere.
    pub fn has_repo_scope(&self) -> bool {
        match self {
            Query::Type {
                kind: TypeKind::Repo,
                ..
            } => true,
            Query::And(children) | Query::Or(children) => children.iter().any(Query::has_repo_scope),
            Query::Not(child) | Query::Type { child, .. } => child.has_repo_scope(),
            _ => false,
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::FileMatch => write!(f, "file"),
            TypeKind::FileName => write!(f, "filename"),
            TypeKind::Repo => write!(f, "repo"),
        }
    }
}

fn write_leaf(
    f: &mut fmt::Formatter<'_>,
    kind: &str,
    pattern: &str,
    case_sensitive: bool,
    file_name: bool,
) -> fmt::Result {
    if case_sensitive {
        write!(f, "case_")?;
    }
    if file_name {
        write!(f, "file_")?;
    }
    write!(f, "{}:{:?}", kind, pattern)
}

fn write_list(f: &mut fmt::Formatter<'_>, op: &str, children: &[Query]) -> fmt::Result {
    write!(f, "({}", op)?;
    for c in children {
        write!(f, " {}", c)?;
    }
    write!(f, ")")
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Substring(s) => {
                write_leaf(f, "substr", &s.pattern, s.case_sensitive, s.file_name)
            }
            Query::Regexp(r) => write_leaf(f, "regex", &r.pattern, r.case_sensitive, r.file_name),
            Query::Repo(p) => write!(f, "repo:{}", p),
            Query::Const(true) => write!(f, "TRUE"),
            Query::Const(false) => write!(f, "FALSE"),
            Query::And(children) => write_list(f, "and", children),
            Query::Or(children) => write_list(f, "or", children),
            Query::Not(child) => write!(f, "(not {})", child),
            Query::Type { kind, child } => write!(f, "(type:{} {})", kind, child),
        }
    }
}
