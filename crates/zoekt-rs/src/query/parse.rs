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

//! Text syntax for queries.
//!
//! Terms are separated by whitespace (quotes group), AND-ed together, and the
//! bare word `or` separates alternatives. A leading `-` negates a term.
//! Recognised prefixes: `repo:`, `file:`, `regex:` / `r:`, `case:yes|no`,
//! `type:repo|file|filename`. `case:` and `type:` apply to the whole query.

use super::ast::{Query, RegexpQuery, Substring, TypeKind};
use super::error::QueryError;
use super::helpers::shell_split;

#[derive(Debug, Default)]
struct Modifiers {
    case_sensitive: bool,
    kind: Option<TypeKind>,
}

impl Query {
    pub fn parse(input: &str) -> Result<Query, QueryError> {
        let tokens = shell_split(input);
        let mut mods = Modifiers::default();
        let mut terms: Vec<&str> = Vec::with_capacity(tokens.len());
        for tok in &tokens {
            if let Some(v) = tok.strip_prefix("case:") {
                mods.case_sensitive = match v {
                    "yes" => true,
                    "no" | "auto" => false,
                    other => {
                        return Err(QueryError::Syntax(format!("unknown case value {:?}", other)))
                    }
                };
            } else if let Some(v) = tok.strip_prefix("type:") {
                mods.kind = Some(match v {
                    "repo" => TypeKind::Repo,
                    "file" => TypeKind::FileMatch,
                    "filename" => TypeKind::FileName,
                    other => {
                        return Err(QueryError::Syntax(format!("unknown type {:?}", other)))
                    }
                });
            } else {
                terms.push(tok.as_str());
            }
        }
        if terms.is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let mut alternatives = Vec::new();
        for group in terms.split(|t| *t == "or") {
            if group.is_empty() {
                return Err(QueryError::Syntax("'or' needs a term on both sides".into()));
            }
            let mut conj = group
                .iter()
                .map(|t| parse_term(t, &mods))
                .collect::<Result<Vec<_>, _>>()?;
            alternatives.push(if conj.len() == 1 {
                conj.remove(0)
            } else {
                Query::And(conj)
            });
        }
        let q = if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            Query::Or(alternatives)
        };
        Ok(match mods.kind {
            Some(kind) => Query::typed(kind, q),
            None => q,
        })
    }
}

fn parse_term(tok: &str, mods: &Modifiers) -> Result<Query, QueryError> {
    if let Some(rest) = tok.strip_prefix('-').filter(|r| !r.is_empty()) {
        return Ok(Query::not(parse_term(rest, mods)?));
    }
    let cs = mods.case_sensitive;
    if let Some(v) = tok.strip_prefix("repo:") {
        return Ok(Query::Repo(non_empty("repo", v)?.to_string()));
    }
    if let Some(v) = tok.strip_prefix("file:") {
        return Ok(Query::Substring(
            Substring::file_name(non_empty("file", v)?).case_sensitive(cs),
        ));
    }
    if let Some(v) = tok
        .strip_prefix("regex:")
        .or_else(|| tok.strip_prefix("r:"))
    {
        return Ok(Query::Regexp(RegexpQuery::new(
            non_empty("regex", v)?,
            cs,
            false,
        )?));
    }
    if tok.is_empty() {
        return Err(QueryError::EmptyPattern);
    }
    Ok(Query::Substring(Substring::new(tok).case_sensitive(cs)))
}

fn non_empty<'a>(field: &str, v: &'a str) -> Result<&'a str, QueryError> {
    if v.is_empty() {
        Err(QueryError::Syntax(format!("{}: needs a value", field)))
    } else {
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> String {
        Query::parse(s).unwrap().to_string()
    }

    #[test]
    fn terms_are_anded() {
        assert_eq!(p("foo bar"), r#"(and substr:"foo" substr:"bar")"#);
        assert_eq!(p(r#""foo bar""#), r#"substr:"foo bar""#);
    }

    #[test]
    fn or_splits_alternatives() {
        assert_eq!(
            p("a b or c"),
            r#"(or (and substr:"a" substr:"b") substr:"c")"#
        );
        assert!(matches!(Query::parse("a or"), Err(QueryError::Syntax(_))));
        assert!(matches!(Query::parse("or a"), Err(QueryError::Syntax(_))));
    }

    #[test]
    fn prefixes_and_negation() {
        assert_eq!(
            p("needle repo:github.com/foo -file:test r:fn\\s"),
            r#"(and substr:"needle" repo:github.com/foo (not file_substr:"test") regex:"fn\\s")"#
        );
    }

    #[test]
    fn case_and_type_apply_to_whole_query() {
        assert_eq!(
            p("case:yes Foo file:Bar"),
            r#"(and case_substr:"Foo" case_file_substr:"Bar")"#
        );
        assert_eq!(p("type:repo bla"), r#"(type:repo substr:"bla")"#);
        assert_eq!(p("type:filename x"), r#"(type:filename substr:"x")"#);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(Query::parse("   "), Err(QueryError::EmptyQuery));
        assert_eq!(Query::parse("case:yes"), Err(QueryError::EmptyQuery));
        assert!(matches!(Query::parse("type:dir x"), Err(QueryError::Syntax(_))));
        assert!(matches!(Query::parse("repo:"), Err(QueryError::Syntax(_))));
        assert!(matches!(
            Query::parse("regex:(x"),
            Err(QueryError::InvalidRegex { .. })
        ));
        assert_eq!(Query::parse(r#"a """#), Err(QueryError::EmptyPattern));
    }

    #[test]
    fn lone_dash_is_a_literal() {
        assert_eq!(p("-"), r#"substr:"-""#);
    }
}
