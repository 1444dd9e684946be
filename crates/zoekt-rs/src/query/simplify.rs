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

//! Static query reduction.
//!
//! `simplify_repo` is run once per shard: with the repository fixed, every
//! `Repo` leaf is a constant, and a query carrying thousands of OR'd repo
//! patterns collapses to either its content part or `FALSE`. Sub-trees that
//! do not change are handed back borrowed, so a query without repo leaves
//! costs one walk and no allocation.

use std::borrow::Cow;

use super::ast::Query;

/// Constant folding and flattening without any outside knowledge.
pub fn simplify(q: &Query) -> Query {
    fold(q, &|_| None).into_owned()
}

/// Resolve `Repo` leaves against `repo_name`, then fold.
pub fn simplify_repo<'a>(q: &'a Query, repo_name: &str) -> Cow<'a, Query> {
    fold(q, &|leaf| match leaf {
        Query::Repo(pattern) => Some(repo_name.contains(pattern.as_str())),
        _ => None,
    })
}

/// Generic fold: `resolve` may turn any node into a constant before its
/// children are looked at.
pub(crate) fn fold<'a, F>(q: &'a Query, resolve: &F) -> Cow<'a, Query>
where
    F: Fn(&Query) -> Option<bool>,
{
    if let Some(v) = resolve(q) {
        return Cow::Owned(Query::Const(v));
    }
    match q {
        Query::And(children) => fold_junction(q, children, true, resolve),
        Query::Or(children) => fold_junction(q, children, false, resolve),
        Query::Not(child) => {
            let folded = fold(child, resolve);
            if let Query::Const(v) = folded.as_ref() {
                return Cow::Owned(Query::Const(!*v));
            }
            match folded {
                Cow::Borrowed(Query::Not(inner)) => Cow::Borrowed(&**inner),
                Cow::Owned(Query::Not(inner)) => Cow::Owned(*inner),
                Cow::Borrowed(b) if std::ptr::eq(b, &**child) => Cow::Borrowed(q),
                other => Cow::Owned(Query::Not(Box::new(other.into_owned()))),
            }
        }
        Query::Type { kind, child } => {
            let folded = fold(child, resolve);
            if let Query::Const(v) = folded.as_ref() {
                return Cow::Owned(Query::Const(*v));
            }
            match folded {
                Cow::Borrowed(b) if std::ptr::eq(b, &**child) => Cow::Borrowed(q),
                other => Cow::Owned(Query::Type {
                    kind: *kind,
                    child: Box::new(other.into_owned()),
                }),
            }
        }
        _ => Cow::Borrowed(q),
    }
}

fn fold_junction<'a, F>(
    q: &'a Query,
    children: &'a [Query],
    is_and: bool,
    resolve: &F,
) -> Cow<'a, Query>
where
    F: Fn(&Query) -> Option<bool>,
{
    // FALSE decides an AND, TRUE decides an OR.
    let absorbing = !is_and;
    let mut changed = false;
    let mut out: Vec<Cow<'a, Query>> = Vec::with_capacity(children.len());
    for child in children {
        let folded = fold(child, resolve);
        if let Query::Const(v) = folded.as_ref() {
            if *v == absorbing {
                return Cow::Owned(Query::Const(absorbing));
            }
            changed = true;
            continue;
        }
        if !matches!(folded, Cow::Borrowed(b) if std::ptr::eq(b, child)) {
            changed = true;
        }
        match folded {
            Cow::Borrowed(Query::And(grand)) if is_and => {
                changed = true;
                out.extend(grand.iter().map(Cow::Borrowed));
            }
            Cow::Borrowed(Query::Or(grand)) if !is_and => {
                changed = true;
                out.extend(grand.iter().map(Cow::Borrowed));
            }
            Cow::Owned(Query::And(grand)) if is_and => {
                changed = true;
                out.extend(grand.into_iter().map(Cow::Owned));
            }
            Cow::Owned(Query::Or(grand)) if !is_and => {
                changed = true;
                out.extend(grand.into_iter().map(Cow::Owned));
            }
            other => out.push(other),
        }
    }

    match out.len() {
        0 => Cow::Owned(Query::Const(is_and)),
        1 => out.pop().unwrap_or(Cow::Owned(Query::Const(is_and))),
        _ if !changed => Cow::Borrowed(q),
        _ => {
            let children: Vec<Query> = out.into_iter().map(Cow::into_owned).collect();
            Cow::Owned(if is_and {
                Query::And(children)
            } else {
                Query::Or(children)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::TypeKind;

    fn repos(n: usize) -> Vec<Query> {
        (0..n)
            .map(|i| Query::repo(format!("github.com/foo/bar-{}", i)))
            .collect()
    }

    #[test]
    fn many_repo_disjuncts_collapse_to_content_predicate() {
        let content = Query::substring("test");
        let want = content.to_string();
        let q = simplify(&Query::and(vec![content, Query::or(repos(2018))]));

        let got = simplify_repo(&q, "github.com/foo/bar-100");
        assert_eq!(got.to_string(), want);

        let got = simplify_repo(&q, "github.com/foo/baz");
        assert_eq!(got.to_string(), Query::Const(false).to_string());
    }

    #[test]
    fn query_without_repo_leaves_is_borrowed() {
        let q = Query::and(vec![
            Query::substring("a"),
            Query::or(vec![Query::substring("b"), Query::file_name("c")]),
        ]);
        assert!(matches!(simplify_repo(&q, "any"), Cow::Borrowed(_)));
    }

    #[test]
    fn unchanged_subtrees_stay_borrowed_inside_a_changed_parent() {
        let inner = Query::or(vec![Query::substring("b"), Query::substring("c")]);
        let q = Query::and(vec![Query::repo("x"), inner.clone()]);
        let got = simplify_repo(&q, "x");
        assert_eq!(got.as_ref(), &inner);
    }

    #[test]
    fn repo_only_trees_match_direct_evaluation() {
        // Each case is (query, evaluation with repo "github.com/a/b").
        let cases = vec![
            (Query::repo("a/b"), true),
            (Query::repo("a/c"), false),
            (Query::not(Query::repo("a/c")), true),
            (
                Query::and(vec![Query::repo("github"), Query::not(Query::repo("x"))]),
                true,
            ),
            (
                Query::or(vec![Query::repo("x"), Query::and(vec![Query::repo("y")])]),
                false,
            ),
            (Query::and(vec![]), true),
            (Query::or(vec![]), false),
        ];
        for (q, want) in cases {
            let got = simplify_repo(&q, "github.com/a/b");
            assert_eq!(got.as_ref(), &Query::Const(want), "query {}", q);
        }
    }

    #[test]
    fn simplification_is_idempotent() {
        let q = Query::and(vec![
            Query::or(vec![Query::repo("r1"), Query::repo("r2"), Query::substring("x")]),
            Query::and(vec![Query::substring("y"), Query::Const(true)]),
            Query::not(Query::not(Query::file_name("z"))),
            Query::typed(TypeKind::Repo, Query::or(vec![Query::substring("w")])),
        ]);
        for repo in ["r1", "r3"] {
            let once = simplify_repo(&q, repo).into_owned();
            let twice = simplify_repo(&once, repo).into_owned();
            assert_eq!(once.to_string(), twice.to_string());
        }
    }

    #[test]
    fn flattens_and_unwraps() {
        let q = Query::and(vec![
            Query::and(vec![Query::substring("a"), Query::substring("b")]),
            Query::or(vec![Query::substring("c")]),
        ]);
        assert_eq!(
            simplify(&q).to_string(),
            r#"(and substr:"a" substr:"b" substr:"c")"#
        );
    }

    #[test]
    fn type_with_constant_child_folds() {
        let q = Query::repo_scoped(Query::or(vec![Query::Const(true), Query::substring("a")]));
        assert_eq!(simplify(&q), Query::Const(true));
    }
}
