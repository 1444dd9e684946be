// Copyright 2025 HyperZoekt Project
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

//! Small stateless helpers shared by the HTTP handlers.

use axum::http::HeaderMap;

/// Detect if the client prefers JSON responses (Accept header or X-Requested-With).
pub fn wants_json(headers: &HeaderMap) -> bool {
    let accept = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|s| s.contains("application/json"));
    let xhr = headers
        .get("X-Requested-With")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|s| s == "XMLHttpRequest");
    accept || xhr
}

/// Escape `s` for HTML text and double-quoted attribute values.
pub fn escape(s: &str) -> String {
    htmlescape::encode_minimal(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn json_preference() {
        let mut h = HeaderMap::new();
        assert!(!wants_json(&h));
        h.insert(
            axum::http::header::ACCEPT,
            HeaderValue::from_static("text/html,application/json;q=0.9"),
        );
        assert!(wants_json(&h));

        let mut h = HeaderMap::new();
        h.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        assert!(wants_json(&h));
    }

    #[test]
    fn escapes_markup() {
        let got = escape("<a href=\"x\">&</a>");
        assert!(!got.contains('<') && !got.contains('"'));
    }
}
