// Very small helper: split on whitespace, honoring single/double quotes.
pub(crate) fn shell_split(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut in_s = false;
    let mut in_d = false;
    let mut quoted = false;
    for ch in input.chars() {
        match ch {
            '\'' if !in_d => {
                in_s = !in_s;
                quoted = true;
            }
            '"' if !in_s => {
                in_d = !in_d;
                quoted = true;
            }
            c if c.is_whitespace() && !in_s && !in_d => {
                if !buf.is_empty() || quoted {
                    out.push(std::mem::take(&mut buf));
                }
                quoted = false;
            }
            c => buf.push(c),
        }
    }
    if !buf.is_empty() || quoted {
        out.push(buf);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::shell_split;

    #[test]
    fn quotes_keep_whitespace() {
        assert_eq!(
            shell_split(r#"foo "bar baz"  'qu"x' "#),
            vec!["foo", "bar baz", "qu\"x"]
        );
    }

    #[test]
    fn empty_quotes_yield_empty_token() {
        assert_eq!(shell_split(r#"a """#), vec!["a", ""]);
    }
}
