/// Write `values` into `out` through `f`, inserting `separator` between the
/// items that produced output.
pub fn separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) where
    F: FnMut(&mut String, T),
{
    let mut len = out.len();
    for v in values {
        if out.len() > len {
            out.push_str(separator);
        }
        len = out.len();
        f(out, v);
    }
}

/// Shorten a statement for logging.
pub fn excerpt(statement: &str) -> &str {
    let cut = statement
        .char_indices()
        .nth(500)
        .map(|(i, _)| i)
        .unwrap_or(statement.len());
    &statement[..cut]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_only_between_written_items() {
        let mut out = String::new();
        separated_by(&mut out, [1, 2, 3], |out, v| out.push_str(&v.to_string()), ", ");
        assert_eq!(out, "1, 2, 3");
        let mut out = String::new();
        separated_by(
            &mut out,
            [Some("a"), None, Some("b")],
            |out, v| {
                if let Some(v) = v {
                    out.push_str(v)
                }
            },
            ",",
        );
        assert_eq!(out, "a,b");
    }
}
