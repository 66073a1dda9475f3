/// Join a list the way a sentence would, `a, b and c`.
pub fn join_human<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [single] => single.as_ref().to_string(),
        [init @ .., last] => {
            let init = init.iter().map(|s| s.as_ref()).collect::<Vec<_>>();
            format!("{} and {}", init.join(", "), last.as_ref())
        }
    }
}

/// Cut a string after `max` characters, appending a scissors marker if anything was removed.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let mut out = s.chars().take(max).collect::<String>();
        out.push_str("✂…");
        out
    } else {
        s.to_string()
    }
}
