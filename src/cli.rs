//! Argument helpers shared by the command-line binaries.

/// `--name=value` or `--name value`. Blank values count as absent.
pub fn arg_value(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(v) = arg.strip_prefix(&prefix) {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

pub fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn equals_and_separate_forms() {
        let a = args(&["--db=/tmp/a.sqlite", "--date", "2025-01-02", "--replace"]);
        assert_eq!(arg_value(&a, "--db").as_deref(), Some("/tmp/a.sqlite"));
        assert_eq!(arg_value(&a, "--date").as_deref(), Some("2025-01-02"));
        assert!(has_flag(&a, "--replace"));
        assert!(!has_flag(&a, "--fake"));
    }

    #[test]
    fn blank_or_trailing_values_are_absent() {
        let a = args(&["--db=  ", "--limit"]);
        assert_eq!(arg_value(&a, "--db"), None);
        assert_eq!(arg_value(&a, "--limit"), None);
        assert_eq!(arg_value(&a, "--mode"), None);
    }
}
