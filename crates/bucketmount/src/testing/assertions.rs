//! Assertions over helper argv and credential files.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Assert that `args` contains `-o <option>` (s3fs style).
pub fn assert_has_option(args: &[String], option: &str, context: &str) {
    let found = args
        .windows(2)
        .any(|pair| pair[0] == "-o" && pair[1] == option);
    if !found {
        panic!("{context}: expected `-o {option}` in {args:?}");
    }
}

/// Assert that no argument contains `needle`.
pub fn assert_no_arg_containing(args: &[String], needle: &str, context: &str) {
    if let Some(arg) = args.iter().find(|a| a.contains(needle)) {
        panic!("{context}: unexpected argument {arg:?} containing {needle:?}");
    }
}

/// Assert that the file at `path` has exactly permission bits `mode`.
pub fn assert_file_mode(path: &Path, mode: u32, context: &str) {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) => panic!("{context}: cannot stat {}: {e}", path.display()),
    };
    let actual = metadata.permissions().mode() & 0o777;
    if actual != mode {
        panic!(
            "{context}: {} has mode {actual:o}, expected {mode:o}",
            path.display()
        );
    }
}

/// Read `path` as UTF-8, panicking with `context` on failure.
pub fn read_file(path: &Path, context: &str) -> String {
    match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => panic!("{context}: cannot read {}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_assert_has_option_success() {
        assert_has_option(&args(&["b", "-o", "ro"]), "ro", "test");
    }

    #[test]
    #[should_panic(expected = "expected `-o ro`")]
    fn test_assert_has_option_requires_pair() {
        assert_has_option(&args(&["b", "ro"]), "ro", "test");
    }

    #[test]
    #[should_panic(expected = "unexpected argument")]
    fn test_assert_no_arg_containing() {
        assert_no_arg_containing(&args(&["secret=x"]), "secret", "test");
    }
}
