use ctaprod::cwl::quote::{join, needs_quoting, quote};

#[test]
fn test_safe_tokens_pass_through() {
    for token in ["dirac_prod_run", "--run", "42", "a/b/c.simtel.zst", "key=value", "x:y,z"] {
        assert!(!needs_quoting(token), "{token} should be safe");
        assert_eq!(quote(token), token);
    }
}

#[test]
fn test_unsafe_tokens_are_quoted() {
    assert_eq!(quote(""), "''");
    assert_eq!(quote("two words"), "'two words'");
    assert_eq!(quote("a|b"), "'a|b'");
    assert_eq!(quote("$HOME"), "'$HOME'");
    assert_eq!(quote("@{JOB_ID}"), "'@{JOB_ID}'");
    assert_eq!(quote("tab\there"), "'tab\there'");
    assert_eq!(quote("it's"), r#"'it'"'"'s'"#);
}

#[test]
fn test_join_uses_single_spaces() {
    let tokens = vec!["setup.sh", "--env", "prod run"];
    assert_eq!(join(&tokens), "setup.sh --env 'prod run'");
    assert_eq!(join::<&str>(&[]), "");
}

#[cfg(unix)]
#[test]
fn test_quoted_tokens_survive_the_shell() {
    use std::process::Command;

    let tokens = [
        "plain",
        "",
        "with space",
        "it's",
        "'''",
        "\"double\"",
        "a;b&c|d",
        "$(echo nope)",
        "<in> out",
        "@{JOB_ID}",
        "line\nbreak",
    ];

    // printf prints each argument followed by a NUL, so the split is exact.
    let script = format!("printf '%s\\0' {}", join(&tokens));
    let output = Command::new("sh")
        .arg("-c")
        .arg(&script)
        .output()
        .expect("Failed to run sh");
    assert!(output.status.success(), "sh failed for: {script}");

    let stdout = String::from_utf8(output.stdout).expect("Non UTF-8 output");
    let parsed: Vec<&str> = stdout.split('\0').collect();
    // Trailing NUL leaves one empty element at the end.
    assert_eq!(&parsed[..parsed.len() - 1], &tokens[..]);
}
