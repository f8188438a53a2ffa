//! Stateless line classification.
//!
//! Every predicate here is a pure, case-insensitive pattern match over one
//! line; none of them look at exchange state.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

static RESULT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:OK|ERROR|BUSY|DATA|NO CARRIER|NO DIALTONE|NO ANSWER|COMMAND NOT SUPPORT|DOWNLOAD|\+CME\b.*|\+CMS ERROR\b.*|> ?|CONNECT(?: .+)?)$",
    )
    .expect("result line pattern")
});

static ERROR_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:\+CM[ES] )?ERROR(?::.*)?|NO CARRIER|COMMAND NOT SUPPORT)$")
        .expect("error line pattern")
});

static CONNECT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^CONNECT(?: .+)?$").expect("connect line pattern"));

static ECHO_SETTING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^AT(?:E([01])|Z0?|&F0?)$").expect("echo setting pattern")
});

/// True for a final result code: `OK`, `ERROR`, `BUSY`, `DATA`,
/// `NO CARRIER`, `COMMAND NOT SUPPORT`, `DOWNLOAD`, `+CME …`,
/// `+CMS ERROR …`, the bare prompt, or `CONNECT` with an optional qualifier.
pub fn is_result_line(line: &str) -> bool {
    RESULT_LINE.is_match(line)
}

/// True for a result code that reports failure.
pub fn is_error_line(line: &str) -> bool {
    ERROR_LINE.is_match(line)
}

/// True for the write prompt (`"> "`, or `">"` when trailing space was lost).
pub fn is_prompt(line: &str) -> bool {
    line.trim_end() == ">"
}

/// True for `CONNECT` and `CONNECT <qualifier>`.
pub fn is_connect(line: &str) -> bool {
    CONNECT_LINE.is_match(line)
}

/// True for `DOWNLOAD`, the prompt for `AT+HTTPDATA`-style binary uploads.
pub fn is_download(line: &str) -> bool {
    line.trim_end().eq_ignore_ascii_case("DOWNLOAD")
}

/// True when `line` is the verbatim echo of `command`. Leading control
/// characters (a stray NUL after power-up) are ignored.
pub fn is_echo(line: &str, command: &str) -> bool {
    !command.is_empty()
        && line.trim_start_matches(char::is_control).trim_end() == command.trim_end()
}

/// The echo mode a successful `command` leaves the module in: `ATE0` turns
/// echo off, `ATE1` on, and `ATZ`/`AT&F` restore the power-up default (on).
pub fn echo_setting(command: &str) -> Option<bool> {
    let caps = ECHO_SETTING.captures(command.trim())?;
    Some(caps.get(1).is_none_or(|m| m.as_str() == "1"))
}

/// Match a result code against a caller-supplied pattern.
///
/// The pattern is anchored at both ends and matched case-insensitively. A
/// pattern that is not a valid regex is compared literally instead.
pub fn matches_expected(pattern: &str, result_code: &str) -> bool {
    match RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(true)
        .build()
    {
        Ok(re) => re.is_match(result_code),
        Err(_) => pattern.eq_ignore_ascii_case(result_code),
    }
}
