//! Line-oriented gitolite.conf parser

use std::sync::OnceLock;

use regex::Regex;

use super::{parse_error, Access, Config, Permission};
use crate::error::Result;

fn rule_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\S+)(?:\s+(.*?))?\s*=\s*(.*)$").expect("rule pattern is valid")
    })
}

/// Parse a gitolite.conf document.
///
/// Rules and options apply to every repository named on the most recent
/// `repo` line. A repository declared in several blocks accumulates rules
/// in file order.
pub fn parse(text: &str) -> Result<Config> {
    let mut config = Config::new();
    let mut context: Vec<String> = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = strip_comment(raw.trim()).trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("include ") || line.starts_with("subconf ") {
            config.add_include(line);
            continue;
        }

        if let Some(names) = line.strip_prefix("repo ") {
            context = names.split_whitespace().map(str::to_string).collect();
            if context.is_empty() {
                return Err(parse_error(line_no, "repo line names no repository"));
            }
            for name in &context {
                config.entry(name);
            }
            continue;
        }

        if line.starts_with('@') {
            let (name, members) = line
                .split_once('=')
                .ok_or_else(|| parse_error(line_no, "group definition without '='"))?;
            let name = name.trim();
            if name.len() < 2 || name.contains(char::is_whitespace) {
                return Err(parse_error(line_no, format!("bad group name {name:?}")));
            }
            config.add_group_members(name, members.split_whitespace());
            continue;
        }

        if context.is_empty() {
            return Err(parse_error(line_no, "rule outside of a repo block"));
        }

        if let Some(keyword) = ["config ", "option "]
            .iter()
            .find(|keyword| line.starts_with(**keyword))
        {
            let (key, value) = line[keyword.len()..]
                .split_once('=')
                .ok_or_else(|| parse_error(line_no, "option without '='"))?;
            let key = format!("{}{}", keyword, key.trim());
            for name in &context {
                config
                    .entry(name)
                    .options
                    .push((key.clone(), value.trim().to_string()));
            }
            continue;
        }

        let captures = rule_pattern()
            .captures(line)
            .ok_or_else(|| parse_error(line_no, format!("unrecognized line {line:?}")))?;
        let access: Access = captures[1]
            .parse()
            .map_err(|message: String| parse_error(line_no, message))?;
        let refspec = captures
            .get(2)
            .map(|m| m.as_str().trim())
            .unwrap_or_default();
        let principals: Vec<&str> = captures[3].split_whitespace().collect();
        if principals.is_empty() {
            return Err(parse_error(line_no, "rule grants nobody"));
        }
        for name in &context {
            config
                .entry(name)
                .push_permission(Permission::new(access.clone(), refspec, principals.iter().copied()));
        }
    }

    Ok(config)
}

/// Drop a trailing `#` comment. `config`/`option` values are taken
/// verbatim, so a `#` inside them survives.
fn strip_comment(line: &str) -> &str {
    if line.starts_with('#') {
        return "";
    }
    if line.starts_with("config ") || line.starts_with("option ") {
        return line;
    }
    match line.find('#') {
        Some(index) => &line[..index],
        None => line,
    }
}
