//! Terminal rendering of servo configuration.

use std::io::Write;

use console::style;

use crate::error::Result;

/// Print a servo `config.yaml` with syntax colouring.
///
/// The document is checked with serde_yaml first; anything that does not
/// parse is printed untouched so the user still sees what the servo holds.
pub fn print_yaml(bytes: &[u8]) -> Result<()> {
    let text = String::from_utf8_lossy(bytes);
    let mut stdout = std::io::stdout().lock();

    if let Err(e) = serde_yaml::from_str::<serde_yaml::Value>(&text) {
        tracing::debug!("config is not valid YAML, printing raw: {}", e);
        stdout.write_all(bytes)?;
        stdout.flush()?;
        return Ok(());
    }

    let mut highlighter = Highlighter::default();
    for line in text.lines() {
        writeln!(stdout, "{}", highlighter.line(line))?;
    }
    stdout.flush()?;
    Ok(())
}

/// Line-at-a-time colouring that tracks `|` and `>` block scalars, whose
/// content is text even when it looks like `key: value`.
#[derive(Debug, Default)]
struct Highlighter {
    /// Column the current block's content must be indented past.
    block_parent: Option<usize>,
}

impl Highlighter {
    /// Colour one line. Stripping the ANSI codes gives back `line`.
    fn line(&mut self, line: &str) -> String {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();

        if let Some(parent) = self.block_parent {
            if trimmed.is_empty() {
                return line.to_string();
            }
            if indent > parent {
                return format!("{}{}", &line[..indent], style(trimmed).green());
            }
            self.block_parent = None;
        }

        if let Some(offset) = block_scalar_start(trimmed) {
            self.block_parent = Some(indent + offset);
        }
        highlight_line(line)
    }
}

/// For a line whose value is a block scalar indicator, the offset of its key
/// within `trimmed` (the `- ` of a keyless sequence item counts as column 0).
fn block_scalar_start(trimmed: &str) -> Option<usize> {
    let (marker, rest) = match trimmed.strip_prefix("- ") {
        Some(rest) => (2, rest),
        None => (0, trimmed),
    };
    let (offset, value) = match split_key(rest) {
        Some((_, _, value)) => (marker, value),
        None if marker > 0 => (0, rest),
        None => return None,
    };

    let indicator = value.split(" #").next().unwrap_or_default().trim_end();
    let mut chars = indicator.chars();
    match chars.next() {
        Some('|') | Some('>') if chars.all(|c| c == '+' || c == '-' || c.is_ascii_digit()) => {
            Some(offset)
        }
        _ => None,
    }
}

/// Colour one line of YAML on its own. Stripping the ANSI codes gives back
/// `line`.
fn highlight_line(line: &str) -> String {
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];

    if trimmed.is_empty() {
        return line.to_string();
    }
    if trimmed.starts_with('#') || trimmed == "---" || trimmed == "..." {
        return format!("{}{}", indent, style(trimmed).dim());
    }

    let (marker, rest) = match trimmed.strip_prefix("- ") {
        Some(rest) => ("- ", rest),
        None if trimmed == "-" => return format!("{}{}", indent, style(trimmed).dim()),
        None => ("", trimmed),
    };

    let body = match split_key(rest) {
        Some((key, sep, value)) => {
            format!("{}{}{}", style(key).cyan(), sep, highlight_value(value))
        }
        None => highlight_value(rest),
    };

    if marker.is_empty() {
        format!("{}{}", indent, body)
    } else {
        format!("{}{}{}", indent, style(marker).dim(), body)
    }
}

/// Split `key: value` on the first mapping colon outside quotes.
fn split_key(text: &str) -> Option<(&str, &str, &str)> {
    let mut quote = None;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (None, '"') | (None, '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '#') if i == 0 => return None,
            (None, ':') => {
                let after = &text[i + 1..];
                if after.is_empty() {
                    return Some((&text[..i], ":", ""));
                }
                if after.starts_with(' ') {
                    let value = after.trim_start();
                    let sep_len = 1 + after.len() - value.len();
                    return Some((&text[..i], &text[i..i + sep_len], value));
                }
            }
            _ => {}
        }
    }
    None
}

fn highlight_value(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    // Trailing comment, only when clearly separated from the scalar.
    let (scalar, comment) = match value.find(" #") {
        Some(i) if !value.starts_with('"') && !value.starts_with('\'') => value.split_at(i),
        _ => (value, ""),
    };
    let scalar_trimmed = scalar.trim_end();
    let padding = &scalar[scalar_trimmed.len()..];

    let coloured = match scalar_trimmed {
        "null" | "~" => style(scalar_trimmed).dim().to_string(),
        "true" | "false" | "yes" | "no" | "on" | "off" => style(scalar_trimmed).yellow().to_string(),
        s if s.parse::<f64>().is_ok() => style(s).yellow().to_string(),
        s if s.starts_with('|') || s.starts_with('>') => style(s).dim().to_string(),
        s if s.starts_with('&') || s.starts_with('*') => style(s).magenta().to_string(),
        s => style(s).green().to_string(),
    };

    if comment.is_empty() {
        format!("{}{}", coloured, padding)
    } else {
        format!("{}{}{}", coloured, padding, style(comment).dim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CYAN: &str = "\x1b[36m";

    fn plain(line: &str) -> String {
        console::strip_ansi_codes(&highlight_line(line)).into_owned()
    }

    fn highlight_doc(doc: &str) -> Vec<String> {
        let mut highlighter = Highlighter::default();
        doc.lines().map(|line| highlighter.line(line)).collect()
    }

    #[test]
    fn test_highlight_preserves_text() {
        let doc = "\
# servo settings
---
optimizer: dev.opsani.com/app
connector:
  kind: compose
  replicas: 3
  debug: false
  tags:
    - web
    - \"quoted: colon\"
  empty:
  url: http://host:8080/path  # primary
  script: |
    echo hi
";
        for line in doc.lines() {
            assert_eq!(plain(line), line);
        }
    }

    #[test]
    fn test_block_scalar_content_is_not_keyed() {
        console::set_colors_enabled(true);
        let doc = "\
notes: |
  owner: ops team

  retry: later
replicas: 3
";
        let lines = highlight_doc(doc);
        assert!(lines[0].contains(CYAN));
        assert!(!lines[1].contains(CYAN));
        assert!(!lines[3].contains(CYAN));
        assert!(lines[4].contains(CYAN));

        for (highlighted, line) in lines.iter().zip(doc.lines()) {
            assert_eq!(console::strip_ansi_codes(highlighted), line);
        }
    }

    #[test]
    fn test_block_scalar_in_sequence_item() {
        console::set_colors_enabled(true);
        let lines = highlight_doc("steps:\n  - run: >-\n      name: build\n    when: always\n");
        assert!(!lines[2].contains(CYAN));
        // Sibling key of the same item ends the block.
        assert!(lines[3].contains(CYAN));
    }

    #[test]
    fn test_block_scalar_start() {
        assert_eq!(block_scalar_start("script: |"), Some(0));
        assert_eq!(block_scalar_start("script: >- # folded"), Some(0));
        assert_eq!(block_scalar_start("- run: |2"), Some(2));
        assert_eq!(block_scalar_start("- |"), Some(0));
        assert_eq!(block_scalar_start("cmd: a | b"), None);
        assert_eq!(block_scalar_start("|"), None);
    }

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("kind: compose"), Some(("kind", ": ", "compose")));
        assert_eq!(split_key("connector:"), Some(("connector", ":", "")));
        assert_eq!(
            split_key("url: http://host:8080"),
            Some(("url", ": ", "http://host:8080"))
        );
        assert_eq!(split_key("\"a: b\""), None);
        assert_eq!(split_key("http://host"), None);
    }

    #[test]
    fn test_print_yaml_accepts_invalid_input() {
        assert!(print_yaml(b"key: [unclosed").is_ok());
        assert!(print_yaml(b"a: 1\nb: two\n").is_ok());
    }
}
