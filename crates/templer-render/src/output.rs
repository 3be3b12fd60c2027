//! Omitted entries removed from rendered text
//!
//! The rendered file is kept as the template wrote it. Comments, anchors,
//! quoting and indentation survive; only the entries whose value carries the
//! omit sentinel are cut out, line by line. The result is checked against a
//! structural strip of the parsed document, and layouts the line pass cannot
//! edit (flow collections, multi-line scalars, omitted keys) are serialized
//! from that structural strip instead.

use templer_engine::{OmitSentinel, strip_omitted};

/// Validate `rendered` and remove every omitted entry from it
///
/// The returned content always ends with a newline. A document that is empty
/// once omitted values are gone becomes `{}`.
pub fn finish(rendered: &str, omit: &OmitSentinel) -> Result<String, String> {
    let document: serde_yaml::Value = serde_yaml::from_str(rendered).map_err(|e| e.to_string())?;

    let expected = match strip_omitted(document, omit) {
        None | Some(serde_yaml::Value::Null) => return Ok("{}\n".to_string()),
        Some(expected) => expected,
    };

    if !omit.is_in(rendered) {
        return Ok(with_newline(rendered.to_string()));
    }

    if let Some(text) = strip_lines(rendered, omit.as_str()) {
        if parses_to(&text, &expected) {
            return Ok(text);
        }
    }

    tracing::debug!("Omitted values need a structural rewrite, comments are dropped");
    let text = serde_yaml::to_string(&expected).map_err(|e| e.to_string())?;
    let indented = indent_sequences(&text);
    Ok(if parses_to(&indented, &expected) { indented } else { text })
}

fn with_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

fn parses_to(text: &str, expected: &serde_yaml::Value) -> bool {
    serde_yaml::from_str::<serde_yaml::Value>(text).is_ok_and(|parsed| parsed == *expected)
}

/// Columns of a block line
#[derive(Debug, PartialEq)]
struct Layout {
    indent: usize,
    /// Number of `- ` sequence indicators before the content
    dashes: usize,
    last_dash: usize,
    /// Where the content after the indicators starts
    column: usize,
}

fn layout(line: &str) -> Layout {
    let bytes = line.as_bytes();
    let indent = bytes.iter().take_while(|&&b| b == b' ').count();

    let mut shape = Layout {
        indent,
        dashes: 0,
        last_dash: indent,
        column: indent,
    };
    while bytes.get(shape.column) == Some(&b'-')
        && matches!(bytes.get(shape.column + 1), None | Some(b' '))
    {
        shape.dashes += 1;
        shape.last_dash = shape.column;
        shape.column += 1;
        while bytes.get(shape.column) == Some(&b' ') {
            shape.column += 1;
        }
    }
    shape
}

fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// One omitted node and how its parent is repaired
#[derive(Debug)]
struct Cut {
    /// Column of the removed node; deeper lines belong to it
    anchor: usize,
    /// Indentation and enclosing `- ` indicators written on the removed line
    prefix: String,
    /// The removed line also opened an enclosing sequence item
    nested: bool,
    /// The removed node is a sequence item rather than a mapping entry
    item: bool,
}

/// Decide what to do with one line
///
/// `Some(None)` keeps the line, `None` gives up on the line pass.
fn plan_cut(line: &str, omit: &str) -> Option<Option<Cut>> {
    let shape = layout(line);
    let content = &line[shape.column..];
    let value = content.split(" #").next().unwrap_or(content);
    if content.starts_with('#') || !value.contains(omit) {
        return Some(None);
    }

    let cut = match split_entry(value) {
        Some((key, entry_value)) => {
            if key.contains(omit) || starts_flow(entry_value) {
                return None;
            }
            Cut {
                anchor: shape.column,
                prefix: line[..shape.column].to_string(),
                nested: shape.dashes > 0,
                item: false,
            }
        }
        None => {
            if shape.dashes == 0 || starts_flow(value) {
                return None;
            }
            Cut {
                anchor: shape.last_dash,
                prefix: line[..shape.last_dash].to_string(),
                nested: shape.dashes > 1,
                item: true,
            }
        }
    };
    Some(Some(cut))
}

/// Split `key: value`, honoring a quoted key
fn split_entry(content: &str) -> Option<(&str, &str)> {
    let key_end = match content.chars().next()? {
        quote @ ('"' | '\'') => content[1..].find(quote)? + 2,
        _ => 0,
    };
    let rest = &content[key_end..];
    let colon = rest
        .find(": ")
        .or_else(|| rest.ends_with(':').then(|| rest.len() - 1))?;
    let split = key_end + colon;
    Some((&content[..split], &content[split + 1..]))
}

fn starts_flow(value: &str) -> bool {
    matches!(value.trim_start().chars().next(), Some('[' | '{'))
}

/// Index after the last line belonging to the node that starts at `start`
fn region_end(lines: &[String], start: usize, anchor: usize) -> usize {
    let mut end = start + 1;
    for (index, line) in lines.iter().enumerate().skip(start + 1) {
        if line.trim().is_empty() {
            continue;
        }
        if layout(line).indent <= anchor {
            break;
        }
        end = index + 1;
    }
    end
}

/// Remove omitted mapping entries and sequence items from block YAML
///
/// When the removed node shared its line with an enclosing `- ` indicator, the
/// next sibling moves up onto that line, or the enclosing item becomes an
/// empty collection.
fn strip_lines(rendered: &str, omit: &str) -> Option<String> {
    let mut lines: Vec<String> = rendered.lines().map(str::to_string).collect();
    let mut kept = Vec::with_capacity(lines.len());
    let mut index = 0;

    while index < lines.len() {
        let Some(cut) = plan_cut(&lines[index], omit)? else {
            kept.push(lines[index].clone());
            index += 1;
            continue;
        };

        let end = region_end(&lines, index, cut.anchor);
        if cut.nested {
            let sibling = (end..lines.len())
                .find(|&i| !is_blank_or_comment(&lines[i]))
                .filter(|&i| {
                    let next = layout(&lines[i]);
                    next.indent == cut.anchor && (next.dashes > 0) == cut.item
                });
            match sibling {
                Some(i) => lines[i] = format!("{}{}", cut.prefix, &lines[i][cut.anchor..]),
                None => {
                    let empty = if cut.item { "[]" } else { "{}" };
                    kept.push(format!("{}{}", cut.prefix, empty));
                }
            }
        }
        index = end;
    }

    Some(with_newline(kept.join("\n")))
}

/// Indent block sequences nested under a mapping key by two spaces
///
/// `serde_yaml` writes them flush with their key.
fn indent_sequences(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut open: Vec<usize> = Vec::new();
    let mut out = String::with_capacity(text.len() + lines.len() * 2);

    for (index, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            out.push_str(line);
            out.push('\n');
            continue;
        }

        let shape = layout(line);
        while open
            .last()
            .is_some_and(|&col| shape.indent < col || (shape.indent == col && shape.dashes == 0))
        {
            open.pop();
        }

        out.push_str(&" ".repeat(2 * open.len()));
        out.push_str(line);
        out.push('\n');

        let opens_sequence = line.ends_with(':')
            && lines.get(index + 1).is_some_and(|next| {
                let next = layout(next);
                next.indent == shape.column && next.dashes > 0
            });
        if opens_sequence {
            open.push(shape.column);
        }
    }
    out
}
