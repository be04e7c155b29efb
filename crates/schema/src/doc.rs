//! Documentation-comment parsing.
//!
//! Two layouts are recognized. Google style:
//!
//! ```text
//! Create a ticket.
//!
//! Args:
//!     title: Short ticket title.
//!     priority (str): Triage priority.
//!
//! Returns:
//!     The ticket id.
//! ```
//!
//! and rustdoc style:
//!
//! ```text
//! Create a ticket.
//!
//! # Arguments
//!
//! * `title` - Short ticket title.
//!
//! # Returns
//!
//! The ticket id.
//! ```
//!
//! Anything unrecognized is ignored; parsing never fails.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Documentation {
    /// Leading summary and body paragraphs, joined by a blank line.
    pub summary: Option<String>,
    /// Per-parameter descriptions, in documentation order.
    pub params: Vec<(String, String)>,
    pub returns: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Summary,
    Params,
    Returns,
    Other,
}

impl Documentation {
    pub fn parse(text: &str) -> Self {
        let mut summary: Vec<&str> = Vec::new();
        let mut params: Vec<(String, String)> = Vec::new();
        let mut returns: Vec<&str> = Vec::new();

        let mut section = Section::Summary;
        let mut entry_indent: Option<usize> = None;

        for line in text.lines() {
            let trimmed = line.trim();
            if let Some(next) = section_header(trimmed) {
                section = next;
                entry_indent = None;
                continue;
            }

            match section {
                Section::Summary => summary.push(trimmed),
                Section::Returns => {
                    if !trimmed.is_empty() {
                        returns.push(trimmed);
                    }
                }
                Section::Params => {
                    if trimmed.is_empty() {
                        continue;
                    }
                    let indent = line.len() - line.trim_start().len();
                    let starts_entry = match entry_indent {
                        None => true,
                        Some(base) => indent <= base || is_bullet(trimmed),
                    };
                    match param_entry(trimmed).filter(|_| starts_entry) {
                        Some((name, description)) => {
                            entry_indent.get_or_insert(indent);
                            params.push((name, description));
                        }
                        None => {
                            if let Some((_, description)) = params.last_mut() {
                                if !description.is_empty() {
                                    description.push(' ');
                                }
                                description.push_str(trimmed);
                            }
                        }
                    }
                }
                Section::Other => {}
            }
        }

        params.retain(|(name, description)| !name.is_empty() && !description.is_empty());

        Self {
            summary: paragraphs(&summary),
            params,
            returns: returns_text(&returns),
        }
    }

    /// Description of a named parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, description)| description.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.params.is_empty() && self.returns.is_none()
    }
}

fn section_header(line: &str) -> Option<Section> {
    if let Some(heading) = line.strip_prefix('#') {
        let heading = heading.trim_start_matches('#').trim();
        return Some(match heading {
            "Arguments" | "Parameters" | "Args" => Section::Params,
            "Returns" | "Return" => Section::Returns,
            _ => Section::Other,
        });
    }

    match line {
        "Args:" | "Arguments:" | "Parameters:" | "Params:" => Some(Section::Params),
        "Returns:" | "Return:" => Some(Section::Returns),
        "Raises:" | "Errors:" | "Yields:" | "Example:" | "Examples:" | "Note:" | "Notes:"
        | "Attributes:" | "See Also:" | "Warning:" | "Warnings:" => Some(Section::Other),
        _ => None,
    }
}

fn is_bullet(line: &str) -> bool {
    line.starts_with("* ") || line.starts_with("- ")
}

/// Split a parameter line into name and description.
///
/// Accepts `name: text`, `name (type): text`, `` * `name` - text `` and
/// `` - `name`: text ``.
fn param_entry(line: &str) -> Option<(String, String)> {
    if is_bullet(line) {
        let rest = line[2..].trim_start();
        let (name, tail) = match rest.strip_prefix('`') {
            Some(quoted) => {
                let end = quoted.find('`')?;
                (&quoted[..end], &quoted[end + 1..])
            }
            None => {
                let end = rest.find([' ', ':'])?;
                (&rest[..end], &rest[end..])
            }
        };
        let description = tail
            .trim_start()
            .trim_start_matches(['-', ':'])
            .trim();
        return Some((clean_name(name), description.to_string()));
    }

    let (head, description) = line.split_once(':')?;
    let name = head.split_once('(').map_or(head, |(name, _)| name).trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some((clean_name(name), description.trim().to_string()))
}

fn clean_name(name: &str) -> String {
    name.trim().trim_start_matches('*').to_string()
}

fn paragraphs(lines: &[&str]) -> Option<String> {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in lines {
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    (!blocks.is_empty()).then(|| blocks.join("\n\n"))
}

/// Returns text, dropping a Google-style `type:` prefix.
fn returns_text(lines: &[&str]) -> Option<String> {
    let joined = lines.join(" ");
    let text = match joined.split_once(':') {
        Some((kind, rest)) if is_type_annotation(kind) && !rest.trim().is_empty() => rest.trim(),
        _ => joined.trim(),
    };
    (!text.is_empty()).then(|| text.to_string())
}

/// `str`, `list[int]`, `dict[str, Any]`, `Optional[Ticket]`, `a.B | None`.
///
/// All-caps words such as `URL` or `JSON` read as prose labels and are kept.
fn is_type_annotation(kind: &str) -> bool {
    let kind = kind.trim();
    let Some(first) = kind.chars().next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || "_.[], |".contains(c);
    if !kind.chars().all(allowed) {
        return false;
    }
    let has_lower = kind.chars().any(|c| c.is_ascii_lowercase());
    let bracketed = kind.contains('[');
    // Spaces only appear inside brackets or around `|`.
    let spaced_ok = !kind.contains(' ') || bracketed || kind.contains('|');
    (has_lower || kind.len() == 1) && spaced_ok
}
