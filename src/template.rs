use crate::Error;

/// A parsed reference to a method argument, with an optional dotted path
/// descending into it.
///
/// `arg_index` is 1-based: `?1` names the first method argument. An empty
/// `path` binds the whole argument value; `?{1.author.username}` descends
/// member by member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub arg_index: usize,
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// Immutable parsed form of a statement template.
///
/// The statement text itself is opaque to the parser; only the `?n` and
/// `?{n.path}` forms are interpreted. A bare `?` that is not followed by a
/// digit or `{` passes through as literal text, so driver-native bind
/// markers can coexist with the template syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parses a statement template.
    ///
    /// Pure and deterministic: parsing the same string twice yields
    /// structurally equal templates.
    ///
    /// # Errors
    /// [`Error::TemplateSyntax`] on an unterminated `?{`, a zero or
    /// non-numeric argument index, or a malformed path segment.
    pub fn parse(source: &str) -> Result<Template, Error> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch != '?' {
                literal.push(ch);
                continue;
            }
            match chars.peek() {
                Some(c) if c.is_ascii_digit() => {
                    let mut digits = String::new();
                    while let Some(c) = chars.peek() {
                        if c.is_ascii_digit() {
                            digits.push(*c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    flush_literal(&mut segments, &mut literal);
                    segments.push(Segment::Placeholder(Placeholder {
                        arg_index: parse_index(&digits)?,
                        path: Vec::new(),
                    }));
                }
                Some('{') => {
                    chars.next();
                    let mut body = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => body.push(c),
                            None => {
                                return Err(Error::TemplateSyntax(format!(
                                    "unterminated placeholder `?{{{body}` in `{source}`"
                                )));
                            }
                        }
                    }
                    flush_literal(&mut segments, &mut literal);
                    segments.push(Segment::Placeholder(parse_braced(&body)?));
                }
                _ => literal.push('?'),
            }
        }
        flush_literal(&mut segments, &mut literal);

        Ok(Template {
            source: source.to_string(),
            segments,
        })
    }

    /// The original template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholders in source order.
    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(p) => Some(p),
            Segment::Literal(_) => None,
        })
    }

    pub fn placeholder_count(&self) -> usize {
        self.placeholders().count()
    }

    /// Highest argument index referenced by any placeholder.
    pub fn max_arg_index(&self) -> usize {
        self.placeholders().map(|p| p.arg_index).max().unwrap_or(0)
    }

    /// Renders the final statement text, replacing the Nth placeholder in
    /// source order with the unit's native bind marker for slot N (1-based).
    pub fn render(&self, mut write_marker: impl FnMut(usize, &mut String)) -> String {
        let mut sql = String::with_capacity(self.source.len());
        let mut slot = 0;
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => sql.push_str(text),
                Segment::Placeholder(_) => {
                    slot += 1;
                    write_marker(slot, &mut sql);
                }
            }
        }
        sql
    }
}

fn flush_literal(segments: &mut Vec<Segment>, literal: &mut String) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

fn parse_index(digits: &str) -> Result<usize, Error> {
    let index: usize = digits
        .parse()
        .map_err(|_| Error::TemplateSyntax(format!("invalid argument index `{digits}`")))?;
    if index == 0 {
        return Err(Error::TemplateSyntax(
            "argument index 0 is invalid, placeholders are 1-based".into(),
        ));
    }
    Ok(index)
}

/// Parses the body of a `?{...}` placeholder: digits optionally followed by
/// one or more `.identifier` segments.
fn parse_braced(body: &str) -> Result<Placeholder, Error> {
    if body.is_empty() {
        return Err(Error::TemplateSyntax("empty placeholder `?{}`".into()));
    }
    let mut parts = body.split('.');
    let digits = parts.next().unwrap_or("");
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::TemplateSyntax(format!(
            "placeholder `?{{{body}}}` must start with an argument index"
        )));
    }
    let arg_index = parse_index(digits)?;

    let mut path = Vec::new();
    for part in parts {
        if !is_identifier(part) {
            return Err(Error::TemplateSyntax(format!(
                "invalid path segment `{part}` in placeholder `?{{{body}}}`"
            )));
        }
        path.push(part.to_string());
    }
    Ok(Placeholder { arg_index, path })
}

fn is_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
