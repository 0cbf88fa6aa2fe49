use super::AttrCondition;
use super::Combinator;
use super::ComplexSelector;
use super::Compound;
use super::SelectorList;
use super::SelectorPart;
use crate::Error;
use crate::Result;

pub(super) fn parse_selector_list(selector: &str) -> Result<SelectorList> {
    let groups = split_selector_groups(selector)?;
    let mut parsed = Vec::with_capacity(groups.len());
    for group in groups {
        parsed.push(parse_complex_selector(selector, group)?);
    }
    Ok(SelectorList::from_selectors(parsed))
}

fn unsupported(selector: &str) -> Error {
    Error::InvalidSelector(selector.to_string())
}

/// Splits on top-level commas, ignoring commas inside brackets or quotes.
fn split_selector_groups(selector: &str) -> Result<Vec<&str>> {
    let mut groups = Vec::new();
    let mut bracket_depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0usize;

    for (idx, ch) in selector.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '[') => bracket_depth += 1,
            (None, ']') => {
                if bracket_depth == 0 {
                    return Err(unsupported(selector));
                }
                bracket_depth -= 1;
            }
            (None, ',') if bracket_depth == 0 => {
                let group = selector[start..idx].trim();
                if group.is_empty() {
                    return Err(unsupported(selector));
                }
                groups.push(group);
                start = idx + 1;
            }
            _ => {}
        }
    }

    if bracket_depth != 0 || quote.is_some() {
        return Err(unsupported(selector));
    }

    let last = selector[start..].trim();
    if last.is_empty() {
        return Err(unsupported(selector));
    }
    groups.push(last);
    Ok(groups)
}

fn tokenize_selector(
    selector: &str,
    group: &str,
) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in group.chars() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            current.push(ch);
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                if bracket_depth == 0 {
                    return Err(unsupported(selector));
                }
                bracket_depth -= 1;
                current.push(ch);
            }
            '>' if bracket_depth == 0 => {
                if !current.trim().is_empty() {
                    tokens.push(current.trim().to_string());
                }
                current.clear();
                tokens.push(ch.to_string());
            }
            '+' | '~' if bracket_depth == 0 => {
                // sibling combinators are not observable through child-list notifications
                return Err(unsupported(selector));
            }
            ch if ch.is_ascii_whitespace() && bracket_depth == 0 => {
                if !current.trim().is_empty() {
                    tokens.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if !current.trim().is_empty() {
        tokens.push(current.trim().to_string());
    }
    Ok(tokens)
}

fn parse_complex_selector(
    selector: &str,
    group: &str,
) -> Result<ComplexSelector> {
    let tokens = tokenize_selector(selector, group)?;
    let mut parts: Vec<SelectorPart> = Vec::new();
    let mut pending_combinator: Option<Combinator> = None;

    for token in tokens {
        if token == ">" {
            if pending_combinator.is_some() || parts.is_empty() {
                return Err(unsupported(selector));
            }
            pending_combinator = Some(Combinator::Child);
            continue;
        }

        let compound = parse_compound(selector, &token)?;
        let combinator = if parts.is_empty() {
            None
        } else {
            Some(pending_combinator.take().unwrap_or(Combinator::Descendant))
        };
        parts.push(SelectorPart { compound, combinator });
    }

    if parts.is_empty() || pending_combinator.is_some() {
        return Err(unsupported(selector));
    }
    Ok(ComplexSelector { parts })
}

fn parse_compound(
    selector: &str,
    part: &str,
) -> Result<Compound> {
    let bytes = part.as_bytes();
    let mut i = 0usize;
    let mut compound = Compound::default();

    while i < bytes.len() {
        match bytes[i] {
            b'*' => {
                if i != 0 {
                    return Err(unsupported(selector));
                }
                compound.universal = true;
                i += 1;
            }
            b'#' => {
                let (id, next) = parse_ident(part, i + 1).ok_or_else(|| unsupported(selector))?;
                if compound.id.replace(id).is_some() {
                    return Err(unsupported(selector));
                }
                i = next;
            }
            b'.' => {
                let (class_name, next) =
                    parse_ident(part, i + 1).ok_or_else(|| unsupported(selector))?;
                compound.classes.push(class_name);
                i = next;
            }
            b'[' => {
                let (cond, next) = parse_attr_condition(selector, part, i)?;
                compound.attrs.push(cond);
                i = next;
            }
            _ => {
                if i != 0 {
                    return Err(unsupported(selector));
                }
                let (tag, next) = parse_ident(part, i).ok_or_else(|| unsupported(selector))?;
                compound.tag = Some(tag);
                i = next;
            }
        }
    }

    Ok(compound)
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b >= 0x80
}

fn parse_ident(
    part: &str,
    start: usize,
) -> Option<(String, usize)> {
    let bytes = part.as_bytes();
    let mut end = start;
    while end < bytes.len() && is_ident_byte(bytes[end]) {
        end += 1;
    }
    if end == start {
        return None;
    }
    Some((part[start..end].to_string(), end))
}

fn parse_attr_condition(
    selector: &str,
    part: &str,
    start: usize,
) -> Result<(AttrCondition, usize)> {
    let mut quote: Option<char> = None;
    let mut close = None;
    for (idx, ch) in part[start + 1..].char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, ']') => {
                close = Some(start + 1 + idx);
                break;
            }
            _ => {}
        }
    }
    let close = close.ok_or_else(|| unsupported(selector))?;
    let inner = part[start + 1..close].trim();

    let cond = match inner.find('=') {
        None => {
            let key = attr_key(selector, inner)?;
            AttrCondition::Exists { key }
        }
        Some(eq) => {
            let (raw_key, op) = match inner[..eq].chars().last() {
                Some(op @ ('~' | '^' | '$' | '*')) => (&inner[..eq - 1], Some(op)),
                _ => (&inner[..eq], None),
            };
            let key = attr_key(selector, raw_key.trim())?;
            let value = attr_value(selector, inner[eq + 1..].trim())?;
            match op {
                None => AttrCondition::Eq { key, value },
                Some('~') => AttrCondition::Includes { key, value },
                Some('^') => AttrCondition::Prefix { key, value },
                Some('$') => AttrCondition::Suffix { key, value },
                Some(_) => AttrCondition::Substring { key, value },
            }
        }
    };

    Ok((cond, close + 1))
}

fn attr_key(
    selector: &str,
    raw: &str,
) -> Result<String> {
    match parse_ident(raw, 0) {
        Some((key, end)) if end == raw.len() => Ok(key),
        _ => Err(unsupported(selector)),
    }
}

fn attr_value(
    selector: &str,
    raw: &str,
) -> Result<String> {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        return Ok(raw[1..raw.len() - 1].to_string());
    }
    match parse_ident(raw, 0) {
        Some((value, end)) if end == raw.len() => Ok(value),
        _ => Err(unsupported(selector)),
    }
}
