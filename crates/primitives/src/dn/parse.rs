//! String-form DN parser.

use smallvec::SmallVec;

use super::{Ava, DnError, Rdn};

pub(super) fn parse_dn(input: &str) -> Result<Vec<Rdn>, DnError> {
	let trimmed = trim_unescaped(input);
	if trimmed.is_empty() {
		return Ok(Vec::new());
	}

	let mut rdns = Vec::new();
	for raw in split_unescaped(trimmed, &[',', ';'], input)? {
		let raw = trim_unescaped(raw);
		if raw.is_empty() {
			return Err(DnError::EmptyRdn {
				dn: input.to_string(),
			});
		}
		rdns.push(parse_rdn(raw)?);
	}
	Ok(rdns)
}

pub(super) fn parse_rdn(raw: &str) -> Result<Rdn, DnError> {
	if raw.is_empty() {
		return Err(DnError::EmptyRdn { dn: String::new() });
	}

	let mut avas: SmallVec<[Ava; 1]> = SmallVec::new();
	for part in split_unescaped(raw, &['+'], raw)? {
		avas.push(parse_ava(trim_unescaped(part), raw)?);
	}
	Ok(Rdn::from_parts(avas, raw))
}

fn parse_ava(part: &str, rdn: &str) -> Result<Ava, DnError> {
	let Some(eq) = first_unescaped(part, '=') else {
		return Err(DnError::MissingEquals {
			rdn: rdn.to_string(),
		});
	};

	let attr = part[..eq].trim();
	if attr.is_empty() {
		return Err(DnError::MissingAttributeType {
			rdn: rdn.to_string(),
		});
	}
	if !is_valid_attribute_type(attr) {
		return Err(DnError::InvalidAttributeType {
			attr: attr.to_string(),
		});
	}

	let value = unescape_value(trim_unescaped(&part[eq + 1..]))?;
	Ok(Ava::new(attr, value))
}

/// Trims surrounding whitespace, keeping a trailing space that is escaped.
fn trim_unescaped(s: &str) -> &str {
	let s = s.trim_start();
	let end = s.trim_end();
	let backslashes = end.chars().rev().take_while(|&c| c == '\\').count();
	if backslashes % 2 == 0 {
		return end;
	}
	match s[end.len()..].chars().next() {
		Some(escaped) => &s[..end.len() + escaped.len_utf8()],
		None => end,
	}
}

/// Descriptor (`dc`, `x-custom`) or numeric OID (`2.5.4.3`).
fn is_valid_attribute_type(attr: &str) -> bool {
	let mut chars = attr.chars();
	let Some(first) = chars.next() else {
		return false;
	};
	if first.is_ascii_digit() {
		return attr.chars().all(|c| c.is_ascii_digit() || c == '.')
			&& !attr.ends_with('.')
			&& !attr.contains("..");
	}
	first.is_ascii_alphabetic() && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Splits on any of `seps` outside quotes and escapes.
fn split_unescaped<'a>(s: &'a str, seps: &[char], whole: &str) -> Result<Vec<&'a str>, DnError> {
	let mut parts = Vec::new();
	let mut start = 0;
	let mut escaped = false;
	let mut quoted = false;

	for (i, c) in s.char_indices() {
		if escaped {
			escaped = false;
			continue;
		}
		match c {
			'\\' => escaped = true,
			'"' => quoted = !quoted,
			c if !quoted && seps.contains(&c) => {
				parts.push(&s[start..i]);
				start = i + c.len_utf8();
			}
			_ => {}
		}
	}

	if escaped {
		return Err(DnError::TrailingEscape {
			dn: whole.to_string(),
		});
	}
	if quoted {
		return Err(DnError::UnterminatedQuote {
			dn: whole.to_string(),
		});
	}
	parts.push(&s[start..]);
	Ok(parts)
}

fn first_unescaped(s: &str, needle: char) -> Option<usize> {
	let mut escaped = false;
	for (i, c) in s.char_indices() {
		if escaped {
			escaped = false;
		} else if c == '\\' {
			escaped = true;
		} else if c == needle {
			return Some(i);
		}
	}
	None
}

fn unescape_value(raw: &str) -> Result<String, DnError> {
	let inner = raw
		.strip_prefix('"')
		.and_then(|r| r.strip_suffix('"'))
		.unwrap_or(raw);

	let invalid = || DnError::InvalidEscape {
		value: raw.to_string(),
	};

	let mut bytes = Vec::with_capacity(inner.len());
	let mut chars = inner.chars().peekable();
	while let Some(c) = chars.next() {
		if c != '\\' {
			let mut buf = [0u8; 4];
			bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
			continue;
		}

		let Some(next) = chars.next() else {
			return Err(invalid());
		};
		if let Some(hi) = next.to_digit(16) {
			match chars.peek().and_then(|c| c.to_digit(16)) {
				Some(lo) => {
					chars.next();
					bytes.push((hi * 16 + lo) as u8);
				}
				None => return Err(invalid()),
			}
		} else if is_special(next) || next == ' ' || next == '#' || next == '=' {
			let mut buf = [0u8; 4];
			bytes.extend_from_slice(next.encode_utf8(&mut buf).as_bytes());
		} else {
			return Err(invalid());
		}
	}

	String::from_utf8(bytes).map_err(|_| DnError::InvalidUtf8 {
		value: raw.to_string(),
	})
}

fn is_special(c: char) -> bool {
	matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';')
}
