//! Distinguished names.
//!
//! # Mental model
//!
//! * A [`Dn`] is a sequence of [`Rdn`]s stored leaf-first: `rdns[0]` is the
//!   left-most component (`cn=bob` in `cn=bob,ou=people,dc=example,dc=com`).
//! * The root DN has no components and is written as the empty string.
//! * Parents share the storage of their children. [`Dn::parent`] and
//!   [`Dn::ancestors`] are allocation-free, which matters for the ancestor walks
//!   done on every routed request.
//!
//! # Equality and ordering
//!
//! Attribute types compare case-insensitively. Values compare case-insensitively
//! with runs of whitespace collapsed. Multi-valued RDNs compare as a set.
//!
//! `Ord` compares from the right-most RDN, so the root sorts first and an
//! ancestor always sorts before its descendants. A `BTreeMap<Dn, _>` therefore
//! iterates parents before children.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use smallvec::SmallVec;

mod parse;


/// Errors produced while parsing a DN string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DnError {
	/// A double-quoted value was not closed.
	#[error("unterminated quoted value in \"{dn}\"")]
	UnterminatedQuote { dn: String },
	/// The string ends with a lone backslash.
	#[error("trailing escape character in \"{dn}\"")]
	TrailingEscape { dn: String },
	/// A backslash was followed by something that is neither a special
	/// character nor a pair of hex digits.
	#[error("invalid escape sequence in \"{value}\"")]
	InvalidEscape { value: String },
	/// Hex escapes decoded to bytes that are not UTF-8.
	#[error("escaped value \"{value}\" is not valid UTF-8")]
	InvalidUtf8 { value: String },
	/// Two separators with nothing between them, or a leading/trailing separator.
	#[error("empty RDN component in \"{dn}\"")]
	EmptyRdn { dn: String },
	/// An attribute value assertion without `=`.
	#[error("missing '=' in RDN \"{rdn}\"")]
	MissingEquals { rdn: String },
	/// An attribute value assertion with nothing before `=`.
	#[error("missing attribute type in RDN \"{rdn}\"")]
	MissingAttributeType { rdn: String },
	/// An attribute type that is neither a descriptor nor a numeric OID.
	#[error("invalid attribute type \"{attr}\"")]
	InvalidAttributeType { attr: String },
}

/// One `type=value` pair of an RDN.
#[derive(Debug, Clone)]
pub struct Ava {
	attr: Box<str>,
	value: Box<str>,
	norm_attr: Box<str>,
	norm_value: Box<str>,
}

impl Ava {
	/// Builds an assertion from an attribute type and an unescaped value.
	pub fn new(attr: impl Into<String>, value: impl Into<String>) -> Self {
		let attr: String = attr.into();
		let value: String = value.into();
		Self {
			norm_attr: attr.trim().to_ascii_lowercase().into(),
			norm_value: normalize_value(&value).into(),
			attr: attr.trim().into(),
			value: value.into(),
		}
	}

	/// Attribute type as written.
	pub fn attr(&self) -> &str {
		&self.attr
	}

	/// Unescaped attribute value.
	pub fn value(&self) -> &str {
		&self.value
	}

	fn key(&self) -> (&str, &str) {
		(&self.norm_attr, &self.norm_value)
	}
}

impl PartialEq for Ava {
	fn eq(&self, other: &Self) -> bool {
		self.key() == other.key()
	}
}

impl Eq for Ava {}

impl PartialOrd for Ava {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Ava {
	fn cmp(&self, other: &Self) -> Ordering {
		self.key().cmp(&other.key())
	}
}

impl Hash for Ava {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.key().hash(state);
	}
}

/// A relative distinguished name: one or more attribute value assertions.
#[derive(Debug, Clone)]
pub struct Rdn {
	/// Sorted by normalized key so that `a=1+b=2` equals `b=2+a=1`.
	avas: SmallVec<[Ava; 1]>,
	text: Box<str>,
}

impl Rdn {
	/// Builds a single-valued RDN, escaping the value for display.
	pub fn new(attr: impl Into<String>, value: impl Into<String>) -> Self {
		let ava = Ava::new(attr, value);
		let text = format!("{}={}", ava.attr, escape_value(&ava.value));
		Self {
			avas: smallvec::smallvec![ava],
			text: text.into(),
		}
	}

	pub(crate) fn from_parts(mut avas: SmallVec<[Ava; 1]>, text: &str) -> Self {
		avas.sort();
		Self {
			avas,
			text: text.into(),
		}
	}

	/// The assertions of this RDN in canonical order.
	pub fn avas(&self) -> &[Ava] {
		&self.avas
	}

	/// Returns true when this RDN has more than one assertion.
	pub fn is_multi_valued(&self) -> bool {
		self.avas.len() > 1
	}
}

impl PartialEq for Rdn {
	fn eq(&self, other: &Self) -> bool {
		self.avas == other.avas
	}
}

impl Eq for Rdn {}

impl PartialOrd for Rdn {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Rdn {
	fn cmp(&self, other: &Self) -> Ordering {
		self.avas.iter().cmp(other.avas.iter())
	}
}

impl Hash for Rdn {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.avas.as_slice().hash(state);
	}
}

impl fmt::Display for Rdn {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.text)
	}
}

impl FromStr for Rdn {
	type Err = DnError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		parse::parse_rdn(s.trim())
	}
}

/// A distinguished name.
#[derive(Clone)]
pub struct Dn {
	rdns: Arc<[Rdn]>,
	/// Index of the left-most RDN of this DN inside `rdns`.
	start: usize,
}

impl Dn {
	/// The root DN (the empty string).
	pub fn root() -> Self {
		Self {
			rdns: Arc::from(Vec::new()),
			start: 0,
		}
	}

	/// Parses a DN from its string form.
	pub fn parse(s: &str) -> Result<Self, DnError> {
		let rdns = parse::parse_dn(s)?;
		Ok(Self::from_rdns(rdns))
	}

	/// Builds a DN from RDNs ordered left-most first.
	pub fn from_rdns(rdns: Vec<Rdn>) -> Self {
		Self {
			rdns: Arc::from(rdns),
			start: 0,
		}
	}

	/// The RDNs of this DN, left-most first.
	pub fn rdns(&self) -> &[Rdn] {
		&self.rdns[self.start..]
	}

	/// Number of RDN components.
	pub fn size(&self) -> usize {
		self.rdns.len() - self.start
	}

	/// Returns true for the root DN.
	pub fn is_root(&self) -> bool {
		self.size() == 0
	}

	/// The left-most RDN, `None` for the root DN.
	pub fn rdn(&self) -> Option<&Rdn> {
		self.rdns().first()
	}

	/// The immediate parent, `None` for the root DN.
	///
	/// The parent of a single-RDN DN is the root DN.
	pub fn parent(&self) -> Option<Dn> {
		if self.is_root() {
			return None;
		}
		Some(Self {
			rdns: Arc::clone(&self.rdns),
			start: self.start + 1,
		})
	}

	/// Strict ancestors from the immediate parent upwards, excluding the root DN.
	pub fn ancestors(&self) -> impl Iterator<Item = Dn> + '_ {
		(self.start + 1..self.rdns.len()).map(move |start| Self {
			rdns: Arc::clone(&self.rdns),
			start,
		})
	}

	/// Returns a new DN with `rdn` prepended.
	pub fn child(&self, rdn: Rdn) -> Dn {
		let mut rdns = Vec::with_capacity(self.size() + 1);
		rdns.push(rdn);
		rdns.extend(self.rdns().iter().cloned());
		Self::from_rdns(rdns)
	}

	/// Returns true when `self` equals `other` or lies below it.
	pub fn is_subordinate_or_equal_to(&self, other: &Dn) -> bool {
		let Some(offset) = self.size().checked_sub(other.size()) else {
			return false;
		};
		self.rdns()[offset..] == *other.rdns()
	}

	/// Returns true when `self` equals `other` or lies above it.
	pub fn is_superior_or_equal_to(&self, other: &Dn) -> bool {
		other.is_subordinate_or_equal_to(self)
	}

	/// Returns true when `self` lies strictly below `other`.
	pub fn is_descendant_of(&self, other: &Dn) -> bool {
		self.size() > other.size() && self.is_subordinate_or_equal_to(other)
	}

	/// Returns true when `self` lies strictly above `other`.
	pub fn is_ancestor_of(&self, other: &Dn) -> bool {
		other.is_descendant_of(self)
	}
}

impl Default for Dn {
	fn default() -> Self {
		Self::root()
	}
}

impl PartialEq for Dn {
	fn eq(&self, other: &Self) -> bool {
		self.rdns() == other.rdns()
	}
}

impl Eq for Dn {}

impl PartialOrd for Dn {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Dn {
	fn cmp(&self, other: &Self) -> Ordering {
		self.rdns().iter().rev().cmp(other.rdns().iter().rev())
	}
}

impl Hash for Dn {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.rdns().hash(state);
	}
}

impl fmt::Display for Dn {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, rdn) in self.rdns().iter().enumerate() {
			if i > 0 {
				f.write_str(",")?;
			}
			fmt::Display::fmt(rdn, f)?;
		}
		Ok(())
	}
}

impl fmt::Debug for Dn {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Dn({:?})", self.to_string())
	}
}

impl FromStr for Dn {
	type Err = DnError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

impl serde::Serialize for Dn {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> serde::Deserialize<'de> for Dn {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		Dn::parse(&s).map_err(serde::de::Error::custom)
	}
}

fn normalize_value(value: &str) -> String {
	let mut out = String::with_capacity(value.len());
	for word in value.split_whitespace() {
		if !out.is_empty() {
			out.push(' ');
		}
		out.extend(word.chars().flat_map(char::to_lowercase));
	}
	out
}

fn escape_value(value: &str) -> String {
	let mut out = String::with_capacity(value.len());
	let last = value.chars().count().saturating_sub(1);
	for (i, c) in value.chars().enumerate() {
		let special = matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
			|| (i == 0 && (c == '#' || c == ' '))
			|| (i == last && c == ' ');
		if special {
			out.push('\\');
		}
		out.push(c);
	}
	out
}
