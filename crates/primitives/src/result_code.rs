use std::fmt;

/// LDAP result codes used by the routing core.
///
/// Only the codes this component produces or forwards are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResultCode {
	#[default]
	Success,
	ConstraintViolation,
	UnwillingToPerform,
	/// The server-error code reported for implementation failures.
	Other,
}

impl ResultCode {
	/// Numeric value as defined by RFC 4511.
	pub fn int_value(self) -> u32 {
		match self {
			Self::Success => 0,
			Self::ConstraintViolation => 19,
			Self::UnwillingToPerform => 53,
			Self::Other => 80,
		}
	}

	/// Protocol name of the code.
	pub fn name(self) -> &'static str {
		match self {
			Self::Success => "success",
			Self::ConstraintViolation => "constraintViolation",
			Self::UnwillingToPerform => "unwillingToPerform",
			Self::Other => "other",
		}
	}

	/// Returns true for [`ResultCode::Success`].
	pub fn is_success(self) -> bool {
		self == Self::Success
	}

	/// The code used when a server-side implementation fails.
	pub fn server_error() -> Self {
		Self::Other
	}
}

impl fmt::Display for ResultCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.name(), self.int_value())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_display_and_values() {
		assert_eq!(ResultCode::UnwillingToPerform.to_string(), "unwillingToPerform (53)");
		assert_eq!(ResultCode::ConstraintViolation.int_value(), 19);
		assert_eq!(ResultCode::default(), ResultCode::Success);
		assert!(ResultCode::Success.is_success());
		assert!(!ResultCode::server_error().is_success());
		assert_eq!(ResultCode::server_error().to_string(), "other (80)");
	}
}
