use std::fmt;

use suffixd_primitives::ResultCode;

/// Outcome of a configuration-listener call.
///
/// Starts out successful; failures overwrite the result code and append a
/// message. Messages may also accompany a successful result (for example a
/// note that a backend is disabled).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigChangeResult {
	pub result_code: ResultCode,
	pub admin_action_required: bool,
	pub messages: Vec<String>,
}

impl ConfigChangeResult {
	pub fn new() -> Self {
		Self::default()
	}

	/// A failed result carrying one message.
	pub fn failure(result_code: ResultCode, message: impl Into<String>) -> Self {
		let mut ccr = Self::new();
		ccr.fail(result_code, message);
		ccr
	}

	/// Sets `result_code` and records `message`.
	pub fn fail(&mut self, result_code: ResultCode, message: impl Into<String>) {
		self.result_code = result_code;
		self.messages.push(message.into());
	}

	pub fn add_message(&mut self, message: impl Into<String>) {
		self.messages.push(message.into());
	}

	pub fn set_admin_action_required(&mut self) {
		self.admin_action_required = true;
	}

	pub fn is_success(&self) -> bool {
		self.result_code.is_success()
	}
}

impl fmt::Display for ConfigChangeResult {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.result_code)?;
		if self.admin_action_required {
			f.write_str(", administrative action required")?;
		}
		for message in &self.messages {
			write!(f, "; {message}")?;
		}
		Ok(())
	}
}
