//! Errors reported by checked emission.

use std::any::Any;

use thiserror::Error;

/// Failure of [`Signal::try_emit`](crate::Signal::try_emit).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
	/// A slot panicked; the remaining slots of that emission were not invoked.
	#[error("slot in group {group} panicked: {message}")]
	SlotPanicked {
		/// Debug rendering of the group id of the panicking slot.
		group: String,
		/// Panic payload, or `<unknown panic>` for non-string payloads.
		message: String,
	},
}

/// Extracts the message of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&'static str>() {
		(*s).to_owned()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"<unknown panic>".to_owned()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_static_str_payload() {
		let payload = std::panic::catch_unwind(|| panic!("boom-str")).unwrap_err();
		assert_eq!(panic_message(&*payload), "boom-str");
	}

	#[test]
	fn extracts_string_payload() {
		let payload = std::panic::catch_unwind(|| panic!("{}", String::from("boom-string"))).unwrap_err();
		assert_eq!(panic_message(&*payload), "boom-string");
	}

	#[test]
	fn unknown_payloads_get_placeholder() {
		let payload = std::panic::catch_unwind(|| std::panic::panic_any(42u8)).unwrap_err();
		assert_eq!(panic_message(&*payload), "<unknown panic>");
	}

	#[test]
	fn display_names_group_and_message() {
		let err = EmitError::SlotPanicked {
			group: "3".into(),
			message: "boom".into(),
		};
		assert_eq!(err.to_string(), "slot in group 3 panicked: boom");
	}
}
