use std::{collections::VecDeque, sync::Mutex};

use uuid::Uuid;

/// Provides UUIDs for newly created entities.
///
/// The default provider is random. Tests construct one from a fixed sequence
/// so that ids are predictable.
#[derive(Debug, Default)]
pub struct UuidProvider {
	sequence: Option<Mutex<VecDeque<Uuid>>>,
}

impl UuidProvider {
	pub fn new_random() -> Self {
		Self { sequence: None }
	}

	pub fn new_from_sequence(uuids: impl IntoIterator<Item = Uuid>) -> Self {
		Self {
			sequence: Some(Mutex::new(uuids.into_iter().collect())),
		}
	}

	pub fn next_v4(&self) -> Uuid {
		match self.sequence {
			None => Uuid::new_v4(),
			Some(ref sequence) => sequence
				.lock()
				.expect("uuid sequence lock poisoned")
				.pop_front()
				.expect("uuid sequence exhausted"),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_sequence_yields_in_order() {
		let provider =
			UuidProvider::new_from_sequence((1..4_u128).map(Uuid::from_u128));
		assert_eq!(provider.next_v4(), Uuid::from_u128(1));
		assert_eq!(provider.next_v4(), Uuid::from_u128(2));
		assert_eq!(provider.next_v4(), Uuid::from_u128(3));
	}

	#[test]
	fn test_random_yields_unique() {
		let provider = UuidProvider::new_random();
		assert_ne!(provider.next_v4(), provider.next_v4());
	}
}
