use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelIdError {
	#[error("short channel id {0:?} does not have three 'x'-separated components")]
	WrongComponentCount(String),
	#[error("short channel id {id:?} has an invalid {component} component")]
	InvalidComponent { id: String, component: &'static str },
}

/// Decoded short channel id: `block_height x tx_index x output_index`.
///
/// The integer (BOLT 7) encoding packs the three fields as 24 + 24 + 16 bits, so the
/// transaction index is a `u24` on the wire and is kept in a `u32` here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortChannelId {
	pub block_height: u32,
	pub tx_index: u32,
	pub output_index: u16,
}

impl ShortChannelId {
	#[cfg(test)]
	pub fn new(block_height: u32, tx_index: u32, output_index: u16) -> Self {
		Self {
			block_height,
			tx_index,
			output_index,
		}
	}

	/// Split a `HxTxO` id into its three components.
	///
	/// Only the split and the integer parse are checked; whether the id actually points at an
	/// output is left to resolution.
	pub fn decode(id: &str) -> Result<Self, ChannelIdError> {
		let parts = id.split('x').collect::<Vec<&str>>();
		if parts.len() != 3 {
			return Err(ChannelIdError::WrongComponentCount(id.to_string()));
		}

		let invalid = |component| ChannelIdError::InvalidComponent {
			id: id.to_string(),
			component,
		};

		Ok(Self {
			block_height: parts[0].parse().map_err(|_| invalid("block height"))?,
			tx_index: parts[1].parse().map_err(|_| invalid("transaction index"))?,
			output_index: parts[2].parse().map_err(|_| invalid("output index"))?,
		})
	}

	pub fn from_u64(value: u64) -> Self {
		Self {
			block_height: (value >> 40) as u32,
			tx_index: ((value >> 16) & 0xFF_FFFF) as u32,
			output_index: (value & 0xFFFF) as u16,
		}
	}

	pub fn to_u64(&self) -> u64 {
		((self.block_height as u64 & 0xFF_FFFF) << 40)
			| ((self.tx_index as u64 & 0xFF_FFFF) << 16)
			| self.output_index as u64
	}
}

impl fmt::Display for ShortChannelId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}x{}x{}",
			self.block_height, self.tx_index, self.output_index
		)
	}
}

impl FromStr for ShortChannelId {
	type Err = ChannelIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::decode(s)
	}
}

impl From<u64> for ShortChannelId {
	fn from(value: u64) -> Self {
		Self::from_u64(value)
	}
}

impl Serialize for ShortChannelId {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for ShortChannelId {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		Self::decode(&s).map_err(serde::de::Error::custom)
	}
}
