//! # linkidx
//!
//! Intrusive associative containers over host-owned records.
//!
//! The host keeps its records in an [`Arena`] and links them into indexes by
//! [`Handle`]. Indexes never own records; keys are pulled out of records on
//! demand through a caller-supplied extractor.
//!
//! - [`OrderedIndex`]: unbalanced binary search tree over `i32` keys, with
//!   successor promotion on delete and ascending iteration.
//! - [`PrefixIndex`]: trie over byte-string keys that branches on insert and
//!   prunes unshared suffixes on remove.
//!
//! Neither index is synchronized; wrap it in a lock to share it between
//! threads.
//!
//! ## Example
//!
//! ```rust
//! use linkidx::{Arena, OrderedIndex, PrefixIndex};
//!
//! struct Person {
//!     id: i32,
//!     name: String,
//! }
//!
//! fn id_of(p: &Person) -> i32 {
//!     p.id
//! }
//!
//! fn name_of(p: &Person) -> &[u8] {
//!     p.name.as_bytes()
//! }
//!
//! # fn main() -> Result<(), linkidx::Error> {
//! let mut people = Arena::new();
//! let mut by_id = OrderedIndex::new("by-id", id_of)?;
//! let mut by_name: PrefixIndex<Person, _> = PrefixIndex::new("by-name", name_of)?;
//!
//! for (id, name) in [(7, "ann"), (3, "annabel"), (5, "dilbert")] {
//!     let h = people.insert(Person { id, name: name.to_owned() });
//!     by_id.insert(&people, h)?;
//!     by_name.insert(name.as_bytes(), h)?;
//! }
//!
//! let ids: Vec<i32> = by_id.iter().map(|h| people[h].id).collect();
//! assert_eq!(ids, vec![3, 5, 7]);
//!
//! let annabel = by_name.lookup(b"annabel").unwrap();
//! assert_eq!(people[annabel].id, 3);
//!
//! by_name.remove(b"ann")?;
//! assert_eq!(by_name.lookup(b"ann"), None);
//! assert!(by_name.lookup(b"annabel").is_some());
//! # for (h, _) in people.iter() {
//! #     by_id.remove(&people, h)?;
//! # }
//! # by_id.destroy().map_err(|e| e.error().clone())?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod arena;
pub mod config;
pub mod error;
pub mod ordered;
pub mod prefix;

pub use arena::{Arena, Handle};
pub use config::Config;
pub use error::{DestroyError, Error, ErrorKind, Result};
pub use ordered::OrderedIndex;
pub use prefix::{PrefixIndex, SENTINEL};

#[cfg(test)]
mod proptests;
