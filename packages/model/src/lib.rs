//! # Scribe Model
//!
//! Tree addressing for the Scribe document engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: tree + addressing                    │
//! │  - Nodes (elements, text runs)              │
//! │  - Positions: root name + offset path       │
//! │  - Ranges and their transformations         │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: operations, transformation,         │
//! │ document history, batches, differ, markers  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Offsets
//!
//! Every child occupies a span of offsets in its parent: one for an
//! element, one per character for text. `[1, 4]` in root `main` is "inside
//! the element at offset 1, before offset 4".
//!
//! ```rust
//! use scribe_model::{Element, Node, Position, Tree};
//!
//! let mut tree = Tree::new();
//! tree.add_root(Element::new("main").with_children(vec![Node::element(
//!     Element::new("paragraph").with_children(vec![Node::text("foo")]),
//! )]));
//!
//! let end_of_paragraph = Position::new("main", vec![0, 3]);
//! tree.insert(&end_of_paragraph, vec![Node::text("bar")]).unwrap();
//! assert_eq!(tree.element_at("main", &[0]).unwrap().text(), "foobar");
//! ```

mod error;
mod node;
mod position;
mod range;
mod tree;

pub use error::{ModelError, ModelResult};
pub use node::{Attributes, Element, Node, Text};
pub use position::{Position, PositionRelation, Stickiness, GRAVEYARD};
pub use range::Range;
pub use tree::Tree;
