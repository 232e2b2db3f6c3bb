mod atom;
mod span;

pub use atom::{Atom, AtomMap};
pub use span::{Location, Source, Span};
