//! The Ushanka object graph: compound objects, DIP parts, and datastreams.
//!
//! This crate defines the shape of what lands in Fedora and enforces its
//! invariants before anything is deposited:
//! - [`CompoundObject`] — one ingested SIP/AIP/DIP bundle
//! - [`DipPart`] — a constituent access object derived from the DIP
//! - [`Datastream`] — a named, typed payload owned by exactly one object
//! - [`RelsExt`] — the typed relationship set (collection membership,
//!   content model, constituency), with Turtle and RDF/XML serialization
//! - [`validate`] — structural validation of the datastream sets

pub mod datastream;
pub mod object;
pub mod rels_ext;
pub mod validate;

pub use datastream::{ControlGroup, Datastream, DatastreamContent, DatastreamId};
pub use object::{CompoundObject, DipPart};
pub use rels_ext::{MODEL_NS, REL_NS, RelsExt};
pub use validate::{COMPOUND_DATASTREAMS, PART_REQUIRED_DATASTREAMS, validate_compound, validate_part};
