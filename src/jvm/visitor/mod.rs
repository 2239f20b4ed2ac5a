//! Bookkeeping wrappers around instruction and class sinks
//!
//! Every visitor here is explicit composition: a stage owns the next stage
//! and forwards calls to it, adding one concern on the way through.
//!
//!   - [`StackTrackingVisitor`] maintains the operand-stack contents and the
//!     local-variable watermark as instructions pass through, so generated
//!     code can be made verifiable without re-running a dataflow analysis
//!   - [`FramePaddingVisitor`] keeps explicit stack-map frames apart, since
//!     some verifiers reject two adjacent frame declarations
//!   - [`MetadataOrderingVisitor`] guarantees the canonical order of the
//!     class-level structural sections
//!   - [`AuxiliaryContextVisitor`] collects auxiliary types and the type
//!     initializer, and refuses to drop them on the floor

mod context;
mod frame_padding;
mod metadata;
mod stack_tracking;

pub use context::*;
pub use frame_padding::*;
pub use metadata::*;
pub use stack_tracking::*;
