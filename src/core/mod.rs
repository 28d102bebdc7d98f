/*!
 * Core read path
 *
 * [`HardObject`] turns open directives into a [`ResilientReader`], which keeps
 * a logical cursor over the object and reconnects whenever the live stream
 * fails.
 */

pub mod object;
pub mod options;
pub mod reader;

pub use object::HardObject;
pub use options::{derive_open_options, split_open_options, ReadWindow};
pub use reader::{ReadOutcome, ReaderStats, ResilientReader};
