/*!
 * Open-directive derivation for resumable reads
 *
 * A reader keeps a logical cursor `(offset, limit)`. Every time it has to
 * (re)connect, the cursor is turned back into the directives the remote
 * understands, with the caller's passthrough directives kept in front.
 */

use crate::backend::{OpenOption, RangeSpec};

/// Build the directives for opening at `offset`, bounded by `limit` (exclusive)
///
/// | offset | limit   | appended directive        |
/// |--------|---------|---------------------------|
/// | 0      | none    | nothing                   |
/// | > 0    | none    | `Seek { offset }`         |
/// | > 0    | `l`     | `Range [offset, l)`       |
/// | 0      | `l`     | nothing                   |
///
/// The last row is kept for compatibility with remotes expecting a plain
/// open for reads from the start; readers enforce the bound themselves.
pub fn derive_open_options(
    passthrough: &[OpenOption],
    offset: u64,
    limit: Option<u64>,
) -> Vec<OpenOption> {
    let mut options = Vec::with_capacity(passthrough.len() + 1);
    options.extend_from_slice(passthrough);

    if offset > 0 {
        match limit {
            None => options.push(OpenOption::Seek { offset }),
            Some(limit) => options.push(OpenOption::Range(RangeSpec::new(
                offset,
                limit.saturating_sub(1),
            ))),
        }
    }

    options
}

/// Cursor and passthrough directives extracted from a caller's open request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadWindow {
    pub offset: u64,
    pub limit: Option<u64>,
    pub passthrough: Vec<OpenOption>,
}

/// Split caller directives into a read window plus passthrough directives
///
/// Seek and range directives are consumed; a range is decoded against
/// `size`. The last directive of each kind wins and a range takes precedence
/// over a seek. All other directives keep their relative order.
pub fn split_open_options(options: &[OpenOption], size: u64) -> ReadWindow {
    let mut seek = None;
    let mut range = None;
    let mut passthrough = Vec::new();

    for option in options {
        match option {
            OpenOption::Seek { offset } => seek = Some(*offset),
            OpenOption::Range(spec) => range = Some(spec.decode(size)),
            other => passthrough.push(other.clone()),
        }
    }

    let (offset, limit) = match (range, seek) {
        (Some((offset, limit)), _) => (offset, limit),
        (None, Some(offset)) => (offset, None),
        (None, None) => (0, None),
    };

    ReadWindow {
        offset,
        limit,
        passthrough,
    }
}
