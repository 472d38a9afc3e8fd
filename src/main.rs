//! # image-dedup CLI
//!
//! Command-line interface for the duplicate image finder.
//!
//! ## Usage
//! ```bash
//! image-dedup scan ~/Pictures --threshold 8
//! image-dedup scan ~/Pictures --trash ~/Pictures/trash --output json
//! image-dedup cache stats
//! ```

mod cli;

use duplicate_image_finder::Result;

fn main() -> Result<()> {
    cli::run()
}
