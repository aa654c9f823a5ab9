//! External format conversion
//!
//! The pipeline only ever talks to the [`Converter`] trait: convert one input
//! file into one output file, given a list of pass-through options. This keeps
//! process handling out of the task logic and lets tests substitute a fake.
//!
//! ## Implementations
//!
//! - [`CliConverter`]: runs Open Babel (`obabel`, or the legacy `babel`)
//! - [`TimeoutConverter`]: wraps any converter and kills invocations that
//!   exceed a deadline
//!
//! ## Usage
//!
//! ```no_run
//! use mol2_pdbqt::converter::{CliConverter, Converter};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = CliConverter::from_path("mol2", "pdbqt")
//!         .expect("openbabel not found in PATH");
//!
//!     let options = vec!["--partialcharge".to_string(), "gasteiger".to_string()];
//!     let result = converter
//!         .convert(Path::new("ZINC001.mol2"), Path::new("ZINC001.pdbqt"), &options)
//!         .await?;
//!     println!("exit status: {:?}", result.status);
//!     Ok(())
//! }
//! ```

mod cli;
mod timeout;
mod traits;

pub use cli::CliConverter;
pub use timeout::TimeoutConverter;
pub use traits::{Converter, ExitResult};
