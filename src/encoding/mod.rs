//! Turning raw rows into typed records.
//!
//! - [`encode()`]: one raw value + [`crate::types::FeatureType`] → [`crate::types::Feature`]
//! - [`build()`]: one row + [`crate::types::Schema`] → [`crate::types::Record`]
//! - [`convert_file()`]: read one input file and build all of its records
//!
//! ## Example
//!
//! ```rust
//! use tfrecord_converter::encoding::build;
//! use tfrecord_converter::types::{Column, Feature, FeatureType, FileType, Schema};
//!
//! let schema = Schema {
//!     dataset_name: "sample".to_string(),
//!     source_path_pattern: "data/*.tsv".to_string(),
//!     destination_path: "out/".to_string(),
//!     file_type: FileType::Tsv,
//!     skip_header: false,
//!     columns: vec![
//!         Column::new("first", FeatureType::String),
//!         Column::new("second", FeatureType::Float),
//!     ],
//! };
//!
//! let record = build(&["String", "4.5"], &schema).unwrap();
//! assert_eq!(record.get("second"), Some(&Feature::Floats(vec![4.5])));
//! ```

pub mod convert;
pub mod example;
pub mod feature;

pub use convert::{convert_file, FileConversion};
pub use example::build;
pub use feature::{encode, encode_column};
