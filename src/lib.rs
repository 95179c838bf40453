//! Generate Visual Studio C++ project files (`.vcxproj` plus
//! `.vcxproj.filters`) from the file lists and configurations a build tool
//! already knows about.

pub mod condition;
pub mod config;
pub mod document;
pub mod emit;
pub mod error;
pub mod guid;
pub mod hierarchy;
pub mod inspect;
pub mod paths;
pub mod policy;
pub mod writer;

pub use config::{BuildMetadata, ConfigurationRecord, ExclusionRule, FileCategory, GeneratorSettings, Manifest};
pub use error::{Result, VcxprojError};
pub use inspect::{check_correlation, CorrelationIssue, FiltersDocument, ProjectDocument};
pub use writer::{generate, generate_into, GeneratedProject, ProjectWriter};
