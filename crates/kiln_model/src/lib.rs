//! The content model that every Kiln component operates on.
//!
//! Items and layouts are the source documents of a site; item reps are the
//! named output variants of items; the configuration and code snippets are
//! site-wide inputs. A [`Site`] bundles them as handed over by a data source.

#![warn(missing_docs)]

pub mod code_snippet;
pub mod collection;
pub mod config;
pub mod content;
pub mod document;
pub mod error;
pub mod rep;
pub mod site;
pub mod value;

pub use code_snippet::CodeSnippet;
pub use collection::{DocumentCollection, ItemCollection, LayoutCollection};
pub use config::Configuration;
pub use content::Content;
pub use document::{Attributes, Document, DocumentKind, Item, Layout};
pub use error::ModelError;
pub use rep::{ItemRep, RepName};
pub use site::Site;
pub use value::Value;

pub use kiln_common::{Identifier, Pattern, PatternKind};
