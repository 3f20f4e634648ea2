//! Services - file level operations on a [`Workspace`](crate::workspace::Workspace).
//!
//! # Components
//!
//! - [`ConfigurationController`]: loads and saves workspace (`.lsz`), filter
//!   (`.flt`/`.tat`) and recent file (`.rcnt`) documents, and handles the menu
//!   actions that touch files.
//! - [`tag_parser`]: tokenizer for the tag based file format shared by all of them.
//! - [`MemPool`]: size classed buffers that whole files are read into.
//! - [`transfer`]: drag/drop and clipboard codec for tree nodes.
//!
//! None of these talk to a GUI. User interaction goes through the
//! [`Prompt`](crate::host::Prompt) of the workspace host.

pub mod configuration;
pub mod mem_pool;
pub mod tag_parser;
pub mod transfer;

pub use configuration::{ConfigurationController, ConfigurationError};
pub use mem_pool::{MemPool, PooledBuffer};
pub use tag_parser::{ParseError, TagHandler, Token, Tokenizer, parse_document, search_element_attribute};
pub use transfer::{DropAction, TransferError, decode_stream, drop_data, encode_selection};
