//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! LT5 material library reader (`.matlib`)

mod reader;
mod types;

pub use reader::MatLibFile;
pub use types::*;

/// Material library magic
pub const MAGIC: [u8; 4] = *b"MTLB";

/// The only supported material library version
pub const VERSION: i32 = 4;

/// All table offsets count from the end of the fixed header
pub const HEADER_SIZE: u64 = 32;

/// Parent offset that terminates a hierarchical name chain
pub const NO_PARENT: u32 = 0xFF_FFFF;
