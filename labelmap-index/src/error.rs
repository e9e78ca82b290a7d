// SPDX-License-Identifier: AGPL-3.0-or-later
// LabelMap - Sharded label lookup for concurrent vector indices
// Copyright (C) 2026 Sushanth Reddy Vanagala (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Error types for LabelMap
//!
//! Lookup operations themselves are total: a missing label is reported as
//! `None`/`false`, never as an error. Errors only come out of configuration
//! validation and profile export.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelMapError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for LabelMapError {
    fn from(err: serde_json::Error) -> Self {
        LabelMapError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LabelMapError>;
