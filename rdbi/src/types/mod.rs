// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Vendor value types carried as text by drivers without native support
//!
//! - `array`: one-dimensional arrays (`{1,2,3}`)
//! - `hstore`: string key/value maps (`"k"=>"v"`)

pub mod array;
pub mod hstore;

pub use array::{decode_elements, encode_array, parse_array, ArrayElement};
pub use hstore::{encode_hstore, parse_hstore, HStoreMap};
