// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Adapters that move events between a chat surface and [`crate::bot::Bot`].
//! They carry no business logic.

pub mod console;
pub mod telegram;
