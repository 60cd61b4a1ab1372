// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Domain services. Each public function is one unit of work against
//! [`crate::db::Storage`].

pub mod alerts;
pub mod categories;
pub mod export;
pub mod investments;
pub mod summary;
pub mod transactions;
pub mod users;
