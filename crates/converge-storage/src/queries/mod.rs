// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for CRUD operations on storage entities.

pub mod queue;
pub mod quotas;
