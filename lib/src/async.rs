// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

/// Async wrappers for watching a chip via the Tokio reactor.
#[cfg(feature = "async_tokio")]
pub mod tokio;

/// Async wrappers for watching a chip via the async-io reactor.
#[cfg(feature = "async_io")]
pub mod async_io;
