// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
pub mod allocator;
pub mod approval;
pub mod assignment;
pub mod database;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod notify;
pub mod quota;
pub mod routes;

#[cfg(test)]
pub mod test_support;
