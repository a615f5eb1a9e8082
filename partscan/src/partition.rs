// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Partition tokens and plans

use serde::{Deserialize, Serialize};

/// Split size used when no override is configured (1 GiB)
pub const DEFAULT_PARTITION_SIZE_BYTES: u64 = 1024 * 1024 * 1024;

/// Upper bound on proposed partitions when no override is configured
pub const DEFAULT_MAX_PARTITIONS: u64 = 10_000;

/// Opaque descriptor of one independently readable slice of a query
///
/// Only the backing store that issued a token can interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionToken(Vec<u8>);

impl PartitionToken {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Ordered tokens, in the order partitioning returned them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionPlan {
    tokens: Vec<PartitionToken>,
}

impl PartitionPlan {
    pub fn new(tokens: Vec<PartitionToken>) -> Self {
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PartitionToken> {
        self.tokens.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartitionToken> {
        self.tokens.iter()
    }
}

/// Split-size hints for partitioning
///
/// `None` leaves the choice to the backing store's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionOptions {
    pub partition_size_bytes: Option<u64>,
    pub max_partitions: Option<u64>,
}

impl PartitionOptions {
    pub fn effective_partition_size(&self) -> u64 {
        self.partition_size_bytes
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_PARTITION_SIZE_BYTES)
    }

    pub fn effective_max_partitions(&self) -> u64 {
        self.max_partitions
            .filter(|max| *max > 0)
            .unwrap_or(DEFAULT_MAX_PARTITIONS)
    }

    /// Desired partition count for a payload of `estimated_bytes`
    pub fn desired_partitions(&self, estimated_bytes: u64) -> u64 {
        let size = self.effective_partition_size();
        let wanted = estimated_bytes.div_ceil(size);
        wanted.clamp(1, self.effective_max_partitions())
    }
}
