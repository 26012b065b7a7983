// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use redis::aio::MultiplexedConnection;
use redis::Client;
use tracing::debug;

use super::text::parse_capture;
use crate::error::IngestionError;
use crate::request::CanonicalRequest;

const SCAN_BATCH: usize = 1000;

/// Reads every value whose key matches `pattern` and parses it as a text
/// capture. Keys are visited once even if `SCAN` reports them again.
pub async fn fetch_redis_source(
    url: &str,
    pattern: &str,
) -> Result<Vec<CanonicalRequest>, IngestionError> {
    let client = Client::open(url)?;
    let mut conn = client.get_multiplexed_async_connection().await?;

    let mut seen = HashSet::new();
    let mut requests = Vec::new();
    let mut cursor: u64 = 0;
    loop {
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_BATCH)
            .query_async(&mut conn)
            .await?;

        let fresh: Vec<String> = keys.into_iter().filter(|k| seen.insert(k.clone())).collect();
        if !fresh.is_empty() {
            requests.extend(fetch_values(&mut conn, &fresh).await?);
        }

        debug!(cursor = next, keys = seen.len(), "scanned redis keys");
        if next == 0 {
            break;
        }
        cursor = next;
    }

    Ok(requests)
}

async fn fetch_values(
    conn: &mut MultiplexedConnection,
    keys: &[String],
) -> Result<Vec<CanonicalRequest>, IngestionError> {
    let values: Vec<Option<String>> = redis::cmd("MGET").arg(keys).query_async(conn).await?;

    let mut requests = Vec::new();
    for value in values.into_iter().flatten() {
        requests.extend(parse_capture(&value)?);
    }
    Ok(requests)
}
