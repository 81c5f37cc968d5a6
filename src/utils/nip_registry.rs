//! Fast NIP availability pre-check for user creation.
//!
//! The cuckoo filter answers "definitely not registered" without touching
//! the database; the moka cache remembers NIPs known to be taken. Anything
//! else falls through to a database lookup.

use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;
use std::time::Duration;

/// Expected capacity and false-positive rate.
const FILTER_CAPACITY: usize = 50_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static NIP_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

static TAKEN_CACHE: Lazy<Cache<String, bool>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(86_400))
        .build()
});

#[inline]
fn normalize(nip: &str) -> String {
    nip.trim().to_string()
}

/// Check if a NIP might be registered (false positives possible).
pub fn might_exist(nip: &str) -> bool {
    let nip = normalize(nip);
    match NIP_FILTER.read() {
        Ok(filter) => filter.contains(&nip),
        // a poisoned lock only means we lose the fast path
        Err(_) => true,
    }
}

/// Record a newly registered NIP.
pub async fn mark_taken(nip: &str) {
    let nip = normalize(nip);
    if let Ok(mut filter) = NIP_FILTER.write() {
        filter.add(&nip);
    }
    TAKEN_CACHE.insert(nip, true).await;
}

/// true  => NIP AVAILABLE
/// false => NIP TAKEN
pub async fn is_available(nip: &str, pool: &MySqlPool) -> Result<bool, sqlx::Error> {
    let nip = normalize(nip);

    // 1️⃣ Cuckoo filter — fast negative
    if !might_exist(&nip) {
        return Ok(true);
    }

    // 2️⃣ Moka cache — fast positive
    if TAKEN_CACHE.get(&nip).await.unwrap_or(false) {
        return Ok(false);
    }

    // 3️⃣ Database fallback
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE nip = ?")
        .bind(&nip)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        TAKEN_CACHE.insert(nip, true).await;
        return Ok(false);
    }
    Ok(true)
}

/// Load every registered NIP into the filter, streaming in batches.
pub async fn warmup(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String,)>("SELECT nip FROM users").fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (nip,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

        batch.push(normalize(&nip));
        total += 1;

        if batch.len() == batch_size {
            insert_batch(&batch)?;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch)?;
    }

    tracing::info!(total, "NIP filter warmup complete");
    Ok(())
}

fn insert_batch(nips: &[String]) -> Result<()> {
    let mut filter = NIP_FILTER
        .write()
        .map_err(|_| anyhow!("NIP filter lock poisoned"))?;

    for nip in nips {
        filter.add(nip);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn marked_nips_are_reported_by_filter() {
        let nip = "197712312005011009";
        mark_taken(nip).await;
        assert!(might_exist(nip));
        assert!(might_exist(" 197712312005011009 "));
        assert!(TAKEN_CACHE.get(nip).await.unwrap_or(false));
    }
}
