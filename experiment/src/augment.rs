use crate::origin::OriginPool;

/// Extends `entries` with a copy of each entry for every alternate origin
///
/// Unlike [`rewrite`](crate::rewrite::rewrite), which moves a request onto
/// the one origin pair it was assigned, this enumerates every origin any
/// request could be assigned. Consumers that build allowlists (such as a
/// `script-src` policy) need all of them.
///
/// An entry containing the default app origin yields one derived entry per
/// app alternate. Otherwise, an entry containing the default s3 origin yields
/// one per s3 alternate. The result is the original entries in order,
/// followed by the derived ones grouped by source entry, then pool order.
pub fn augment(entries: Vec<String>, app_pool: &OriginPool, s3_pool: &OriginPool) -> Vec<String> {
    let mut derived = Vec::new();

    for entry in &entries {
        let Some((default, alternates)) = [app_pool, s3_pool].into_iter().find_map(|pool| {
            let default = pool.default_origin()?.as_str();
            (!default.is_empty() && entry.contains(default)).then(|| (default, pool.alternates()))
        }) else {
            continue;
        };

        derived.extend(
            alternates
                .iter()
                .map(|alternate| entry.replace(default, alternate.as_str())),
        );
    }

    let mut augmented = entries;
    augmented.extend(derived);
    augmented
}
