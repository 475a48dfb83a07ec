//! Deterministic bucket assignment.
//!
//! # Assignment algorithm (`chacha8-lemire-v1`)
//!
//! The bucket a client lands in is an external contract: changing any step
//! below reshuffles every client, so it is versioned through
//! [`ASSIGNMENT_ALGORITHM`] and that identifier is folded into response
//! cache keys.
//!
//! 1. The client IP becomes an integer: IPv4 as its `u32` value, IPv6 as its
//!    `u128` value. IPv4-mapped IPv6 addresses are not unmapped.
//! 2. The seed is 32 bytes: that integer as a little-endian `u128` in bytes
//!    0..16, zeroes in bytes 16..32.
//! 3. The generator is `ChaCha8Rng::from_seed(seed)`, whose output stream is
//!    stable across `rand_chacha` releases.
//! 4. A single value in `[0, bucket_count)` is drawn with Lemire's
//!    widening-multiply rejection over `next_u64`.
//!
//! `Rng::random_range` is not used: `rand` does not guarantee its sampling
//! algorithm across releases.

use crate::context::RequestContext;
use crate::errors::{ExperimentError, Result};
use crate::metrics_defs::{BUCKET_ASSIGNED, BUCKET_OVERRIDE_REJECTED};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shared::counter;
use std::fmt;
use std::net::IpAddr;
use std::num::NonZeroUsize;

/// Identifies the seeding and draw scheme described in the module docs
pub const ASSIGNMENT_ALGORITHM: &str = "chacha8-lemire-v1";

/// Request parameter that pins a bucket explicitly
pub const OVERRIDE_PARAM: &str = "_cdn_index";

/// Index into both origin pools at once; 0 is the default pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketIndex(usize);

impl BucketIndex {
    pub const DEFAULT: BucketIndex = BucketIndex(0);

    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn get(self) -> usize {
        self.0
    }

    pub fn is_default(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for BucketIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a bucket assignment came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignmentSource {
    Override,
    ClientIp,
}

impl AssignmentSource {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AssignmentSource::Override => "override",
            AssignmentSource::ClientIp => "ip",
        }
    }
}

/// Draws a bucket for a client
///
/// Implementations must be pure functions of their inputs. The selector
/// relies on that for stickiness.
pub trait BucketDraw {
    fn draw(&self, client_ip: IpAddr, bucket_count: NonZeroUsize) -> usize;
}

/// The production draw, see the module docs
#[derive(Clone, Copy, Debug, Default)]
pub struct SeededDraw;

impl BucketDraw for SeededDraw {
    fn draw(&self, client_ip: IpAddr, bucket_count: NonZeroUsize) -> usize {
        let mut rng = ChaCha8Rng::from_seed(seed_for(client_ip));
        // bucket_count comes from pool lengths, so it always fits in u64
        uniform_below(&mut rng, bucket_count.get() as u64) as usize
    }
}

/// Integer form of an address: u32 for IPv4, u128 for IPv6
pub fn ip_to_integer(ip: IpAddr) -> u128 {
    match ip {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

fn seed_for(ip: IpAddr) -> [u8; 32] {
    let mut seed = [0u8; 32];
    seed[..16].copy_from_slice(&ip_to_integer(ip).to_le_bytes());
    seed
}

// Lemire, "Fast Random Integer Generation in an Interval" (2019).
fn uniform_below<R: RngCore>(rng: &mut R, range: u64) -> u64 {
    let threshold = range.wrapping_neg() % range;
    loop {
        let product = u128::from(rng.next_u64()) * u128::from(range);
        if (product as u64) >= threshold {
            return (product >> 64) as u64;
        }
    }
}

/// Parses an override parameter, returning it only if it names a valid bucket
pub fn parse_override(param: &str, max_index: usize) -> Option<BucketIndex> {
    match param.parse::<usize>() {
        Ok(value) if value <= max_index => Some(BucketIndex(value)),
        _ => None,
    }
}

/// Resolves the bucket for a request, once per request context
#[derive(Clone, Debug, Default)]
pub struct BucketSelector<D = SeededDraw> {
    draw: D,
}

impl BucketSelector<SeededDraw> {
    pub fn new() -> Self {
        Self { draw: SeededDraw }
    }
}

impl<D: BucketDraw> BucketSelector<D> {
    pub fn with_draw(draw: D) -> Self {
        Self { draw }
    }

    /// Returns the bucket memoized in `ctx`, computing and storing it first if needed
    ///
    /// A request is never rewritten with two different buckets: once a
    /// context holds an index, later calls return it unchanged.
    pub fn resolve_index(
        &self,
        ctx: &RequestContext,
        app_pool_size: usize,
        s3_pool_size: usize,
    ) -> Result<BucketIndex> {
        if let Some(index) = ctx.bucket() {
            return Ok(index);
        }

        let (index, source) = self.pick(
            ctx.override_param(),
            ctx.client_ip(),
            app_pool_size,
            s3_pool_size,
        )?;

        tracing::debug!(
            client_ip = %ctx.client_ip(),
            bucket = index.get(),
            source = source.as_str(),
            "Assigned CDN bucket"
        );
        counter!(BUCKET_ASSIGNED, "source" => source.as_str()).increment(1);

        Ok(ctx.memoize_bucket(index))
    }

    /// Picks a bucket without consulting or updating any request context
    pub fn pick(
        &self,
        explicit_param: Option<&str>,
        client_ip: IpAddr,
        app_pool_size: usize,
        s3_pool_size: usize,
    ) -> Result<(BucketIndex, AssignmentSource)> {
        let bucket_count = NonZeroUsize::new(app_pool_size.min(s3_pool_size)).ok_or_else(|| {
            tracing::error!(
                app_pool_size,
                s3_pool_size,
                "CDN experiment has an empty origin pool"
            );
            ExperimentError::EmptyOriginPool {
                app: app_pool_size,
                s3: s3_pool_size,
            }
        })?;
        let max_index = bucket_count.get() - 1;

        if let Some(param) = explicit_param {
            if let Some(index) = parse_override(param, max_index) {
                return Ok((index, AssignmentSource::Override));
            }
            tracing::warn!(
                param,
                max_index,
                "Ignoring invalid {OVERRIDE_PARAM} parameter"
            );
            counter!(BUCKET_OVERRIDE_REJECTED).increment(1);
        }

        // Clamp so a misbehaving draw can never index past the smaller pool
        let drawn = self.draw.draw(client_ip, bucket_count).min(max_index);
        Ok((BucketIndex(drawn), AssignmentSource::ClientIp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::net::{Ipv4Addr, Ipv6Addr};

    /// Returns 0, 1, 2, ... on successive calls, ignoring the IP
    struct SequentialDraw(Cell<usize>);

    impl BucketDraw for SequentialDraw {
        fn draw(&self, _client_ip: IpAddr, bucket_count: NonZeroUsize) -> usize {
            let next = self.0.get();
            self.0.set(next + 1);
            next % bucket_count.get()
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_ip_to_integer() {
        assert_eq!(ip_to_integer(ip("1.2.3.4")), 0x01020304);
        assert_eq!(ip_to_integer(ip("0.0.0.0")), 0);
        assert_eq!(
            ip_to_integer(ip("1:2:3:4:5:6:7:8")),
            0x0001_0002_0003_0004_0005_0006_0007_0008
        );
        // Mapped addresses keep their IPv6 integer form
        assert_eq!(
            ip_to_integer(IpAddr::V6(Ipv4Addr::new(1, 2, 3, 4).to_ipv6_mapped())),
            0xffff_0102_0304
        );
    }

    #[test]
    fn test_determinism() {
        let selector = BucketSelector::new();
        for addr in ["1.2.3.4", "10.0.0.1", "1:2:3:4:5:6:7:8", "::1"] {
            let first = selector.pick(None, ip(addr), 5, 4).unwrap();
            for _ in 0..10 {
                let ctx = RequestContext::new(ip(addr), None);
                assert_eq!(selector.resolve_index(&ctx, 5, 4).unwrap(), first.0);
            }
        }
    }

    #[test]
    fn test_range() {
        let selector = BucketSelector::new();
        for (app, s3) in [(1, 1), (2, 3), (3, 2), (4, 4), (10, 7)] {
            let max_index = app.min(s3) - 1;
            for n in 0u32..200 {
                let client = IpAddr::V4(Ipv4Addr::from(n.wrapping_mul(2_654_435_761)));
                let (index, source) = selector.pick(None, client, app, s3).unwrap();
                assert!(index.get() <= max_index, "{index} out of range for {app}/{s3}");
                assert_eq!(source, AssignmentSource::ClientIp);
            }
        }
    }

    #[test]
    fn test_draw_spreads_clients() {
        let selector = BucketSelector::new();
        let mut seen = [0usize; 3];
        for n in 0u128..300 {
            let client = IpAddr::V6(Ipv6Addr::from(n << 64 | 0x2001));
            let (index, _) = selector.pick(None, client, 3, 3).unwrap();
            seen[index.get()] += 1;
        }
        assert!(seen.iter().all(|count| *count > 0), "{seen:?}");
    }

    #[test]
    fn test_single_bucket_is_always_default() {
        let selector = BucketSelector::new();
        for addr in ["1.2.3.4", "1:2:3:4:5:6:7:8"] {
            let (index, _) = selector.pick(None, ip(addr), 1, 5).unwrap();
            assert_eq!(index, BucketIndex::DEFAULT);
        }
    }

    #[test]
    fn test_override_precedence() {
        let selector = BucketSelector::new();
        for addr in ["1.2.3.4", "1:2:3:4:5:6:7:8"] {
            for wanted in 0..3 {
                let param = wanted.to_string();
                let (index, source) = selector.pick(Some(&param), ip(addr), 3, 4).unwrap();
                assert_eq!(index.get(), wanted);
                assert_eq!(source, AssignmentSource::Override);
            }
        }
    }

    #[test]
    fn test_override_rejection() {
        let selector = BucketSelector::new();
        let client = ip("1.2.3.4");
        let (from_ip, _) = selector.pick(None, client, 2, 2).unwrap();

        for param in ["2", "-1", "abc", "", "1.5", " 1"] {
            let (index, source) = selector.pick(Some(param), client, 2, 2).unwrap();
            assert_eq!(source, AssignmentSource::ClientIp, "param {param:?}");
            assert_eq!(index, from_ip, "param {param:?}");
        }
    }

    #[test]
    fn test_empty_pool_is_an_error() {
        let selector = BucketSelector::new();
        assert_eq!(
            selector.pick(Some("0"), ip("1.2.3.4"), 0, 2).unwrap_err(),
            ExperimentError::EmptyOriginPool { app: 0, s3: 2 }
        );

        let ctx = RequestContext::new(ip("1.2.3.4"), None);
        assert!(selector.resolve_index(&ctx, 3, 0).is_err());
        assert_eq!(ctx.bucket(), None);
    }

    #[test]
    fn test_memoization() {
        let selector = BucketSelector::with_draw(SequentialDraw(Cell::new(0)));

        let ctx = RequestContext::new(ip("1.2.3.4"), None);
        let first = selector.resolve_index(&ctx, 2, 2).unwrap();
        let second = selector.resolve_index(&ctx, 2, 2).unwrap();
        assert_eq!(first, BucketIndex::new(0));
        assert_eq!(second, first);

        // A fresh context sees the next draw
        let ctx = RequestContext::new(ip("1.2.3.4"), None);
        assert_eq!(selector.resolve_index(&ctx, 2, 2).unwrap(), BucketIndex::new(1));
    }

    #[test]
    fn test_pinned_assignments() {
        // Changing these values reshuffles every client; bump ASSIGNMENT_ALGORITHM instead.
        assert_eq!(ASSIGNMENT_ALGORITHM, "chacha8-lemire-v1");

        let cases = [
            ("1.2.3.4", [1, 2, 3, 3]),
            ("10.0.0.1", [1, 2, 3, 4]),
            ("192.168.1.1", [0, 0, 0, 0]),
            ("1:2:3:4:5:6:7:8", [0, 0, 0, 0]),
            ("::1", [0, 1, 1, 1]),
        ];
        for (addr, expected) in cases {
            let drawn: Vec<usize> = (2..=5)
                .map(|count| SeededDraw.draw(ip(addr), NonZeroUsize::new(count).unwrap()))
                .collect();
            assert_eq!(drawn, expected, "client {addr}");
        }
    }

    #[test]
    fn test_uniform_below_is_in_range() {
        let mut rng = ChaCha8Rng::from_seed([7u8; 32]);
        for range in [1u64, 2, 3, 7, 1 << 40, u64::MAX] {
            for _ in 0..100 {
                assert!(uniform_below(&mut rng, range) < range);
            }
        }
    }
}
