use crate::bucket::{ASSIGNMENT_ALGORITHM, BucketIndex, OVERRIDE_PARAM};
use http::Request;
use http::header::HeaderName;
use std::cell::OnceCell;
use std::net::IpAddr;

pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Per-request scratch space for the experiment
///
/// Holds the request-derived inputs to bucket selection and memoizes the
/// selected bucket. A context lives exactly as long as one inbound request
/// and is not `Sync`, so it cannot be shared between concurrent requests.
#[derive(Debug)]
pub struct RequestContext {
    client_ip: IpAddr,
    override_param: Option<String>,
    bucket: OnceCell<BucketIndex>,
}

impl RequestContext {
    pub fn new(client_ip: IpAddr, override_param: Option<String>) -> Self {
        Self {
            client_ip,
            override_param,
            bucket: OnceCell::new(),
        }
    }

    /// Builds a context from an inbound request
    ///
    /// `peer_ip` is the address of the connecting socket. When
    /// `trust_forwarded_for` is set, the first parseable `X-Forwarded-For`
    /// entry wins over it. The override parameter is read from the query string.
    pub fn from_request<B>(
        req: &Request<B>,
        peer_ip: IpAddr,
        trust_forwarded_for: bool,
    ) -> Self {
        let client_ip = trust_forwarded_for
            .then(|| forwarded_client_ip(req))
            .flatten()
            .unwrap_or(peer_ip);

        let override_param = req.uri().query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == OVERRIDE_PARAM)
                .map(|(_, value)| value.into_owned())
        });

        Self::new(client_ip, override_param)
    }

    pub fn client_ip(&self) -> IpAddr {
        self.client_ip
    }

    pub fn override_param(&self) -> Option<&str> {
        self.override_param.as_deref()
    }

    /// The bucket resolved for this request so far, if any
    pub fn bucket(&self) -> Option<BucketIndex> {
        self.bucket.get().copied()
    }

    /// Stores `index` unless a bucket is already memoized; returns the memoized bucket
    pub(crate) fn memoize_bucket(&self, index: BucketIndex) -> BucketIndex {
        *self.bucket.get_or_init(|| index)
    }

    /// Segment a response cache must fold into its key
    ///
    /// `None` until a bucket has been resolved, which is also the case when
    /// the experiment is disabled.
    pub fn cache_key_segment(&self) -> Option<String> {
        self.bucket()
            .map(|bucket| format!("cdn:{ASSIGNMENT_ALGORITHM}:{bucket}"))
    }
}

fn forwarded_client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    req.headers()
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|entry| entry.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, forwarded_for: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = forwarded_for {
            builder = builder.header(&X_FORWARDED_FOR, value);
        }
        builder.body(()).unwrap()
    }

    fn peer() -> IpAddr {
        "10.1.1.1".parse().unwrap()
    }

    #[test]
    fn test_override_param_from_query() {
        let ctx = RequestContext::from_request(&request("/?_cdn_index=1", None), peer(), false);
        assert_eq!(ctx.override_param(), Some("1"));

        let req = request("/t/1?a=b&_cdn_index=abc", None);
        let ctx = RequestContext::from_request(&req, peer(), false);
        assert_eq!(ctx.override_param(), Some("abc"));

        let ctx = RequestContext::from_request(&request("/?cdn_index=1", None), peer(), false);
        assert_eq!(ctx.override_param(), None);

        let ctx = RequestContext::from_request(&request("/", None), peer(), false);
        assert_eq!(ctx.override_param(), None);
    }

    #[test]
    fn test_client_ip() {
        let req = request("/", Some("garbage, 1:2:3:4:5:6:7:8, 1.2.3.4"));

        let ctx = RequestContext::from_request(&req, peer(), true);
        assert_eq!(ctx.client_ip(), "1:2:3:4:5:6:7:8".parse::<IpAddr>().unwrap());

        // Forwarded headers are ignored unless trusted
        let ctx = RequestContext::from_request(&req, peer(), false);
        assert_eq!(ctx.client_ip(), peer());

        // Nothing usable falls back to the peer
        let req = request("/", Some("unknown"));
        let ctx = RequestContext::from_request(&req, peer(), true);
        assert_eq!(ctx.client_ip(), peer());
    }

    #[test]
    fn test_memoize_keeps_first_bucket() {
        let ctx = RequestContext::new(peer(), None);
        assert_eq!(ctx.bucket(), None);
        assert_eq!(ctx.cache_key_segment(), None);

        assert_eq!(ctx.memoize_bucket(BucketIndex::new(2)), BucketIndex::new(2));
        assert_eq!(ctx.memoize_bucket(BucketIndex::new(0)), BucketIndex::new(2));
        assert_eq!(ctx.bucket(), Some(BucketIndex::new(2)));
        assert_eq!(
            ctx.cache_key_segment().as_deref(),
            Some("cdn:chacha8-lemire-v1:2")
        );
    }
}
