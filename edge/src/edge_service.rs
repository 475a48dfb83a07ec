use crate::cache::{CachedPage, PageCache};
use crate::config::Config;
use crate::errors::EdgeError;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::page::render_page;
use crate::site::SiteAssets;
use cdn_experiment::{
    ExperimentAssets, ExperimentConfig, ExperimentScriptSources, RequestContext, ScriptSources,
};
use http::header::{CONTENT_SECURITY_POLICY, CONTENT_TYPE, HeaderName, HeaderValue};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use shared::http::{PeerAddr, make_boxed_error_response};
use shared::{gauge, histogram};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::pin::Pin;
use std::time::Instant;

pub static X_CDN_EXPERIMENT_BUCKET: HeaderName =
    HeaderName::from_static("x-cdn-experiment-bucket");
pub static X_CACHE: HeaderName = HeaderName::from_static("x-cache");

pub type EdgeBody = BoxBody<Bytes, EdgeError>;

/// Serves the site's pages with the CDN experiment applied
pub struct EdgeService {
    experiment: ExperimentConfig,
    assets: SiteAssets,
    cache: PageCache,
    trust_forwarded_for: bool,
}

impl EdgeService {
    pub fn try_new(config: &Config) -> Result<Self, EdgeError> {
        let experiment = config.cdn_experiment.to_config()?;
        tracing::info!(
            enabled = experiment.enabled,
            app_origins = experiment.app_pool.len(),
            s3_origins = experiment.s3_pool.len(),
            "Loaded CDN experiment"
        );

        Ok(Self {
            experiment,
            assets: SiteAssets::new(&config.cdn_experiment, config.site.clone()),
            cache: PageCache::new(&config.cache),
            trust_forwarded_for: config.trust_forwarded_for,
        })
    }

    /// Handles one request from `peer_ip`
    pub fn handle<B>(&self, req: &Request<B>, peer_ip: IpAddr) -> Response<EdgeBody> {
        let start = Instant::now();
        gauge!(REQUESTS_INFLIGHT).increment(1);

        let response = match self.render(req, peer_ip) {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    path = %req.uri().path(),
                    "Failed to render page"
                );
                make_boxed_error_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        };

        gauge!(REQUESTS_INFLIGHT).decrement(1);
        histogram!(REQUEST_DURATION, "status" => response.status().as_str().to_string())
            .record(start.elapsed().as_secs_f64());
        response
    }

    fn render<B>(
        &self,
        req: &Request<B>,
        peer_ip: IpAddr,
    ) -> Result<Response<EdgeBody>, EdgeError> {
        if !matches!(*req.method(), Method::GET | Method::HEAD) {
            return Ok(make_boxed_error_response(StatusCode::METHOD_NOT_ALLOWED));
        }

        let ctx = RequestContext::from_request(req, peer_ip, self.trust_forwarded_for);
        let assets = ExperimentAssets::new(&self.assets, &self.experiment, &ctx)?;

        let segment = ctx.cache_key_segment();
        let key = PageCache::key(req.uri().path(), segment.as_deref());

        let (page, cache_status) = match self.cache.get(&key) {
            Some(page) => (page, "HIT"),
            None => {
                let sources = ExperimentScriptSources::new(&self.assets, &self.experiment);
                let page = CachedPage {
                    body: Bytes::from(render_page(&assets, self.assets.site())),
                    content_security_policy: content_security_policy(sources.script_assets()),
                };
                self.cache.insert(key, page.clone());
                (page, "MISS")
            }
        };

        let body = match *req.method() {
            Method::HEAD => Bytes::new(),
            _ => page.body,
        };

        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/html; charset=utf-8")
            .header(
                CONTENT_SECURITY_POLICY,
                HeaderValue::from_str(&page.content_security_policy)?,
            )
            .header(&X_CACHE, cache_status);
        if let Some(segment) = segment {
            builder = builder.header(&X_CDN_EXPERIMENT_BUCKET, HeaderValue::from_str(&segment)?);
        }

        Ok(builder.body(Full::new(body).map_err(|e| match e {}).boxed())?)
    }
}

fn content_security_policy(script_sources: Vec<String>) -> String {
    let mut policy = String::from("script-src 'self'");
    for source in script_sources {
        policy.push(' ');
        policy.push_str(&source);
    }
    policy
}

impl<B> Service<Request<B>> for EdgeService {
    type Response = Response<EdgeBody>;
    type Error = EdgeError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let peer_ip = match req.extensions().get::<PeerAddr>() {
            Some(PeerAddr(addr)) => addr.ip(),
            None => {
                tracing::debug!("Request has no peer address");
                IpAddr::V4(Ipv4Addr::UNSPECIFIED)
            }
        };

        let response = self.handle(&req, peer_ip);
        Box::pin(async move { Ok(response) })
    }
}
