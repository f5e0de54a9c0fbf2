//! HTTP-facing request pipeline.
//!
//! Each framed request passes through origin trust, preflight handling, the
//! liveness banner, call decoding, authorization and dispatch, in that order.
//! Every path produces a complete response; callers are never left with a
//! silently closed socket.

use serde_json::Value;
use tracing::{debug, info};

use super::builtin::REQUEST_PERMISSION;
use super::dispatcher::{CallContext, Dispatcher};
use super::errors::DispatchError;
use super::request::ActionCall;
use super::response::{banner, error_envelope, format_reply};
use super::router::DISPATCH_TARGET;
use crate::access::{self, OriginDecision};
use crate::transport::{
    FramingError, HttpRequest, HttpResponse, JSON_CONTENT_TYPE, RequestHandler, Status,
    TEXT_CONTENT_TYPE,
};

const ALLOW_ORIGIN_HEADER: &str = "Access-Control-Allow-Origin";
const ALLOW_HEADERS_HEADER: &str = "Access-Control-Allow-Headers";
const ALLOW_PRIVATE_NETWORK_HEADER: &str = "Access-Control-Allow-Private-Network";
const REQUEST_PRIVATE_NETWORK_HEADER: &str = "access-control-request-private-network";

/// Name reported in the liveness banner.
pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

/// Turns framed requests into serialized responses.
#[derive(Debug)]
pub struct GatewayHandler {
    dispatcher: Dispatcher,
    cors_origins: Vec<String>,
    default_version: u32,
}

impl GatewayHandler {
    /// Builds the pipeline around `dispatcher`.
    ///
    /// `cors_origins` is the configured allow-list; origins granted through
    /// `requestPermission` are added to it on every request.
    #[must_use]
    pub fn new(dispatcher: Dispatcher, cors_origins: Vec<String>, default_version: u32) -> Self {
        Self {
            dispatcher,
            cors_origins,
            default_version,
        }
    }

    /// The dispatcher behind this pipeline.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Computes the trust decision for `origin` against the configured and
    /// granted origins.
    #[must_use]
    pub fn decide(&self, origin: Option<&str>) -> OriginDecision {
        let allow_list: Vec<&str> = self
            .cors_origins
            .iter()
            .map(String::as_str)
            .chain(self.dispatcher.store().allowed())
            .collect();
        access::decide(origin, &allow_list)
    }

    /// Produces the response for one request.
    pub fn respond(&mut self, request: &HttpRequest) -> HttpResponse {
        let origin = request.header("origin");
        let decision = self.decide(origin);

        if request.is_preflight() {
            return preflight(request, &decision);
        }
        if request.body().is_empty() {
            return self.liveness(&decision);
        }

        let value = match serde_json::from_slice::<Value>(request.body()) {
            Ok(value) => value,
            Err(error) => return self.undecodable(&decision, DispatchError::malformed(error)),
        };
        let call = match ActionCall::from_value(value, self.default_version) {
            Ok(call) => call,
            Err(error) => return self.undecodable(&decision, error),
        };

        let permission_request = call.action == REQUEST_PERMISSION;
        if !decision.allowed() && !permission_request {
            return forbidden(&decision, origin);
        }

        let origin = origin.unwrap_or_default();
        let echoed = if decision.allowed() {
            decision.echoed_origin()
        } else {
            origin
        };
        let context = CallContext::new(origin, decision.allowed());
        let reply = self.dispatcher.answer(call, &context);
        json_response(Status::Ok, echoed, &reply)
    }

    fn liveness(&self, decision: &OriginDecision) -> HttpResponse {
        if !decision.allowed() {
            return forbidden(decision, None);
        }
        let body = banner(SERVER_NAME, self.dispatcher.api_version());
        with_cors(HttpResponse::new(Status::Ok), decision.echoed_origin())
            .with_body(TEXT_CONTENT_TYPE, body.into_bytes())
    }

    fn undecodable(&self, decision: &OriginDecision, error: DispatchError) -> HttpResponse {
        if !decision.allowed() {
            return forbidden(decision, None);
        }
        debug!(target: DISPATCH_TARGET, error = %error, "undecodable request body");
        let reply = format_reply(self.dispatcher.api_version(), Err(error));
        json_response(Status::Ok, decision.echoed_origin(), &reply)
    }
}

impl RequestHandler for GatewayHandler {
    fn handle(&mut self, request: &HttpRequest) -> Vec<u8> {
        self.respond(request).into_bytes()
    }

    fn reject(&mut self, error: &FramingError) -> Vec<u8> {
        let decision = self.decide(error.origin());
        if !decision.allowed() {
            return forbidden(&decision, error.origin()).into_bytes();
        }
        let reply = error_envelope(&error.to_string());
        json_response(Status::BadRequest, decision.echoed_origin(), &reply).into_bytes()
    }
}

fn with_cors(response: HttpResponse, echoed_origin: &str) -> HttpResponse {
    response
        .with_header(ALLOW_ORIGIN_HEADER, echoed_origin)
        .with_header(ALLOW_HEADERS_HEADER, "*")
}

fn json_response(status: Status, echoed_origin: &str, reply: &Value) -> HttpResponse {
    with_cors(HttpResponse::new(status), echoed_origin)
        .with_body(JSON_CONTENT_TYPE, reply.to_string().into_bytes())
}

fn preflight(request: &HttpRequest, decision: &OriginDecision) -> HttpResponse {
    let response = with_cors(HttpResponse::new(Status::Ok), decision.echoed_origin());
    let wants_private_network = request
        .header(REQUEST_PRIVATE_NETWORK_HEADER)
        .is_some_and(|value| value.eq_ignore_ascii_case("true"));
    if decision.allowed() && wants_private_network {
        response.with_header(ALLOW_PRIVATE_NETWORK_HEADER, "true")
    } else {
        response
    }
}

fn forbidden(decision: &OriginDecision, origin: Option<&str>) -> HttpResponse {
    info!(
        target: DISPATCH_TARGET,
        origin = origin.unwrap_or_default(),
        "request from untrusted origin refused"
    );
    with_cors(HttpResponse::new(Status::Forbidden), decision.echoed_origin())
}
