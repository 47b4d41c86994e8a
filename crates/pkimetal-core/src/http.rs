//! HTTP Surface (C9): two independent `axum` routers, one per listener. The web router serves
//! the six lint endpoints plus a handful of informational pages; the monitoring router serves
//! liveness/readiness/metrics/build/config. Grounded on the reference implementation's
//! `server/{server,livez,readyz,metrics}.go` and `request/{post,input,certificate,crl,
//! ocspResponse,webpage,linters,profiles}.go`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::FromDer;
use x509_parser::revocation_list::CertificateRevocationList;

use pkimetal_config::PkiMetalConfig;

use crate::autodetect::{self, EndpointKind};
use crate::ccadb::CcadbTable;
use crate::decode;
use crate::dispatch::{self, DispatchInput, DispatchOutcome};
use crate::health::HealthObserver;
use crate::profile::{self, ProfileId};
use crate::registry::EngineRegistry;
use crate::severity::Severity;
use crate::telemetry::{LogLevel, Metrics, RequestLogFields};
use crate::types::PKIMETAL_NAME;

/// Everything a request handler needs, built once at boot and shared via `Arc`.
pub struct AppState {
    pub registry: Arc<EngineRegistry>,
    pub health: Arc<HealthObserver>,
    pub metrics: Arc<Metrics>,
    pub ccadb: Arc<CcadbTable>,
    pub config: Arc<PkiMetalConfig>,
    pub service_version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseFormat {
    Html,
    Json,
    Text,
}

impl ResponseFormat {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Some(Self::Html),
            "json" => Some(Self::Json),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Mirrors `getResponseFormat`: an explicit, non-empty `format` param wins outright (even if it
/// fails to parse, in which case the caller reports "unrecognised format" rather than falling
/// back); absent that, the `Accept` header is checked for an exact match; absent that, the
/// configured default.
fn response_format(format_param: Option<&str>, headers: &HeaderMap, default: ResponseFormat) -> Option<ResponseFormat> {
    if let Some(f) = format_param {
        if !f.is_empty() {
            return ResponseFormat::parse(f);
        }
    }
    if let Some(accept) = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) {
        match accept {
            "text/html" => return Some(ResponseFormat::Html),
            "application/json" => return Some(ResponseFormat::Json),
            "text/plain" => return Some(ResponseFormat::Text),
            _ => {}
        }
    }
    Some(default)
}

#[derive(Clone, Copy)]
enum LintEndpoint {
    Cert,
    TbsCert,
    Crl,
    TbsCrl,
    Ocsp,
    TbsOcsp,
}

impl LintEndpoint {
    const ALL: [LintEndpoint; 6] = [
        LintEndpoint::Cert,
        LintEndpoint::TbsCert,
        LintEndpoint::Crl,
        LintEndpoint::TbsCrl,
        LintEndpoint::Ocsp,
        LintEndpoint::TbsOcsp,
    ];

    fn path(self) -> &'static str {
        match self {
            LintEndpoint::Cert => "lintcert",
            LintEndpoint::TbsCert => "linttbscert",
            LintEndpoint::Crl => "lintcrl",
            LintEndpoint::TbsCrl => "linttbscrl",
            LintEndpoint::Ocsp => "lintocsp",
            LintEndpoint::TbsOcsp => "linttbsocsp",
        }
    }

    /// The PEM label `decode_pem_or_base64` is tried against. The reference implementation uses
    /// the full type's label for its TBS endpoints too (a TBS blob is never itself PEM-wrapped in
    /// practice, so this only ever matters for the base64 fallback it shares with the full type).
    fn pem_label(self) -> &'static str {
        match self {
            LintEndpoint::Cert | LintEndpoint::TbsCert => "CERTIFICATE",
            LintEndpoint::Crl | LintEndpoint::TbsCrl => "X509 CRL",
            LintEndpoint::Ocsp | LintEndpoint::TbsOcsp => "OCSP RESPONSE",
        }
    }

    fn is_tbs(self) -> bool {
        matches!(self, LintEndpoint::TbsCert | LintEndpoint::TbsCrl | LintEndpoint::TbsOcsp)
    }

    fn endpoint_kind(self) -> EndpointKind {
        match self {
            LintEndpoint::Cert | LintEndpoint::TbsCert => EndpointKind::Certificate,
            LintEndpoint::Crl | LintEndpoint::TbsCrl => EndpointKind::Crl,
            LintEndpoint::Ocsp | LintEndpoint::TbsOcsp => EndpointKind::Ocsp,
        }
    }

    fn form_description(self) -> &'static str {
        match self {
            LintEndpoint::Cert => "Certificate/Precertificate",
            LintEndpoint::TbsCert => "To-be-signed Certificate/Precertificate",
            LintEndpoint::Crl => "Certificate Revocation List",
            LintEndpoint::TbsCrl => "To-be-signed Certificate Revocation List",
            LintEndpoint::Ocsp => "OCSP Response",
            LintEndpoint::TbsOcsp => "To-be-signed OCSP Response",
        }
    }
}

/// The subset of content types a lint POST may carry, and what each implies about where the
/// input bytes live.
enum InputSource {
    /// `application/x-www-form-urlencoded`: the named field holds PEM or base64 text.
    FormEncoded,
    /// A binary content type whose body is the raw DER (or, for TBS endpoints, raw TBS bytes).
    RawBinary,
}

fn classify_content_type(content_type: &str, endpoint: LintEndpoint) -> Result<InputSource, &'static str> {
    match content_type {
        "application/x-www-form-urlencoded" => Ok(InputSource::FormEncoded),
        "application/pkix-cert" if matches!(endpoint, LintEndpoint::Cert) => Ok(InputSource::RawBinary),
        "application/pkix-crl" if matches!(endpoint, LintEndpoint::Crl) => Ok(InputSource::RawBinary),
        "application/ocsp-response" if matches!(endpoint, LintEndpoint::Ocsp) => Ok(InputSource::RawBinary),
        "application/octet-stream" if endpoint.is_tbs() => Ok(InputSource::RawBinary),
        "" => Err("Empty request body"),
        _ => Err("Unsupported content type"),
    }
}

/// One handled lint request's rendered findings, in the JSON/text/HTML shape the reference
/// implementation's `LintResult` exposes (deliberately narrower than `LintingResult`: callers
/// never see the internal `code` field).
#[derive(Serialize)]
struct RenderedResult {
    #[serde(rename = "Linter")]
    linter: String,
    #[serde(rename = "Field", skip_serializing_if = "Option::is_none")]
    field: Option<String>,
    #[serde(rename = "Finding")]
    finding: String,
    #[serde(rename = "Severity")]
    severity: String,
}

fn fatal_result(message: impl Into<String>) -> Vec<RenderedResult> {
    vec![RenderedResult {
        linter: PKIMETAL_NAME.to_string(),
        field: None,
        finding: message.into(),
        severity: Severity::Fatal.as_str().to_string(),
    }]
}

fn render_results(format: ResponseFormat, results: &[RenderedResult], pretty: bool) -> Response {
    match format {
        ResponseFormat::Html => render_html(results).into_response(),
        ResponseFormat::Json => render_json(results, pretty).into_response(),
        ResponseFormat::Text => render_text(results).into_response(),
    }
}

fn severity_style(severity: &str) -> &'static str {
    match severity {
        "META" => "color:#BBEEBB",
        "DEBUG" => "color:#888888",
        "INFO" => "color:#222222",
        "NOTICE" => "background-color:#FFFFDF;color:#606000",
        "WARNING" => "background-color:#FFEFDF;color:#DF6000",
        "ERROR" => "background-color:#FFDFDF;color:#CC0000;font-weight:bold",
        "BUG" | "FATAL" => "background-color:#0000AA;color:#FFFFFF;font-weight:bold",
        _ => "",
    }
}

fn render_html(results: &[RenderedResult]) -> Response {
    let mut body = String::from(
        r#"<!DOCTYPE HTML>
<HTML>
<HEAD>
  <META http-equiv="Content-Type" content="text/html; charset=UTF-8">
  <TITLE>pkimetal | PKI Meta-Linter</TITLE>
  <LINK href="//fonts.googleapis.com/css?family=Roboto+Mono|Roboto:400,400i,700,700i" rel="stylesheet">
  <STYLE type="text/css">
    table { border-collapse: collapse; color: #222222; font: 12pt Roboto, sans-serif; margin: auto }
    td, th { padding: 3px 10px }
  </STYLE>
</HEAD>
<BODY>
  <TABLE>
    <TR><TH>Linter</TH><TH>Severity</TH><TH>Finding</TH></TR>"#,
    );
    if results.is_empty() {
        body.push_str(r#"<TR><TD colspan="3" align="center">No findings</TD></TR>"#);
    } else {
        for r in results {
            body.push_str(&format!(r#"<TR style="{}"><TD>{}</TD><TD>{}</TD><TD>"#, severity_style(&r.severity), r.linter, r.severity));
            if let Some(field) = &r.field {
                body.push_str(&format!("[{field}] "));
            }
            body.push_str(&r.finding);
            body.push_str("</TD></TR>");
        }
    }
    body.push_str("</TABLE></BODY></HTML>");

    ([(header::CONTENT_TYPE, "text/html; charset=UTF-8")], body).into_response()
}

fn render_json(results: &[RenderedResult], pretty: bool) -> Response {
    let body = if results.is_empty() {
        // serde_json would emit "null" for an empty Vec serialized through a reference; an
        // explicit literal keeps the wire shape an array, matching the reference implementation.
        "[]".to_string()
    } else if pretty {
        serde_json::to_string_pretty(results).unwrap_or_else(|_| "[]".to_string())
    } else {
        serde_json::to_string(results).unwrap_or_else(|_| "[]".to_string())
    };
    ([(header::CONTENT_TYPE, "application/json; charset=UTF-8")], body).into_response()
}

fn render_text(results: &[RenderedResult]) -> Response {
    let mut body = String::new();
    for r in results {
        let finding = match &r.field {
            Some(field) => format!("{field}: {}", r.finding),
            None => r.finding.clone(),
        };
        body.push_str(&format!("{}\t{}\t{}\n", r.linter, r.severity, finding));
    }
    ([(header::CONTENT_TYPE, "text/plain; charset=UTF-8")], body).into_response()
}

fn bad_request(format: ResponseFormat, pretty: bool, message: &str) -> Response {
    let results = fatal_result(message);
    let mut response = render_results(format, &results, pretty);
    *response.status_mut() = StatusCode::BAD_REQUEST;
    response
}

async fn handle_lint_get(State(state): State<Arc<AppState>>, endpoint: LintEndpoint) -> Response {
    render_lint_form(&state, endpoint)
}

async fn handle_lint_post(
    state: Arc<AppState>,
    endpoint: LintEndpoint,
    headers: HeaderMap,
    query: HashMap<String, String>,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    let default_format = ResponseFormat::parse(&state.config.response.default_format).unwrap_or(ResponseFormat::Json);
    let pretty = state.config.response.json_pretty_print;

    let form: Option<HashMap<String, String>> = if content_type == "application/x-www-form-urlencoded" {
        serde_urlencoded::from_bytes(&body).ok()
    } else {
        None
    };

    let format_param = form
        .as_ref()
        .and_then(|f| f.get("format"))
        .or_else(|| query.get("format"))
        .map(String::as_str);
    let Some(format) = response_format(format_param, &headers, default_format) else {
        return bad_request(default_format, pretty, "Unrecognised response format");
    };

    if body.is_empty() {
        return bad_request(format, pretty, "Empty request body");
    }

    let source = match classify_content_type(&content_type, endpoint) {
        Ok(source) => source,
        Err(message) => return bad_request(format, pretty, message),
    };

    let raw_text;
    let b64_text: &[u8] = match source {
        InputSource::FormEncoded => {
            let Some(fields) = &form else {
                return bad_request(format, pretty, "Unrecognised input");
            };
            let field = fields
                .get(&format!("b64{}", endpoint.path().trim_start_matches("lint")))
                .or_else(|| fields.get("b64input"));
            match field {
                Some(v) if !v.is_empty() => {
                    raw_text = v.clone();
                    raw_text.as_bytes()
                }
                _ => return bad_request(format, pretty, "Unrecognised input"),
            }
        }
        InputSource::RawBinary => &body,
    };

    let decoded = match decode::decode_pem_or_base64(b64_text, endpoint.pem_label()) {
        Ok(d) => d,
        Err(_) => return bad_request(format, pretty, "Unrecognised input"),
    };

    let wrapped = if endpoint.is_tbs() {
        let result = match endpoint.endpoint_kind() {
            EndpointKind::Certificate => decode::wrap_tbs_certificate(&decoded),
            EndpointKind::Crl => decode::wrap_tbs_crl(&decoded),
            EndpointKind::Ocsp => Ok(decode::wrap_tbs_ocsp(&decoded)),
        };
        match result {
            Ok(w) => w,
            Err(_) => return bad_request(format, pretty, "Unrecognised input"),
        }
    } else {
        decoded
    };

    let profile_param = form
        .as_ref()
        .and_then(|f| f.get("profile"))
        .or_else(|| query.get("profile"))
        .map(String::as_str)
        .unwrap_or("");
    let profile_id = match resolve_profile(&state, endpoint, profile_param, &wrapped) {
        Ok(id) => id,
        Err(message) => return bad_request(format, pretty, message),
    };

    let severity_param = form
        .as_ref()
        .and_then(|f| f.get("severity"))
        .or_else(|| query.get("severity"))
        .map(String::as_str)
        .unwrap_or("");
    let minimum_severity = if severity_param.is_empty() {
        Severity::Meta
    } else {
        match Severity::from_name(severity_param) {
            Some(s) => s,
            None => return bad_request(format, pretty, "Unrecognised severity"),
        }
    };

    let is_certificate = matches!(endpoint.endpoint_kind(), EndpointKind::Certificate);
    let input = DispatchInput {
        b64_input: base64::engine::general_purpose::STANDARD.encode(&wrapped),
        decoded_input: Arc::new(wrapped),
        is_certificate,
        profile_id,
        minimum_severity,
    };

    let started = Instant::now();
    let outcome = dispatch::dispatch(
        &state.registry,
        &state.health,
        input,
        state.config.server.request_timeout,
        &state.service_version,
    )
    .await;
    state.metrics.record_request(crate::telemetry::RequestKind::Linting, started.elapsed());

    let (response, status, body_size) = match outcome {
        DispatchOutcome::Completed(results) => {
            let rendered: Vec<RenderedResult> = results
                .into_iter()
                .map(|r| RenderedResult {
                    linter: r.engine_name,
                    field: r.field,
                    finding: r.finding,
                    severity: r.severity.as_str().to_string(),
                })
                .collect();
            let mut response = render_results(format, &rendered, pretty);
            *response.status_mut() = StatusCode::OK;
            (response, 200u16, rendered.len())
        }
        DispatchOutcome::TimedOut => {
            let mut response = render_results(format, &[], pretty);
            *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
            (response, 503u16, 0)
        }
    };

    crate::telemetry::log_request(
        if status == 200 { LogLevel::Info } else { LogLevel::Warn },
        "Linting Request",
        &RequestLogFields {
            client_ip: String::new(),
            method: "POST",
            path: endpoint.path(),
            http_status: status,
            response_body_size: body_size,
            time_taken: started.elapsed(),
            request_content_type: Some(content_type.as_str()),
            user_agent: headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()),
            error: None,
        },
    );

    response
}

/// Resolves the `profile` request parameter to a [`ProfileId`], autodetecting when it names
/// `autodetect` (or is absent). Mirrors `RequestInfo.GetProfile`.
fn resolve_profile(state: &AppState, endpoint: LintEndpoint, name: &str, decoded: &[u8]) -> Result<ProfileId, &'static str> {
    if name.is_empty() || name.eq_ignore_ascii_case("autodetect") {
        return Ok(autodetect_profile(state, endpoint, decoded));
    }
    profile::by_name(name).ok_or("Unrecognised profile")
}

fn autodetect_profile(state: &AppState, endpoint: LintEndpoint, decoded: &[u8]) -> ProfileId {
    match endpoint.endpoint_kind() {
        EndpointKind::Certificate => {
            let Ok((_, cert)) = x509_parser::certificate::X509Certificate::from_der(decoded) else {
                return ProfileId::Rfc5280Leaf;
            };
            let fingerprint: [u8; 32] = Sha256::digest(decoded).into();
            autodetect::detect_certificate_profile(&cert, &state.ccadb, &fingerprint)
        }
        EndpointKind::Crl => {
            let aki = extract_crl_aki(decoded);
            autodetect::detect_crl_profile(aki.as_deref(), &state.ccadb)
        }
        EndpointKind::Ocsp => autodetect::detect_ocsp_profile(),
    }
}

fn extract_crl_aki(der: &[u8]) -> Option<Vec<u8>> {
    let (_, crl) = CertificateRevocationList::from_der(der).ok()?;
    crl.tbs_cert_list.extensions().iter().find_map(|e| match e.parsed_extension() {
        ParsedExtension::AuthorityKeyIdentifier(aki) => aki.key_identifier.as_ref().map(|k| k.0.to_vec()),
        _ => None,
    })
}

fn render_lint_form(state: &AppState, endpoint: LintEndpoint) -> Response {
    let mut body = format!(
        r#"<!DOCTYPE HTML>
<HTML>
<HEAD>
  <META http-equiv="Content-Type" content="text/html; charset=UTF-8">
  <TITLE>pkimetal | PKI Meta-Linter</TITLE>
  <LINK href="//fonts.googleapis.com/css?family=Roboto+Mono|Roboto:400,400i,700,700i" rel="stylesheet">
  <LINK href="/css" rel="stylesheet">
</HEAD>
<BODY>
  <FORM method="post">
    <TABLE>
      <TR><TD colspan="2"><DIV class="title">pkimetal {}</DIV></TD></TR>
      <TR>
        <TD>{} (PEM/Base64):
          <BR><TEXTAREA name="b64input" cols="70" rows="18" autofocus></TEXTAREA>
        </TD>
        <TD>Response Format:
          <BR><SELECT name="format" size="3">
            <OPTION value="html" selected>html</OPTION>
            <OPTION value="json">json</OPTION>
            <OPTION value="text">text</OPTION>
          </SELECT>
          <BR><BR>Minimum Severity:
          <BR><SELECT name="severity" size="8">
            <OPTION value="meta" selected>meta</OPTION>
            <OPTION value="debug">debug</OPTION>
            <OPTION value="info">info</OPTION>
            <OPTION value="notice">notice</OPTION>
            <OPTION value="warning">warning</OPTION>
            <OPTION value="error">error</OPTION>
            <OPTION value="bug">bug</OPTION>
            <OPTION value="fatal">fatal</OPTION>
          </SELECT>
        </TD>
      </TR>
      <TR>
        <TD>Profile:
          <BR><SELECT name="profile" size="13">"#,
        state.service_version,
        endpoint.form_description(),
    );

    for (id, p) in profile::all_profiles_ordered() {
        let shown = match endpoint.endpoint_kind() {
            EndpointKind::Certificate => !profile::is_non_certificate(id),
            EndpointKind::Crl => id == ProfileId::Autodetect || profile::is_crl(id),
            EndpointKind::Ocsp => id == ProfileId::Autodetect || profile::is_ocsp(id),
        };
        if !shown {
            continue;
        }
        let selected = if id == ProfileId::Autodetect { " selected" } else { "" };
        let source = if p.source.is_empty() {
            String::new()
        } else {
            format!("[{}] ", p.source)
        };
        body.push_str(&format!(
            r#"<OPTION value="{}"{selected}>{source}{}</OPTION>"#,
            p.name, p.description
        ));
    }

    body.push_str(&format!(
        r#"</SELECT></TD><TD><INPUT class="button" type="submit" value="{}"></TD></TR></TABLE></FORM></BODY></HTML>"#,
        endpoint.path()
    ));

    ([(header::CONTENT_TYPE, "text/html; charset=UTF-8")], body).into_response()
}

fn front_page(state: &AppState) -> Response {
    let mut links = String::new();
    for e in LintEndpoint::ALL {
        links.push_str(&format!(r#"<LI><A href="/{0}">{0}</A></LI>"#, e.path()));
    }
    let body = format!(
        r#"<!DOCTYPE HTML>
<HTML>
<HEAD>
  <META http-equiv="Content-Type" content="text/html; charset=UTF-8">
  <TITLE>pkimetal | PKI Meta-Linter</TITLE>
  <LINK href="/css" rel="stylesheet">
</HEAD>
<BODY>
  <DIV class="title">pkimetal {}</DIV>
  <P>Example webpages that use the linting REST APIs:</P>
  <UL>{}</UL>
  <P><A href="/linters">linters</A> - List all available linters</P>
  <P><A href="/profiles">profiles</A> - List all available profiles</P>
</BODY>
</HTML>
"#,
        state.service_version, links
    );
    ([(header::CONTENT_TYPE, "text/html; charset=UTF-8")], body).into_response()
}

const STYLESHEET: &str = r#"
table { border-collapse: collapse; color: #222222; font: 12pt Roboto, sans-serif; margin-left: auto; margin-right: auto }
td { padding: 5px 10px 0px 0px; vertical-align: top }
textarea { font: 8pt "Roboto Mono", monospace }
.title { font: 18pt Roboto, sans-serif; padding: 5px 30px }
.button { font: 14pt Roboto, sans-serif; font-weight: bold; padding: 5px 25px }
"#;

#[derive(Serialize)]
struct LinterInfo {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Instances")]
    instances: usize,
    #[serde(rename = "Version")]
    version: String,
    #[serde(rename = "Url")]
    url: String,
}

async fn linters_endpoint(State(state): State<Arc<AppState>>) -> Response {
    let infos: Vec<LinterInfo> = state
        .registry
        .engines()
        .iter()
        .map(|e| LinterInfo {
            name: e.name.clone(),
            instances: e.instance_count,
            version: e.version.clone(),
            url: e.url.clone(),
        })
        .collect();
    json_response(&infos, state.config.response.json_pretty_print)
}

async fn profiles_endpoint(State(state): State<Arc<AppState>>) -> Response {
    let profiles: Vec<_> = profile::all_profiles_ordered().into_iter().map(|(_, p)| p.clone()).collect();
    json_response(&profiles, state.config.response.json_pretty_print)
}

fn json_response<T: Serialize>(value: &T, pretty: bool) -> Response {
    let body = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match body {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json; charset=UTF-8")], body).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn livez(State(state): State<Arc<AppState>>) -> Response {
    deadline_checked(state.config.server.livez_timeout, state.health.is_alive()).await
}

async fn readyz(State(state): State<Arc<AppState>>) -> Response {
    deadline_checked(state.config.server.readyz_timeout, state.health.is_ready()).await
}

async fn deadline_checked(timeout: Duration, healthy: bool) -> Response {
    match tokio::time::timeout(timeout, async { healthy }).await {
        Ok(true) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], "OK").into_response(),
        Ok(false) => (StatusCode::SERVICE_UNAVAILABLE, [(header::CONTENT_TYPE, "text/plain")], "ERROR").into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, [(header::CONTENT_TYPE, "text/plain")], "ERROR").into_response(),
    }
}

async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> Response {
    match tokio::time::timeout(state.config.server.metrics_timeout, async { state.metrics.encode() }).await {
        Ok(Ok(body)) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Ok(Err(_)) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

#[derive(Serialize)]
struct BuildInfo {
    version: String,
    linters: Vec<LinterInfo>,
}

async fn build_endpoint(State(state): State<Arc<AppState>>) -> Response {
    let linters = state
        .registry
        .engines()
        .iter()
        .map(|e| LinterInfo {
            name: e.name.clone(),
            instances: e.instance_count,
            version: e.version.clone(),
            url: e.url.clone(),
        })
        .collect();
    json_response(&BuildInfo { version: state.service_version.clone(), linters }, state.config.response.json_pretty_print)
}

async fn config_endpoint(State(state): State<Arc<AppState>>) -> Response {
    json_response(state.config.as_ref(), state.config.response.json_pretty_print)
}

async fn favicon() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

async fn mascot() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

async fn stylesheet() -> Response {
    ([(header::CONTENT_TYPE, "text/css")], STYLESHEET).into_response()
}

macro_rules! lint_routes {
    ($($variant:ident => $get_fn:ident, $post_fn:ident);* $(;)?) => {
        $(
            async fn $get_fn(state: State<Arc<AppState>>) -> Response {
                handle_lint_get(state, LintEndpoint::$variant).await
            }
            async fn $post_fn(
                State(state): State<Arc<AppState>>,
                headers: HeaderMap,
                Query(query): Query<HashMap<String, String>>,
                body: Bytes,
            ) -> Response {
                handle_lint_post(state, LintEndpoint::$variant, headers, query, body).await
            }
        )*
    };
}

lint_routes! {
    Cert => get_lintcert, post_lintcert;
    TbsCert => get_linttbscert, post_linttbscert;
    Crl => get_lintcrl, post_lintcrl;
    TbsCrl => get_linttbscrl, post_linttbscrl;
    Ocsp => get_lintocsp, post_lintocsp;
    TbsOcsp => get_linttbsocsp, post_linttbsocsp;
}

async fn front_page_handler(State(state): State<Arc<AppState>>) -> Response {
    front_page(&state)
}

/// Matches `POST`'s unconditional `Access-Control-Allow-Origin: *` on every lint response.
fn cors_layer() -> CorsLayer {
    CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
}

/// Builds the web listener's router: the front page, static assets, the six lint endpoints, and
/// the linter/profile capability listings.
pub fn web_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(front_page_handler))
        .route("/css", get(stylesheet))
        .route("/favicon.ico", get(favicon))
        .route("/mascot.jpg", get(mascot))
        .route("/lintcert", get(get_lintcert).post(post_lintcert))
        .route("/linttbscert", get(get_linttbscert).post(post_linttbscert))
        .route("/lintcrl", get(get_lintcrl).post(post_lintcrl))
        .route("/linttbscrl", get(get_linttbscrl).post(post_linttbscrl))
        .route("/lintocsp", get(get_lintocsp).post(post_lintocsp))
        .route("/linttbsocsp", get(get_linttbsocsp).post(post_linttbsocsp))
        .route("/linters", get(linters_endpoint))
        .route("/profiles", get(profiles_endpoint))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

/// Builds the monitoring listener's router: liveness, readiness, metrics, build and config.
pub fn monitoring_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/livez", get(livez))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_endpoint))
        .route("/build", get(build_endpoint))
        .route("/config", get(config_endpoint))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_format_prefers_explicit_param() {
        let headers = HeaderMap::new();
        assert_eq!(response_format(Some("text"), &headers, ResponseFormat::Json), Some(ResponseFormat::Text));
    }

    #[test]
    fn response_format_rejects_invalid_explicit_param_without_falling_back() {
        let headers = HeaderMap::new();
        assert_eq!(response_format(Some("bogus"), &headers, ResponseFormat::Json), None);
    }

    #[test]
    fn response_format_falls_back_to_accept_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, "text/html".parse().unwrap());
        assert_eq!(response_format(None, &headers, ResponseFormat::Json), Some(ResponseFormat::Html));
    }

    #[test]
    fn response_format_falls_back_to_default() {
        let headers = HeaderMap::new();
        assert_eq!(response_format(None, &headers, ResponseFormat::Text), Some(ResponseFormat::Text));
    }

    #[test]
    fn classify_content_type_rejects_mismatched_binary_type() {
        assert!(classify_content_type("application/pkix-crl", LintEndpoint::Cert).is_err());
    }

    #[test]
    fn classify_content_type_accepts_octet_stream_only_for_tbs_endpoints() {
        assert!(classify_content_type("application/octet-stream", LintEndpoint::TbsCert).is_ok());
        assert!(classify_content_type("application/octet-stream", LintEndpoint::Cert).is_err());
    }

    #[test]
    fn render_json_empty_is_bracket_literal() {
        let response = render_json(&[], false);
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn severity_style_covers_bug_and_fatal_identically() {
        assert_eq!(severity_style("BUG"), severity_style("FATAL"));
    }
}
