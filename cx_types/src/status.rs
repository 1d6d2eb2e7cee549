//! Classification of raw HTTP status codes.
//!
//! Exchanges sit behind CloudFlare, nginx and AWS load balancers, so responses can carry
//! codes outside the registered set. Status codes are kept as plain integers and classified here.

pub const OK: u16 = 200;
pub const BAD_REQUEST: u16 = 400;
pub const UNAUTHORIZED: u16 = 401;
pub const FORBIDDEN: u16 = 403;
pub const NOT_FOUND: u16 = 404;
pub const REQUEST_TIMEOUT: u16 = 408;
pub const TOO_MANY_REQUESTS: u16 = 429;
pub const INTERNAL_SERVER_ERROR: u16 = 500;
pub const BAD_GATEWAY: u16 = 502;
pub const SERVICE_UNAVAILABLE: u16 = 503;
pub const GATEWAY_TIMEOUT: u16 = 504;

pub const AWS_ELB_TIMEOUT: u16 = 460;
pub const AWS_ELB_TOO_MANY_REQUESTS: u16 = 463;
pub const NGINX_CLIENT_CLOSED_REQUEST: u16 = 499;
pub const CLOUDFLARE_UNKNOWN_ERROR: u16 = 520;
pub const CLOUDFLARE_RAILGUN_ERROR: u16 = 527;

#[inline]
pub fn is_informational(code: u16) -> bool {
    (100..200).contains(&code)
}

#[inline]
pub fn is_success(code: u16) -> bool {
    (200..300).contains(&code)
}

#[inline]
pub fn is_redirect(code: u16) -> bool {
    (300..400).contains(&code)
}

#[inline]
pub fn is_client_error(code: u16) -> bool {
    (400..500).contains(&code)
}

#[inline]
pub fn is_server_error(code: u16) -> bool {
    (500..600).contains(&code)
}

pub fn is_cloudflare_error(code: u16) -> bool {
    (CLOUDFLARE_UNKNOWN_ERROR..=CLOUDFLARE_RAILGUN_ERROR).contains(&code)
}

/// Codes produced by proxies and load balancers rather than defined by the HTTP RFCs
pub fn is_nonstandard(code: u16) -> bool {
    !(100..600).contains(&code)
        || is_cloudflare_error(code)
        || matches!(code, NGINX_CLIENT_CLOSED_REQUEST | AWS_ELB_TIMEOUT | AWS_ELB_TOO_MANY_REQUESTS)
}

pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        OK => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        BAD_REQUEST => "Bad Request",
        UNAUTHORIZED => "Unauthorized",
        FORBIDDEN => "Forbidden",
        NOT_FOUND => "Not Found",
        REQUEST_TIMEOUT => "Request Timeout",
        TOO_MANY_REQUESTS => "Too Many Requests",
        AWS_ELB_TIMEOUT => "AWS ELB Timeout",
        AWS_ELB_TOO_MANY_REQUESTS => "AWS ELB Too Many Requests",
        NGINX_CLIENT_CLOSED_REQUEST => "Client Closed Request",
        INTERNAL_SERVER_ERROR => "Internal Server Error",
        BAD_GATEWAY => "Bad Gateway",
        SERVICE_UNAVAILABLE => "Service Unavailable",
        GATEWAY_TIMEOUT => "Gateway Timeout",
        520 => "Web Server Returned an Unknown Error",
        521 => "Web Server Is Down",
        522 => "Connection Timed Out",
        523 => "Origin Is Unreachable",
        524 => "A Timeout Occurred",
        525 => "SSL Handshake Failed",
        526 => "Invalid SSL Certificate",
        CLOUDFLARE_RAILGUN_ERROR => "Railgun Error",
        _ => "Unknown Status",
    }
}
